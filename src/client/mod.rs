pub mod credentials;
pub mod retrying;

#[cfg(test)]
pub mod tests;

pub use credentials::{
    CredentialHandle, CredentialSelector, EnvCredentialSelector, PromptCredentialSelector,
};
pub use retrying::{ClientStatistics, RetryingApiClient};

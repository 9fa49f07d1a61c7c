pub mod dryrun;
pub mod http_service;
pub mod provider;
pub mod schema;
pub mod types;

pub use dryrun::DryRunService;
pub use http_service::HttpGenerationService;
pub use provider::GenerationService;
pub use types::*;

//! Submit-and-poll driver for long-running remote jobs (video generation).

pub mod poller;

#[cfg(test)]
mod tests;

pub use poller::{CancelFlag, JobProgress, JobState, LongRunningJobPoller, PollerConfig};

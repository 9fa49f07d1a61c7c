//! Durable local state: the activity log and the daily quota.
//!
//! Both live behind a [`KeyValueStore`], one namespace each, and are written
//! as whole JSON values.

pub mod activity;
pub mod backend;
pub mod fit;
pub mod quota;
pub mod types;


pub use activity::PersistentActivityStore;
pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use fit::fit;
pub use quota::{Clock, LocalClock, ManualClock, QuotaManager};
pub use types::*;

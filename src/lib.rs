pub mod api;
pub mod config;
pub mod error;
pub mod json_db;
pub mod notify;
pub mod scanner;
pub mod storage;
pub mod types;

pub use api::{ListingSource, MarktplaatsClient};
pub use config::Config;
pub use error::{Result, WatcherError};
pub use json_db::JsonSeenStore;
pub use notify::{ListingAlert, Notifier, WebhookNotifier};
pub use scanner::{CycleReport, ListingScanner, Scheduler, SchedulerState};
pub use storage::{SeenSet, SeenStore};
pub use types::{Listing, ListingId};

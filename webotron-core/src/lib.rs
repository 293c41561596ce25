pub mod cancel;
pub mod config;
pub mod content_type;
pub mod error;
pub mod fingerprint;
pub mod path_safety;
pub mod progress;
pub mod report;
pub mod store;
pub mod sync;
pub mod walk;

pub use config::SyncConfig;
pub use error::{SyncError, TransferError};
pub use report::SyncReport;
pub use sync::SyncEngine;

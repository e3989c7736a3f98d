//! Sync layer
//!
//! Download and upload between the remote store and the local cache,
//! plus the batch submission flow used by the upload page.

pub mod engine;
pub mod errors;
pub mod submit;

pub use engine::{DownloadReport, SyncEngine, UploadReceipt};
pub use errors::{ErrorKind, SyncError};
pub use submit::{FileStatus, FileSubmission, SubmissionReport, SyncService};

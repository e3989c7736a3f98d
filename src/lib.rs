//! Tree Tracker sync service
//!
//! Keeps a local file cache in step with the S3 bucket that holds the
//! reforestation datasets (drone imagery, weather grids, models, parcel
//! boundaries and satellite composites).

pub mod cache;
pub mod config;
pub mod ipc;
pub mod store;
pub mod sync;

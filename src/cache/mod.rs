//! Local cache
//!
//! Files live under a single root as `<root>/<category>/<relative path>`.

pub mod category;
pub mod intake;
pub mod layout;

pub use category::Category;
pub use intake::{CacheIntake, SaveOutcome, UploadedFile};
pub use layout::{CacheLayout, DirectoryPolicy, RemoteKey};

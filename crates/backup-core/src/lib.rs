//! Archive storage and retention decisions for world backups.
//!
//! Everything in this crate is synchronous and network-free: callers that
//! need the tarball work off the async runtime wrap it in `spawn_blocking`.

pub mod archive;
pub mod errors;
pub mod retention;
pub mod server_properties;

pub use archive::{Archive, ArchiveStore, CullReport, Listing};
pub use errors::{ConfigError, StoreError};
pub use retention::{RetentionConfig, RetentionDecision, RetentionTier, Verdict};

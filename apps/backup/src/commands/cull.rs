use std::path::Path;

use anyhow::Result;
use backup_core::archive::ArchiveStore;
use backup_core::retention::RetentionConfig;
use chrono::Utc;
use tracing::info;

/// Cull old backups without taking a new one. Needs no control session.
pub fn exec(server: &Path, retention: RetentionConfig) -> Result<()> {
    let store = ArchiveStore::open(server)?;
    let report = store.cull(Utc::now(), &retention)?;
    info!(
        kept = report.kept,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "culling complete"
    );
    Ok(())
}

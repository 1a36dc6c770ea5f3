use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use backup_core::RetentionConfig;

use crate::orchestrator::BackupOrchestrator;

pub async fn exec(
    config: &Path,
    server: &Path,
    settle: Duration,
    retention: RetentionConfig,
) -> Result<()> {
    let orchestrator = BackupOrchestrator::prepare(config, server, settle, retention)?;
    orchestrator.run().await
}

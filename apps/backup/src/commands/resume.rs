use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use control_client::{ControlConfig, ControlSession};
use tracing::warn;

use crate::orchestrator::SAVE_ON;

/// Recovery path for a run that died with persistence disabled: open a
/// session and issue save-on unconditionally.
pub async fn exec(config: &Path) -> Result<()> {
    let control = ControlConfig::load(config).context("loading control settings")?;

    let mut session = ControlSession::new();
    session
        .connect(&control)
        .await
        .context("control session authentication failed")?;

    warn!("force-resuming persistence (save-on)");
    session.send_command(SAVE_ON).await?;

    // Give the wrapper a moment to pass the command along before the
    // connection drops.
    tokio::time::sleep(Duration::from_secs(1)).await;
    session.close().await;
    Ok(())
}

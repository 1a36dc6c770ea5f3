//! End-to-end backup run: quiesce the server, archive the world, resume
//! persistence, cull old backups.
//!
//! The control protocol has no save-complete reply, so ordering between
//! "save-all" and the archive step rests entirely on a settling delay. That
//! is the contract the wrapper family has always had; the delay is
//! configurable but must not be skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use backup_core::archive::{Archive, ArchiveStore};
use backup_core::retention::RetentionConfig;
use backup_core::server_properties;
use chrono::Utc;
use control_client::{ControlConfig, ControlSession};
use tracing::{info, warn};

pub const SAVE_OFF: &str = "save-off";
pub const SAVE_ALL: &str = "save-all";
pub const SAVE_ON: &str = "save-on";

#[derive(Debug)]
pub struct BackupOrchestrator {
    control: ControlConfig,
    world_dir: PathBuf,
    store: ArchiveStore,
    settle: Duration,
    retention: RetentionConfig,
}

impl BackupOrchestrator {
    /// Preflight. Everything that can be validated without touching the
    /// network happens here: control settings parse, the server directory is
    /// really a server directory, and the backups directory exists.
    pub fn prepare(
        config_path: &Path,
        server_dir: &Path,
        settle: Duration,
        retention: RetentionConfig,
    ) -> Result<Self> {
        let control = ControlConfig::load(config_path).context("loading control settings")?;
        let level = server_properties::level_name(server_dir)?;
        let world_dir = server_dir.join(&level);
        let store = ArchiveStore::open(server_dir)?;
        info!(
            world = %level,
            backups = %store.backups_dir().display(),
            "preflight complete"
        );
        Ok(Self {
            control,
            world_dir,
            store,
            settle,
            retention,
        })
    }

    pub async fn run(self) -> Result<()> {
        let mut session = ControlSession::new();
        session
            .connect(&self.control)
            .await
            .context("control session authentication failed")?;
        info!("connected and authenticated to control endpoint");
        self.run_with_session(&mut session).await
    }

    /// The run proper, over an already-authenticated session. The session is
    /// closed on every exit path, success or failure.
    pub(crate) async fn run_with_session(&self, session: &mut ControlSession) -> Result<()> {
        let result = self.execute(session).await;
        session.close().await;
        result
    }

    async fn execute(&self, session: &mut ControlSession) -> Result<()> {
        info!("turning off auto-saving and saving the world");
        session.send_command(SAVE_OFF).await?;

        // Persistence is off from here on: every failure below must fall
        // through to the save-on attempt before it surfaces.
        let archive_result = match session.send_command(SAVE_ALL).await {
            Ok(()) => {
                self.settle(session).await;
                self.create_archive().await
            }
            Err(err) => Err(anyhow::Error::new(err).context("forcing a save failed")),
        };

        self.settle(session).await;
        info!("turning auto-saving back on");
        let resume_result = session.send_command(SAVE_ON).await;
        if let Err(err) = &resume_result {
            warn!(
                error = %err,
                "could not re-enable saving; run `mc-backup resume` once the endpoint is back"
            );
        }

        let archive = archive_result.map_err(|err| {
            err.context("backup aborted after persistence was disabled (resume was attempted)")
        })?;
        resume_result.context("failed to re-enable saving after backup")?;
        info!(
            path = %archive.path.display(),
            size_bytes = archive.size_bytes,
            "backup complete"
        );

        let report = self.store.cull(Utc::now(), &self.retention)?;
        info!(
            kept = report.kept,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "culling complete"
        );
        Ok(())
    }

    /// Tar the world off the runtime. Ctrl-C aborts the archive but not the
    /// resume step that follows it.
    async fn create_archive(&self) -> Result<Archive> {
        let store = self.store.clone();
        let world_dir = self.world_dir.clone();
        let taken_at = Utc::now();
        info!(world = %world_dir.display(), "archiving the world");

        let archive = tokio::select! {
            result = tokio::task::spawn_blocking(move || store.create(taken_at, &world_dir)) => {
                result.context("archive task panicked")??
            }
            _ = tokio::signal::ctrl_c() => {
                bail!("interrupted while archiving");
            }
        };
        Ok(archive)
    }

    /// Wait out the settling delay, logging any server chatter that arrives
    /// in the meantime.
    async fn settle(&self, session: &mut ControlSession) {
        let deadline = tokio::time::sleep(self.settle);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                message = session.next_message() => match message {
                    Some(text) => info!(server = %text, "server message"),
                    None => {
                        // Notification channel is gone; just finish the wait.
                        (&mut deadline).await;
                        break;
                    }
                }
            }
        }
    }
}

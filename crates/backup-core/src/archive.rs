//! On-disk archive store: one gzip tarball per backup under
//! `<server>/backups/`, named `YYYY-MM-DD_HH-MM-SS.tar.gz` in UTC.
//!
//! The naming format is load-bearing: existing directories written by older
//! tooling must keep parsing, so it never changes.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::retention::{self, RetentionConfig, Verdict};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const ARCHIVE_SUFFIX: &str = ".tar.gz";
// In-progress tarballs carry this extra suffix until they are renamed into
// place, so a crash mid-write never leaves a valid-looking archive behind.
const PARTIAL_SUFFIX: &str = ".partial";

/// One completed backup. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Archive {
    pub taken_at: DateTime<Utc>,
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
}

/// Result of scanning the backups directory.
#[derive(Debug, Default)]
pub struct Listing {
    /// Parsed archives, newest first.
    pub archives: Vec<Archive>,
    /// `.tar.gz` entries whose names did not parse. Reported so callers can
    /// warn about them; they are never candidates for deletion.
    pub unparsed: Vec<PathBuf>,
}

/// Outcome of one culling pass.
#[derive(Debug, Default)]
pub struct CullReport {
    pub kept: usize,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, StoreError)>,
}

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    backups_dir: PathBuf,
}

impl ArchiveStore {
    /// Open the store for a server directory, creating `backups/` if absent.
    pub fn open(server_dir: &Path) -> Result<Self, StoreError> {
        if !server_dir.is_dir() {
            return Err(StoreError::MissingServerDir(server_dir.to_path_buf()));
        }
        let backups_dir = server_dir.join("backups");
        if !backups_dir.is_dir() {
            info!(dir = %backups_dir.display(), "creating backups directory");
            fs::create_dir_all(&backups_dir)
                .map_err(|e| StoreError::io("creating backups directory", e))?;
        }
        Ok(Self { backups_dir })
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    pub fn archive_name(taken_at: DateTime<Utc>) -> String {
        format!("{}{}", taken_at.format(TIMESTAMP_FORMAT), ARCHIVE_SUFFIX)
    }

    pub fn parse_archive_name(name: &str) -> Option<DateTime<Utc>> {
        let stem = name.strip_suffix(ARCHIVE_SUFFIX)?;
        let naive = NaiveDateTime::parse_from_str(stem, TIMESTAMP_FORMAT).ok()?;
        Some(naive.and_utc())
    }

    /// Scan the backups directory. Entries without the `.tar.gz` suffix are
    /// ignored; suffixed entries that fail to parse land in
    /// [`Listing::unparsed`].
    pub fn list(&self) -> Result<Listing, StoreError> {
        let mut listing = Listing::default();

        let entries = fs::read_dir(&self.backups_dir)
            .map_err(|e| StoreError::io("reading backups directory", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("reading backups directory", e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(ARCHIVE_SUFFIX) {
                continue;
            }
            match Self::parse_archive_name(&name) {
                Some(taken_at) => {
                    let size_bytes = entry.metadata().ok().map(|m| m.len());
                    listing.archives.push(Archive {
                        taken_at,
                        path: entry.path(),
                        size_bytes,
                    });
                }
                None => {
                    warn!(file = %name, "backup has an unrecognized name, leaving it alone");
                    listing.unparsed.push(entry.path());
                }
            }
        }

        listing.archives.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
        Ok(listing)
    }

    /// Tar and gzip `source` into a new archive stamped `taken_at`.
    ///
    /// The tarball is written under a temporary name and renamed into place
    /// on success; on any failure the temporary file is removed and no
    /// archive is published.
    pub fn create(&self, taken_at: DateTime<Utc>, source: &Path) -> Result<Archive, StoreError> {
        if !source.exists() {
            return Err(StoreError::MissingSource(source.to_path_buf()));
        }
        let root = source
            .file_name()
            .ok_or_else(|| StoreError::MissingSource(source.to_path_buf()))?
            .to_os_string();

        let name = Self::archive_name(taken_at);
        let final_path = self.backups_dir.join(&name);
        let partial_path = self.backups_dir.join(format!("{name}{PARTIAL_SUFFIX}"));

        debug!(source = %source.display(), dest = %final_path.display(), "writing tarball");
        if let Err(e) = write_tarball(&partial_path, source, Path::new(&root)) {
            let _ = fs::remove_file(&partial_path);
            return Err(StoreError::io("writing archive", e));
        }
        fs::rename(&partial_path, &final_path)
            .map_err(|e| StoreError::io("publishing archive", e))?;

        let size_bytes = fs::metadata(&final_path).ok().map(|m| m.len());
        Ok(Archive {
            taken_at,
            path: final_path,
            size_bytes,
        })
    }

    pub fn delete(&self, archive: &Archive) -> Result<(), StoreError> {
        fs::remove_file(&archive.path).map_err(|e| StoreError::io("deleting archive", e))
    }

    /// One full culling pass: list, evaluate, delete every `Delete` verdict.
    ///
    /// A failed deletion is recorded in the report and does not stop the
    /// pass. Unparsed entries are only warned about.
    pub fn cull(&self, now: DateTime<Utc>, config: &RetentionConfig) -> Result<CullReport, StoreError> {
        let listing = self.list()?;
        let decisions = retention::evaluate(&listing.archives, now, config);

        let mut report = CullReport::default();
        for (archive, decision) in listing.archives.iter().zip(&decisions) {
            match decision.verdict {
                Verdict::Keep => {
                    debug!(file = %archive.path.display(), tier = ?decision.tier, "keeping backup");
                    report.kept += 1;
                }
                Verdict::Delete => match self.delete(archive) {
                    Ok(()) => {
                        info!(file = %archive.path.display(), "culled old backup");
                        report.deleted.push(archive.path.clone());
                    }
                    Err(err) => {
                        warn!(file = %archive.path.display(), error = %err, "failed to cull backup");
                        report.failed.push((archive.path.clone(), err));
                    }
                },
            }
        }
        Ok(report)
    }
}

fn write_tarball(dest: &Path, source: &Path, root: &Path) -> std::io::Result<()> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(root, source)?;
    let encoder = builder.into_inner()?;
    let file = encoder.finish()?;
    file.sync_all()?;
    Ok(())
}

//! Timestamped snapshots of the document directory.
//!
//! Every archive is a gzip-compressed tarball of the whole document
//! directory, written under its `backups/` subdirectory and never pruned
//! here; retention is the caller's concern. Backups are best-effort: a
//! failure is reported to the caller and must never roll back the save
//! that triggered it.

use crate::error::{Result, StoreError};
use crate::paths;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub const ARCHIVE_EXT: &str = "tar.gz";

pub struct BackupService {
    source_dir: PathBuf,
    backup_dir: PathBuf,
}

impl BackupService {
    /// Archives `source_dir` into `source_dir/backups`.
    pub fn new<P: AsRef<Path>>(source_dir: P) -> Self {
        let source_dir = source_dir.as_ref().to_path_buf();
        let backup_dir = source_dir.join(paths::BACKUPS_DIR_NAME);
        Self {
            source_dir,
            backup_dir,
        }
    }

    pub fn with_backup_dir<P: AsRef<Path>, Q: AsRef<Path>>(source_dir: P, backup_dir: Q) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            backup_dir: backup_dir.as_ref().to_path_buf(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshot the source directory into a new `backup_<timestamp>.tar.gz`.
    ///
    /// Returns the archive path. Two backups within the same second get a
    /// monotonic `_1`, `_2`, ... suffix; an existing archive is never
    /// overwritten.
    pub fn backup(&self) -> Result<PathBuf> {
        if !self.source_dir.is_dir() {
            return Err(StoreError::BackupIo(format!(
                "source directory missing: {}",
                self.source_dir.display()
            )));
        }
        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| StoreError::BackupIo(format!("create backup directory: {e}")))?;

        let timestamp = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let (file, archive_path) = claim_archive_file(&self.backup_dir, &timestamp)?;

        match self.write_archive(file) {
            Ok(()) => Ok(archive_path),
            Err(err) => {
                warn!(path = %archive_path.display(), "discarding partial backup archive");
                let _ = fs::remove_file(&archive_path);
                Err(err)
            }
        }
    }

    fn write_archive(&self, file: File) -> Result<()> {
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for entry in WalkDir::new(&self.source_dir) {
            let entry = entry.map_err(|e| StoreError::BackupIo(format!("walk source: {e}")))?;
            let path = entry.path();
            // never archive older archives
            if path.starts_with(&self.backup_dir) {
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = path
                .strip_prefix(&self.source_dir)
                .map_err(|e| StoreError::BackupIo(format!("relativize {}: {e}", path.display())))?;
            builder
                .append_path_with_name(path, rel)
                .map_err(|e| StoreError::BackupIo(format!("archive {}: {e}", path.display())))?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| StoreError::BackupIo(format!("finish archive: {e}")))?;
        let file = encoder
            .finish()
            .map_err(|e| StoreError::BackupIo(format!("finish compression: {e}")))?;
        file.sync_all()
            .map_err(|e| StoreError::BackupIo(format!("sync archive: {e}")))?;
        Ok(())
    }
}

/// Claim an unused archive path for `timestamp`, appending `_1`, `_2`, ...
/// until the create succeeds. `create_new` makes the claim atomic.
fn claim_archive_file(backup_dir: &Path, timestamp: &str) -> Result<(File, PathBuf)> {
    let mut attempt: u32 = 0;
    loop {
        let file_name = if attempt == 0 {
            format!("backup_{timestamp}.{ARCHIVE_EXT}")
        } else {
            format!("backup_{timestamp}_{attempt}.{ARCHIVE_EXT}")
        };
        let path = backup_dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                attempt += 1;
            }
            Err(err) => {
                return Err(StoreError::BackupIo(format!(
                    "create archive {}: {err}",
                    path.display()
                )));
            }
        }
    }
}

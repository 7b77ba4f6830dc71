//! Storage layer for critterlog.
//!
//! Sightings live in a single newline-delimited JSON file, one record per
//! line, in append order. There is no index and no cache: every operation
//! reads or writes the file directly.
//!
//! Every operation takes an advisory lock on a sidecar `<file>.lock`:
//! shared for reads, exclusive for append, delete and clear. Concurrent
//! requests therefore never interleave partial lines or lose a rewrite.

pub mod codec;
mod lock;

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::sighting::{NewSighting, Sighting};

use lock::FileLock;

/// Operations over the sighting collection.
///
/// The HTTP layer and the CLI only talk to this trait; the flat file is one
/// implementation of it.
pub trait SightingStore: Send + Sync + std::fmt::Debug {
    /// All sightings, in append order. Undecodable lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file exists but cannot be read.
    fn list(&self) -> Result<Vec<Sighting>>;

    /// Validate, stamp and append a new sighting.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad candidate, or a storage error if
    /// the line cannot be written.
    fn append(&self, candidate: NewSighting) -> Result<Sighting>;

    /// Remove every sighting whose key equals `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing matched (the file is left
    /// untouched), or a storage error if the rewrite fails.
    fn delete_by_key(&self, key: &str) -> Result<bool>;

    /// Remove every sighting.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be truncated.
    fn clear_all(&self) -> Result<()>;
}

/// Result of reading the whole file, including the lines that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scan {
    /// Decoded sightings, in file order.
    pub sightings: Vec<Sighting>,
    /// Number of non-blank lines that could not be decoded.
    pub skipped_lines: usize,
}

/// Statistics about the sighting file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of readable sightings.
    pub total_sightings: usize,
    /// Number of non-blank lines that could not be decoded.
    pub skipped_lines: usize,
    /// Earliest `created_at` present.
    pub oldest_sighting: Option<String>,
    /// Latest `created_at` present.
    pub newest_sighting: Option<String>,
    /// Size of the data file in bytes.
    pub file_size_bytes: u64,
}

/// Flat-file implementation of [`SightingStore`].
#[derive(Debug)]
pub struct FlatFileStore {
    /// Path to the data file.
    path: PathBuf,
    /// Path to the sidecar lock file.
    lock_path: PathBuf,
}

impl FlatFileStore {
    /// Open a store backed by the file at `path`.
    ///
    /// Creates the parent directories if they don't exist. The data file
    /// itself is created lazily by the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let lock_path = sibling_with_suffix(&path, ".lock");
        debug!("Sighting store at {}", path.display());
        Ok(Self { path, lock_path })
    }

    /// Get the path to the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every line, keeping the sightings and counting what was dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn scan(&self) -> Result<Scan> {
        let _guard = FileLock::shared(&self.lock_path)?;
        let content = self.read_content()?;

        let mut scan = Scan::default();
        for line in codec::split_lines(&content) {
            match line.and_then(codec::decode) {
                Some(sighting) => scan.sightings.push(sighting),
                None => scan.skipped_lines += 1,
            }
        }
        Ok(scan)
    }

    /// Append a sighting stamped with the given time.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad candidate, or a storage error if
    /// the line cannot be written.
    pub fn append_at(&self, candidate: NewSighting, at: DateTime<Local>) -> Result<Sighting> {
        let sighting = candidate.into_sighting(at)?;
        let mut line = codec::encode(&sighting)?;
        line.push('\n');

        let _guard = FileLock::exclusive(&self.lock_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.write_error(source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| self.write_error(source))?;

        debug!("Appended sighting {}", sighting.created_at);
        Ok(sighting)
    }

    /// Get statistics about the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn stats(&self) -> Result<StoreStats> {
        let scan = self.scan()?;

        let keys = scan
            .sightings
            .iter()
            .map(Sighting::key)
            .filter(|key| !key.is_empty());
        let oldest_sighting = keys.clone().min().map(str::to_string);
        let newest_sighting = keys.max().map(str::to_string);

        let file_size_bytes = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(StoreStats {
            total_sightings: scan.sightings.len(),
            skipped_lines: scan.skipped_lines,
            oldest_sighting,
            newest_sighting,
            file_size_bytes,
        })
    }

    /// Read the raw file. A missing file is empty.
    fn read_content(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(Error::StoreRead {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Replace the file contents via a temporary sibling and a rename.
    ///
    /// Must be called with the exclusive lock held.
    fn rewrite(&self, content: &str) -> Result<()> {
        let temp_path = sibling_with_suffix(&self.path, ".tmp");

        let written = write_synced(&temp_path, content.as_bytes())
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(source) = written {
            if let Err(e) = fs::remove_file(&temp_path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Could not remove {}: {e}", temp_path.display());
                }
            }
            return Err(self.write_error(source));
        }
        Ok(())
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::StoreWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl SightingStore for FlatFileStore {
    fn list(&self) -> Result<Vec<Sighting>> {
        let scan = self.scan()?;
        if scan.skipped_lines > 0 {
            warn!(
                "Skipped {} unreadable line(s) in {}",
                scan.skipped_lines,
                self.path.display()
            );
        }
        Ok(scan.sightings)
    }

    fn append(&self, candidate: NewSighting) -> Result<Sighting> {
        self.append_at(candidate, Local::now())
    }

    fn delete_by_key(&self, key: &str) -> Result<bool> {
        let _guard = FileLock::exclusive(&self.lock_path)?;
        let content = self.read_content()?;

        let mut kept = String::with_capacity(content.len());
        let mut removed = 0usize;
        let mut dropped = 0usize;

        for line in codec::split_lines(&content) {
            let Some(line) = line else {
                dropped += 1;
                continue;
            };
            match codec::decode(line) {
                Some(sighting) if sighting.matches_key(key) => removed += 1,
                Some(_) => {
                    kept.push_str(line);
                    kept.push('\n');
                }
                None => dropped += 1,
            }
        }

        if removed == 0 {
            return Err(Error::not_found(key));
        }

        self.rewrite(&kept)?;

        if dropped > 0 {
            warn!(
                "Dropped {} unreadable line(s) while rewriting {}",
                dropped,
                self.path.display()
            );
        }
        info!("Deleted {} sighting(s) recorded at {}", removed, key);
        Ok(true)
    }

    fn clear_all(&self) -> Result<()> {
        let _guard = FileLock::exclusive(&self.lock_path)?;
        File::create(&self.path).map_err(|source| self.write_error(source))?;
        info!("Cleared all sightings in {}", self.path.display());
        Ok(())
    }
}

/// Create `path`, write `content` and flush it to disk.
fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}

/// `path` with `suffix` appended to its file name.
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

//! Directory-backed result archive (`batch_results/`).
//!
//! One pretty-printed JSON file per drained batch, named
//! `<YYYYmmdd-HHMMSS>_<batch id prefix>.json`. Files are moved into place with
//! a no-clobber rename; on a name clash a `-<n>` suffix is tried instead.
//! `locate` only opens files whose name carries the batch's prefix.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::PersistError;

use super::json_file::write_temp;
use crate::domain::{BatchError, BatchId, ResultRecord, Result};
use crate::ports::{ArchiveLocation, ResultArchive};

const BATCH_PREFIX_LEN: usize = 8;
const MAX_SUFFIX: u32 = 1000;

pub struct DirectoryResultArchive {
    dir: PathBuf,
}

impl DirectoryResultArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_prefix(batch_id: &BatchId) -> String {
        batch_id
            .short(BATCH_PREFIX_LEN)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }

    fn stem(record: &ResultRecord) -> String {
        format!(
            "{}_{}",
            record.retrieved_at.format("%Y%m%d-%H%M%S"),
            Self::file_prefix(&record.batch_id)
        )
    }

    /// Whether a file name could have been written by `append` for a batch
    /// with this prefix, with or without a `-<n>` suffix.
    fn named_for(path: &Path, prefix: &str) -> bool {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return false;
        };
        let tail = format!("_{prefix}");
        if stem.ends_with(&tail) {
            return true;
        }
        match stem.rsplit_once('-') {
            Some((head, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                head.ends_with(&tail)
            }
            _ => false,
        }
    }

    fn file_name(stem: &str, attempt: u32) -> String {
        if attempt == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}-{attempt}.json")
        }
    }
}

impl ResultArchive for DirectoryResultArchive {
    fn append(&self, record: &ResultRecord) -> Result<ArchiveLocation> {
        let stem = Self::stem(record);
        let mut tmp = write_temp(&self.dir.join(Self::file_name(&stem, 0)), record)?;

        for attempt in 0..MAX_SUFFIX {
            let path = self.dir.join(Self::file_name(&stem, attempt));
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "result record archived");
                    return Ok(ArchiveLocation::new(path));
                }
                Err(PersistError { error, file })
                    if error.kind() == std::io::ErrorKind::AlreadyExists =>
                {
                    tmp = file;
                }
                Err(PersistError { error, .. }) => return Err(BatchError::io(path, error)),
            }
        }

        Err(BatchError::io(
            self.dir.join(Self::file_name(&stem, MAX_SUFFIX)),
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "no free archive file name",
            ),
        ))
    }

    fn locate(&self, batch_id: &BatchId) -> Result<Option<ArchiveLocation>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BatchError::io(&self.dir, e)),
        };

        let prefix = Self::file_prefix(batch_id);
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter(|p| Self::named_for(p, &prefix))
            .collect();
        candidates.sort();

        for path in candidates {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable archive file");
                    continue;
                }
            };
            match serde_json::from_str::<ResultRecord>(&text) {
                Ok(record) if &record.batch_id == batch_id => {
                    return Ok(Some(ArchiveLocation::new(path)));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping malformed archive file");
                }
            }
        }
        Ok(None)
    }
}

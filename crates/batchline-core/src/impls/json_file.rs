//! Whole-file JSON persistence: read-or-default, write-to-temp-then-rename.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::domain::{BatchError, Result};

/// Read `path` as JSON; a missing or blank file yields `T::default()`.
pub(crate) fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(T::default()),
        Ok(text) => serde_json::from_str(&text).map_err(|source| BatchError::Serialization {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(BatchError::io(path, e)),
    }
}

/// Serialize `value` into a temp file next to `path`.
///
/// The caller decides how the temp file replaces (or refuses to replace) the
/// destination.
pub(crate) fn write_temp<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|e| BatchError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| BatchError::io(dir, e))?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|source| {
        BatchError::Serialization {
            path: path.to_path_buf(),
            source,
        }
    })?;
    tmp.write_all(b"\n").map_err(|e| BatchError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| BatchError::io(tmp.path(), e))?;
    Ok(tmp)
}

/// Replace `path` atomically with the serialized `value`.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = write_temp(path, value)?;
    tmp.persist(path).map_err(|e| BatchError::io(path, e.error))?;
    Ok(())
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_and_blank_files_read_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let v: Vec<String> = read_json(&missing).unwrap();
        assert!(v.is_empty());

        let blank = dir.path().join("blank.json");
        fs::write(&blank, "  \n").unwrap();
        let v: Vec<String> = read_json(&blank).unwrap();
        assert!(v.is_empty());
    }

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        write_json_atomic(&path, &vec!["a".to_string()]).unwrap();
        write_json_atomic(&path, &vec!["b".to_string(), "c".to_string()]).unwrap();

        let v: Vec<String> = read_json(&path).unwrap();
        assert_eq!(v, ["b", "c"]);
        // Only the destination remains; temp files were renamed away.
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let err = read_json::<BTreeMap<String, String>>(&path).unwrap_err();
        assert!(matches!(err, BatchError::Serialization { .. }));
    }
}

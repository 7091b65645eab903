//! One JSON file per capture under `<base>/snapshot_tool/snapshots`.
//!
//! Files are only ever created whole, read, or removed whole. A capture that
//! lands in the same second as an existing file gets a numeric suffix instead
//! of replacing it.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::error::{Result, SnapshotError};
use crate::system::platform;
use crate::system::snapshot::Snapshot;

const FILE_PREFIX: &str = "snapshot_";
const FILE_EXTENSION: &str = "json";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const MAX_SUFFIX: u32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Failed,
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeleteOutcome::Deleted => "Deleted",
            DeleteOutcome::Failed => "Failed",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteReport {
    pub name: String,
    pub outcome: DeleteOutcome,
    pub detail: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<home>/snapshot_tool/snapshots`, or `%APPDATA%\snapshot_tool\snapshots`
    /// on Windows.
    pub fn default_dir() -> Result<PathBuf> {
        let base = platform::snapshot_base_dir().ok_or(SnapshotError::NoBaseDirectory)?;
        Ok(base.join("snapshot_tool").join("snapshots"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        self.save_at(snapshot, Local::now().naive_local())
    }

    pub fn save_at(&self, snapshot: &Snapshot, captured_at: NaiveDateTime) -> Result<PathBuf> {
        let _save_span = tracing::debug_span!("store.save").entered();

        fs::create_dir_all(&self.dir)
            .map_err(|e| SnapshotError::io("create directory", &self.dir, e))?;

        let bytes = serde_json::to_vec(snapshot).map_err(|e| {
            SnapshotError::io("serialize snapshot for", &self.dir, std::io::Error::other(e))
        })?;

        let stamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
        for suffix in 0..MAX_SUFFIX {
            let path = self.dir.join(file_name(&stamp, suffix));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(SnapshotError::io("create", &path, e)),
            };
            if let Err(e) = file.write_all(&bytes).and_then(|()| file.sync_all()) {
                drop(file);
                // Never leave a truncated snapshot behind.
                if let Err(cleanup) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), "could not remove partial snapshot: {cleanup}");
                }
                return Err(SnapshotError::io("write", &path, e));
            }
            tracing::info!(path = %path.display(), "snapshot saved");
            return Ok(path);
        }

        Err(SnapshotError::io(
            "find a free name in",
            &self.dir,
            std::io::Error::new(ErrorKind::AlreadyExists, format!("too many snapshots at {stamp}")),
        ))
    }

    /// Snapshot names in ascending order. A missing directory is an empty list.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SnapshotError::io("read directory", &self.dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SnapshotError::io("read directory", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(?raw, "skipping non UTF-8 file name"),
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<Snapshot> {
        let _load_span = tracing::debug_span!("store.load").entered();

        let path = self.resolve(name)?;
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(name.to_string()));
            }
            Err(e) => return Err(SnapshotError::io("read", &path, e)),
        };
        serde_json::from_slice(&contents).map_err(|source| SnapshotError::Parse {
            name: name.to_string(),
            source,
        })
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(snapshot = name, "snapshot deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SnapshotError::NotFound(name.to_string())),
            Err(e) => Err(SnapshotError::io("delete", &path, e)),
        }
    }

    /// Deletes every listed snapshot, reporting each one; a failure on one
    /// name does not stop the rest.
    pub fn delete_all(&self) -> Result<Vec<DeleteReport>> {
        let reports = self
            .list()?
            .into_iter()
            .map(|name| match self.delete(&name) {
                Ok(()) => DeleteReport {
                    name,
                    outcome: DeleteOutcome::Deleted,
                    detail: None,
                },
                Err(e) => {
                    tracing::warn!(snapshot = %name, "{e}");
                    DeleteReport {
                        name,
                        outcome: DeleteOutcome::Failed,
                        detail: Some(e.to_string()),
                    }
                }
            })
            .collect();
        Ok(reports)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        // Names are plain file names inside the store, never paths.
        let is_plain = !name.is_empty()
            && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
            && name != "."
            && name != "..";
        if !is_plain {
            return Err(SnapshotError::NotFound(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

/// Capture time encoded in a standard snapshot name, if it is one.
pub fn captured_at(name: &str) -> Option<NaiveDateTime> {
    let stem = name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_EXTENSION)?
        .strip_suffix('.')?;
    let stamp = stem.get(..19)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

fn file_name(stamp: &str, suffix: u32) -> String {
    if suffix == 0 {
        format!("{FILE_PREFIX}{stamp}.{FILE_EXTENSION}")
    } else {
        format!("{FILE_PREFIX}{stamp}_{suffix}.{FILE_EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn file_names_follow_timestamp_layout() {
        assert_eq!(file_name("2024-03-09_08-05-01", 0), "snapshot_2024-03-09_08-05-01.json");
        assert_eq!(file_name("2024-03-09_08-05-01", 2), "snapshot_2024-03-09_08-05-01_2.json");
    }

    #[test]
    fn captured_at_parses_plain_and_suffixed_names() {
        assert_eq!(captured_at("snapshot_2024-03-09_08-05-01.json"), Some(at(8, 5, 1)));
        assert_eq!(captured_at("snapshot_2024-03-09_08-05-01_3.json"), Some(at(8, 5, 1)));
        assert_eq!(captured_at("notes.json"), None);
        assert_eq!(captured_at("snapshot_garbage.json"), None);
    }

    #[test]
    fn names_with_separators_are_not_found() {
        let store = SnapshotStore::new(std::env::temp_dir().join("snapshot_tool_resolve_test"));
        for name in ["../etc/passwd", "a/b.json", "", ".."] {
            assert!(matches!(store.resolve(name), Err(SnapshotError::NotFound(_))), "{name}");
        }
        assert!(store.resolve("snapshot_2024-03-09_08-05-01.json").is_ok());
    }
}

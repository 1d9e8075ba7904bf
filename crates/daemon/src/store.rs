// Slot-addressed persistence for the annotator's working files.
//
// Every write lands in a uniquely named temp file first and is renamed over
// the slot, so readers (including the static file server) never see a torn file.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use annotator_common::metadata::MetadataRecord;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Suffix shared by the current metadata record and its history.
pub const META_SUFFIX: &str = "_meta.json";

/// Fixed file roles inside the plots directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Background,
    Annotated,
    Annotations,
    Metadata,
}

impl Slot {
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Background => "current.png",
            Self::Annotated => "current_annotated.png",
            Self::Annotations => "current_annotations.json",
            Self::Metadata => "current_meta.json",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write `{}`: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read `{}`: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("metadata `{}` is not a valid record: {source}", .path.display())]
    Metadata { path: PathBuf, source: serde_json::Error },

    #[error("failed to encode metadata: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Storage behind the dispatcher. Implementations own the slot files.
pub trait PersistenceStore: Send + Sync {
    fn slot_path(&self, slot: Slot) -> PathBuf;

    /// Replace the slot contents wholesale and return its path.
    fn write(&self, slot: Slot, bytes: &[u8]) -> Result<PathBuf, StoreError>;

    fn read(&self, slot: Slot) -> Result<Option<Vec<u8>>, StoreError>;

    /// Every parseable `*_meta.json` record, the current one included.
    fn history(&self) -> Result<Vec<MetadataRecord>, StoreError>;

    fn load_metadata(&self) -> Result<Option<MetadataRecord>, StoreError> {
        let Some(bytes) = self.read(Slot::Metadata)? else {
            return Ok(None);
        };
        MetadataRecord::from_json(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Metadata { path: self.slot_path(Slot::Metadata), source })
    }

    fn store_metadata(&self, record: &MetadataRecord) -> Result<PathBuf, StoreError> {
        let bytes = record.to_json_pretty().map_err(StoreError::Encode)?;
        self.write(Slot::Metadata, &bytes)
    }
}

// ── Directory-backed store ─────────────────────────────────────────

/// Stores slots as files directly under one directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|source| StoreError::Write { path: dir.clone(), source })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn temp_path_for(&self, slot: Slot) -> PathBuf {
        self.dir.join(format!(".{}.{}.tmp", slot.file_name(), Uuid::new_v4()))
    }
}

impl PersistenceStore for DirStore {
    fn slot_path(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.file_name())
    }

    fn write(&self, slot: Slot, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let target_path = self.slot_path(slot);
        let tmp_path = self.temp_path_for(slot);

        let result =
            write_synced(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, &target_path));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Write { path: target_path, source });
        }

        debug!(path = %target_path.display(), bytes = bytes.len(), "slot written");
        Ok(target_path)
    }

    fn read(&self, slot: Slot) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.slot_path(slot);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn history(&self) -> Result<Vec<MetadataRecord>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Read { path: self.dir.clone(), source }),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(META_SUFFIX) && !name.starts_with('.'))
            })
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = fs::read(&path)
                .map_err(|error| error.to_string())
                .and_then(|bytes| MetadataRecord::from_json(&bytes).map_err(|e| e.to_string()));
            match parsed {
                Ok(record) => records.push(record),
                Err(reason) => debug!(path = %path.display(), %reason, "skipping metadata record"),
            }
        }
        Ok(records)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_data()
}

// ── In-memory store ────────────────────────────────────────────────

/// Keeps slots in memory. Paths are reported under a virtual root.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<Slot, Vec<u8>>>,
    history: Mutex<Vec<MetadataRecord>>,
}

impl MemoryStore {
    const ROOT: &'static str = "/memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add an archived metadata record (a `<name>_meta.json` file on disk).
    pub fn push_history(&self, record: MetadataRecord) {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

impl PersistenceStore for MemoryStore {
    fn slot_path(&self, slot: Slot) -> PathBuf {
        Path::new(Self::ROOT).join(slot.file_name())
    }

    fn write(&self, slot: Slot, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).insert(slot, bytes.to_vec());
        Ok(self.slot_path(slot))
    }

    fn read(&self, slot: Slot) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.slots.lock().unwrap_or_else(PoisonError::into_inner).get(&slot).cloned())
    }

    fn history(&self) -> Result<Vec<MetadataRecord>, StoreError> {
        let mut records = self.history.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Ok(Some(current)) = self.load_metadata() {
            records.push(current);
        }
        Ok(records)
    }
}

//! Durable snapshot storage for named collections.
//!
//! A [`SnapshotStore`] persists opaque serialized blobs under names.
//! `put` must be atomic: concurrent readers never observe a partially
//! written blob. The collection layer owns the blob schema; stores only
//! move bytes.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;

use crate::error::{LociError, Result};

/// File extension used by [`FsStore`] snapshots.
const SNAPSHOT_EXT: &str = "loci";

/// Named, atomic blob storage.
pub trait SnapshotStore {
    /// Commit a blob under `name`, replacing any previous blob
    /// atomically (all-or-nothing visibility).
    fn put(&self, name: &str, blob: &[u8]) -> Result<()>;

    /// Fetch the blob stored under `name`.
    /// Fails with [`LociError::SnapshotNotFound`] when absent.
    fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Whether a blob exists under `name`.
    fn contains(&self, name: &str) -> Result<bool>;

    /// All stored names, sorted for deterministic iteration.
    fn list(&self) -> Result<Vec<String>>;

    /// Remove the blob under `name`. Returns whether anything was
    /// removed. Already-loaded in-memory copies are unaffected.
    fn delete(&self, name: &str) -> Result<bool>;
}

/// Reject names that are empty or would escape a store's namespace.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(LociError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// In-memory store, used as a test collaborator and for ephemeral
/// collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<FxHashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FxHashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| LociError::Storage(io::Error::other("memory store lock poisoned")))
    }
}

impl SnapshotStore for MemoryStore {
    fn put(&self, name: &str, blob: &[u8]) -> Result<()> {
        validate_name(name)?;
        self.lock()?.insert(name.to_string(), blob.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        self.lock()?
            .get(name)
            .cloned()
            .ok_or_else(|| LociError::SnapshotNotFound(name.to_string()))
    }

    fn contains(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.lock()?.contains_key(name))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.lock()?.remove(name).is_some())
    }
}

/// Filesystem-backed store: one file per snapshot under a root
/// directory, committed by writing a temporary file in the same
/// directory and renaming it over the target.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{SNAPSHOT_EXT}"))
    }
}

impl SnapshotStore for FsStore {
    fn put(&self, name: &str, blob: &[u8]) -> Result<()> {
        validate_name(name)?;
        // Temp file must live in the store root: rename is only atomic
        // within a filesystem.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(blob)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.blob_path(name))
            .map_err(|e| LociError::Storage(e.error))?;
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        match fs::read(self.blob_path(name)) {
            Ok(blob) => Ok(blob),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LociError::SnapshotNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.blob_path(name).exists())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        match fs::remove_file(self.blob_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

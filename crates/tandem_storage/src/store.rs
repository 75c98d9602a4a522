//! The rooted document store.

use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;
use crate::transaction::Transaction;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum serialized document size: 10 MiB.
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// Serial for staging-file names.
static TEMP_SERIAL: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Advisory lock file guarding the storage root.
const LOCK_FILE: &str = "LOCK";

/// Durable hierarchical key-value store.
///
/// One JSON document per key, laid out under a root directory. The store is
/// an explicit service object: open one per process, share it via `Arc`.
/// Dropping the store releases the root lock.
///
/// # Single Writer
///
/// `open` takes an exclusive advisory lock on `<root>/LOCK`; a second
/// process opening the same root fails with [`StorageError::RootLocked`].
///
/// # Concurrency
///
/// All operations are safe to call from many tasks at once. Note that
/// [`Storage::update`] is read-modify-write without cross-caller atomicity:
/// two concurrent updates of the same key can interleave. Callers that need
/// that guarantee serialize the sequence externally (the session layer holds
/// its lock manager's write lock around session-record updates).
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    _lock_file: std::fs::File,
}

impl Storage {
    /// Opens a storage root, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RootLocked`] if another process holds the
    /// root, or an I/O error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(root)?;
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::RootLocked);
        }
        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the storage root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads and deserializes the document at `key`.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if the key has no document.
    pub async fn read<T: DeserializeOwned>(&self, key: &StorageKey) -> StorageResult<T> {
        let bytes = self.read_raw(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Serializes `value` and writes it at `key`, creating missing parent
    /// containers transparently.
    ///
    /// # Errors
    ///
    /// [`StorageError::ValueTooLarge`] if the serialized document exceeds
    /// [`MAX_VALUE_SIZE`].
    pub async fn write<T: Serialize>(&self, key: &StorageKey, value: &T) -> StorageResult<()> {
        let payload = serde_json::to_vec(value)?;
        self.write_raw(key, &payload).await
    }

    /// Removes the document at `key`. Removing an absent key is not an
    /// error.
    pub async fn remove(&self, key: &StorageKey) -> StorageResult<()> {
        match tokio::fs::remove_file(self.document_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if absent_kind(e.kind()) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns true if a document exists at `key`.
    pub async fn exists(&self, key: &StorageKey) -> bool {
        tokio::fs::try_exists(self.document_path(key))
            .await
            .unwrap_or(false)
    }

    /// Lists every full key under `prefix`, sorted.
    ///
    /// An absent prefix yields an empty list.
    pub async fn list(&self, prefix: &StorageKey) -> StorageResult<Vec<StorageKey>> {
        let mut out = Vec::new();
        let start = self.root.join(prefix.container_path());
        let mut stack: Vec<(PathBuf, Vec<String>)> =
            vec![(start, prefix.segments().to_vec())];

        while let Some((dir, segments)) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    let mut child = segments.clone();
                    child.push(name);
                    stack.push((entry.path(), child));
                } else if let Some(stem) = name.strip_suffix(".json") {
                    let mut child = segments.clone();
                    child.push(stem.to_string());
                    out.push(StorageKey::from_trusted(child));
                }
            }
        }

        out.sort();
        Ok(out)
    }

    /// Read-modify-write convenience: reads the document at `key`, applies
    /// `mutate`, writes the result back, and returns it.
    ///
    /// This does **not** serialize concurrent updates of the same key;
    /// callers needing that atomicity hold an external write lock around the
    /// call.
    pub async fn update<T, F>(&self, key: &StorageKey, mutate: F) -> StorageResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let mut value: T = self.read(key).await?;
        mutate(&mut value);
        self.write(key, &value).await?;
        Ok(value)
    }

    /// Begins a transaction that stages writes and removes against this
    /// store.
    #[must_use]
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Reads the raw document bytes at `key`.
    pub(crate) async fn read_raw(&self, key: &StorageKey) -> StorageResult<Vec<u8>> {
        match tokio::fs::read(self.document_path(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if absent_kind(e.kind()) => Err(StorageError::not_found(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes raw document bytes at `key` via write-to-temp + atomic
    /// rename.
    pub(crate) async fn write_raw(&self, key: &StorageKey, payload: &[u8]) -> StorageResult<()> {
        if payload.len() > MAX_VALUE_SIZE {
            return Err(StorageError::ValueTooLarge {
                key: key.to_string(),
                size: payload.len(),
                limit: MAX_VALUE_SIZE,
            });
        }
        let path = self.document_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Unique temp name so concurrent writers of one key cannot clobber
        // each other's staging file; the rename is what linearizes them.
        let serial = TEMP_SERIAL.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let temp = path.with_extension(format!("json.{serial}.tmp"));
        {
            let mut file = tokio::fs::File::create(&temp).await?;
            tokio::io::AsyncWriteExt::write_all(&mut file, payload).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }

    fn document_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.document_path())
    }
}

/// Error kinds that mean "this key has no document": the file is missing,
/// or a parent component exists but is not a container.
fn absent_kind(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

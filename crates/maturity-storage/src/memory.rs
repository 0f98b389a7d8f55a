//! In-memory stand-ins for the store and the sync folder.
//!
//! Used by tests and by callers that want to exercise the sync engine
//! without a filesystem. The folder fake keeps a logical clock so
//! modification times are deterministic, counts writes and deletes, and can
//! simulate revoked access or failing files.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use jiff::{SignedDuration, Timestamp};

use crate::BoxFuture;
use crate::error::StorageError;
use crate::folder::{FileContents, FolderEntry, SyncFolder};
use crate::store::PersistentStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_string(), value.to_string());
    }
}

impl PersistentStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        Box::pin(async move { Ok(lock(&self.entries).get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Io {
                    path: key.to_string(),
                    source: std::io::Error::other("simulated write failure"),
                });
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            lock(&self.entries).insert(key.to_string(), value);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            lock(&self.entries).remove(key);
            Ok(())
        })
    }
}

#[derive(Debug)]
struct MemoryFile {
    bytes: Vec<u8>,
    modified: Timestamp,
}

#[derive(Debug, Default)]
pub struct MemoryFolder {
    files: Mutex<BTreeMap<String, MemoryFile>>,
    failing: Mutex<BTreeSet<String>>,
    denied: Mutex<BTreeSet<String>>,
    clock: AtomicI64,
    writes: AtomicUsize,
    deletes: AtomicUsize,
    revoked: AtomicBool,
}

impl MemoryFolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next logical modification time; one second per tick.
    fn tick(&self) -> Timestamp {
        let seconds = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        Timestamp::UNIX_EPOCH + SignedDuration::from_secs(seconds)
    }

    /// Per-file permission failure, as a real folder reports it once the
    /// root is known to be reachable.
    fn check_file(&self, name: &str) -> Result<(), StorageError> {
        if lock(&self.denied).contains(name) {
            return Err(StorageError::Io {
                path: name.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        Ok(())
    }

    fn check_access(&self) -> Result<(), StorageError> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(StorageError::PermissionDenied {
                path: self.describe(),
            });
        }
        Ok(())
    }

    /// Place a file as another device would. Not counted as a write.
    pub fn put_external(&self, name: &str, bytes: impl Into<Vec<u8>>) -> Timestamp {
        let modified = self.tick();
        lock(&self.files).insert(
            name.to_string(),
            MemoryFile {
                bytes: bytes.into(),
                modified,
            },
        );
        modified
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(name).map(|f| f.bytes.clone())
    }

    pub fn modified(&self, name: &str) -> Option<Timestamp> {
        lock(&self.files).get(name).map(|f| f.modified)
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.files).keys().cloned().collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        self.revoked.store(false, Ordering::SeqCst);
    }

    /// Deny reads, writes and deletes of `name` while the folder itself
    /// stays accessible.
    pub fn deny_file(&self, name: &str) {
        lock(&self.denied).insert(name.to_string());
    }

    /// Make writes to `name` fail with a transient I/O error.
    pub fn fail_writes_to(&self, name: &str) {
        lock(&self.failing).insert(name.to_string());
    }
}

impl SyncFolder for MemoryFolder {
    fn describe(&self) -> String {
        "memory://sync".to_string()
    }

    fn request_permission(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(async move { self.check_access() })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<FolderEntry>, StorageError>> {
        Box::pin(async move {
            self.check_access()?;
            Ok(lock(&self.files)
                .iter()
                .map(|(name, file)| FolderEntry {
                    name: name.clone(),
                    modified: file.modified,
                })
                .collect())
        })
    }

    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<FileContents, StorageError>> {
        Box::pin(async move {
            self.check_access()?;
            self.check_file(name)?;
            lock(&self.files)
                .get(name)
                .map(|f| FileContents {
                    bytes: f.bytes.clone(),
                    modified: f.modified,
                })
                .ok_or_else(|| StorageError::NotFound {
                    key: name.to_string(),
                })
        })
    }

    fn write<'a>(
        &'a self,
        name: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<Timestamp, StorageError>> {
        Box::pin(async move {
            self.check_access()?;
            self.check_file(name)?;
            if lock(&self.failing).contains(name) {
                return Err(StorageError::Io {
                    path: name.to_string(),
                    source: std::io::Error::other("simulated write failure"),
                });
            }
            let modified = self.tick();
            lock(&self.files).insert(name.to_string(), MemoryFile { bytes, modified });
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(modified)
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.check_access()?;
            self.check_file(name)?;
            if lock(&self.files).remove(name).is_some() {
                self.deletes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
    }
}

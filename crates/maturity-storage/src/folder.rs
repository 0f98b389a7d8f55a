use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use jiff::Timestamp;
use tracing::debug;

use crate::BoxFuture;
use crate::error::StorageError;

/// A file in the sync folder and its last modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    pub modified: Timestamp,
}

#[derive(Debug)]
pub struct FileContents {
    pub bytes: Vec<u8>,
    pub modified: Timestamp,
}

/// A flat directory shared with other devices.
///
/// Entries are addressed by bare file name. Implementations report loss of
/// access as [`StorageError::PermissionDenied`] or
/// [`StorageError::FolderUnavailable`].
pub trait SyncFolder: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Confirm the folder is still reachable and writable.
    fn request_permission(&self) -> BoxFuture<'_, Result<(), StorageError>>;

    fn list(&self) -> BoxFuture<'_, Result<Vec<FolderEntry>, StorageError>>;

    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<FileContents, StorageError>>;

    /// Write `bytes` to `name`, returning the file's new modification time.
    fn write<'a>(
        &'a self,
        name: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<Timestamp, StorageError>>;

    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;
}

/// A real directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryFolder {
    root: PathBuf,
}

impl DirectoryFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(StorageError::InvalidKey(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Map an error on a single entry. Folder loss is reported only when
    /// the root itself fails its access check; anything else is an error on
    /// that one file.
    async fn classify(&self, err: io::Error, path: &Path) -> StorageError {
        if let Err(root_err) = self.request_permission().await {
            return root_err;
        }
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                key: path.display().to_string(),
            },
            _ => StorageError::Io {
                path: path.display().to_string(),
                source: err,
            },
        }
    }
}

fn to_timestamp(time: io::Result<SystemTime>) -> Timestamp {
    time.ok()
        .and_then(|t| Timestamp::try_from(t).ok())
        .unwrap_or_else(Timestamp::now)
}

impl SyncFolder for DirectoryFolder {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn request_permission(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(async move {
            let meta = match tokio::fs::metadata(&self.root).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StorageError::FolderUnavailable {
                        path: self.root.display().to_string(),
                    });
                }
                Err(e) => return Err(StorageError::from_io(e, &self.root)),
            };
            if !meta.is_dir() {
                return Err(StorageError::FolderUnavailable {
                    path: self.root.display().to_string(),
                });
            }
            if meta.permissions().readonly() {
                return Err(StorageError::PermissionDenied {
                    path: self.root.display().to_string(),
                });
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<FolderEntry>, StorageError>> {
        Box::pin(async move {
            let mut dir = match tokio::fs::read_dir(&self.root).await {
                Ok(dir) => dir,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StorageError::FolderUnavailable {
                        path: self.root.display().to_string(),
                    });
                }
                Err(e) => return Err(StorageError::from_io(e, &self.root)),
            };

            let mut entries = Vec::new();
            while let Some(entry) = dir
                .next_entry()
                .await
                .map_err(|e| StorageError::from_io(e, &self.root))?
            {
                let Ok(meta) = entry.metadata().await else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                entries.push(FolderEntry {
                    name,
                    modified: to_timestamp(meta.modified()),
                });
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        })
    }

    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<FileContents, StorageError>> {
        Box::pin(async move {
            let path = self.entry_path(name)?;
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => return Err(self.classify(e, &path).await),
            };
            let modified = match tokio::fs::metadata(&path).await {
                Ok(meta) => to_timestamp(meta.modified()),
                Err(e) => return Err(self.classify(e, &path).await),
            };
            Ok(FileContents { bytes, modified })
        })
    }

    fn write<'a>(
        &'a self,
        name: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<Timestamp, StorageError>> {
        Box::pin(async move {
            let path = self.entry_path(name)?;
            // Temp name does not end in `.json`, so a concurrent import skips it.
            let tmp_path = self.root.join(format!(".{name}.tmp"));
            if let Err(e) = tokio::fs::write(&tmp_path, &bytes).await {
                return Err(self.classify(e, &tmp_path).await);
            }
            if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
                return Err(self.classify(e, &path).await);
            }
            let modified = match tokio::fs::metadata(&path).await {
                Ok(meta) => to_timestamp(meta.modified()),
                Err(e) => return Err(self.classify(e, &path).await),
            };
            debug!(path = %path.display(), "sync file written");
            Ok(modified)
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let path = self.entry_path(name)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "sync file deleted");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.classify(e, &path).await),
            }
        })
    }
}

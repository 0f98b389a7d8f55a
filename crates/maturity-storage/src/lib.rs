//! maturity-storage
//!
//! Durable storage behind two seams: a key/value [`PersistentStore`] for the
//! local copy of the data, and a [`SyncFolder`] of one JSON file per
//! assessment shared between devices. Filesystem implementations run on
//! `tokio::fs`; in-memory fakes back the tests.

pub mod error;
pub mod folder;
pub mod handle;
pub mod memory;
pub mod state;
pub mod store;

use std::future::Future;
use std::pin::Pin;

pub use crate::error::StorageError;
pub use crate::folder::{DirectoryFolder, FileContents, FolderEntry, SyncFolder};
pub use crate::handle::SyncFolderHandle;
pub use crate::memory::{MemoryFolder, MemoryStore};
pub use crate::store::{FileStore, PersistentStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

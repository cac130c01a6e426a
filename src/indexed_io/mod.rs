//! Hierarchical named byte store
//!
//! An indexed container behaves like a small filesystem: directories hold
//! named entries, files hold typed [`EntryData`]. Typed values persist
//! themselves into a container; [`MemoryIndexedIo`] keeps the tree in memory
//! and serializes it into a single self-describing buffer.

mod entry;
mod error;
mod memory;

pub use entry::{EntryData, EntryValue};
pub use error::{IndexedIoError, Result};
pub use memory::{CONTAINER_MAGIC, CONTAINER_VERSION, MAX_DIRECTORY_DEPTH, MemoryIndexedIo};

/// Directory name that moves one level up
pub const PARENT_DIRECTORY: &str = "..";

/// Directory name that moves to the root
pub const ROOT_DIRECTORY: &str = "/";

/// Kind of an entry listed in a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Nested directory
    Directory,
    /// File holding [`EntryData`]
    File,
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry name
    pub name: String,
    /// Entry kind
    pub kind: EntryKind,
}

/// Scoped key-value storage used by the persistence layer.
///
/// All names are relative to the current directory.
pub trait IndexedIo {
    /// Write (or replace) a file entry
    fn write_entry(&mut self, name: &str, data: EntryData) -> Result<()>;

    /// Borrow a file entry
    fn read_entry(&self, name: &str) -> Result<&EntryData>;

    /// Create a directory if it does not exist yet
    fn create_directory(&mut self, name: &str) -> Result<()>;

    /// Enter a directory; accepts [`PARENT_DIRECTORY`] and [`ROOT_DIRECTORY`]
    fn change_directory(&mut self, name: &str) -> Result<()>;

    /// List the current directory
    fn entries(&self) -> Result<Vec<EntryInfo>>;

    /// Remove a file or a whole directory subtree
    fn remove(&mut self, name: &str) -> Result<()>;

    /// Whether an entry of any kind exists
    fn exists(&self, name: &str) -> bool;

    /// Absolute path of the current directory
    fn current_path(&self) -> String;
}

/// Typed convenience layer over [`IndexedIo`].
pub trait IndexedIoExt: IndexedIo {
    /// Write a value as a file entry
    fn write<T: EntryValue>(&mut self, name: &str, value: T) -> Result<()> {
        self.write_entry(name, value.into_entry())
    }

    /// Read a file entry as a value of the requested kind
    fn read<T: EntryValue>(&self, name: &str) -> Result<T> {
        let entry = self.read_entry(name)?;
        T::from_entry(entry).ok_or_else(|| IndexedIoError::TypeMismatch {
            path: join_path(&self.current_path(), name),
            expected: T::KIND,
            found: entry.kind_name(),
        })
    }

    /// Run `f` inside an existing directory, returning to the current one
    /// afterwards whether or not `f` succeeds.
    fn with_directory<R, E>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E>
    where
        E: From<IndexedIoError>,
    {
        self.change_directory(name)?;
        let result = f(self);
        self.change_directory(PARENT_DIRECTORY)?;
        result
    }

    /// Like [`IndexedIoExt::with_directory`], creating the directory first.
    fn with_new_directory<R, E>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E>
    where
        E: From<IndexedIoError>,
    {
        self.create_directory(name)?;
        self.with_directory(name, f)
    }
}

impl<I: IndexedIo + ?Sized> IndexedIoExt for I {}

pub(crate) fn join_path(directory: &str, name: &str) -> String {
    if directory.ends_with('/') {
        format!("{directory}{name}")
    } else {
        format!("{directory}/{name}")
    }
}

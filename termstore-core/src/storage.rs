//! Single-file raw storage for serialized entity files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::CodecError;

/// Raw text access to the file backing a storage.
///
/// The repository only ever reads the whole file and writes the whole file;
/// anything finer-grained (locking, remote transport) belongs to the
/// implementor.
pub trait RawStorage {
    /// Reads the full serialized text, or `None` if nothing is stored yet.
    fn read_raw(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the stored text.
    fn write_raw(&self, text: &str) -> Result<(), StorageError>;

    /// Checks whether anything is stored.
    fn exists(&self) -> bool;

    /// Name of the database identity column carried alongside `vp_id`.
    fn id_column_name(&self) -> &str;
}

/// Storage backed by a single file on disk.
#[derive(Clone, Debug)]
pub struct SingleFileStorage {
    path: PathBuf,
    id_column: String,
}

impl SingleFileStorage {
    /// Creates a storage for the file at `path`.
    pub fn new(path: impl Into<PathBuf>, id_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_column: id_column.into(),
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawStorage for SingleFileStorage {
    fn read_raw(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::IoError(self.path.clone(), e)),
        }
    }

    /// Creates the parent directory if it doesn't exist.
    fn write_raw(&self, text: &str) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| StorageError::IoError(dir.to_path_buf(), e))?;
        }

        fs::write(&self.path, text).map_err(|e| StorageError::IoError(self.path.clone(), e))?;

        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn id_column_name(&self) -> &str {
        &self.id_column
    }
}

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error reading or writing a file.
    #[error("I/O error for {}: {1}", .0.display())]
    IoError(PathBuf, #[source] io::Error),

    /// The stored text could not be parsed, or the tree could not be
    /// encoded back to text.
    #[error("Invalid stored entities: {0}")]
    CodecError(#[from] CodecError),

    /// The caller passed an update without a required field.
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
}

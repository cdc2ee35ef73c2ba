//! Index of files already transferred to a destination volume.

use std::collections::HashSet;
use std::path::Path;

use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{archive_root, IdentityKey, MediaFile};

/// Lookup of every file under `<destination>/TransferredMedia`, keyed by
/// name and length. Built fresh for each run and dropped after planning.
#[derive(Debug, Clone, Default)]
pub struct DestinationIndex {
    entries: HashSet<IdentityKey>,
}

impl DestinationIndex {
    /// Scan the archive folder of `destination_root`.
    ///
    /// All files count, whatever their extension. A missing archive folder is
    /// the normal first-run case and yields an empty index.
    ///
    /// # Errors
    /// Returns the enumeration failure if the archive exists but cannot be read.
    pub fn build(destination_root: &Path) -> Result<Self, EngineError> {
        let archive = archive_root(destination_root);
        if !archive.is_dir() {
            return Ok(Self::default());
        }
        let files = fs_ops::enumerate_files(&archive)?;
        Ok(Self::from_files(&files))
    }

    pub fn from_files(files: &[MediaFile]) -> Self {
        let entries = files.iter().map(MediaFile::identity_key).collect();
        DestinationIndex { entries }
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

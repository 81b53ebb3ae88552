//! Store handle for Charter's engine state.
//!
//! A Store is the root directory holding the consolidated SQLite bin
//! (`charter.db`), the broker audit log, and the optional `charter.toml`
//! configuration file. All engine state is scoped to a store.

use std::path::{Path, PathBuf};

/// Handle to a Charter state directory.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute or caller-relative path to the store root directory.
    pub root: PathBuf,
}

impl Store {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

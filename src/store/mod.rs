//! Snapshot persistence for hosts that keep the ledger on disk.
//!
//! The ledger core never touches the filesystem; this module is the only place
//! that does. Writes go to a sibling temp file first and are renamed into place.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

use crate::error::SnapshotError;
use crate::ledger::{LedgerSnapshot, LedgerState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid snapshot {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },

    #[error("refusing to overwrite existing ledger at {0}")]
    AlreadyInitialized(PathBuf),
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    pub fn load(&self) -> Result<LedgerState, StoreError> {
        let bytes = fs::read(&self.path).map_err(|e| self.io_err(e))?;
        let snapshot: LedgerSnapshot =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        let state = LedgerState::restore(snapshot).map_err(|source| StoreError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), height = state.meta().height, "Ledger loaded");
        Ok(state)
    }

    pub fn save(&self, state: &LedgerState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&state.snapshot()).map_err(|source| {
            StoreError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut f = fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
            f.write_all(&json).map_err(|e| self.io_err(e))?;
            f.sync_all().map_err(|e| self.io_err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(path = %self.path.display(), height = state.meta().height, "Ledger saved");
        Ok(())
    }

    /// Writes a brand-new ledger; fails if one is already present.
    pub fn create(&self, state: &LedgerState) -> Result<(), StoreError> {
        if self.exists() {
            return Err(StoreError::AlreadyInitialized(self.path.clone()));
        }
        self.save(state)
    }
}

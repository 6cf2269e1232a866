//! Runtime state persistence for restart recovery.
//!
//! Stores mode, position and operating window of every shade. The light
//! history is not persisted; after a restart it fills up again from the
//! sampling loop.

use crate::shade::{Shade, ShadeStatus};
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Persisted state file contents
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub shades: Vec<ShadeStatus>,
}

impl PersistedState {
    /// Load from file
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<PersistedState>(&bytes) {
                Ok(state) => {
                    info!(
                        "Loaded state of {} shade(s) from {:?}",
                        state.shades.len(),
                        path
                    );
                    state
                }
                Err(e) => {
                    warn!("Failed to parse state file: {}", e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No persisted state found (first run)");
                Self::default()
            }
            Err(e) => {
                error!("Failed to read state file: {}", e);
                Self::default()
            }
        }
    }

    /// Save to file, replacing it atomically
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)
    }

    pub fn get(&self, name: &str) -> Option<&ShadeStatus> {
        self.shades.iter().find(|s| s.name == name)
    }

    /// Add or update a shade
    pub fn upsert(&mut self, status: ShadeStatus) {
        self.shades.retain(|s| s.name != status.name);
        self.shades.push(status);
    }
}

/// Store wrapper that saves after every update
pub struct StateStore {
    path: PathBuf,
    state: RwLock<PersistedState>,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        let state = PersistedState::load(&path);
        Self {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted status of `name`, if any.
    pub fn status(&self, name: &str) -> Option<ShadeStatus> {
        self.state.read().get(name).cloned()
    }

    /// Snapshot `shades` and write the file.
    pub fn save_shades(&self, shades: &[Arc<Shade>]) -> Result<(), std::io::Error> {
        let mut state = self.state.write();
        for shade in shades {
            state.upsert(shade.status());
        }
        state.save(&self.path)
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use spool_store::{StoreFile, StoreResult};

use crate::error::{PoolError, PoolResult};

/// Durability barrier strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` at every barrier of the prepare/commit protocol (safest).
    #[default]
    Full,
    /// Skip barriers and rely on the OS page cache (fastest, not crash-safe).
    OsDefault,
}

impl SyncMode {
    /// Force `file` to stable storage if this mode asks for it.
    pub fn force(self, file: &dyn StoreFile) -> StoreResult<()> {
        match self {
            SyncMode::Full => file.sync(),
            SyncMode::OsDefault => Ok(()),
        }
    }
}

/// Configuration for a string pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Base name of the pool files inside the pool directory (default: `spool`).
    pub name: String,
    /// Sync/flush strategy.
    pub sync_mode: SyncMode,
    /// Maximum entries in the id -> value cache (default: 1024, 0 disables).
    pub node_cache_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "spool".into(),
            sync_mode: SyncMode::default(),
            node_cache_capacity: 1024,
        }
    }
}

impl PoolConfig {
    pub fn from_toml_str(s: &str) -> PoolResult<Self> {
        toml::from_str(s).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Load a TOML configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> PoolResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// File holding the two metaroot slots.
    pub fn metaroot_file(&self) -> String {
        format!("{}.sp", self.name)
    }

    /// Append-only value log.
    pub fn log_file(&self) -> String {
        format!("{}.sp_nd", self.name)
    }

    /// Index snapshot referenced by metaroot slot `slot`.
    pub fn index_file(&self, slot: usize) -> String {
        format!("{}.sp_idx{slot}", self.name)
    }
}

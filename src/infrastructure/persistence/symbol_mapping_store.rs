//! `data/symbol_mapping.json`: `{ canonical: broker_symbol }` (spec §6.3).

use crate::infrastructure::persistence::atomic_write;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub struct SymbolMappingStore {
    path: PathBuf,
}

impl SymbolMappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        Path::new("data/symbol_mapping.json").to_path_buf()
    }

    /// Returns `None` (not an error) if the file does not exist yet, and
    /// ignores malformed content by logging and returning `None`, per
    /// spec §7's "disk write failure: log; retain in-memory state".
    pub fn load(&self) -> Option<HashMap<String, String>> {
        if !self.path.exists() {
            return None;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => Some(map),
                Err(e) => {
                    error!("SymbolMappingStore: malformed mapping file, ignoring: {}", e);
                    None
                }
            },
            Err(e) => {
                error!("SymbolMappingStore: failed to read mapping file: {}", e);
                None
            }
        }
    }

    pub fn save(&self, mapping: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(mapping).context("failed to serialize symbol mapping")?;
        atomic_write(&self.path, &content)?;
        info!("SymbolMappingStore: saved {} mappings to {:?}", mapping.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_persists_mapping() {
        let dir = tempdir();
        let path = dir.join("symbol_mapping.json");
        let store = SymbolMappingStore::new(path);

        let mut map = HashMap::new();
        map.insert("EURUSD".to_string(), "EURUSDm".to_string());
        store.save(&map).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempdir();
        let store = SymbolMappingStore::new(dir.join("missing.json"));
        assert!(store.load().is_none());
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("triarb-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

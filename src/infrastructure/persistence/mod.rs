//! JSON file persistence (spec §6.3), using the atomic
//! write-to-temp-then-rename pattern already established in this
//! codebase's `SettingsPersistence`.

pub mod order_tracking_store;
pub mod symbol_mapping_store;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create persistence directory")?;
    }
    let tmp_path: PathBuf = path.with_extension("tmp");
    std::fs::write(&tmp_path, content).context("failed to write temp file")?;
    std::fs::rename(&tmp_path, path).context("failed to rename temp file into place")?;
    Ok(())
}

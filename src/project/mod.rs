use std::path::Path;

use anyhow::{Context, Result};

use crate::sequencer::Pattern;

/// Default location of the persisted pattern
pub const MAIN_PATTERN_FILE: &str = "./patterns/main.txt";

/// Save a pattern as 9 lines of 32 `0`/`1` characters, creating the parent directory
pub fn save_pattern(pattern: &Pattern, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, pattern.to_text())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load a pattern written by `save_pattern`
pub fn load_pattern(path: &Path) -> Result<Pattern> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let pattern = Pattern::from_text(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(pattern)
}

use std::path::{Path, PathBuf};

use crate::errors::PipelineError;

/// Files in `dir` matching `pattern`, sorted by path so chunk order is stable.
pub fn discover_chunks(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = Path::new(&escaped).join(pattern);
    let full = full.to_string_lossy();
    let entries = glob::glob(&full).map_err(|e| PipelineError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let mut files = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

pub mod chunks;
pub mod decode;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{PipelineError, PipelineWarning};
use crate::loader::chunks::discover_chunks;
use crate::loader::decode::{decode_chunk, read_chunk_text};
use crate::schema::{SourceKind, SourceSchema};

/// One input row. Counters line up with the source schema's counter columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: String,
    pub pincode: String,
    pub state: Option<String>,
    pub district: Option<String>,
    pub counters: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub kind: SourceKind,
    pub records: Vec<RawRecord>,
}

impl SourceTable {
    pub fn new(kind: SourceKind, records: Vec<RawRecord>) -> Self {
        Self { kind, records }
    }

    pub fn schema(&self) -> &'static SourceSchema {
        self.kind.schema()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    pub file: PathBuf,
    pub rows: usize,
    pub skipped_lines: usize,
    pub latin1_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub source: SourceKind,
    pub dir: PathBuf,
    pub chunks: Vec<ChunkReport>,
    pub skipped_chunks: usize,
    pub total_rows: usize,
    pub skipped_lines: usize,
    pub warnings: Vec<PipelineWarning>,
}

/// Loads and concatenates every chunk of one source. Rows are kept in chunk order
/// and are not deduplicated.
pub fn load_source(
    kind: SourceKind,
    dir: &Path,
    pattern: &str,
) -> Result<(SourceTable, LoadReport), PipelineError> {
    let files = discover_chunks(dir, pattern)?;
    if files.is_empty() {
        return Err(PipelineError::MissingSource {
            kind,
            dir: dir.to_path_buf(),
        });
    }
    info!("loading {} {kind} chunk(s) from {}", files.len(), dir.display());

    let schema = kind.schema();
    let mut records = Vec::new();
    let mut chunks = Vec::new();
    let mut warnings = Vec::new();
    let mut skipped_chunks = 0usize;

    for file in files {
        let text = match read_chunk_text(&file) {
            Ok(text) => text,
            Err(err) => {
                warn!("{kind}: skipping unreadable chunk {}: {err}", file.display());
                skipped_chunks += 1;
                warnings.push(PipelineWarning::SkippedChunk {
                    source: kind,
                    file,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if text.latin1_fallback {
            warn!("{kind}: {} is not UTF-8, decoding as Latin-1", file.display());
            warnings.push(PipelineWarning::EncodingFallback {
                source: kind,
                file: file.clone(),
            });
        }

        let decoded = match decode_chunk(&file, &text.text, schema) {
            Ok(decoded) => decoded,
            Err(err @ PipelineError::SchemaMismatch { .. }) | Err(err @ PipelineError::Csv(_)) => {
                warn!("{kind}: skipping chunk: {err}");
                skipped_chunks += 1;
                warnings.push(PipelineWarning::SkippedChunk {
                    source: kind,
                    file,
                    reason: err.to_string(),
                });
                continue;
            }
            Err(err) => return Err(err),
        };

        if decoded.skipped_lines > 0 {
            warn!(
                "{kind}: skipped {} malformed line(s) in {}",
                decoded.skipped_lines,
                file.display()
            );
            warnings.push(PipelineWarning::SkippedLines {
                source: kind,
                file: file.clone(),
                count: decoded.skipped_lines,
            });
        }
        debug!("{kind}: {} -> {} rows", file.display(), decoded.records.len());
        chunks.push(ChunkReport {
            file,
            rows: decoded.records.len(),
            skipped_lines: decoded.skipped_lines,
            latin1_fallback: text.latin1_fallback,
        });
        records.extend(decoded.records);
    }

    if chunks.is_empty() {
        return Err(PipelineError::MissingSource {
            kind,
            dir: dir.to_path_buf(),
        });
    }

    let report = LoadReport {
        source: kind,
        dir: dir.to_path_buf(),
        skipped_chunks,
        total_rows: records.len(),
        skipped_lines: chunks.iter().map(|c| c.skipped_lines).sum(),
        chunks,
        warnings,
    };
    info!("{kind}: {} rows loaded", report.total_rows);
    Ok((SourceTable::new(kind, records), report))
}

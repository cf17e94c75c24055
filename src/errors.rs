use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::SourceKind;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no usable {kind} chunk files found in {}", dir.display())]
    MissingSource { kind: SourceKind, dir: PathBuf },
    #[error("chunk {} is missing expected column '{column}'", file.display())]
    SchemaMismatch { file: PathBuf, column: String },
    #[error("invalid file pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("source load task failed: {0}")]
    Join(String),
}

/// Conditions that are reported alongside a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    SkippedChunk {
        source: SourceKind,
        file: PathBuf,
        reason: String,
    },
    SkippedLines {
        source: SourceKind,
        file: PathBuf,
        count: usize,
    },
    EncodingFallback {
        source: SourceKind,
        file: PathBuf,
    },
    DegenerateIntersection {
        common_dates: usize,
        common_pincodes: usize,
    },
    UndefinedZScore {
        source: SourceKind,
        dates: usize,
    },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SkippedChunk {
                source,
                file,
                reason,
            } => write!(f, "{source}: skipped chunk {}: {reason}", file.display()),
            Self::SkippedLines {
                source,
                file,
                count,
            } => write!(
                f,
                "{source}: skipped {count} malformed line(s) in {}",
                file.display()
            ),
            Self::EncodingFallback { source, file } => write!(
                f,
                "{source}: {} is not valid UTF-8, decoded as Latin-1",
                file.display()
            ),
            Self::DegenerateIntersection {
                common_dates,
                common_pincodes,
            } => write!(
                f,
                "common key domain is empty ({common_dates} dates, {common_pincodes} pincodes); all synchronized tables are empty"
            ),
            Self::UndefinedZScore { source, dates } => write!(
                f,
                "{source}: z-score undefined over {dates} date(s) (fewer than 2 distinct values); no spikes reported"
            ),
        }
    }
}

use std::fs;
use std::io;
use std::path::Path;

use crate::errors::PipelineError;
use crate::loader::RawRecord;
use crate::schema::{SourceSchema, DISTRICT_COLUMN, STATE_COLUMN};

pub struct ChunkText {
    pub text: String,
    pub latin1_fallback: bool,
}

pub struct DecodedChunk {
    pub records: Vec<RawRecord>,
    pub skipped_lines: usize,
}

/// Reads a chunk as UTF-8, falling back to Latin-1 when the bytes are not valid UTF-8.
pub fn read_chunk_text(path: &Path) -> io::Result<ChunkText> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(ChunkText {
            text,
            latin1_fallback: false,
        }),
        Err(err) => Ok(ChunkText {
            text: decode_latin1(err.as_bytes()),
            latin1_fallback: true,
        }),
    }
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

struct ColumnIndex {
    date: usize,
    pincode: usize,
    state: Option<usize>,
    district: Option<usize>,
    counters: Vec<usize>,
}

pub fn decode_chunk(
    path: &Path,
    text: &str,
    schema: &SourceSchema,
) -> Result<DecodedChunk, PipelineError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let columns = index_columns(path, &headers, schema)?;

    let mut records = Vec::new();
    let mut skipped_lines = 0usize;
    for row in reader.records() {
        let Ok(row) = row else {
            skipped_lines += 1;
            continue;
        };
        if row.len() != headers.len() {
            skipped_lines += 1;
            continue;
        }
        match decode_row(&row, &columns) {
            Some(record) => records.push(record),
            None => skipped_lines += 1,
        }
    }
    Ok(DecodedChunk {
        records,
        skipped_lines,
    })
}

fn index_columns(
    path: &Path,
    headers: &csv::StringRecord,
    schema: &SourceSchema,
) -> Result<ColumnIndex, PipelineError> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let require = |name: &str| {
        find(name).ok_or_else(|| PipelineError::SchemaMismatch {
            file: path.to_path_buf(),
            column: name.to_string(),
        })
    };

    let required = schema
        .required_columns()
        .map(require)
        .collect::<Result<Vec<_>, _>>()?;
    let (keys, counters) = required.split_at(2);
    Ok(ColumnIndex {
        date: keys[0],
        pincode: keys[1],
        state: find(STATE_COLUMN),
        district: find(DISTRICT_COLUMN),
        counters: counters.to_vec(),
    })
}

fn decode_row(row: &csv::StringRecord, columns: &ColumnIndex) -> Option<RawRecord> {
    let date = row.get(columns.date)?.trim();
    let pincode = row.get(columns.pincode)?.trim();
    if date.is_empty() || pincode.is_empty() {
        return None;
    }
    let mut counters = Vec::with_capacity(columns.counters.len());
    for idx in &columns.counters {
        counters.push(parse_count(row.get(*idx)?)?);
    }
    Some(RawRecord {
        date: date.to_string(),
        pincode: pincode.to_string(),
        state: label(row, columns.state),
        district: label(row, columns.district),
        counters,
    })
}

fn label(row: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    let value = row.get(idx?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Largest per-row counter accepted; anything above is treated as a corrupt cell.
pub const MAX_COUNT: u64 = 10_000_000_000;

/// Counts are non-negative integers up to `MAX_COUNT`; float renderings like
/// `12.0` are accepted and an empty cell counts as zero.
pub fn parse_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    let value = match trimmed.parse::<u64>() {
        Ok(v) => v,
        Err(_) => {
            let v = trimmed.parse::<f64>().ok()?;
            if !(v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= MAX_COUNT as f64) {
                return None;
            }
            v as u64
        }
    };
    (value <= MAX_COUNT).then_some(value)
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::output::csv::{
    cleaned_table_to_csv, cleaning_summary_to_csv, daily_summary_to_csv, events_to_csv,
    imbalance_summary_to_csv, imbalance_to_csv, misuse_to_csv, pincode_summary_to_csv,
    state_summary_to_csv,
};
use crate::output::json::render_json;
use crate::pipeline::{PipelineRun, SyncRun};

fn write_file(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body).with_context(|| format!("failed writing {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(path)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed creating output directory: {}", dir.display()))
}

/// Cleaned per-source tables and the cleaning summary.
pub fn write_sync_outputs(cleaned: &SyncRun, dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;
    let mut written = Vec::new();
    for (kind, table) in cleaned.tables.iter() {
        let name = format!("{}_cleaned.csv", kind.as_slug());
        written.push(write_file(dir, &name, &cleaned_table_to_csv(table)?)?);
    }
    written.push(write_file(
        dir,
        "cleaning_summary.csv",
        &cleaning_summary_to_csv(&cleaned.sync.per_source)?,
    )?);
    Ok(written)
}

/// Every table of a full run plus `run_report.json`.
pub fn write_run_outputs(run: &PipelineRun, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = write_sync_outputs(&run.cleaned, dir)?;
    let tables = [
        ("pincode_summary.csv", pincode_summary_to_csv(&run.pincode_summary)?),
        ("suspicious_pincodes_misuse.csv", misuse_to_csv(&run.misuse.flagged)?),
        ("imbalance_summary.csv", imbalance_summary_to_csv(&run.imbalance_summary)?),
        ("imbalanced_pincodes.csv", imbalance_to_csv(&run.imbalance.flagged)?),
        ("mass_registration_events.csv", events_to_csv(&run.spikes.events)?),
        ("daily_summary.csv", daily_summary_to_csv(&run.daily)?),
        ("state_summary.csv", state_summary_to_csv(&run.states)?),
        ("run_report.json", render_json(&run.report())?),
    ];
    for (name, body) in tables {
        written.push(write_file(dir, name, &body)?);
    }
    Ok(written)
}

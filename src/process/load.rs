use anyhow::Result;
use std::path::Path;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::PipelineError;
use crate::process::utils::normalize_column_name;
use crate::report::PhaseReport;
use crate::table::{read_csv, Table};

/// Fail unless `table` is exactly `expected` = (rows, columns).
pub fn check_shape(table: &Table, expected: (usize, usize)) -> Result<()> {
    let actual = table.shape();
    if actual != expected {
        return Err(PipelineError::ShapeMismatch { expected, actual }.into());
    }
    Ok(())
}

/// Read the export at `path`, enforce the configured shape, and normalize
/// the header names the same way the mapping tab's names are.
#[instrument(level = "info", skip(path, cfg, report), fields(path = %path.as_ref().display()))]
pub fn load_dataset<P: AsRef<Path>>(
    path: P,
    cfg: &Config,
    report: &mut PhaseReport,
) -> Result<Table> {
    let mut table = read_csv(path.as_ref())?;
    check_shape(&table, (cfg.expected_row_count, cfg.expected_col_count))?;

    let mut renamed = 0usize;
    for h in table.headers.iter_mut() {
        let clean = normalize_column_name(h);
        if clean != *h {
            *h = clean;
            renamed += 1;
        }
    }

    let (rows, cols) = table.shape();
    info!(rows, cols, renamed, "dataset loaded");
    report.note(format!("Loaded {} rows x {} columns", rows, cols));
    if renamed > 0 {
        report.note(format!("Removed line breaks or padding from {} column names", renamed));
    }
    Ok(table)
}

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::metadata::MappingTable;
use crate::report::PhaseReport;
use crate::table::{write_csv, Table};

pub const NOT_IN_METADATA_FILENAME: &str = "columns_not_in_metadata.csv";
pub const NOT_IN_DATA_FILENAME: &str = "columns_not_in_data.csv";

/// Column-name drift between the export and the mapping tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDrift {
    /// In the export, absent from the mapping tab (export order).
    pub not_in_metadata: Vec<String>,
    /// In the mapping tab, absent from the export (mapping order).
    pub not_in_data: Vec<String>,
}

pub fn column_drift(table: &Table, mapping: &MappingTable) -> ColumnDrift {
    let known = mapping.columns();
    let present: HashSet<&str> = table.headers.iter().map(String::as_str).collect();

    let not_in_metadata = table
        .headers
        .iter()
        .filter(|h| !known.contains(h.as_str()))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let not_in_data = mapping
        .entries
        .iter()
        .map(|e| e.column.as_str())
        .filter(|c| !present.contains(c) && seen.insert(*c))
        .map(str::to_string)
        .collect();

    ColumnDrift {
        not_in_metadata,
        not_in_data,
    }
}

fn one_column(header: &str, values: &[String]) -> Table {
    Table {
        headers: vec![header.to_string()],
        rows: values.iter().map(|v| vec![v.clone()]).collect(),
    }
}

/// Write both drift lists as one-column CSVs under `out_dir`.
pub fn write_drift_audit(drift: &ColumnDrift, out_dir: &Path) -> Result<()> {
    write_csv(
        &one_column("column", &drift.not_in_metadata),
        out_dir.join(NOT_IN_METADATA_FILENAME),
    )?;
    write_csv(
        &one_column("column", &drift.not_in_data),
        out_dir.join(NOT_IN_DATA_FILENAME),
    )?;
    Ok(())
}

/// Keep only in-scope columns, in mapping order. A missing in-scope column
/// is fatal; any other drift only lands in the audit files.
#[instrument(level = "info", skip_all)]
pub fn filter_to_in_scope(
    table: &Table,
    mapping: &MappingTable,
    out_dir: &Path,
    report: &mut PhaseReport,
) -> Result<Table> {
    let drift = column_drift(table, mapping);
    write_drift_audit(&drift, out_dir)?;
    if !drift.not_in_metadata.is_empty() || !drift.not_in_data.is_empty() {
        warn!(
            not_in_metadata = drift.not_in_metadata.len(),
            not_in_data = drift.not_in_data.len(),
            "column names differ between data and metadata"
        );
        report.note(format!(
            "{} data columns missing from metadata (see {}), {} metadata columns missing from data (see {})",
            drift.not_in_metadata.len(),
            NOT_IN_METADATA_FILENAME,
            drift.not_in_data.len(),
            NOT_IN_DATA_FILENAME
        ));
    }

    let scoped = table.select(&mapping.in_scope_columns())?;
    info!(
        before = table.headers.len(),
        after = scoped.headers.len(),
        "filtered to in-scope columns"
    );
    report.note(format!(
        "Reduced columns from {} to {}",
        table.headers.len(),
        scoped.headers.len()
    ));
    Ok(scoped)
}

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::metadata::MappingTable;
use crate::report::PhaseReport;
use crate::table::{is_blank, write_csv, Table};

/// Targets whose custom-field type is one of `types` (case-insensitive), in
/// mapping order, without repeats.
pub fn multi_choice_targets<'a>(mapping: &'a MappingTable, types: &[String]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    mapping
        .in_scope()
        .filter(|e| {
            e.custom_field_type
                .as_deref()
                .is_some_and(|t| types.iter().any(|want| want.eq_ignore_ascii_case(t)))
        })
        .filter_map(|e| e.target.as_deref())
        .filter(|t| seen.insert(*t))
        .collect()
}

/// Sorted distinct non-blank values of `column`.
pub fn distinct_values(table: &Table, column: &str) -> Option<Vec<String>> {
    let values = table.column_values(column)?;
    let set: BTreeSet<&str> = values.into_iter().filter(|v| !is_blank(v)).collect();
    Some(set.into_iter().map(str::to_string).collect())
}

fn file_stem_for(target: &str) -> String {
    target
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Replace the contents of `dir` with one distinct-value CSV per multi-choice
/// target. Returns the files written.
pub fn write_custom_field_values(
    table: &Table,
    mapping: &MappingTable,
    types: &[String],
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
    for entry in glob(&pattern).context("invalid glob pattern for custom field values")? {
        match entry {
            Ok(stale) => fs::remove_file(&stale)
                .with_context(|| format!("removing stale {}", stale.display()))?,
            Err(e) => warn!("cannot read glob entry: {:?}", e),
        }
    }

    let mut written = Vec::new();
    for target in multi_choice_targets(mapping, types) {
        let Some(values) = distinct_values(table, target) else {
            warn!(target_field = target, "multi-choice target missing from output");
            continue;
        };
        let path = dir.join(format!("{}.csv", file_stem_for(target)));
        let out = Table {
            headers: vec![target.to_string()],
            rows: values.into_iter().map(|v| vec![v]).collect(),
        };
        write_csv(&out, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Write the main output, its head sample, and the custom-field value files.
#[instrument(level = "info", skip_all)]
pub fn output_data(
    table: &Table,
    mapping: &MappingTable,
    cfg: &Config,
    report: &mut PhaseReport,
) -> Result<()> {
    let out_path = cfg.output_path();
    write_csv(table, &out_path)?;
    report.note(format!(
        "Saved {} rows to {}",
        table.rows.len(),
        out_path.display()
    ));

    let sample = table.head(cfg.sample_rows);
    let sample_path = cfg.sample_path();
    write_csv(&sample, &sample_path)?;
    report.note(format!(
        "Saved {} sample rows to {}",
        sample.rows.len(),
        sample_path.display()
    ));

    let files =
        write_custom_field_values(table, mapping, &cfg.multi_choice_types, &cfg.custom_fields_dir())?;
    report.note(format!(
        "Wrote {} custom field value files to {}",
        files.len(),
        cfg.custom_fields_dir().display()
    ));

    info!(rows = table.rows.len(), cols = table.headers.len(), "output written");
    Ok(())
}

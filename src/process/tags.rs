use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::error::PipelineError;
use crate::metadata::MappingTable;
use crate::report::PhaseReport;
use crate::table::{is_blank, Table};

pub const TAG_SEPARATOR: &str = ", ";

/// Insertion-ordered set of tag labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `tag` was already present.
    pub fn insert(&mut self, tag: &str) -> bool {
        if self.seen.contains(tag) {
            return false;
        }
        self.seen.insert(tag.to_string());
        self.order.push(tag.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn join(&self, sep: &str) -> String {
        self.order.join(sep)
    }
}

/// Per-row tag sets: for each tag entry in mapping order, the row gets the
/// entry's label when its column is filled in.
pub fn build_tag_sets(table: &Table, mapping: &MappingTable) -> Vec<TagSet> {
    let sources: Vec<(usize, &str)> = mapping
        .tag_entries()
        .filter_map(|e| {
            let label = e.tag_label()?;
            match table.column_index(&e.column) {
                Some(idx) => Some((idx, label)),
                None => {
                    debug!(column = %e.column, "tag column not present, skipped");
                    None
                }
            }
        })
        .collect();

    table
        .rows
        .iter()
        .map(|row| {
            let mut tags = TagSet::new();
            for &(idx, label) in &sources {
                if !is_blank(&row[idx]) {
                    tags.insert(label);
                }
            }
            tags
        })
        .collect()
}

/// Append the flattened tag column to `table`.
#[instrument(level = "info", skip_all, fields(tag_column = %tag_column))]
pub fn add_tag_column(
    table: &mut Table,
    mapping: &MappingTable,
    tag_column: &str,
    report: &mut PhaseReport,
) -> Result<()> {
    if table.column_index(tag_column).is_some() {
        return Err(PipelineError::DuplicateColumn(tag_column.to_string()).into());
    }
    let sets = build_tag_sets(table, mapping);
    let tagged = sets.iter().filter(|s| !s.is_empty()).count();
    let total: usize = sets.iter().map(TagSet::len).sum();
    let values = sets.iter().map(|s| s.join(TAG_SEPARATOR)).collect();
    table.push_column(tag_column, values)?;

    info!(tagged, total, "tags derived");
    report.note(format!("Tagged {} rows with {} tags in total", tagged, total));
    Ok(())
}

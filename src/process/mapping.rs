use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

use crate::error::PipelineError;
use crate::metadata::MappingTable;
use crate::report::PhaseReport;
use crate::table::{is_blank, Table};

/// One output column and the source columns that feed it, in mapping order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    pub target: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Targets in first-seen order.
    pub groups: Vec<TargetGroup>,
    /// In-scope columns with no target that only exist to feed tags.
    pub tag_only: Vec<String>,
}

impl MergePlan {
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.target.as_str())
    }

    /// Groups with more than one source.
    pub fn merges(&self) -> impl Iterator<Item = &TargetGroup> {
        self.groups.iter().filter(|g| g.sources.len() > 1)
    }
}

/// Fold the in-scope mapping entries into `target → [source...]`.
/// An in-scope column with neither a target nor a tag flag is fatal.
pub fn plan_merge(mapping: &MappingTable) -> Result<MergePlan> {
    let mut plan = MergePlan::default();
    let mut by_target: HashMap<String, usize> = HashMap::new();
    let mut seen_sources = HashSet::new();

    for entry in mapping.in_scope() {
        if !seen_sources.insert(entry.column.as_str()) {
            debug!(column = %entry.column, "duplicate in-scope entry ignored");
            continue;
        }
        match (&entry.target, entry.is_tag) {
            (Some(target), _) => match by_target.get(target) {
                Some(&i) => plan.groups[i].sources.push(entry.column.clone()),
                None => {
                    by_target.insert(target.clone(), plan.groups.len());
                    plan.groups.push(TargetGroup {
                        target: target.clone(),
                        sources: vec![entry.column.clone()],
                    });
                }
            },
            (None, true) => plan.tag_only.push(entry.column.clone()),
            (None, false) => {
                return Err(PipelineError::UnmappedColumn(entry.column.clone()).into());
            }
        }
    }
    Ok(plan)
}

/// The tag column is appended after cleaning and carried through the merge,
/// so no in-scope source, tag-only column or target may share its name.
pub fn check_tag_column(plan: &MergePlan, tag_column: &str) -> Result<()> {
    let clash = plan
        .groups
        .iter()
        .any(|g| g.target == tag_column || g.sources.iter().any(|s| s == tag_column))
        || plan.tag_only.iter().any(|s| s == tag_column);
    if clash {
        return Err(PipelineError::DuplicateColumn(tag_column.to_string()).into());
    }
    Ok(())
}

/// Combine the value already in the target with the next source's value.
/// Equal or blank-new keeps `existing`; blank-existing adopts `new`;
/// otherwise both are kept, joined by `sep`.
pub fn merge_values(existing: &str, new: &str, sep: &str) -> String {
    if existing == new || is_blank(new) {
        existing.to_string()
    } else if is_blank(existing) {
        new.to_string()
    } else {
        format!("{}{}{}", existing, sep, new)
    }
}

/// Build the output table: one column per target (first-seen order), each
/// row reduced left to right over the group's sources, then `carry` (the
/// tag column) if the table has it.
pub fn apply_merge(
    table: &Table,
    plan: &MergePlan,
    sep: &str,
    carry: Option<&str>,
) -> Result<Table> {
    let mut headers: Vec<String> = plan.targets().map(str::to_string).collect();
    let mut index_groups: Vec<Vec<usize>> = Vec::with_capacity(plan.groups.len());
    for g in &plan.groups {
        let idxs = g
            .sources
            .iter()
            .map(|s| {
                table
                    .column_index(s)
                    .ok_or_else(|| PipelineError::UnknownColumn(s.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        index_groups.push(idxs);
    }

    let carry_idx = match carry {
        Some(name) => match table.column_index(name) {
            Some(idx) => {
                headers.push(name.to_string());
                Some(idx)
            }
            None => None,
        },
        None => None,
    };

    let mut unique = HashSet::new();
    if let Some(dup) = headers.iter().find(|h| !unique.insert(h.as_str())) {
        return Err(PipelineError::DuplicateColumn(dup.clone()).into());
    }

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut out: Vec<String> = index_groups
                .iter()
                .map(|idxs| {
                    idxs[1..]
                        .iter()
                        .fold(row[idxs[0]].clone(), |acc, &i| merge_values(&acc, &row[i], sep))
                })
                .collect();
            if let Some(i) = carry_idx {
                out.push(row[i].clone());
            }
            out
        })
        .collect();

    Ok(Table { headers, rows })
}

/// Rename and merge in-scope columns into their target fields.
#[instrument(level = "info", skip_all)]
pub fn map_columns(
    table: &Table,
    mapping: &MappingTable,
    sep: &str,
    tag_column: &str,
    report: &mut PhaseReport,
) -> Result<Table> {
    let plan = plan_merge(mapping)?;
    check_tag_column(&plan, tag_column)?;
    let out = apply_merge(table, &plan, sep, Some(tag_column))?;

    let merged: Vec<&TargetGroup> = plan.merges().collect();
    for g in &merged {
        debug!(target_field = %g.target, sources = ?g.sources, "merged columns");
    }
    info!(
        targets = plan.groups.len(),
        merged = merged.len(),
        tag_only = plan.tag_only.len(),
        "mapped columns"
    );
    report.note(format!(
        "Mapped {} source columns onto {} target columns ({} merged, {} tag-only dropped)",
        table.headers.len(),
        out.headers.len(),
        merged.len(),
        plan.tag_only.len()
    ));
    Ok(out)
}

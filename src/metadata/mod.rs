// src/metadata/mod.rs

pub mod cache;
pub mod fetch;

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::config::{Config, MappingColumns, RepeatedDataConfig};
use crate::error::PipelineError;
use crate::process::utils::normalize_column_name;
use crate::table::Table;

pub use cache::load_metadata;

/// One row of the source-to-target mapping tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub column: String,
    pub in_scope: bool,
    /// `None` when the sheet says blank or "not mapped".
    pub target: Option<String>,
    pub is_tag: bool,
    pub tag_name: Option<String>,
    pub custom_field_type: Option<String>,
}

impl MappingEntry {
    /// Tag label this entry contributes, if any.
    pub fn tag_label(&self) -> Option<&str> {
        if self.is_tag {
            self.tag_name.as_deref()
        } else {
            None
        }
    }
}

/// Mapping entries in spreadsheet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    pub entries: Vec<MappingEntry>,
}

/// Spreadsheet checkbox / free-text truthiness.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "x"
    )
}

fn parse_target(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("not mapped") {
        None
    } else {
        Some(t.to_string())
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}

impl MappingTable {
    /// Interpret the mapping tab. The name, in-scope and target headers are
    /// required; the tag and custom-field headers may be absent.
    pub fn from_table(table: &Table, cols: &MappingColumns) -> Result<Self> {
        let required = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| PipelineError::InvalidMetadata {
                    table: "mapping".into(),
                    reason: format!("missing column `{}`", name),
                })
        };
        let name_idx = required(&cols.full_column_name)?;
        let scope_idx = required(&cols.in_scope)?;
        let target_idx = required(&cols.target_field)?;
        let tag_idx = table.column_index(&cols.tag);
        let tag_name_idx = table.column_index(&cols.tag_name);
        let cft_idx = table.column_index(&cols.custom_field_type);

        let cell = |row: &[String], idx: Option<usize>| -> String {
            idx.map(|i| row[i].clone()).unwrap_or_default()
        };

        let mut entries = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let column = normalize_column_name(&row[name_idx]);
            if column.is_empty() {
                continue;
            }
            entries.push(MappingEntry {
                column,
                in_scope: parse_flag(&row[scope_idx]),
                target: parse_target(&row[target_idx]),
                is_tag: parse_flag(&cell(row.as_slice(), tag_idx)),
                tag_name: non_blank(&cell(row.as_slice(), tag_name_idx)),
                custom_field_type: non_blank(&cell(row.as_slice(), cft_idx)),
            });
        }
        debug!(entries = entries.len(), "parsed mapping table");
        Ok(Self { entries })
    }

    pub fn in_scope(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter().filter(|e| e.in_scope)
    }

    /// Names of in-scope columns, first occurrence only, in table order.
    pub fn in_scope_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.in_scope()
            .map(|e| e.column.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// In-scope entries that contribute a tag, in table order.
    pub fn tag_entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.in_scope().filter(|e| e.tag_label().is_some())
    }

    pub fn columns(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.column.as_str()).collect()
    }
}

/// Raw value → replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    map: HashMap<String, String>,
}

impl LookupTable {
    /// Build from the columns `key` and `value` of `table`. Keys are trimmed;
    /// on duplicate keys the first row wins.
    pub fn from_columns(table: &Table, name: &str, key: &str, value: &str) -> Result<Self> {
        let find = |col: &str| {
            table
                .column_index(col)
                .ok_or_else(|| PipelineError::InvalidMetadata {
                    table: name.to_string(),
                    reason: format!("missing column `{}`", col),
                })
        };
        let (k, v) = (find(key)?, find(value)?);
        Ok(Self::from_rows(table, name, k, v))
    }

    /// Build from the first two columns of `table`, whatever they are called.
    pub fn from_first_two(table: &Table, name: &str) -> Result<Self> {
        if table.headers.len() < 2 {
            return Err(PipelineError::InvalidMetadata {
                table: name.to_string(),
                reason: format!("expected 2 columns, found {}", table.headers.len()),
            }
            .into());
        }
        Ok(Self::from_rows(table, name, 0, 1))
    }

    fn from_rows(table: &Table, name: &str, k: usize, v: usize) -> Self {
        let mut map = HashMap::with_capacity(table.rows.len());
        let mut dupes = 0usize;
        for row in &table.rows {
            let key = row[k].trim();
            if key.is_empty() {
                continue;
            }
            if map.contains_key(key) {
                dupes += 1;
                continue;
            }
            map.insert(key.to_string(), row[v].clone());
        }
        if dupes > 0 {
            warn!(table = name, dupes, "lookup table has duplicate keys, keeping first");
        }
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A hand-cleaned column ready to be joined back by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatedLookup {
    pub column: String,
    pub key_column: String,
    pub table: LookupTable,
}

/// Everything fetched from the metadata spreadsheet for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub mapping: MappingTable,
    pub religion: Option<LookupTable>,
    pub repeated: Vec<RepeatedLookup>,
}

impl Metadata {
    /// Interpret raw tabs. `repeated` is in the same order as
    /// `cfg.cleaning.repeated_data`.
    pub fn build(
        cfg: &Config,
        mapping: &Table,
        religion: Option<&Table>,
        repeated: &[Table],
    ) -> Result<Self> {
        let mapping = MappingTable::from_table(mapping, &cfg.sheet.mapping_columns)?;

        let religion = match (&cfg.cleaning.religion, religion) {
            (Some(rel), Some(t)) => Some(LookupTable::from_first_two(t, &rel.tab.tab)?),
            _ => None,
        };

        anyhow::ensure!(
            repeated.len() == cfg.cleaning.repeated_data.len(),
            "got {} repeated-data tables for {} configured columns",
            repeated.len(),
            cfg.cleaning.repeated_data.len()
        );
        let repeated = cfg
            .cleaning
            .repeated_data
            .iter()
            .zip(repeated)
            .map(|(rc, t): (&RepeatedDataConfig, &Table)| {
                Ok(RepeatedLookup {
                    column: rc.column.clone(),
                    key_column: rc.key_column.clone(),
                    table: LookupTable::from_columns(
                        t,
                        &rc.tab.tab,
                        &rc.key_column,
                        rc.value_column(),
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mapping,
            religion,
            repeated,
        })
    }
}

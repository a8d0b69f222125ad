// src/table.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};
use tracing::debug;

use crate::error::PipelineError;

/// An in-memory CSV: header names plus string rows. Every row has exactly
/// `headers.len()` cells; a blank cell is the missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Empty after trimming whitespace.
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

impl Table {
    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Values of column `name`, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Project onto `names`, in that order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let mut idxs = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let idx = self
                .column_index(name)
                .ok_or_else(|| PipelineError::UnknownColumn(name.to_string()))?;
            idxs.push(idx);
        }
        Ok(Table {
            headers: idxs.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| idxs.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Append a column. `values` must have one entry per row.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        anyhow::ensure!(
            values.len() == self.rows.len(),
            "column has {} values for {} rows",
            values.len(),
            self.rows.len()
        );
        self.headers.push(name.into());
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
        Ok(())
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Split rows into (kept, removed) by `remove`.
    pub fn partition<F>(self, mut remove: F) -> (Table, Table)
    where
        F: FnMut(&[String]) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.rows.into_iter().partition(|row| remove(row.as_slice()));
        (
            Table {
                headers: self.headers.clone(),
                rows: kept,
            },
            Table {
                headers: self.headers,
                rows: removed,
            },
        )
    }
}

/// Parse a headed CSV from any reader. All cells stay text; ragged rows are
/// an error.
pub fn read_csv_from<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(Table { headers, rows })
}

pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::MissingFile(path.to_path_buf()).into());
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let table = read_csv_from(file).with_context(|| format!("reading {}", path.display()))?;
    debug!(path = %path.display(), rows = table.rows.len(), cols = table.headers.len(), "read csv");
    Ok(table)
}

/// Write `table` to `path`: to a dot-prefixed temp file first, then rename
/// over the destination.
pub fn write_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "out.csv".into());
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    {
        let mut wtr = WriterBuilder::new()
            .from_path(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        wtr.write_record(&table.headers)
            .with_context(|| format!("writing header to {}", tmp_path.display()))?;
        for row in &table.rows {
            wtr.write_record(row)
                .with_context(|| format!("writing row to {}", tmp_path.display()))?;
        }
        wtr.flush()
            .with_context(|| format!("flushing {}", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
    debug!(path = %path.display(), rows = table.rows.len(), "wrote csv");
    Ok(())
}

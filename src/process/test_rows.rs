use anyhow::Result;
use std::path::Path;
use tracing::{info, instrument};

use crate::config::TestRowConfig;
use crate::report::PhaseReport;
use crate::table::{write_csv, Table};

/// Any cell contains the needle, case-insensitively, and the exception
/// column (if present) does not hold the exception value.
pub fn is_test_row(
    row: &[String],
    needle: &str,
    exception_idx: Option<usize>,
    exception: &str,
) -> bool {
    if let Some(i) = exception_idx {
        if row[i] == exception {
            return false;
        }
    }
    row.iter().any(|cell| cell.to_lowercase().contains(needle))
}

/// Split QA submissions out of `table`. Returns (kept, removed).
///
/// This is a blunt full-row substring scan: a real surname like "Testa"
/// is removed too.
pub fn split_test_rows(table: Table, cfg: &TestRowConfig) -> (Table, Table) {
    let needle = cfg.needle.to_lowercase();
    let exception_idx = table.column_index(&cfg.exception_column);
    table.partition(|row| is_test_row(row, &needle, exception_idx, &cfg.exception_value))
}

/// Drop test rows and write them to `deleted_path` for review.
#[instrument(level = "info", skip_all, fields(deleted = %deleted_path.display()))]
pub fn delete_test_rows(
    table: Table,
    cfg: &TestRowConfig,
    deleted_path: &Path,
    report: &mut PhaseReport,
) -> Result<Table> {
    let (kept, removed) = split_test_rows(table, cfg);
    write_csv(&removed, deleted_path)?;

    info!(kept = kept.rows.len(), removed = removed.rows.len(), "removed test rows");
    let name = deleted_path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    report.note(format!("Deleted {} rows. See {}", removed.rows.len(), name));
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{read_csv, tests::table};
    use anyhow::Result;
    use tempfile::tempdir;

    const CONSTITUENCY: &str = "Parliamentary Constituency (U.K.)";

    #[test]
    fn removes_test_rows_but_honours_exception() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("deleted_test_rows.csv");
        let t = table(
            &["First Name", "Email", CONSTITUENCY],
            &[
                &["Ann", "ann@example.com", "Leeds North"],
                &["QA", "TEST@example.com", "Leeds North"],
                &["Bea", "bea@example.com", "Southampton, Test"],
                &["Carl", "carl@example.com", "Southampton, Itchen"],
                &["Testa", "d@example.com", ""],
            ],
        );

        let mut report = PhaseReport::new("test rows");
        let kept = delete_test_rows(t, &TestRowConfig::default(), &path, &mut report)?;
        let names: Vec<&str> = kept.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bea", "Carl"]);

        let removed = read_csv(&path)?;
        assert_eq!(removed.headers, kept.headers);
        assert_eq!(removed.rows.len(), 2);
        assert_eq!(removed.rows[0][0], "QA");
        assert_eq!(removed.rows[1][0], "Testa");
        assert_eq!(report.lines, vec!["Deleted 2 rows. See deleted_test_rows.csv"]);
        Ok(())
    }

    #[test]
    fn exception_needs_exact_match_and_column() {
        let cfg = TestRowConfig::default();
        let t = table(
            &["Note", CONSTITUENCY],
            &[&["test", "southampton, test"], &["test", "Southampton, Test"]],
        );
        let (kept, removed) = split_test_rows(t, &cfg);
        assert_eq!(kept.rows.len(), 1);
        assert_eq!(removed.rows.len(), 1);

        let no_col = table(&["Note"], &[&["Southampton, Test"]]);
        let (kept, _) = split_test_rows(no_col, &cfg);
        assert!(kept.rows.is_empty());
    }
}

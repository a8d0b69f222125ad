// src/process/mod.rs

pub mod clean;
pub mod date_parser;
pub mod load;
pub mod mapping;
pub mod scope;
pub mod tags;
pub mod test_rows;
pub mod utils;
pub mod write;

use anyhow::{Context, Result};
use std::fs;
use tracing::{info, instrument};

use crate::config::Config;
use crate::metadata::Metadata;
use crate::report::PhaseReport;

/// What a completed run did, phase by phase.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// `(rows, columns)` as loaded.
    pub loaded: (usize, usize),
    pub in_scope_columns: usize,
    pub deleted_rows: usize,
    /// `(rows, columns)` as written.
    pub output: (usize, usize),
    pub reports: Vec<PhaseReport>,
}

/// Create every directory the run writes into.
pub fn prepare_directories(cfg: &Config) -> Result<()> {
    for d in cfg.directories() {
        fs::create_dir_all(&d).with_context(|| format!("creating {}", d.display()))?;
    }
    Ok(())
}

fn finish(report: PhaseReport, summary: &mut RunSummary) {
    report.print();
    summary.reports.push(report);
}

/// Load → scope → test rows → clean → tags → map → write. Any fatal
/// condition stops the run before the next phase starts.
#[instrument(level = "info", skip_all, fields(input = %cfg.input_path().display()))]
pub fn run_pipeline(cfg: &Config, meta: &Metadata) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    // ─── 1) load ────────────────────────────────────────────────────
    let mut report = PhaseReport::new("Load data");
    let table = load::load_dataset(cfg.input_path(), cfg, &mut report)?;
    summary.loaded = table.shape();
    finish(report, &mut summary);

    // ─── 2) in-scope columns ────────────────────────────────────────
    let mut report = PhaseReport::new("Filter to in-scope columns");
    let table = scope::filter_to_in_scope(&table, &meta.mapping, &cfg.output_directory, &mut report)?;
    debug_assert_eq!(table.rows.len(), summary.loaded.0);
    summary.in_scope_columns = table.headers.len();
    finish(report, &mut summary);

    // ─── 3) test rows ───────────────────────────────────────────────
    let mut report = PhaseReport::new("Remove test rows");
    let before = table.rows.len();
    let mut table =
        test_rows::delete_test_rows(table, &cfg.test_rows, &cfg.deleted_rows_path(), &mut report)?;
    summary.deleted_rows = before - table.rows.len();
    finish(report, &mut summary);

    // ─── 4) clean ───────────────────────────────────────────────────
    let mut report = PhaseReport::new("Clean data");
    clean::clean_data(&mut table, &cfg.cleaning, meta, &mut report)?;
    finish(report, &mut summary);

    // ─── 5) tags ────────────────────────────────────────────────────
    let mut report = PhaseReport::new("Process tags");
    tags::add_tag_column(&mut table, &meta.mapping, &cfg.tag_column, &mut report)?;
    finish(report, &mut summary);

    // ─── 6) map / merge ─────────────────────────────────────────────
    let mut report = PhaseReport::new("Map columns");
    let table = mapping::map_columns(
        &table,
        &meta.mapping,
        &cfg.merge_separator,
        &cfg.tag_column,
        &mut report,
    )?;
    finish(report, &mut summary);

    // ─── 7) write ───────────────────────────────────────────────────
    let mut report = PhaseReport::new("Output data");
    write::output_data(&table, &meta.mapping, cfg, &mut report)?;
    summary.output = table.shape();
    finish(report, &mut summary);

    info!(
        loaded_rows = summary.loaded.0,
        deleted = summary.deleted_rows,
        output_rows = summary.output.0,
        output_cols = summary.output.1,
        "pipeline complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepeatedDataConfig, TabConfig};
    use crate::error::PipelineError;
    use crate::metadata::tests::MAPPING_HEADERS;
    use crate::table::{read_csv, tests::table, write_csv};
    use anyhow::Result;
    use std::path::Path;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,nbprep::process=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const CONSTITUENCY: &str = "Parliamentary Constituency (U.K.)";

    fn fixture_config(root: &Path, rows: usize) -> Config {
        let mut cfg = Config {
            data_directory: root.join("data"),
            output_directory: root.join("output"),
            cache_directory: root.join("cache"),
            expected_row_count: rows,
            expected_col_count: 11,
            ..Config::default()
        };
        cfg.cleaning.repeated_data = vec![RepeatedDataConfig {
            column: "Occupation".into(),
            key_column: "Email".into(),
            value_column: Some("Occupation (clean)".into()),
            tab: TabConfig {
                tab: "Occupation".into(),
                cache_filename: "occupation.csv".into(),
            },
        }];
        cfg
    }

    fn fixture_metadata(cfg: &Config) -> Result<Metadata> {
        let mapping = table(
            MAPPING_HEADERS,
            &[
                &["First Name", "TRUE", "first_name", "", "", ""],
                &["Last Name", "TRUE", "last_name", "", "", ""],
                &["Email", "TRUE", "email", "", "", ""],
                &["Mobile", "TRUE", "mobile_number", "", "", ""],
                &["City", "TRUE", "city", "", "", ""],
                &["Date of Birth", "TRUE", "born_at", "", "", ""],
                &["Religion", "TRUE", "religion", "", "", "Multiple Choice"],
                &["Occupation", "TRUE", "occupation", "", "", ""],
                &["Cell\nPhone", "TRUE", "mobile_number", "TRUE", "has_phone", ""],
                &["Can help", "TRUE", "", "TRUE", "volunteer", ""],
                &[CONSTITUENCY, "TRUE", "constituency", "", "", ""],
                &["Staff Notes", "FALSE", "", "", "", ""],
            ],
        );
        let religion = table(
            &["Religion", "Religion (clean)"],
            &[&["c of e", "Christian"], &["RC", "Christian"]],
        );
        let occupation = table(
            &["Email", "Occupation (clean)"],
            &[&["ann@example.com", "Teacher"]],
        );
        Metadata::build(cfg, &mapping, Some(&religion), &[occupation])
    }

    fn export() -> crate::table::Table {
        table(
            &[
                "First Name",
                "Last Name",
                "Email",
                "Mobile",
                "City",
                "Date of Birth",
                "Religion",
                "Occupation",
                "Cell\nPhone",
                "Can help",
                CONSTITUENCY,
            ],
            &[
                &[
                    "Ann", "Smith,", "ann@example.com", "07700 900001", "LEEDS", "1980-01-02",
                    "c of e", "teacher teacher", "07700 900002", "yes", "Leeds North",
                ],
                &[
                    "QA", "Bot", "qa@TESTING.org", "", "York", "", "", "", "", "", "York Central",
                ],
                &[
                    "Bea", "Jones", "bea@example.com", "", "St. Mary&#039;s Ward", "1975-12-31",
                    "Jedi", "nurse", "07700 900003", "", "Southampton, Test",
                ],
            ],
        )
    }

    #[test]
    fn end_to_end() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let cfg = fixture_config(dir.path(), 3);
        prepare_directories(&cfg)?;
        write_csv(&export(), cfg.input_path())?;
        let meta = fixture_metadata(&cfg)?;

        let summary = run_pipeline(&cfg, &meta)?;
        assert_eq!(summary.loaded, (3, 11));
        assert_eq!(summary.in_scope_columns, 11);
        assert_eq!(summary.deleted_rows, 1);
        assert_eq!(summary.reports.len(), 7);

        let out = read_csv(cfg.output_path())?;
        assert_eq!(
            out.headers,
            vec![
                "first_name",
                "last_name",
                "email",
                "mobile_number",
                "city",
                "born_at",
                "religion",
                "occupation",
                "constituency",
                "tag_list",
            ]
        );
        assert_eq!(summary.output, (2, 10));
        assert_eq!(
            out.rows[0],
            vec![
                "Ann",
                "Smith",
                "ann@example.com",
                "07700 900001, 07700 900002",
                "Leeds",
                "01/02/1980",
                "Christian",
                "Teacher",
                "Leeds North",
                "has_phone, volunteer",
            ]
        );
        assert_eq!(
            out.rows[1],
            vec![
                "Bea",
                "Jones",
                "bea@example.com",
                "07700 900003",
                "St. Mary's Ward",
                "12/31/1975",
                "",
                "",
                "Southampton, Test",
                "has_phone",
            ]
        );

        let deleted = read_csv(cfg.deleted_rows_path())?;
        assert_eq!(deleted.rows.len(), 1);
        assert_eq!(deleted.rows[0][0], "QA");

        let religions = read_csv(cfg.custom_fields_dir().join("religion.csv"))?;
        assert_eq!(religions.rows, vec![vec!["Christian".to_string()]]);
        assert_eq!(read_csv(cfg.sample_path())?, out);
        Ok(())
    }

    #[test]
    fn shape_mismatch_stops_before_any_output() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let cfg = fixture_config(dir.path(), 4);
        prepare_directories(&cfg)?;
        write_csv(&export(), cfg.input_path())?;
        let meta = fixture_metadata(&cfg)?;

        let err = run_pipeline(&cfg, &meta).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::ShapeMismatch {
                expected: (4, 11),
                actual: (3, 11)
            })
        );
        assert!(!cfg.deleted_rows_path().exists());
        assert!(!cfg.output_path().exists());
        Ok(())
    }
}

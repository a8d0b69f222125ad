// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// Environment variable pointing at the YAML config file.
pub const CONFIG_ENV_VAR: &str = "NBPREP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "nbprep.yaml";

/// Everything a run needs to know. Built once in `main` and handed to
/// each phase by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_directory: PathBuf,
    pub output_directory: PathBuf,
    pub cache_directory: PathBuf,
    /// Relative to `output_directory`.
    pub custom_fields_directory: PathBuf,

    pub input_filename: String,
    pub output_filename: String,
    pub sample_filename: String,
    pub deleted_rows_filename: String,
    pub sample_rows: usize,

    pub expected_row_count: usize,
    pub expected_col_count: usize,

    /// Joins conflicting values when two source columns land on one target.
    pub merge_separator: String,
    pub tag_column: String,
    /// Custom-field types (case-insensitive) that get a distinct-value file.
    pub multi_choice_types: Vec<String>,

    pub test_rows: TestRowConfig,
    pub sheet: SheetConfig,
    pub cleaning: CleaningConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("data"),
            output_directory: PathBuf::from("output"),
            cache_directory: PathBuf::from("cache"),
            custom_fields_directory: PathBuf::from("customFieldValues"),
            input_filename: "export_01_sample.csv".into(),
            output_filename: "data_prepped_for_nb.csv".into(),
            sample_filename: "data_prepped_for_nb_sample.csv".into(),
            deleted_rows_filename: "deleted_test_rows.csv".into(),
            sample_rows: 10_000,
            expected_row_count: 1000,
            expected_col_count: 297,
            merge_separator: ", ".into(),
            tag_column: "tag_list".into(),
            multi_choice_types: vec!["multiple choice".into(), "checkbox".into()],
            test_rows: TestRowConfig::default(),
            sheet: SheetConfig::default(),
            cleaning: CleaningConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRowConfig {
    pub needle: String,
    pub exception_column: String,
    pub exception_value: String,
}

impl Default for TestRowConfig {
    fn default() -> Self {
        Self {
            needle: "test".into(),
            exception_column: "Parliamentary Constituency (U.K.)".into(),
            exception_value: "Southampton, Test".into(),
        }
    }
}

/// Where the metadata spreadsheet lives and how its mapping tab is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    /// JSON file holding `{"api_key": "..."}`.
    pub credentials_file: PathBuf,
    pub api_base: String,
    pub mapping: TabConfig,
    pub mapping_columns: MappingColumns,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            credentials_file: PathBuf::from("jcf_google_api_key_file.json"),
            api_base: "https://sheets.googleapis.com/v4/spreadsheets/".into(),
            mapping: TabConfig {
                tab: "JCF - Source to Target Mapping".into(),
                cache_filename: "meta_data.csv".into(),
            },
            mapping_columns: MappingColumns::default(),
        }
    }
}

/// One spreadsheet tab and the local file it is cached in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabConfig {
    pub tab: String,
    pub cache_filename: String,
}

/// Header names of the mapping tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingColumns {
    pub full_column_name: String,
    pub in_scope: String,
    pub target_field: String,
    pub tag: String,
    pub tag_name: String,
    pub custom_field_type: String,
}

impl Default for MappingColumns {
    fn default() -> Self {
        Self {
            full_column_name: "Full Column Name".into(),
            in_scope: "In Scope".into(),
            target_field: "Target Field".into(),
            tag: "Tag".into(),
            tag_name: "Tag Name".into(),
            custom_field_type: "Custom Field Type".into(),
        }
    }
}

/// Data for the hand-written corrections, applied in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub last_name_column: String,
    pub last_name_comma_exceptions: Vec<String>,
    pub punctuation_only_columns: Vec<String>,
    pub title_case_columns: Vec<String>,
    pub replacements: Vec<Replacement>,
    pub date_columns: Vec<String>,
    pub religion: Option<ReligionConfig>,
    pub repeated_data: Vec<RepeatedDataConfig>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            last_name_column: "Last Name".into(),
            last_name_comma_exceptions: vec!["F. Queen, Jr.".into()],
            punctuation_only_columns: vec!["Address 1".into()],
            title_case_columns: vec!["City".into()],
            replacements: vec![
                Replacement::new("City", "St. Mary&#039;s Ward", "St. Mary's Ward"),
                Replacement::new("Home Phone", "0", ""),
                Replacement::new("Postcode", "0", ""),
            ],
            date_columns: vec!["Date of Birth".into()],
            religion: Some(ReligionConfig {
                column: "Religion".into(),
                tab: TabConfig {
                    tab: "Religion Mapping".into(),
                    cache_filename: "religion_mapping.csv".into(),
                },
            }),
            repeated_data: Vec::new(),
        }
    }
}

/// Exact-match substitution: a cell equal to `from` becomes `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub column: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
}

impl Replacement {
    pub fn new(column: &str, from: &str, to: &str) -> Self {
        Self {
            column: column.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReligionConfig {
    pub column: String,
    pub tab: TabConfig,
}

/// A column cleaned by hand outside the pipeline, re-attached by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedDataConfig {
    pub column: String,
    pub key_column: String,
    /// Column of the cleaned tab holding the corrected value; defaults to `column`.
    #[serde(default)]
    pub value_column: Option<String>,
    pub tab: TabConfig,
}

impl RepeatedDataConfig {
    pub fn value_column(&self) -> &str {
        self.value_column.as_deref().unwrap_or(&self.column)
    }
}

impl Config {
    /// Read the YAML file at `path`, or fall back to built-in defaults when
    /// it does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Resolve the config path from `NBPREP_CONFIG`, then load it.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(path)
    }

    pub fn input_path(&self) -> PathBuf {
        self.data_directory.join(&self.input_filename)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_directory.join(&self.output_filename)
    }

    pub fn sample_path(&self) -> PathBuf {
        self.output_directory.join(&self.sample_filename)
    }

    pub fn deleted_rows_path(&self) -> PathBuf {
        self.output_directory.join(&self.deleted_rows_filename)
    }

    pub fn custom_fields_dir(&self) -> PathBuf {
        self.output_directory.join(&self.custom_fields_directory)
    }

    pub fn cache_path(&self, tab: &TabConfig) -> PathBuf {
        self.cache_directory.join(&tab.cache_filename)
    }

    /// Every tab a run reads, mapping tab first.
    pub fn tabs(&self) -> Vec<&TabConfig> {
        let mut tabs = vec![&self.sheet.mapping];
        if let Some(rel) = &self.cleaning.religion {
            tabs.push(&rel.tab);
        }
        tabs.extend(self.cleaning.repeated_data.iter().map(|r| &r.tab));
        tabs
    }

    /// Directories that must exist before the pipeline writes anything.
    pub fn directories(&self) -> Vec<PathBuf> {
        vec![
            self.data_directory.clone(),
            self.output_directory.clone(),
            self.cache_directory.clone(),
            self.custom_fields_dir(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let cfg = Config::load("/definitely/not/here.yaml")?;
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.merge_separator, ", ");
        assert_eq!(cfg.sample_rows, 10_000);
        Ok(())
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(
            tmp,
            r#"
expected_row_count: 5
merge_separator: "  |  "
cleaning:
  date_columns: ["Joined"]
  repeated_data:
    - column: Occupation
      key_column: Email
      tab:
        tab: Occupation Cleaned
        cache_filename: occupation.csv
"#
        )?;

        let cfg = Config::load(tmp.path())?;
        assert_eq!(cfg.expected_row_count, 5);
        assert_eq!(cfg.expected_col_count, 297);
        assert_eq!(cfg.merge_separator, "  |  ");
        assert_eq!(cfg.cleaning.date_columns, vec!["Joined".to_string()]);
        assert_eq!(cfg.cleaning.last_name_column, "Last Name");

        let rep = &cfg.cleaning.repeated_data[0];
        assert_eq!(rep.value_column(), "Occupation");
        assert_eq!(
            cfg.cache_path(&rep.tab),
            PathBuf::from("cache").join("occupation.csv")
        );
        // mapping, religion, one repeated-data tab
        assert_eq!(cfg.tabs().len(), 3);
        Ok(())
    }
}

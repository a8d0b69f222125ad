// src/setup.rs

use anyhow::Result;
use reqwest::Client;
use tracing::instrument;

use crate::config::Config;
use crate::error::PipelineError;
use crate::metadata::{load_metadata, Metadata};
use crate::process::{
    mapping::{check_tag_column, plan_merge},
    prepare_directories,
};
use crate::report::PhaseReport;

/// Everything that can fail before a single data row is touched: directory
/// layout, presence of the export, metadata (cache or sheet), and the
/// mapping's own consistency.
#[instrument(level = "info", skip(client, cfg))]
pub async fn setup(
    client: &Client,
    cfg: &Config,
    refresh: bool,
) -> Result<(Metadata, PhaseReport)> {
    let mut report = PhaseReport::new("Setup");

    prepare_directories(cfg)?;
    report.note(format!(
        "Output goes to {}, metadata cache in {}",
        cfg.output_directory.display(),
        cfg.cache_directory.display()
    ));

    let input = cfg.input_path();
    if !input.is_file() {
        return Err(PipelineError::MissingFile(input).into());
    }
    report.note(format!("Found input {}", input.display()));

    let meta = load_metadata(client, cfg, refresh).await?;
    let plan = plan_merge(&meta.mapping)?;
    check_tag_column(&plan, &cfg.tag_column)?;
    report.note(format!(
        "Metadata: {} columns, {} in scope, {} target fields, {} tag-only",
        meta.mapping.entries.len(),
        meta.mapping.in_scope().count(),
        plan.groups.len(),
        plan.tag_only.len()
    ));
    report.note(format!(
        "Read {} metadata tabs (refresh = {})",
        cfg.tabs().len(),
        refresh
    ));

    Ok((meta, report))
}

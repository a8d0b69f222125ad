// src/metadata/fetch.rs

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::{fs, path::Path};
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::SheetConfig;
use crate::error::PipelineError;
use crate::table::Table;

#[derive(Debug, Deserialize)]
struct Credentials {
    api_key: String,
}

/// Body of a `spreadsheets.values.get` response.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Read the API key out of the credential file.
pub fn read_api_key<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::MissingFile(path.to_path_buf()).into());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let creds: Credentials = serde_json::from_str(&text)
        .with_context(|| format!("parsing credentials {}", path.display()))?;
    Ok(creds.api_key)
}

/// `{api_base}/{spreadsheet_id}/values/{tab}?key={api_key}`, with the tab
/// name percent-encoded as a single path segment.
pub fn tab_url(sheet: &SheetConfig, tab: &str, api_key: &str) -> Result<Url> {
    if sheet.spreadsheet_id.trim().is_empty() {
        return Err(anyhow!("sheet.spreadsheet_id is not configured"));
    }
    let mut url = Url::parse(&sheet.api_base)
        .with_context(|| format!("parsing api base {}", sheet.api_base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("api base {} cannot take path segments", sheet.api_base))?
        .pop_if_empty()
        .push(&sheet.spreadsheet_id)
        .push("values")
        .push(tab);
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// First row is the header; short rows are padded with blanks, long rows
/// are cut to the header width.
pub fn values_to_table(tab: &str, values: &[Vec<Value>]) -> Result<Table> {
    let (header, body) = values
        .split_first()
        .ok_or_else(|| PipelineError::InvalidMetadata {
            table: tab.to_string(),
            reason: "tab is empty".into(),
        })?;

    let headers: Vec<String> = header.iter().map(cell_text).collect();
    let width = headers.len();
    let rows = body
        .iter()
        .map(|r| {
            let mut row: Vec<String> = r.iter().take(width).map(cell_text).collect();
            row.resize(width, String::new());
            row
        })
        .collect();

    Ok(Table { headers, rows })
}

/// Download one tab of the metadata spreadsheet. No retry: a failure here
/// ends the run.
#[instrument(level = "info", skip(client, sheet, api_key))]
pub async fn fetch_tab(
    client: &Client,
    sheet: &SheetConfig,
    api_key: &str,
    tab: &str,
) -> Result<Table> {
    let url = tab_url(sheet, tab, api_key)?;
    debug!(tab, "fetching sheet tab");

    let body: ValueRange = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET sheet tab `{}`", tab))?
        .error_for_status()
        .with_context(|| format!("non-success status for sheet tab `{}`", tab))?
        .json()
        .await
        .with_context(|| format!("decoding sheet tab `{}`", tab))?;

    let table = values_to_table(tab, &body.values)?;
    info!(tab, rows = table.rows.len(), cols = table.headers.len(), "fetched sheet tab");
    Ok(table)
}

// src/metadata/cache.rs

use anyhow::Result;
use reqwest::Client;
use tracing::{info, instrument};

use super::{fetch, Metadata};
use crate::config::{Config, TabConfig};
use crate::table::{read_csv, write_csv, Table};

/// Reads tabs from the local snapshot, or from the spreadsheet when asked
/// to refresh or when no snapshot exists yet. Fetched tabs are written back
/// to the snapshot.
pub struct TabSource<'a> {
    client: &'a Client,
    cfg: &'a Config,
    refresh: bool,
    api_key: Option<String>,
}

impl<'a> TabSource<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config, refresh: bool) -> Self {
        Self {
            client,
            cfg,
            refresh,
            api_key: None,
        }
    }

    fn api_key(&mut self) -> Result<String> {
        if let Some(k) = &self.api_key {
            return Ok(k.clone());
        }
        let k = fetch::read_api_key(&self.cfg.sheet.credentials_file)?;
        self.api_key = Some(k.clone());
        Ok(k)
    }

    pub async fn load(&mut self, tab: &TabConfig) -> Result<Table> {
        let cache = self.cfg.cache_path(tab);
        if !self.refresh && cache.is_file() {
            info!(tab = %tab.tab, path = %cache.display(), "using cached tab");
            return read_csv(&cache);
        }

        let key = self.api_key()?;
        let table = fetch::fetch_tab(self.client, &self.cfg.sheet, &key, &tab.tab).await?;
        write_csv(&table, &cache)?;
        info!(tab = %tab.tab, path = %cache.display(), "cached tab");
        Ok(table)
    }
}

/// Load the mapping tab and every auxiliary cleaning tab.
#[instrument(level = "info", skip(client, cfg))]
pub async fn load_metadata(client: &Client, cfg: &Config, refresh: bool) -> Result<Metadata> {
    let mut source = TabSource::new(client, cfg, refresh);

    let mapping = source.load(&cfg.sheet.mapping).await?;
    let religion = match &cfg.cleaning.religion {
        Some(rel) => Some(source.load(&rel.tab).await?),
        None => None,
    };
    let mut repeated = Vec::with_capacity(cfg.cleaning.repeated_data.len());
    for rc in &cfg.cleaning.repeated_data {
        repeated.push(source.load(&rc.tab).await?);
    }

    let meta = Metadata::build(cfg, &mapping, religion.as_ref(), &repeated)?;
    info!(
        entries = meta.mapping.entries.len(),
        in_scope = meta.mapping.in_scope().count(),
        repeated = meta.repeated.len(),
        "metadata loaded"
    );
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReligionConfig;
    use crate::error::PipelineError;
    use crate::metadata::tests::MAPPING_HEADERS;
    use crate::table::tests::table;
    use anyhow::Result;
    use tempfile::tempdir;

    fn cfg_in(dir: &std::path::Path) -> Config {
        let mut cfg = Config::default();
        cfg.cache_directory = dir.join("cache");
        cfg.sheet.credentials_file = dir.join("creds.json");
        cfg.cleaning.religion = Some(ReligionConfig {
            column: "Religion".into(),
            tab: TabConfig {
                tab: "Religion Mapping".into(),
                cache_filename: "religion.csv".into(),
            },
        });
        cfg
    }

    #[tokio::test]
    async fn cached_tabs_need_no_credentials() -> Result<()> {
        let dir = tempdir()?;
        let cfg = cfg_in(dir.path());
        write_csv(
            &table(
                MAPPING_HEADERS,
                &[&["Email", "TRUE", "email", "", "", ""]],
            ),
            cfg.cache_path(&cfg.sheet.mapping),
        )?;
        write_csv(
            &table(&["raw", "clean"], &[&["RC", "Catholic"]]),
            cfg.cache_path(&cfg.cleaning.religion.as_ref().unwrap().tab),
        )?;

        let meta = load_metadata(&Client::new(), &cfg, false).await?;
        assert_eq!(meta.mapping.entries.len(), 1);
        assert_eq!(meta.religion.unwrap().get("RC"), Some("Catholic"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_cache_without_credentials_fails() -> Result<()> {
        let dir = tempdir()?;
        let cfg = cfg_in(dir.path());
        let err = load_metadata(&Client::new(), &cfg, false)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::MissingFile(dir.path().join("creds.json")))
        );
        Ok(())
    }
}

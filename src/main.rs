use anyhow::Result;
use clap::Parser;
use nbprep::{run_pipeline, setup, Config};
use reqwest::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "nbprep")]
#[command(about = "Clean and map a membership export for NationBuilder import")]
struct Cli {
    /// Re-download the metadata tabs instead of using the local cache
    #[arg(long)]
    refresh_metadata: bool,

    /// Stop after setup and validation, without processing data
    #[arg(long)]
    setup_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nbprep=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    let cli = Cli::parse();

    // ─── 2) config ───────────────────────────────────────────────────
    let cfg = Arc::new(Config::from_env()?);

    // ─── 3) setup: dirs, input, metadata ─────────────────────────────
    let client = Client::new();
    let (meta, report) = setup(&client, &cfg, cli.refresh_metadata).await?;
    report.print();

    if cli.setup_only {
        info!("setup only; exit");
        return Ok(());
    }

    // ─── 4) run the pipeline on the blocking pool ────────────────────
    let summary = tokio::task::spawn_blocking({
        let cfg = Arc::clone(&cfg);
        move || run_pipeline(&cfg, &meta)
    })
    .await??;

    info!(
        rows = summary.output.0,
        cols = summary.output.1,
        deleted = summary.deleted_rows,
        "all done"
    );
    Ok(())
}

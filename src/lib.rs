//! Prepares a membership CSV export for import into NationBuilder.

pub mod config;
pub mod error;
pub mod metadata;
pub mod process;
pub mod report;
pub mod setup;
pub mod table;

pub use config::Config;
pub use error::PipelineError;
pub use metadata::Metadata;
pub use process::{run_pipeline, RunSummary};
pub use setup::setup;
pub use table::Table;

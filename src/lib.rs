//! # scholarcsv
//!
//! Google Scholar search via SerpAPI, saved as CSV.
//!
//! ## Modules
//!
//! - [`serpapi`] - SerpAPI client and result records
//! - [`writer`] - CSV formatting and atomic file output
//! - [`pipeline`] - search → CSV run
//! - [`config`] - Runtime configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholarcsv::{config::Config, pipeline, serpapi::SerpApiClient, writer::ResultWriter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = SerpApiClient::from_config(&config)?;
//!     let writer = ResultWriter::new(&config.output_dir);
//!     let report = pipeline::run(&config, &client, &writer, "machine learning").await?;
//!     println!("Saved {} results to {}", report.rows, report.path.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod serpapi;
pub mod writer;

pub use error::{Result, ScholarError};

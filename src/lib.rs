//! # repo-chunker
//!
//! Splits a Git repository's text files into token-bounded output files
//! suitable for LLM context windows.
//!
//! ## Features
//!
//! - Local repositories or remote URLs (cloned to a temporary directory)
//! - `.gitignore`, `.git/info/exclude` and extra glob exclusions
//! - Order-preserving chunking; a file is never split across outputs
//! - Optional repository-structure preamble in the first output file
//! - Pluggable token estimation and Tera section templates
//! - Atomic file writes with an optional `summary.json` manifest
//!
//! ## Quick Start
//!
//! ```no_run
//! use repo_chunker::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .repo("./my-project")
//!     .output_dir("./output")
//!     .max_tokens(100_000)
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Repository**: opens the working tree or clones it
//! 2. **Scanner**: reads files that pass the path filter
//! 3. **Chunker**: groups entries under the token limit
//! 4. **Writer**: persists one file per chunk

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod chunker;
mod config;
mod error;
mod file;
mod filter;
mod pipeline;
mod repository;
mod scanner;
mod template;
mod token;
mod tree;
mod writer;

pub use chunker::{Chunk, Chunker, chunk};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use file::FileEntry;
pub use filter::{BASE_IGNORE_PATTERNS, ExcludeReason, PathDecision, PathFilter};
pub use pipeline::{Pipeline, PipelineStats, StageTimings};
pub use repository::{RepoSource, ResolvedRepository};
pub use scanner::{ScanReport, ScanStats};
pub use template::TemplateEngine;
pub use token::{TokenEstimator, TokenizerKind};
pub use tree::render_tree;

/// Runs the complete pipeline with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid (including a zero token limit)
/// - The repository cannot be opened or cloned
/// - The output directory or an output file cannot be written
///
/// # Examples
///
/// ```no_run
/// use repo_chunker::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .repo(".")
///     .build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}

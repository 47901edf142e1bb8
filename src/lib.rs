//! # mdpress
//!
//! Build HTML, PDF, LaTeX and DOCX documents from Markdown by driving
//! [pandoc](https://pandoc.org), with a small SQLite-backed fingerprint
//! cache that skips conversions whose inputs have not changed.
//!
//! Markdown parsing, LaTeX typesetting and PDF rendering are all done by
//! external tools. This crate decides *when* to call them and keeps the
//! surrounding chores (templates, asset copies, PDF merging, front-matter,
//! index lists) in one place.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source.md
//!  │
//!  ├─ 1. Template  auto / explicit / none
//!  ├─ 2. Cache     MD5(source) + MD5(template) vs. SQLite row
//!  │               └─ UpToDate → skip
//!  ├─ 3. Convert   pandoc --to html|latex|docx [--pdf-engine]
//!  └─ 4. Record    store the new fingerprints
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdpress::{compile, BuildConfig, OutputFormat, TemplateChoice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BuildConfig::builder().output_dir("demo/").build()?;
//!     let out = compile("README.md", OutputFormat::Pdf, &TemplateChoice::Auto, &config).await?;
//!     if out.skipped {
//!         eprintln!("{} is up to date", out.output.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdpress` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod compile;
pub mod config;
pub mod error;
pub mod filelist;
pub mod files;
pub mod fingerprint;
pub mod frontmatter;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod site;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CacheDecision, CacheEntry, ConversionCache, RecordOutcome};
pub use compile::{cache_status, compile, compile_as, compile_string, compile_sync};
pub use config::{BuildConfig, BuildConfigBuilder, CacheConfig, OutputFormat, TemplateChoice};
pub use error::{CacheError, JobError, MdPressError};
pub use filelist::{file_list_html, list_by_modified, list_by_name, ListOrder};
pub use files::{copy_dir, copy_file, ensure_dir, include_in_file};
pub use frontmatter::{extract_front_matter, front_matter_value};
pub use output::{BuildReport, CompileOutput, JobOutcome, JobResult, MergeStats};
pub use pipeline::merge::merge_pdfs;
pub use pipeline::pandoc::{ConversionRequest, DocumentConverter, PandocConverter};
pub use progress::{BuildProgressCallback, NoopProgressCallback, ProgressCallback};
pub use site::{build_site, Job, Manifest};

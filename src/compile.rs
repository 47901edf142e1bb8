//! Compile entry points: one Markdown source to one document.
//!
//! ## Flow
//!
//! ```text
//! source ──▶ template ──▶ cache check ──▶ converter ──▶ cache record
//!                              │
//!                              └─ UpToDate + output newer than inputs ──▶ skip
//! ```
//!
//! The cache runs on a blocking thread (SQLite and file hashing are
//! synchronous). A conversion that fails is never recorded, so the next
//! run retries it.

use crate::cache::{CacheDecision, ConversionCache, RecordOutcome};
use crate::config::{BuildConfig, OutputFormat, TemplateChoice};
use crate::error::MdPressError;
use crate::files;
use crate::output::CompileOutput;
use crate::pipeline::pandoc::{self, ConversionRequest};
use crate::pipeline::template;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Compile `input` into `<output_dir>/<input stem>.<format ext>`.
///
/// # Errors
/// Returns `Err(MdPressError)` when the source cannot be read, the output
/// directory cannot be created, or the converter fails. Cache storage
/// problems are logged and never fail the compile.
pub async fn compile(
    input: impl AsRef<Path>,
    format: OutputFormat,
    template: &TemplateChoice,
    config: &BuildConfig,
) -> Result<CompileOutput, MdPressError> {
    let input = input.as_ref();
    let output = pandoc::output_path(&config.output_dir, input, format);
    compile_to(input, &output, format, template, config).await
}

/// Compile `input` into `<output_dir>/<outfile stem>.<format ext>`.
pub async fn compile_as(
    input: impl AsRef<Path>,
    outfile: impl AsRef<Path>,
    format: OutputFormat,
    template: &TemplateChoice,
    config: &BuildConfig,
) -> Result<CompileOutput, MdPressError> {
    let output = pandoc::output_path(&config.output_dir, outfile.as_ref(), format);
    compile_to(input.as_ref(), &output, format, template, config).await
}

/// Compile a Markdown string into `<output_dir>/<outfile>.<format ext>`.
///
/// The text is written to a managed temp file that is removed on return.
/// The cache is not consulted: a temp path has no stable identity.
pub async fn compile_string(
    markdown: &str,
    outfile: impl AsRef<Path>,
    format: OutputFormat,
    template: &TemplateChoice,
    config: &BuildConfig,
) -> Result<CompileOutput, MdPressError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("mdpress-")
        .suffix(".md")
        .tempfile()
        .map_err(|e| MdPressError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(markdown.as_bytes())
        .map_err(|e| MdPressError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| MdPressError::Internal(format!("tempfile write: {e}")))?;

    let outfile = outfile.as_ref();
    let output = pandoc::output_path(&config.output_dir, outfile, format);

    // Auto templates are looked up by the requested name, not the temp file's.
    let template_path = match template {
        TemplateChoice::Auto => {
            template::resolve_template(template, outfile, format, &config.templates_dir)
        }
        other => template::resolve_template(other, tmp.path(), format, &config.templates_dir),
    };

    let start = Instant::now();
    files::ensure_parent(&output)?;
    info!("Writing: {}...", output.display());
    let request = ConversionRequest {
        input: tmp.path().to_path_buf(),
        output: output.clone(),
        format,
        template: template_path.clone(),
    };
    pandoc::converter_for(config).convert(&request).await?;

    // `tmp` is dropped (and the file deleted) after the converter finishes
    Ok(CompileOutput {
        input: PathBuf::from(outfile),
        output,
        format,
        template: template_path,
        decision: None,
        record: None,
        skipped: false,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Synchronous wrapper around [`compile`].
///
/// Creates a temporary tokio runtime internally.
pub fn compile_sync(
    input: impl AsRef<Path>,
    format: OutputFormat,
    template: &TemplateChoice,
    config: &BuildConfig,
) -> Result<CompileOutput, MdPressError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MdPressError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(compile(input, format, template, config))
}

/// Ask the cache about `input` without converting anything.
pub async fn cache_status(
    input: impl AsRef<Path>,
    format: OutputFormat,
    template: &TemplateChoice,
    config: &BuildConfig,
) -> Result<(Option<PathBuf>, CacheDecision), MdPressError> {
    let input = input.as_ref().to_path_buf();
    let template_path =
        template::resolve_template(template, &input, format, &config.templates_dir);
    let cache = ConversionCache::new(config.cache.clone());
    let t = template_path.clone();
    let decision = run_blocking(move || cache.should_skip(&input, t.as_deref())).await?;
    Ok((template_path, decision))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn compile_to(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    template: &TemplateChoice,
    config: &BuildConfig,
) -> Result<CompileOutput, MdPressError> {
    let start = Instant::now();
    let template_path = template::resolve_template(template, input, format, &config.templates_dir);

    // ── Step 1: Cache check (also validates the source is readable) ──────
    let cache = ConversionCache::new(config.cache.clone());
    let decision = {
        let cache = cache.clone();
        let source = input.to_path_buf();
        let t = template_path.clone();
        run_blocking(move || cache.should_skip(&source, t.as_deref())).await?
    };
    debug!(input = %input.display(), ?decision, "Cache decision");

    if !decision.needs_conversion()
        && !config.force
        && output_is_current(output, input, template_path.as_deref())
    {
        info!("Skipping {} (unchanged)", input.display());
        return Ok(CompileOutput {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            format,
            template: template_path,
            decision: Some(decision),
            record: None,
            skipped: true,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    // ── Step 2: Convert ──────────────────────────────────────────────────
    files::ensure_parent(output)?;
    info!("Writing: {}...", output.display());
    let request = ConversionRequest {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        format,
        template: template_path.clone(),
    };
    pandoc::converter_for(config).convert(&request).await?;

    // ── Step 3: Record fingerprints ──────────────────────────────────────
    let record = {
        let source = input.to_path_buf();
        let t = template_path.clone();
        run_blocking(move || cache.record(&source, t.as_deref())).await?
    };
    if record == RecordOutcome::StorageFailed {
        debug!(input = %input.display(), "Converted without a cache entry");
    }

    Ok(CompileOutput {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        format,
        template: template_path,
        decision: Some(decision),
        record: Some(record),
        skipped: false,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// `output` exists and was written no earlier than its source and template.
///
/// The cache key covers source and template only, so outputs that share a
/// key (other formats, other names, other directories) are told apart here.
fn output_is_current(output: &Path, input: &Path, template: Option<&Path>) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    let Some(written) = modified(output) else {
        return false;
    };
    let current = [Some(input), template]
        .into_iter()
        .flatten()
        .all(|p| modified(p).map_or(true, |t| t <= written));
    if !current {
        debug!(output = %output.display(), "Output older than its inputs");
    }
    current
}

async fn run_blocking<T, F>(f: F) -> Result<T, MdPressError>
where
    F: FnOnce() -> Result<T, MdPressError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MdPressError::Internal(format!("Cache task panicked: {}", e)))?
}

//! CLI binary for mdpress.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BuildConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mdpress::{
    build_site, cache_status, compile, compile_as, compile_string, copy_dir, copy_file,
    file_list_html, front_matter_value, include_in_file, merge_pdfs, BuildConfig,
    BuildProgressCallback, CacheConfig, CacheDecision, ConversionCache, ListOrder, Manifest,
    OutputFormat, ProgressCallback, TemplateChoice,
};
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback for `mdpress build`: one bar for the whole
/// manifest plus a log line per finished job.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} jobs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Building");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl BuildProgressCallback for CliProgressCallback {
    fn on_build_start(&self, total_jobs: usize) {
        self.bar.set_length(total_jobs as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running {total_jobs} jobs…"))
        ));
    }

    fn on_job_start(&self, _index: usize, _total: usize, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_job_complete(&self, index: usize, total: usize, label: &str, skipped: bool) {
        let mark = if skipped {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            dim("=")
        } else {
            green("✓")
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}{}",
            mark,
            index,
            total,
            label,
            if skipped { dim("  (up to date)") } else { String::new() }
        ));
        self.bar.inc(1);
    }

    fn on_job_error(&self, index: usize, total: usize, label: &str, error: &str) {
        // Keep the log tidy; the full error is in build.log.
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.len() > 80 {
            let cut = first_line
                .char_indices()
                .nth(79)
                .map(|(i, _)| i)
                .unwrap_or(first_line.len());
            format!("{}\u{2026}", &first_line[..cut])
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            label,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_build_complete(&self, total_jobs: usize, failed_jobs: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        if failed_jobs == 0 {
            eprintln!(
                "{} {} jobs done  {}",
                green("✔"),
                bold(&total_jobs.to_string()),
                dim(&format!("({skipped} up to date)"))
            );
        } else {
            eprintln!(
                "{} {}/{} jobs done  ({} failed)",
                if failed_jobs == total_jobs {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&(total_jobs - failed_jobs).to_string()),
                total_jobs,
                red(&failed_jobs.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # HTML page with templates/README.html or templates/default.html
  mdpress compile README.md

  # PDF through xelatex with an explicit template
  mdpress compile README.md --format pdf --template templates/example.tex -o demo/

  # Rebuild even when the cache says the output is current
  mdpress --force compile README.md

  # Compile Markdown from stdin
  echo "# Hi" | mdpress compile-string string_demo --format pdf

  # Merge PDFs
  mdpress merge demo/a.pdf demo/b.pdf --outfile comb.pdf

  # Run a whole site manifest
  mdpress build site.yaml

  # Front-matter lookup (dotted keys walk nested maps)
  mdpress meta post.md author.name

  # What would happen to README.md?
  mdpress cache status README.md --format pdf

CACHE:
  Fingerprints (MD5 of source and template) live in a SQLite file,
  mdpress.db by default. A conversion is skipped when both fingerprints
  match the stored row and the output file is no older than the source
  and template. The cache is advisory: `mdpress cache clear` or --force
  always rebuilds.

ENVIRONMENT VARIABLES:
  MDPRESS_CACHE_DB        Cache database path
  MDPRESS_OUTPUT_DIR      Output directory (default page/)
  MDPRESS_TEMPLATES_DIR   Template directory (default templates/)
  MDPRESS_PANDOC          pandoc executable
  MDPRESS_PDF_ENGINE      LaTeX engine for PDF output (default xelatex)
  PDFIUM_LIB_PATH         libpdfium used by `merge`
  RUST_LOG                Overrides the console log filter
"##;

/// Build documents from Markdown with pandoc, skipping unchanged inputs.
#[derive(Parser, Debug)]
#[command(
    name = "mdpress",
    version,
    about = "Build HTML, PDF, LaTeX and DOCX documents from Markdown via pandoc",
    long_about = "Build HTML, PDF, LaTeX and DOCX documents from Markdown via pandoc. \
A content-hash cache skips conversions whose source and template are unchanged; \
helpers copy assets, merge PDFs, read YAML front-matter and render file lists.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output directory.
    #[arg(short, long = "output-dir", global = true, env = "MDPRESS_OUTPUT_DIR", default_value = "page/")]
    output_dir: PathBuf,

    /// Directory searched for automatic templates.
    #[arg(long, global = true, env = "MDPRESS_TEMPLATES_DIR", default_value = "templates/")]
    templates_dir: PathBuf,

    /// Cache database file.
    #[arg(long, global = true, env = "MDPRESS_CACHE_DB", default_value = mdpress::config::DEFAULT_CACHE_DB)]
    cache_db: PathBuf,

    /// Do not read or write the conversion cache.
    #[arg(long, global = true, env = "MDPRESS_NO_CACHE")]
    no_cache: bool,

    /// Convert even when the cache reports the output up to date.
    #[arg(long, global = true, env = "MDPRESS_FORCE")]
    force: bool,

    /// pandoc executable.
    #[arg(long, global = true, env = "MDPRESS_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// LaTeX engine for PDF output.
    #[arg(long, global = true, env = "MDPRESS_PDF_ENGINE", default_value = "xelatex")]
    pdf_engine: String,

    /// Do not pass --listings for LaTeX/PDF output.
    #[arg(long, global = true)]
    no_listings: bool,

    /// Extra argument passed to pandoc (repeatable).
    #[arg(long = "pandoc-arg", global = true, allow_hyphen_values = true)]
    pandoc_args: Vec<String>,

    /// Per-conversion timeout in seconds.
    #[arg(long, global = true, env = "MDPRESS_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Append DEBUG logs to this file.
    #[arg(long, global = true, env = "MDPRESS_LOG_FILE", default_value = "build.log")]
    log_file: PathBuf,

    /// Do not write a log file.
    #[arg(long, global = true)]
    no_log_file: bool,

    /// Disable the progress bar for `build`.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Enable DEBUG-level console logs.
    #[arg(short, long, global = true, env = "MDPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all console output except errors.
    #[arg(short, long, global = true, env = "MDPRESS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile one Markdown file.
    Compile {
        input: PathBuf,
        /// Output format.
        #[arg(short, long, value_enum, default_value = "html")]
        format: FormatArg,
        /// Template: auto, none, or a path.
        #[arg(short, long, default_value = "auto")]
        template: String,
        /// Output name (extension replaced by the format's).
        #[arg(long)]
        outfile: Option<PathBuf>,
    },
    /// Compile Markdown text given inline or on stdin.
    CompileString {
        /// Output name (extension replaced by the format's).
        outfile: PathBuf,
        /// Markdown text; read from stdin when omitted.
        #[arg(long)]
        markdown: Option<String>,
        #[arg(short, long, value_enum, default_value = "html")]
        format: FormatArg,
        #[arg(short, long, default_value = "auto")]
        template: String,
    },
    /// Merge PDFs into one document in the output directory.
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "comb.pdf")]
        outfile: PathBuf,
    },
    /// Copy a directory tree into the output directory.
    CopyDir { dir: PathBuf },
    /// Copy a file into the output directory.
    CopyFile {
        file: PathBuf,
        /// New file name.
        #[arg(long)]
        name: Option<PathBuf>,
    },
    /// Replace a placeholder in a file with text.
    Include {
        infile: PathBuf,
        variable: String,
        /// Replacement text.
        #[arg(long, conflicts_with = "text_file", required_unless_present = "text_file")]
        text: Option<String>,
        /// File whose contents replace the placeholder.
        #[arg(long)]
        text_file: Option<PathBuf>,
        /// Write here instead of overwriting INFILE.
        #[arg(long)]
        outfile: Option<PathBuf>,
    },
    /// Print a front-matter value.
    Meta { file: PathBuf, key: String },
    /// List files in a directory.
    FileList {
        dir: PathBuf,
        /// File name suffix, e.g. `.md`.
        ext: String,
        #[arg(long, value_enum, default_value = "name")]
        sort: SortArg,
        /// Print an HTML <ul> snippet instead of paths.
        #[arg(long)]
        html: bool,
    },
    /// Run a YAML site manifest.
    Build { manifest: PathBuf },
    /// Inspect or reset the conversion cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show the cache decision for a source.
    Status {
        input: PathBuf,
        #[arg(short, long, value_enum, default_value = "html")]
        format: FormatArg,
        #[arg(short, long, default_value = "auto")]
        template: String,
    },
    /// List every cache entry.
    List,
    /// Delete the cache database.
    Clear,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Html,
    Pdf,
    Latex,
    Docx,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Latex => OutputFormat::Latex,
            FormatArg::Docx => OutputFormat::Docx,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Name,
    Modified,
}

impl From<SortArg> for ListOrder {
    fn from(v: SortArg) -> Self {
        match v {
            SortArg::Name => ListOrder::Name,
            SortArg::Modified => ListOrder::Modified,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs on the console during `build`;
    // the log file always gets everything.
    let show_progress = matches!(cli.command, Command::Build { .. })
        && !cli.quiet
        && !cli.no_progress
        && !cli.json;
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    init_logging(level, (!cli.no_log_file).then_some(cli.log_file.as_path()))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BuildProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    match &cli.command {
        Command::Compile {
            input,
            format,
            template,
            outfile,
        } => {
            let template = TemplateChoice::parse(template);
            let out = match outfile {
                Some(name) => compile_as(input, name, (*format).into(), &template, &config).await,
                None => compile(input, (*format).into(), &template, &config).await,
            }
            .with_context(|| format!("Compiling {} failed", input.display()))?;

            if cli.json {
                print_json(&out)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {}  {}",
                    if out.skipped { dim("=") } else { green("✔") },
                    bold(&out.output.display().to_string()),
                    dim(&if out.skipped {
                        "up to date".to_string()
                    } else {
                        format!("{}ms", out.duration_ms)
                    }),
                );
            }
        }

        Command::CompileString {
            outfile,
            markdown,
            format,
            template,
        } => {
            let text = match markdown {
                Some(t) => t.clone(),
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read Markdown from stdin")?;
                    buf
                }
            };
            let template = TemplateChoice::parse(template);
            let out = compile_string(&text, outfile, (*format).into(), &template, &config)
                .await
                .context("Compiling Markdown text failed")?;
            if cli.json {
                print_json(&out)?;
            } else if !cli.quiet {
                eprintln!("{}  {}", green("✔"), bold(&out.output.display().to_string()));
            }
        }

        Command::Merge { files, outfile } => {
            let stats = merge_pdfs(files, config.output_dir.join(outfile))
                .await
                .context("Merging PDFs failed")?;
            if cli.json {
                print_json(&stats)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} files, {} pages  →  {}",
                    green("✔"),
                    stats.files,
                    stats.pages,
                    bold(&stats.output.display().to_string())
                );
            }
        }

        Command::CopyDir { dir } => {
            let to = copy_dir(dir, &config.output_dir).context("Copying directory failed")?;
            if !cli.quiet {
                eprintln!("{}  {}", green("✔"), to.display());
            }
        }

        Command::CopyFile { file, name } => {
            let to = copy_file(file, &config.output_dir, name.as_deref())
                .context("Copying file failed")?;
            if !cli.quiet {
                eprintln!("{}  {}", green("✔"), to.display());
            }
        }

        Command::Include {
            infile,
            variable,
            text,
            text_file,
            outfile,
        } => {
            let text = match (text, text_file) {
                (Some(t), _) => t.clone(),
                (None, Some(path)) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("Pass --text or --text-file"),
            };
            let written = include_in_file(infile, variable, &text, outfile.as_deref())
                .context("Include failed")?;
            if !cli.quiet {
                eprintln!("{}  {}", green("✔"), written.display());
            }
        }

        Command::Meta { file, key } => {
            let value = front_matter_value(file, key)
                .with_context(|| format!("Reading front-matter of {}", file.display()))?;
            if cli.json {
                print_json(&value)?;
            } else {
                match value {
                    Some(v) => println!("{v}"),
                    None => anyhow::bail!("{} has no value for '{}'", file.display(), key),
                }
            }
        }

        Command::FileList {
            dir,
            ext,
            sort,
            html,
        } => {
            let files = mdpress::filelist::list_files(dir, ext, (*sort).into())
                .with_context(|| format!("Listing {}", dir.display()))?;
            if *html {
                print!("{}", file_list_html(&files).context("Rendering file list")?);
            } else if cli.json {
                print_json(&files)?;
            } else {
                for f in &files {
                    println!("{}", f.display());
                }
            }
        }

        Command::Build { manifest } => {
            let manifest = Manifest::load(manifest).context("Failed to load manifest")?;
            let report = build_site(&manifest, &config).await;
            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet && !show_progress {
                eprintln!(
                    "Built {} jobs in {}ms: {} converted, {} up to date, {} failed",
                    report.jobs.len(),
                    report.duration_ms,
                    report.completed,
                    report.skipped,
                    report.failed
                );
                for e in report.errors() {
                    eprintln!("  {}", red(&e.to_string()));
                }
            }
            if !report.is_success() {
                anyhow::bail!("{} of {} jobs failed", report.failed, report.jobs.len());
            }
        }

        Command::Cache { action } => run_cache_action(action, &cli, &config).await?,
    }

    Ok(())
}

async fn run_cache_action(action: &CacheAction, cli: &Cli, config: &BuildConfig) -> Result<()> {
    let cache = ConversionCache::new(config.cache.clone());
    match action {
        CacheAction::Status {
            input,
            format,
            template,
        } => {
            let (template_path, decision) = cache_status(
                input,
                (*format).into(),
                &TemplateChoice::parse(template),
                config,
            )
            .await
            .with_context(|| format!("Checking {}", input.display()))?;

            if cli.json {
                print_json(&serde_json::json!({
                    "input": input,
                    "template": template_path,
                    "decision": decision,
                }))?;
            } else {
                let label = match decision {
                    CacheDecision::UpToDate => green("up to date"),
                    CacheDecision::Stale => cyan("stale"),
                    CacheDecision::NotCached => cyan("not cached"),
                    CacheDecision::CachingDisabled => dim("caching disabled"),
                };
                println!(
                    "{}  {}  {}",
                    input.display(),
                    dim(&template_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(no template)".into())),
                    label
                );
            }
        }
        CacheAction::List => {
            let entries = cache.entries();
            if cli.json {
                print_json(&entries)?;
            } else {
                for e in &entries {
                    let template = if mdpress::cache::is_sentinel_template(&e.template_path) {
                        "(no template)".to_string()
                    } else {
                        e.template_path.clone()
                    };
                    println!(
                        "{}  {}  {}",
                        e.source_path,
                        dim(&template),
                        dim(&e.source_hash[..e.source_hash.len().min(12)])
                    );
                }
                if !cli.quiet {
                    eprintln!("{} entries in {}", entries.len(), config.cache.db_path.display());
                }
            }
        }
        CacheAction::Clear => {
            let removed = cache.wipe().context("Failed to remove cache database")?;
            if !cli.quiet {
                if removed {
                    eprintln!("{}  removed {}", green("✔"), config.cache.db_path.display());
                } else {
                    eprintln!("{}", dim("no cache database to remove"));
                }
            }
        }
    }
    Ok(())
}

/// Console layer at `level` (RUST_LOG wins), plus an optional DEBUG file layer.
fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let console = fmt::layer().with_writer(io::stderr).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
    );

    let file = match log_file {
        Some(path) => {
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(f))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    Ok(())
}

/// Map CLI args to `BuildConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BuildConfig> {
    let cache = CacheConfig {
        enabled: !cli.no_cache,
        ..CacheConfig::at(&cli.cache_db)
    };

    let mut builder = BuildConfig::builder()
        .output_dir(&cli.output_dir)
        .templates_dir(&cli.templates_dir)
        .pandoc_path(&cli.pandoc)
        .pdf_engine(&cli.pdf_engine)
        .listings(!cli.no_listings)
        .converter_timeout_secs(cli.timeout)
        .force(cli.force)
        .cache(cache);

    for arg in &cli.pandoc_args {
        builder = builder.extra_arg(arg);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

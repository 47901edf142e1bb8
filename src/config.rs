//! Configuration types for document builds.
//!
//! All build behaviour is controlled through [`BuildConfig`], built via its
//! [`BuildConfigBuilder`]. The conversion cache has its own small
//! [`CacheConfig`] which is handed to [`crate::cache::ConversionCache`] at
//! construction, so whether caching is on, where it persists, and where
//! its log events go are all explicit values rather than process globals.

use crate::error::MdPressError;
use crate::pipeline::pandoc::DocumentConverter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default SQLite file for the conversion cache.
pub const DEFAULT_CACHE_DB: &str = "mdpress.db";

/// Settings for the conversion cache.
#[derive(Clone)]
pub struct CacheConfig {
    /// Persist fingerprints and skip unchanged conversions. Default: true.
    ///
    /// When false the cache answers every query with
    /// [`crate::cache::CacheDecision::CachingDisabled`] and never touches disk.
    pub enabled: bool,

    /// SQLite database file. Created on first access. Default: `mdpress.db`.
    pub db_path: PathBuf,

    /// Where cache log events go. `None` uses the global subscriber.
    pub log_sink: Option<tracing::Dispatch>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: PathBuf::from(DEFAULT_CACHE_DB),
            log_sink: None,
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("enabled", &self.enabled)
            .field("db_path", &self.db_path)
            .field("log_sink", &self.log_sink.as_ref().map(|_| "<Dispatch>"))
            .finish()
    }
}

impl CacheConfig {
    /// A cache persisted at `db_path`.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// A cache that never persists anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Route cache log events to `dispatch`.
    pub fn with_log_sink(mut self, dispatch: tracing::Dispatch) -> Self {
        self.log_sink = Some(dispatch);
        self
    }
}

/// Configuration for compiling documents and running site builds.
///
/// Built via [`BuildConfig::builder()`] or using [`BuildConfig::default()`].
///
/// # Example
/// ```rust
/// use mdpress::BuildConfig;
///
/// let config = BuildConfig::builder()
///     .output_dir("demo/")
///     .pdf_engine("lualatex")
///     .cache_db("build/cache.db")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BuildConfig {
    /// Directory compiled documents are written to. Default: `page/`.
    pub output_dir: PathBuf,

    /// Directory searched for automatic templates. Default: `templates/`.
    pub templates_dir: PathBuf,

    /// pandoc executable. Default: `pandoc` (looked up on `PATH`).
    pub pandoc_path: PathBuf,

    /// LaTeX engine used for PDF output. Default: `xelatex`.
    pub pdf_engine: String,

    /// Pass `--listings` for LaTeX and PDF output. Default: true.
    ///
    /// Templates that load the `listings` package get highlighted code.
    pub listings: bool,

    /// Produce standalone documents (`-s`). Default: true.
    pub standalone: bool,

    /// Extra arguments appended to every converter invocation.
    pub extra_args: Vec<String>,

    /// Deadline for a single converter run, in seconds. Default: 300.
    ///
    /// PDF output runs a full LaTeX pass, which can be slow on big documents.
    pub converter_timeout_secs: u64,

    /// Reconvert even when the cache reports the output up to date. Default: false.
    pub force: bool,

    /// Conversion cache settings.
    pub cache: CacheConfig,

    /// Pre-constructed converter. Takes precedence over pandoc.
    pub converter: Option<Arc<dyn DocumentConverter>>,

    /// Optional progress callback for site builds.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("page/"),
            templates_dir: PathBuf::from("templates/"),
            pandoc_path: PathBuf::from("pandoc"),
            pdf_engine: "xelatex".to_string(),
            listings: true,
            standalone: true,
            extra_args: Vec::new(),
            converter_timeout_secs: 300,
            force: false,
            cache: CacheConfig::default(),
            converter: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("output_dir", &self.output_dir)
            .field("templates_dir", &self.templates_dir)
            .field("pandoc_path", &self.pandoc_path)
            .field("pdf_engine", &self.pdf_engine)
            .field("listings", &self.listings)
            .field("standalone", &self.standalone)
            .field("extra_args", &self.extra_args)
            .field("converter_timeout_secs", &self.converter_timeout_secs)
            .field("force", &self.force)
            .field("cache", &self.cache)
            .field(
                "converter",
                &self.converter.as_ref().map(|_| "<dyn DocumentConverter>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BuildProgressCallback>"),
            )
            .finish()
    }
}

impl BuildConfig {
    /// Create a new builder for `BuildConfig`.
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BuildConfig`].
#[derive(Debug)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.templates_dir = dir.into();
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.pdf_engine = engine.into();
        self
    }

    pub fn listings(mut self, v: bool) -> Self {
        self.config.listings = v;
        self
    }

    pub fn standalone(mut self, v: bool) -> Self {
        self.config.standalone = v;
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    pub fn converter_timeout_secs(mut self, secs: u64) -> Self {
        self.config.converter_timeout_secs = secs;
        self
    }

    pub fn force(mut self, v: bool) -> Self {
        self.config.force = v;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn cache_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache.db_path = path.into();
        self
    }

    pub fn cache_enabled(mut self, v: bool) -> Self {
        self.config.cache.enabled = v;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BuildConfig, MdPressError> {
        let c = &self.config;
        if c.converter_timeout_secs == 0 {
            return Err(MdPressError::InvalidConfig(
                "Converter timeout must be ≥ 1 second".into(),
            ));
        }
        if c.pandoc_path.as_os_str().is_empty() {
            return Err(MdPressError::InvalidConfig(
                "pandoc path must not be empty".into(),
            ));
        }
        if c.pdf_engine.trim().is_empty() {
            return Err(MdPressError::InvalidConfig(
                "PDF engine must not be empty".into(),
            ));
        }
        if c.cache.enabled && c.cache.db_path.as_os_str().is_empty() {
            return Err(MdPressError::InvalidConfig(
                "Cache database path must not be empty while caching is enabled".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Document formats pandoc is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Standalone HTML page. (default)
    #[default]
    Html,
    /// PDF via a LaTeX engine.
    Pdf,
    /// LaTeX source.
    Latex,
    /// Word document.
    Docx,
}

impl OutputFormat {
    /// File extension of the produced document.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Latex => "tex",
            OutputFormat::Docx => "docx",
        }
    }

    /// pandoc writer name passed to `--to`.
    pub fn writer(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf | OutputFormat::Latex => "latex",
            OutputFormat::Docx => "docx",
        }
    }

    /// Extension of the templates that apply to this format.
    ///
    /// PDF is produced through LaTeX, so it shares `.tex` templates.
    pub fn template_extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf | OutputFormat::Latex => "tex",
            OutputFormat::Docx => "docx",
        }
    }

    /// Whether the LaTeX-only flags (`--listings`) apply.
    pub fn is_latex(self) -> bool {
        matches!(self, OutputFormat::Pdf | OutputFormat::Latex)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Latex => "latex",
            OutputFormat::Docx => "docx",
        })
    }
}

/// Which template a compile uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateChoice {
    /// Look up `<templates_dir>/<stem>.<ext>`, then `<templates_dir>/default.<ext>`. (default)
    #[default]
    Auto,
    /// Use pandoc's built-in template.
    None,
    /// Use this template file.
    Path(PathBuf),
}

impl TemplateChoice {
    /// Parse the CLI / manifest spelling: `auto`, `none`, or a path.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "auto" => TemplateChoice::Auto,
            "none" => TemplateChoice::None,
            path => TemplateChoice::Path(PathBuf::from(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = BuildConfig::default();
        assert_eq!(c.output_dir, PathBuf::from("page/"));
        assert_eq!(c.templates_dir, PathBuf::from("templates/"));
        assert_eq!(c.pdf_engine, "xelatex");
        assert!(c.listings);
        assert!(c.cache.enabled);
        assert_eq!(c.cache.db_path, PathBuf::from(DEFAULT_CACHE_DB));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = BuildConfig::builder()
            .converter_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, MdPressError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_engine() {
        assert!(BuildConfig::builder().pdf_engine("  ").build().is_err());
    }

    #[test]
    fn empty_db_path_is_fine_when_cache_disabled() {
        let c = BuildConfig::builder()
            .cache_db("")
            .cache_enabled(false)
            .build()
            .unwrap();
        assert!(!c.cache.enabled);
    }

    #[test]
    fn format_tables() {
        assert_eq!(OutputFormat::Pdf.extension(), "pdf");
        assert_eq!(OutputFormat::Pdf.writer(), "latex");
        assert_eq!(OutputFormat::Pdf.template_extension(), "tex");
        assert_eq!(OutputFormat::Latex.extension(), "tex");
        assert_eq!(OutputFormat::Docx.template_extension(), "docx");
        assert!(!OutputFormat::Html.is_latex());
    }

    #[test]
    fn template_choice_parse() {
        assert_eq!(TemplateChoice::parse("auto"), TemplateChoice::Auto);
        assert_eq!(TemplateChoice::parse(""), TemplateChoice::Auto);
        assert_eq!(TemplateChoice::parse("none"), TemplateChoice::None);
        assert_eq!(
            TemplateChoice::parse("templates/example.tex"),
            TemplateChoice::Path(PathBuf::from("templates/example.tex"))
        );
    }

    #[test]
    fn format_deserialises_lowercase() {
        let f: OutputFormat = serde_yaml::from_str("pdf").unwrap();
        assert_eq!(f, OutputFormat::Pdf);
    }
}

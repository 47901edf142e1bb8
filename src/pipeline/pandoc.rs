//! External converter invocation.
//!
//! Conversion is delegated entirely to pandoc. This module only assembles
//! the command line and maps process failures onto [`MdPressError`].
//! The [`DocumentConverter`] trait is the seam: the default
//! [`PandocConverter`] spawns a subprocess, while tests and embedders can
//! inject their own implementation through
//! [`crate::config::BuildConfigBuilder::converter`].

use crate::config::{BuildConfig, OutputFormat};
use crate::error::MdPressError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// One conversion for a [`DocumentConverter`] to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub template: Option<PathBuf>,
}

/// Something that turns a Markdown file into a document.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `request.input` into `request.output`.
    async fn convert(&self, request: &ConversionRequest) -> Result<(), MdPressError>;
}

/// Runs the `pandoc` executable.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: PathBuf,
    pdf_engine: String,
    listings: bool,
    standalone: bool,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl PandocConverter {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            program: config.pandoc_path.clone(),
            pdf_engine: config.pdf_engine.clone(),
            listings: config.listings,
            standalone: config.standalone,
            extra_args: config.extra_args.clone(),
            timeout: Duration::from_secs(config.converter_timeout_secs),
        }
    }

    /// Command-line arguments for `request`, without the program name.
    pub fn args(&self, request: &ConversionRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--from".into(),
            "markdown".into(),
            "--to".into(),
            request.format.writer().into(),
        ];

        if self.standalone {
            args.push("-s".into());
        }

        if let Some(template) = &request.template {
            let flag = match request.format {
                OutputFormat::Docx => "--reference-doc=",
                _ => "--template=",
            };
            let mut arg = OsString::from(flag);
            arg.push(template.as_os_str());
            args.push(arg);
        }

        if request.format.is_latex() && self.listings {
            args.push("--listings".into());
        }

        if request.format == OutputFormat::Pdf {
            args.push(format!("--pdf-engine={}", self.pdf_engine).into());
        }

        args.extend(self.extra_args.iter().map(OsString::from));

        args.push("--output".into());
        args.push(request.output.as_os_str().to_owned());
        args.push(request.input.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl DocumentConverter for PandocConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<(), MdPressError> {
        let args = self.args(request);
        debug!(program = %self.program.display(), ?args, "Running converter");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MdPressError::ConverterNotFound {
                    program: self.program.display().to_string(),
                },
                _ => MdPressError::Internal(format!(
                    "Failed to start '{}': {}",
                    self.program.display(),
                    e
                )),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| MdPressError::ConverterTimeout {
                input: request.input.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| MdPressError::Internal(format!("Waiting for converter: {}", e)))?;

        if !output.status.success() {
            return Err(MdPressError::ConverterFailed {
                input: request.input.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let warnings = String::from_utf8_lossy(&output.stderr);
        if !warnings.trim().is_empty() {
            info!(input = %request.input.display(), "pandoc: {}", warnings.trim());
        }
        Ok(())
    }
}

/// The converter a config asks for: the injected one, else pandoc.
pub fn converter_for(config: &BuildConfig) -> Arc<dyn DocumentConverter> {
    match &config.converter {
        Some(converter) => Arc::clone(converter),
        None => Arc::new(PandocConverter::from_config(config)),
    }
}

/// `<dir>/<stem of name>.<format ext>`.
pub fn output_path(dir: &Path, name: &Path, format: OutputFormat) -> PathBuf {
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    dir.join(format!("{}.{}", stem, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(format: OutputFormat, template: Option<&str>) -> ConversionRequest {
        ConversionRequest {
            input: PathBuf::from("README.md"),
            output: PathBuf::from("demo/README.out"),
            format,
            template: template.map(PathBuf::from),
        }
    }

    fn args_of(converter: &PandocConverter, req: &ConversionRequest) -> Vec<String> {
        converter
            .args(req)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn html_args() {
        let c = PandocConverter::from_config(&BuildConfig::default());
        let args = args_of(&c, &request(OutputFormat::Html, Some("templates/example.html")));
        assert_eq!(
            args,
            vec![
                "--from",
                "markdown",
                "--to",
                "html",
                "-s",
                "--template=templates/example.html",
                "--output",
                "demo/README.out",
                "README.md",
            ]
        );
    }

    #[test]
    fn pdf_args_include_engine_and_listings() {
        let c = PandocConverter::from_config(&BuildConfig::default());
        let args = args_of(&c, &request(OutputFormat::Pdf, Some("templates/example.tex")));
        assert!(args.contains(&"--to".to_string()));
        assert!(args.contains(&"latex".to_string()));
        assert!(args.contains(&"--listings".to_string()));
        assert!(args.contains(&"--pdf-engine=xelatex".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("README.md"));
    }

    #[test]
    fn latex_has_no_engine() {
        let c = PandocConverter::from_config(&BuildConfig::default());
        let args = args_of(&c, &request(OutputFormat::Latex, None));
        assert!(args.contains(&"--listings".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--pdf-engine")));
        assert!(!args.iter().any(|a| a.starts_with("--template")));
    }

    #[test]
    fn docx_uses_reference_doc() {
        let c = PandocConverter::from_config(&BuildConfig::default());
        let args = args_of(&c, &request(OutputFormat::Docx, Some("templates/ref.docx")));
        assert!(args.contains(&"--reference-doc=templates/ref.docx".to_string()));
        assert!(!args.contains(&"--listings".to_string()));
    }

    #[test]
    fn config_switches_are_honoured() {
        let config = BuildConfig::builder()
            .listings(false)
            .standalone(false)
            .pdf_engine("lualatex")
            .extra_arg("--toc")
            .build()
            .unwrap();
        let c = PandocConverter::from_config(&config);
        let args = args_of(&c, &request(OutputFormat::Pdf, None));
        assert!(!args.contains(&"-s".to_string()));
        assert!(!args.contains(&"--listings".to_string()));
        assert!(args.contains(&"--pdf-engine=lualatex".to_string()));
        assert!(args.contains(&"--toc".to_string()));
    }

    #[test]
    fn output_path_uses_stem_and_format() {
        assert_eq!(
            output_path(Path::new("demo/"), Path::new("docs/README.md"), OutputFormat::Pdf),
            PathBuf::from("demo/README.pdf")
        );
        assert_eq!(
            output_path(Path::new("page"), Path::new("string_demo"), OutputFormat::Latex),
            PathBuf::from("page/string_demo.tex")
        );
    }

    #[tokio::test]
    async fn missing_program_is_converter_not_found() {
        let config = BuildConfig::builder()
            .pandoc_path("/definitely/not/a/pandoc")
            .build()
            .unwrap();
        let c = PandocConverter::from_config(&config);
        let err = c
            .convert(&request(OutputFormat::Html, None))
            .await
            .unwrap_err();
        assert!(matches!(err, MdPressError::ConverterNotFound { .. }), "got: {err}");
    }
}

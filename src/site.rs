//! Manifest-driven site builds.
//!
//! A manifest lists the jobs that produce a site or document set, in the
//! order they run:
//!
//! ```yaml
//! output_dir: demo/
//! templates_dir: templates/
//! jobs:
//!   - compile: { input: README.md, format: pdf, template: templates/example.tex }
//!   - compile: { input: README.md, template: templates/example.html }
//!   - compile_string: { markdown: "# Hello", outfile: string_demo, format: pdf }
//!   - copy_dir: { dir: css/ }
//!   - merge: { files: [demo/a.pdf, demo/b.pdf], outfile: comb.pdf }
//! ```
//!
//! Jobs run sequentially so cache reads and writes for one key never race.
//! A failing job is recorded in the [`BuildReport`] and the build moves on.

use crate::compile;
use crate::config::{BuildConfig, OutputFormat, TemplateChoice};
use crate::error::{JobError, MdPressError};
use crate::filelist::{self, ListOrder};
use crate::files;
use crate::output::{BuildReport, JobOutcome, JobResult};
use crate::pipeline::merge;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// A parsed site manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Overrides [`BuildConfig::output_dir`].
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Overrides [`BuildConfig::templates_dir`].
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Written as one-key maps (`- compile: {…}`), not YAML tags.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub jobs: Vec<Job>,
}

/// One step of a site build. `path` overrides the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    Compile {
        input: PathBuf,
        #[serde(default)]
        format: OutputFormat,
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        outfile: Option<PathBuf>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    CompileString {
        markdown: String,
        outfile: PathBuf,
        #[serde(default)]
        format: OutputFormat,
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    CopyDir {
        dir: PathBuf,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    CopyFile {
        file: PathBuf,
        #[serde(default)]
        name: Option<PathBuf>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Merge {
        files: Vec<PathBuf>,
        #[serde(default = "default_merge_name")]
        outfile: PathBuf,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Include {
        infile: PathBuf,
        variable: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_file: Option<PathBuf>,
        #[serde(default)]
        outfile: Option<PathBuf>,
    },
    FileList {
        dir: PathBuf,
        ext: String,
        #[serde(default)]
        sort: ListOrder,
        outfile: PathBuf,
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

fn default_merge_name() -> PathBuf {
    PathBuf::from("comb.pdf")
}

impl Job {
    /// Short description used in logs and progress output.
    pub fn label(&self) -> String {
        match self {
            Job::Compile { input, format, .. } => {
                format!("compile {} → {}", input.display(), format)
            }
            Job::CompileString { outfile, format, .. } => {
                format!("compile_string {} → {}", outfile.display(), format)
            }
            Job::CopyDir { dir, .. } => format!("copy_dir {}", dir.display()),
            Job::CopyFile { file, .. } => format!("copy_file {}", file.display()),
            Job::Merge { files, outfile, .. } => {
                format!("merge {} files → {}", files.len(), outfile.display())
            }
            Job::Include {
                infile, variable, ..
            } => format!("include {} into {}", variable, infile.display()),
            Job::FileList { dir, ext, .. } => format!("file_list {}*{}", dir.display(), ext),
        }
    }
}

impl Manifest {
    /// Parse a manifest from YAML text.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, MdPressError> {
        serde_yaml::from_str(text).map_err(|e| MdPressError::Manifest {
            path: origin.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Read and parse a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MdPressError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| MdPressError::Manifest {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_yaml(&text, path)
    }

    /// `config` with this manifest's directory overrides applied.
    pub fn apply_to(&self, config: &BuildConfig) -> BuildConfig {
        let mut config = config.clone();
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.templates_dir {
            config.templates_dir = dir.clone();
        }
        config
    }
}

/// Run every job of `manifest` in order.
///
/// Job failures do not stop the build; check [`BuildReport::failed`].
pub async fn build_site(manifest: &Manifest, config: &BuildConfig) -> BuildReport {
    let start = Instant::now();
    let config = manifest.apply_to(config);
    let total = manifest.jobs.len();
    info!("Building {} jobs into {}", total, config.output_dir.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_build_start(total);
    }

    let mut report = BuildReport::default();
    for (i, job) in manifest.jobs.iter().enumerate() {
        let index = i + 1;
        let label = job.label();
        if let Some(ref cb) = config.progress_callback {
            cb.on_job_start(index, total, &label);
        }

        match run_job(job, &config).await {
            Ok(outcome) => {
                let skipped = outcome.skipped();
                if skipped {
                    report.skipped += 1;
                } else {
                    report.completed += 1;
                }
                if let Some(ref cb) = config.progress_callback {
                    cb.on_job_complete(index, total, &label, skipped);
                }
                report.jobs.push(JobResult {
                    index,
                    label,
                    outcome: Some(outcome),
                    error: None,
                });
            }
            Err(e) => {
                error!("Job {} ({}) failed: {}", index, label, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_job_error(index, total, &label, &e.to_string());
                }
                report.failed += 1;
                report.jobs.push(JobResult {
                    index,
                    label: label.clone(),
                    outcome: None,
                    error: Some(JobError::Failed {
                        index,
                        label,
                        detail: e.to_string(),
                    }),
                });
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Build complete: {} converted, {} skipped, {} failed in {}ms",
        report.completed, report.skipped, report.failed, report.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_build_complete(total, report.failed);
    }
    report
}

async fn run_job(job: &Job, config: &BuildConfig) -> Result<JobOutcome, MdPressError> {
    match job {
        Job::Compile {
            input,
            format,
            template,
            outfile,
            path,
        } => {
            let config = with_output_dir(config, path);
            let template = template_choice(template);
            let out = match outfile {
                Some(name) => compile::compile_as(input, name, *format, &template, &config).await?,
                None => compile::compile(input, *format, &template, &config).await?,
            };
            Ok(JobOutcome::Compiled(out))
        }
        Job::CompileString {
            markdown,
            outfile,
            format,
            template,
            path,
        } => {
            let config = with_output_dir(config, path);
            let template = template_choice(template);
            let out =
                compile::compile_string(markdown, outfile, *format, &template, &config).await?;
            Ok(JobOutcome::Compiled(out))
        }
        Job::CopyDir { dir, path } => {
            let dest = path.as_deref().unwrap_or(&config.output_dir);
            let to = files::copy_dir(dir, dest)?;
            Ok(JobOutcome::Copied { to })
        }
        Job::CopyFile { file, name, path } => {
            let dest = path.as_deref().unwrap_or(&config.output_dir);
            let to = files::copy_file(file, dest, name.as_deref())?;
            Ok(JobOutcome::Copied { to })
        }
        Job::Merge {
            files,
            outfile,
            path,
        } => {
            let dest = path.as_deref().unwrap_or(&config.output_dir);
            let stats = merge::merge_pdfs(files, dest.join(outfile)).await?;
            Ok(JobOutcome::Merged(stats))
        }
        Job::Include {
            infile,
            variable,
            text,
            text_file,
            outfile,
        } => {
            let text = match (text, text_file) {
                (Some(t), None) => t.clone(),
                (None, Some(file)) => std::fs::read_to_string(file)
                    .map_err(|e| MdPressError::from_source_io(file, e))?,
                _ => {
                    return Err(MdPressError::InvalidConfig(
                        "include needs exactly one of `text` or `text_file`".into(),
                    ))
                }
            };
            let path = files::include_in_file(infile, variable, &text, outfile.as_deref())?;
            Ok(JobOutcome::Written { path })
        }
        Job::FileList {
            dir,
            ext,
            sort,
            outfile,
            path,
        } => {
            let listed = filelist::list_files(dir, ext, *sort)?;
            let html = filelist::file_list_html(&listed)?;
            let dest = path.as_deref().unwrap_or(&config.output_dir);
            let target = dest.join(outfile);
            files::write_file(&target, &html)?;
            Ok(JobOutcome::Written { path: target })
        }
    }
}

fn with_output_dir(config: &BuildConfig, path: &Option<PathBuf>) -> BuildConfig {
    match path {
        Some(dir) => {
            let mut c = config.clone();
            c.output_dir = dir.clone();
            c
        }
        None => config.clone(),
    }
}

fn template_choice(template: &Option<String>) -> TemplateChoice {
    template
        .as_deref()
        .map(TemplateChoice::parse)
        .unwrap_or_default()
}

//! Integration tests for compile and site builds.
//!
//! pandoc is replaced by [`FakeConverter`], which copies the source into the
//! output file and counts its calls, so these tests need no external tools.

use async_trait::async_trait;
use mdpress::{
    build_site, cache_status, compile, compile_as, compile_string, compile_sync, BuildConfig,
    BuildProgressCallback, CacheConfig, CacheDecision, ConversionRequest, DocumentConverter,
    Job, Manifest, MdPressError, OutputFormat, RecordOutcome, TemplateChoice,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeConverter {
    calls: AtomicUsize,
    requests: Mutex<Vec<ConversionRequest>>,
    /// Inputs whose file name contains this fail to convert.
    fail_on: Option<String>,
}

impl FakeConverter {
    fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> ConversionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<(), MdPressError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let name = request.input.to_string_lossy();
        if let Some(bad) = &self.fail_on {
            if name.contains(bad.as_str()) {
                return Err(MdPressError::ConverterFailed {
                    input: request.input.clone(),
                    code: Some(64),
                    stderr: "pandoc: syntax error".into(),
                });
            }
        }

        let body = tokio::fs::read_to_string(&request.input)
            .await
            .map_err(|e| MdPressError::Internal(e.to_string()))?;
        tokio::fs::write(&request.output, format!("<converted>{body}</converted>"))
            .await
            .map_err(|e| MdPressError::Internal(e.to_string()))
    }
}

struct Site {
    dir: TempDir,
    converter: Arc<FakeConverter>,
}

impl Site {
    fn new() -> Self {
        Self::with_converter(FakeConverter::default())
    }

    fn with_converter(converter: FakeConverter) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            converter: Arc::new(converter),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, text: &str) -> PathBuf {
        let p = self.path(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&p, text).unwrap();
        p
    }

    fn builder(&self) -> mdpress::BuildConfigBuilder {
        BuildConfig::builder()
            .output_dir(self.path("page"))
            .templates_dir(self.path("templates"))
            .cache_db(self.path("mdpress.db"))
            .converter(self.converter.clone() as Arc<dyn DocumentConverter>)
    }

    fn config(&self) -> BuildConfig {
        self.builder().build().unwrap()
    }
}

// ── compile ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_compile_is_skipped_until_source_changes() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    let config = site.config();

    let first = compile(&src, OutputFormat::Html, &TemplateChoice::Auto, &config)
        .await
        .unwrap();
    assert_eq!(first.output, site.path("page/a.html"));
    assert_eq!(first.decision, Some(CacheDecision::NotCached));
    assert_eq!(first.record, Some(RecordOutcome::Inserted));
    assert!(!first.skipped);
    assert!(first.output.exists());

    let second = compile(&src, OutputFormat::Html, &TemplateChoice::Auto, &config)
        .await
        .unwrap();
    assert!(second.skipped);
    assert_eq!(second.decision, Some(CacheDecision::UpToDate));
    assert_eq!(site.converter.calls(), 1);

    fs::write(&src, "# A\n\nmore\n").unwrap();
    let third = compile(&src, OutputFormat::Html, &TemplateChoice::Auto, &config)
        .await
        .unwrap();
    assert_eq!(third.decision, Some(CacheDecision::Stale));
    assert_eq!(third.record, Some(RecordOutcome::Updated));
    assert_eq!(site.converter.calls(), 2);
    assert!(fs::read_to_string(&third.output).unwrap().contains("more"));
}

#[tokio::test]
async fn auto_template_prefers_document_name_then_default() {
    let site = Site::new();
    let about = site.write("about.md", "# About\n");
    let index = site.write("index.md", "# Home\n");
    let own = site.write("templates/about.html", "<about>$body$</about>");
    let fallback = site.write("templates/default.html", "$body$");
    let config = site.config();

    let out = compile(&about, OutputFormat::Html, &TemplateChoice::Auto, &config)
        .await
        .unwrap();
    assert_eq!(out.template, Some(own.clone()));
    assert_eq!(site.converter.last_request().template, Some(own));

    let out = compile(&index, OutputFormat::Html, &TemplateChoice::Auto, &config)
        .await
        .unwrap();
    assert_eq!(out.template, Some(fallback));

    // LaTeX looks for .tex templates, none exist.
    let out = compile(&index, OutputFormat::Latex, &TemplateChoice::Auto, &config)
        .await
        .unwrap();
    assert_eq!(out.template, None);
    assert_eq!(out.output, site.path("page/index.tex"));
}

#[tokio::test]
async fn template_edit_triggers_rebuild() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    let tpl = site.write("t1.html", "$body$");
    let config = site.config();
    let choice = TemplateChoice::Path(tpl.clone());

    compile(&src, OutputFormat::Html, &choice, &config).await.unwrap();
    fs::write(&tpl, "<main>$body$</main>").unwrap();

    let out = compile(&src, OutputFormat::Html, &choice, &config).await.unwrap();
    assert_eq!(out.decision, Some(CacheDecision::Stale));
    assert!(!out.skipped);
    assert_eq!(site.converter.calls(), 2);
}

#[tokio::test]
async fn unreadable_template_converts_without_one() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    let config = site.config();
    let choice = TemplateChoice::Path(site.path("missing.html"));

    let out = compile(&src, OutputFormat::Html, &choice, &config).await.unwrap();
    assert_eq!(out.template, None);
    assert_eq!(site.converter.last_request().template, None);
}

#[tokio::test]
async fn force_reconverts_up_to_date_output() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    compile(&src, OutputFormat::Pdf, &TemplateChoice::None, &site.config())
        .await
        .unwrap();

    let forced = site.builder().force(true).build().unwrap();
    let out = compile(&src, OutputFormat::Pdf, &TemplateChoice::None, &forced)
        .await
        .unwrap();
    assert!(!out.skipped);
    assert_eq!(out.decision, Some(CacheDecision::UpToDate));
    assert_eq!(out.record, Some(RecordOutcome::Unchanged));
    assert_eq!(site.converter.calls(), 2);
}

#[tokio::test]
async fn deleted_output_is_rebuilt() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    let config = site.config();

    let first = compile(&src, OutputFormat::Html, &TemplateChoice::None, &config)
        .await
        .unwrap();
    fs::remove_file(&first.output).unwrap();

    let again = compile(&src, OutputFormat::Html, &TemplateChoice::None, &config)
        .await
        .unwrap();
    assert!(!again.skipped);
    assert!(again.output.exists());
    assert_eq!(site.converter.calls(), 2);
}

fn backdate(path: &Path, secs: u64) {
    let past = std::time::SystemTime::now() - std::time::Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(past)
        .unwrap();
}

#[tokio::test]
async fn formats_sharing_a_cache_key_rebuild_independently() {
    let site = Site::new();
    let src = site.write("a.md", "v1");
    let config = site.config();

    // PDF and LaTeX with no template share the `a.md_none` entry.
    let pdf = compile(&src, OutputFormat::Pdf, &TemplateChoice::None, &config)
        .await
        .unwrap();
    let tex = compile(&src, OutputFormat::Latex, &TemplateChoice::None, &config)
        .await
        .unwrap();
    backdate(&pdf.output, 3600);
    backdate(&tex.output, 3600);
    fs::write(&src, "v2").unwrap();

    let pdf = compile(&src, OutputFormat::Pdf, &TemplateChoice::None, &config)
        .await
        .unwrap();
    assert_eq!(pdf.decision, Some(CacheDecision::Stale));

    let tex = compile(&src, OutputFormat::Latex, &TemplateChoice::None, &config)
        .await
        .unwrap();
    assert_eq!(tex.decision, Some(CacheDecision::UpToDate));
    assert!(!tex.skipped);
    assert!(fs::read_to_string(&tex.output).unwrap().contains("v2"));
    assert_eq!(site.converter.calls(), 4);

    let again = compile(&src, OutputFormat::Latex, &TemplateChoice::None, &config)
        .await
        .unwrap();
    assert!(again.skipped);
    assert_eq!(site.converter.calls(), 4);
}

#[tokio::test]
async fn output_older_than_template_is_rebuilt() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    let tpl = site.write("t1.html", "$body$");
    let config = site.config();
    let choice = TemplateChoice::Path(tpl.clone());

    compile(&src, OutputFormat::Html, &choice, &config).await.unwrap();
    // Another name for the same pair, written before the template.
    let old = compile_as(&src, "b.md", OutputFormat::Html, &choice, &config)
        .await
        .unwrap();
    backdate(&src, 7200);
    backdate(&old.output, 3600);

    let again = compile_as(&src, "b.md", OutputFormat::Html, &choice, &config)
        .await
        .unwrap();
    assert!(!again.skipped, "template is newer than b.html");
    assert_eq!(site.converter.calls(), 3);
}

#[tokio::test]
async fn disabled_cache_always_converts() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    let config = site.builder().cache(CacheConfig::disabled()).build().unwrap();

    for _ in 0..2 {
        let out = compile(&src, OutputFormat::Html, &TemplateChoice::None, &config)
            .await
            .unwrap();
        assert_eq!(out.decision, Some(CacheDecision::CachingDisabled));
        assert_eq!(out.record, Some(RecordOutcome::Disabled));
    }
    assert_eq!(site.converter.calls(), 2);
    assert!(!site.path("mdpress.db").exists());
}

#[tokio::test]
async fn failed_conversion_is_not_recorded() {
    let site = Site::with_converter(FakeConverter::failing_on("broken"));
    let src = site.write("broken.md", "# oops\n");
    let config = site.config();

    let err = compile(&src, OutputFormat::Html, &TemplateChoice::None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, MdPressError::ConverterFailed { code: Some(64), .. }));

    let (_, decision) = cache_status(&src, OutputFormat::Html, &TemplateChoice::None, &config)
        .await
        .unwrap();
    assert_eq!(decision, CacheDecision::NotCached);
}

#[tokio::test]
async fn missing_source_fails_before_converting() {
    let site = Site::new();
    let err = compile(
        site.path("nope.md"),
        OutputFormat::Html,
        &TemplateChoice::None,
        &site.config(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MdPressError::SourceNotFound { .. }), "got {err:?}");
    assert_eq!(site.converter.calls(), 0);
}

#[tokio::test]
async fn compile_as_renames_output() {
    let site = Site::new();
    let src = site.write("README.md", "# Readme\n");
    let out = compile_as(
        &src,
        "manual.md",
        OutputFormat::Docx,
        &TemplateChoice::None,
        &site.config(),
    )
    .await
    .unwrap();
    assert_eq!(out.output, site.path("page/manual.docx"));
    assert!(out.output.exists());
}

#[tokio::test]
async fn compile_string_uses_temp_source_and_skips_cache() {
    let site = Site::new();
    let tpl = site.write("templates/string_demo.html", "$body$");
    let config = site.config();

    let out = compile_string(
        "# From a string\n",
        "string_demo",
        OutputFormat::Html,
        &TemplateChoice::Auto,
        &config,
    )
    .await
    .unwrap();

    assert_eq!(out.output, site.path("page/string_demo.html"));
    assert_eq!(out.decision, None);
    assert_eq!(out.template, Some(tpl));
    assert!(fs::read_to_string(&out.output)
        .unwrap()
        .contains("# From a string"));

    let request = site.converter.last_request();
    assert!(!request.input.exists(), "temp source should be removed");
    assert!(!site.path("mdpress.db").exists());
}

#[test]
fn compile_sync_outside_runtime() {
    let site = Site::new();
    let src = site.write("a.md", "# A\n");
    let out = compile_sync(&src, OutputFormat::Html, &TemplateChoice::None, &site.config())
        .unwrap();
    assert!(out.output.exists());
}

// ── build_site ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, e: String) {
        self.events.lock().unwrap().push(e);
    }
}

impl BuildProgressCallback for Recorder {
    fn on_build_start(&self, total_jobs: usize) {
        self.push(format!("start {total_jobs}"));
    }
    fn on_job_complete(&self, index: usize, _total: usize, _label: &str, skipped: bool) {
        self.push(format!("ok {index} {skipped}"));
    }
    fn on_job_error(&self, index: usize, _total: usize, _label: &str, _error: &str) {
        self.push(format!("err {index}"));
    }
    fn on_build_complete(&self, total_jobs: usize, failed_jobs: usize) {
        self.push(format!("done {total_jobs} {failed_jobs}"));
    }
}

#[tokio::test]
async fn build_continues_past_failed_job() {
    let site = Site::with_converter(FakeConverter::failing_on("broken"));
    let good = site.write("good.md", "# Good\n");
    let broken = site.write("broken.md", "# Bad\n");
    let css = site.write("css/site.css", "body{}");
    let recorder = Arc::new(Recorder::default());
    let config = site
        .builder()
        .progress_callback(recorder.clone() as Arc<dyn BuildProgressCallback>)
        .build()
        .unwrap();

    let manifest = Manifest {
        jobs: vec![
            Job::Compile {
                input: good.clone(),
                format: OutputFormat::Html,
                template: Some("none".into()),
                outfile: None,
                path: None,
            },
            Job::Compile {
                input: broken,
                format: OutputFormat::Html,
                template: None,
                outfile: None,
                path: None,
            },
            Job::CopyDir {
                dir: css.parent().unwrap().to_path_buf(),
                path: None,
            },
        ],
        ..Manifest::default()
    };

    let report = build_site(&manifest, &config).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 2);
    assert!(!report.is_success());
    assert_eq!(report.errors().count(), 1);
    assert!(report.jobs[1].error.is_some());
    assert!(site.path("page/css/site.css").exists());

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start 3", "ok 1 false", "err 2", "ok 3 false", "done 3 1"]
    );

    // Second run: the good page is up to date.
    let again = build_site(&manifest, &config).await;
    assert_eq!(again.skipped, 1);
    assert_eq!(again.failed, 1);
}

#[tokio::test]
async fn manifest_jobs_honour_path_override() {
    let site = Site::new();
    let post = site.write("posts/2015-03-20-London.md", "---\ntitle: London\ndate: 2015-03-20\n---\n");
    let yaml = format!(
        "output_dir: {out}\njobs:\n  - compile: {{ input: {post}, path: {alt} }}\n  - file_list: {{ dir: {posts}, ext: .md, outfile: list.html }}\n",
        out = site.path("site").display(),
        post = post.display(),
        alt = site.path("alt").display(),
        posts = site.path("posts").display(),
    );
    let manifest = Manifest::from_yaml(&yaml, Path::new("site.yaml")).unwrap();

    let report = build_site(&manifest, &site.config()).await;
    assert!(report.is_success(), "{:?}", report.errors().collect::<Vec<_>>());
    assert!(site.path("alt/2015-03-20-London.html").exists());

    let list = fs::read_to_string(site.path("site/list.html")).unwrap();
    assert!(list.contains(">London</a> - March 20, 2015</li>"), "got: {list}");
}

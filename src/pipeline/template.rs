//! Template resolution.
//!
//! `Auto` looks for a template named after the document first, so
//! `about.md` picks up `templates/about.html` while every other page falls
//! back to `templates/default.html`. When neither exists pandoc's built-in
//! template is used. An explicit template that cannot be read degrades to
//! "no template" with a warning, the same way the cache fingerprints it.

use crate::config::{OutputFormat, TemplateChoice};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the fallback template in the templates directory.
const DEFAULT_TEMPLATE_STEM: &str = "default";

/// Resolve the template file to use for `source` in `format`.
pub fn resolve_template(
    choice: &TemplateChoice,
    source: &Path,
    format: OutputFormat,
    templates_dir: &Path,
) -> Option<PathBuf> {
    match choice {
        TemplateChoice::None => None,
        TemplateChoice::Path(path) => {
            if is_readable_file(path) {
                Some(path.clone())
            } else {
                warn!(
                    template = %path.display(),
                    "Template not readable, converting without a template"
                );
                None
            }
        }
        TemplateChoice::Auto => auto_template(source, format, templates_dir),
    }
}

fn auto_template(source: &Path, format: OutputFormat, templates_dir: &Path) -> Option<PathBuf> {
    let ext = format.template_extension();

    if let Some(stem) = source.file_stem() {
        let own = templates_dir.join(format!("{}.{}", stem.to_string_lossy(), ext));
        if is_readable_file(&own) {
            info!("    using {}", own.display());
            return Some(own);
        }
    }

    let fallback = templates_dir.join(format!("{DEFAULT_TEMPLATE_STEM}.{ext}"));
    if is_readable_file(&fallback) {
        info!("    using {}", fallback.display());
        Some(fallback)
    } else {
        info!("    using pandoc's built-in {} template", format);
        None
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && std::fs::File::open(path).is_ok()
}

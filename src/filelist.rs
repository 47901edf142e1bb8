//! File listings for index pages.
//!
//! Lists the documents in a directory, sorted by name or by modification
//! time, and renders them as an HTML `<ul>` snippet using each document's
//! `title` and `date` front-matter. The snippet is typically spliced into a
//! template with [`crate::files::include_in_file`].

use crate::error::MdPressError;
use crate::frontmatter;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Order of a file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    /// By file name, ascending. (default)
    #[default]
    Name,
    /// By modification time, newest first.
    Modified,
}

/// Files directly inside `dir` whose name ends with `ext`, sorted by name.
pub fn list_by_name(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, MdPressError> {
    info!("Generating file list sorted by file name");
    let mut files = matching_files(dir, ext)?;
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Files: {:?}", files);
    Ok(files)
}

/// Files directly inside `dir` whose name ends with `ext`, newest first.
pub fn list_by_modified(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, MdPressError> {
    info!("Generating file list sorted by date modified");
    let mut files: Vec<(SystemTime, PathBuf)> = matching_files(dir, ext)?
        .into_iter()
        .map(|p| {
            let mtime = fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (mtime, p)
        })
        .collect();
    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    let files: Vec<PathBuf> = files.into_iter().map(|(_, p)| p).collect();
    debug!("Files: {:?}", files);
    Ok(files)
}

/// List with the given order.
pub fn list_files(dir: &Path, ext: &str, order: ListOrder) -> Result<Vec<PathBuf>, MdPressError> {
    match order {
        ListOrder::Name => list_by_name(dir, ext),
        ListOrder::Modified => list_by_modified(dir, ext),
    }
}

/// Render `files` as an HTML list linking to their `.html` outputs.
///
/// ```text
/// <ul>
///     <li><a href="/posts/2015-03-20-London.html">Eurotrip 15 London</a> - March 20, 2015</li>
/// </ul>
/// ```
///
/// The date is left out when a document has none or it is not `YYYY-MM-DD`.
pub fn file_list_html(files: &[PathBuf]) -> Result<String, MdPressError> {
    let mut html = String::from("<ul>\n");
    for file in files {
        debug!("file_list_html: {}", file.display());
        let title = frontmatter::front_matter_value(file, "title")?.unwrap_or_default();
        let href = format!("/{}.html", file.with_extension("").to_string_lossy());

        match frontmatter::front_matter_value(file, "date")?
            .as_deref()
            .and_then(format_date)
        {
            Some(date) => html.push_str(&format!(
                "\t<li><a href=\"{}\">{}</a> - {}</li>\n",
                href, title, date
            )),
            None => html.push_str(&format!("\t<li><a href=\"{}\">{}</a></li>\n", href, title)),
        }
    }
    html.push_str("</ul>\n");
    debug!("File list as HTML:\n{}", html);
    Ok(html)
}

/// `2015-03-20` → `March 20, 2015`.
fn format_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%B %d, %Y").to_string())
}

fn matching_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, MdPressError> {
    let suffix = if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    };

    let entries = fs::read_dir(dir).map_err(|e| MdPressError::from_source_io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MdPressError::from_source_io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(&suffix) {
            files.push(path);
        }
    }
    Ok(files)
}

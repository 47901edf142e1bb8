//! Error types for the mdpress library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`MdPressError`]: **Fatal** for the operation at hand: the source
//!   document cannot be read, pandoc is missing or exited non-zero, a PDF
//!   could not be merged. Returned as `Err(MdPressError)` from the public
//!   functions.
//!
//! * [`JobError`]: **Non-fatal** for a site build: one job of a manifest
//!   failed but the others still run. Stored inside
//!   [`crate::output::JobResult`] so callers can report partial success.
//!
//! * [`CacheError`]: a storage-layer failure inside the conversion cache.
//!   The cache is advisory, so these are logged and swallowed; they never
//!   reach the caller of `should_skip`/`record`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mdpress library.
#[derive(Debug, Error)]
pub enum MdPressError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the source.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The source exists but reading it failed.
    #[error("Failed to read source '{path}': {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The converter executable could not be spawned.
    #[error("Converter '{program}' not found.\nInstall pandoc (https://pandoc.org) or pass --pandoc <PATH>.")]
    ConverterNotFound { program: String },

    /// The converter ran but exited with a failure status.
    #[error("Converter exited with code {code:?} while converting '{input}':\n{stderr}")]
    ConverterFailed {
        input: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The converter did not finish within the configured deadline.
    #[error("Converter timed out after {secs}s on '{input}'\nIncrease --timeout.")]
    ConverterTimeout { input: PathBuf, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Merging PDFs needs the pdfium shared library.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium, or\n\
  • install libpdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    /// An input PDF could not be opened.
    #[error("Failed to load PDF '{path}': {detail}")]
    PdfLoadFailed { path: PathBuf, detail: String },

    /// Appending pages or saving the merged document failed.
    #[error("PDF merge failed: {detail}")]
    PdfMergeFailed { detail: String },

    /// `merge_pdfs` was called with no inputs.
    #[error("Nothing to merge: the input file list is empty")]
    EmptyMerge,

    // ── File system errors ────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying a file or directory tree failed.
    #[error("Failed to copy '{from}' to '{to}': {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source and target of a copy overlap; nothing was touched.
    #[error("Refusing to copy '{from}' to '{to}': the target contains the source or lies inside it")]
    CopyOverlap { from: PathBuf, to: PathBuf },

    // ── Content errors ────────────────────────────────────────────────────
    /// The YAML front-matter block could not be parsed.
    #[error("Invalid YAML front-matter in '{path}': {detail}")]
    FrontMatter { path: PathBuf, detail: String },

    /// A site manifest could not be read or parsed.
    #[error("Invalid manifest '{path}': {detail}")]
    Manifest { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MdPressError {
    /// Classify an I/O failure on a source document.
    pub(crate) fn from_source_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => MdPressError::SourceNotFound { path },
            std::io::ErrorKind::PermissionDenied => MdPressError::PermissionDenied { path },
            _ => MdPressError::SourceUnreadable { path, source: err },
        }
    }
}

/// A non-fatal error for a single job of a site build.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum JobError {
    /// The job ran and failed.
    #[error("Job {index} ({label}) failed: {detail}")]
    Failed {
        index: usize,
        label: String,
        detail: String,
    },
}

/// Storage-layer failures inside the conversion cache.
///
/// Only ever logged; see [`crate::cache::ConversionCache`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// Insert hit an existing primary key (another writer got there first).
    #[error("cache entry '{key}' already exists")]
    DuplicateKey { key: String },

    /// Any other SQLite failure.
    #[error("cache storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The directory holding the database could not be created.
    #[error("cannot create cache directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_source_not_found() {
        let e = MdPressError::from_source_io(
            "a.md",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(e, MdPressError::SourceNotFound { .. }));
        assert!(e.to_string().contains("a.md"));
    }

    #[test]
    fn permission_denied_maps() {
        let e = MdPressError::from_source_io(
            "secret.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(e, MdPressError::PermissionDenied { .. }));
    }

    #[test]
    fn other_io_errors_keep_source() {
        let e = MdPressError::from_source_io(
            "dir.md",
            std::io::Error::new(std::io::ErrorKind::Other, "is a directory"),
        );
        assert!(e.to_string().contains("is a directory"), "got: {e}");
    }

    #[test]
    fn converter_failed_display() {
        let e = MdPressError::ConverterFailed {
            input: "README.md".into(),
            code: Some(43),
            stderr: "Error producing PDF.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("43"), "got: {msg}");
        assert!(msg.contains("Error producing PDF."));
    }

    #[test]
    fn job_error_display() {
        let e = JobError::Failed {
            index: 2,
            label: "copy_dir css/".into(),
            detail: "missing".into(),
        };
        assert!(e.to_string().contains("copy_dir css/"));
    }

    #[test]
    fn duplicate_key_display() {
        let e = CacheError::DuplicateKey {
            key: "a.md_none".into(),
        };
        assert!(e.to_string().contains("a.md_none"));
    }
}

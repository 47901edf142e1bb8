//! PDF merging via pdfium.
//!
//! pdfium is not safe to drive from async contexts, so the work runs on a
//! `spawn_blocking` thread. The library is bound at call time from
//! `PDFIUM_LIB_PATH` when set, otherwise from the system search path.

use crate::error::MdPressError;
use crate::output::MergeStats;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Append every page of `files`, in order, into a new PDF at `output`.
///
/// The output directory is created if needed.
pub async fn merge_pdfs(
    files: &[PathBuf],
    output: impl AsRef<Path>,
) -> Result<MergeStats, MdPressError> {
    if files.is_empty() {
        return Err(MdPressError::EmptyMerge);
    }
    let files = files.to_vec();
    let output = output.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || merge_pdfs_blocking(&files, &output))
        .await
        .map_err(|e| MdPressError::Internal(format!("Merge task panicked: {}", e)))?
}

fn merge_pdfs_blocking(files: &[PathBuf], output: &Path) -> Result<MergeStats, MdPressError> {
    crate::files::ensure_parent(output)?;

    let pdfium = bind_pdfium()?;
    let mut merged = pdfium
        .create_new_pdf()
        .map_err(|e| MdPressError::PdfMergeFailed {
            detail: format!("{:?}", e),
        })?;

    for file in files {
        let document =
            pdfium
                .load_pdf_from_file(file, None)
                .map_err(|e| MdPressError::PdfLoadFailed {
                    path: file.clone(),
                    detail: format!("{:?}", e),
                })?;
        debug!(
            "Appending {} ({} pages)",
            file.display(),
            document.pages().len()
        );
        merged
            .pages_mut()
            .append(&document)
            .map_err(|e| MdPressError::PdfMergeFailed {
                detail: format!("appending '{}': {:?}", file.display(), e),
            })?;
    }

    let pages = merged.pages().len() as usize;
    info!("Writing: {} ({} pages)", output.display(), pages);
    merged
        .save_to_file(output)
        .map_err(|e| MdPressError::PdfMergeFailed {
            detail: format!("saving '{}': {:?}", output.display(), e),
        })?;

    Ok(MergeStats {
        output: output.to_path_buf(),
        files: files.len(),
        pages,
    })
}

/// Bind pdfium from `PDFIUM_LIB_PATH`, falling back to the system library.
fn bind_pdfium() -> Result<Pdfium, MdPressError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| {
                    MdPressError::PdfiumBindingFailed(format!("{}: {}", path.display(), e))
                });
        }
        debug!(
            "PDFIUM_LIB_PATH '{}' does not exist, trying the system library",
            path.display()
        );
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| MdPressError::PdfiumBindingFailed(e.to_string()))
}

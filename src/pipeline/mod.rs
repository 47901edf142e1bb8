//! Pipeline stages for compiling a document.
//!
//! ## Data Flow
//!
//! ```text
//! template ──▶ pandoc ──▶ (merge)
//! (resolve)    (convert)   (pdfium)
//! ```
//!
//! 1. [`template`]: turn a [`crate::config::TemplateChoice`] into the
//!    template file actually used, if any
//! 2. [`pandoc`]:   build the argument list and run the external converter
//!    behind the [`pandoc::DocumentConverter`] seam
//! 3. [`merge`]:    append the pages of several PDFs into one document;
//!    runs in `spawn_blocking` because pdfium is not async-safe

pub mod merge;
pub mod pandoc;
pub mod template;

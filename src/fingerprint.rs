//! Content fingerprints used by the conversion cache.
//!
//! A fingerprint is the lowercase hex MD5 of a file's bytes. MD5 is plenty
//! here: the cache only has to notice that a file changed, not resist
//! someone crafting collisions against their own build.

use std::io;
use std::path::Path;
use tracing::warn;

/// Template column value stored when no template is used.
pub const NO_TEMPLATE: &str = "none";

/// Bytes hashed in place of a template file when there is none.
const NO_TEMPLATE_CONTENT: &[u8] = b"0";

/// MD5 of raw bytes as lowercase hex.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Fingerprint of a source document. Unreadable sources are an error.
pub fn file_fingerprint(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(digest(&bytes))
}

/// Fingerprint of the sentinel "no template" state.
pub fn no_template_fingerprint() -> String {
    digest(NO_TEMPLATE_CONTENT)
}

/// Fingerprint of an optional template.
///
/// `None`, or a template that cannot be read, hashes to the sentinel.
pub fn template_fingerprint(template: Option<&Path>) -> String {
    match template {
        None => no_template_fingerprint(),
        Some(path) => match file_fingerprint(path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(
                    template = %path.display(),
                    error = %e,
                    "Template unreadable, fingerprinting as no template"
                );
                no_template_fingerprint()
            }
        },
    }
}

/// The template column value for an optional template path.
pub fn template_label(template: Option<&Path>) -> String {
    template
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| NO_TEMPLATE.to_string())
}

//! YAML front-matter extraction.
//!
//! A document's front-matter is the block at its top that opens with a
//! `---` line and closes with `---` or `...`, the same block pandoc reads
//! as metadata:
//!
//! ```text
//! ---
//! title: How to mdpress
//! author:
//!     name: Jane Doe
//! ...
//! ```

use crate::error::MdPressError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use std::path::Path;
use tracing::warn;

static RE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^---\s*$").unwrap());
static RE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(---|\.\.\.)\s*$").unwrap());

/// The raw YAML between the delimiters, without them.
///
/// Leading blank lines are skipped; any other content before the opening
/// `---` means there is no front-matter. An unterminated block is ignored.
pub fn extract_front_matter(text: &str) -> Option<String> {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());

    let first = lines.next()?;
    if !RE_OPEN.is_match(first) {
        return None;
    }

    let mut yaml = String::new();
    for line in lines {
        if RE_CLOSE.is_match(line) {
            return Some(yaml);
        }
        yaml.push_str(line);
        yaml.push('\n');
    }
    None
}

/// Parse the front-matter of `text`. `Ok(None)` when there is none.
pub fn parse_front_matter(text: &str) -> Result<Option<Value>, serde_yaml::Error> {
    match extract_front_matter(text) {
        None => Ok(None),
        Some(yaml) if yaml.trim().is_empty() => Ok(None),
        Some(yaml) => serde_yaml::from_str(&yaml).map(Some),
    }
}

/// Follow a dotted key (`author.name`) into a YAML value.
pub fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(value, |node, part| node.as_mapping()?.get(part))
}

/// Render a scalar as a string. Mappings and sequences yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Read `path` and return the front-matter value at `key`.
///
/// Missing front-matter or a missing key logs a warning and yields `None`.
pub fn front_matter_value(path: &Path, key: &str) -> Result<Option<String>, MdPressError> {
    let text = std::fs::read_to_string(path).map_err(|e| MdPressError::from_source_io(path, e))?;
    let meta = parse_front_matter(&text).map_err(|e| MdPressError::FrontMatter {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let Some(meta) = meta else {
        warn!("{} has no front-matter", path.display());
        return Ok(None);
    };

    match lookup(&meta, key) {
        Some(value) => {
            let s = scalar_to_string(value);
            if s.is_none() {
                warn!("{}: '{}' is not a scalar", path.display(), key);
            }
            Ok(s)
        }
        None => {
            warn!("Maybe {} has no key {}", path.display(), key);
            Ok(None)
        }
    }
}

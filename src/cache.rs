//! Content-hash conversion cache.
//!
//! Before a document is converted the orchestration layer asks
//! [`ConversionCache::should_skip`] whether the previous output is still
//! valid; after a successful conversion it calls [`ConversionCache::record`].
//! Validity is an equality check of two MD5 fingerprints (source and
//! template) against the row stored for the `(source, template)` pair.
//!
//! ## Storage
//!
//! One SQLite table, created on first access:
//!
//! ```text
//! files(id TEXT PRIMARY KEY, name TEXT, template TEXT, fileHash TEXT, templateHash TEXT)
//! ```
//!
//! `id` is `name + "_" + template`, with `template = "none"` when no
//! template is used. Every operation opens its own connection and drops it
//! when done; nothing is held between calls.
//!
//! ## Failure policy
//!
//! The cache is advisory. An unreadable source is the caller's problem and
//! is returned as an error, but storage failures are logged and swallowed:
//! a failed read looks like [`CacheDecision::NotCached`], a failed write
//! leaves the conversion result in place without a cache row.

use crate::config::CacheConfig;
use crate::error::{CacheError, MdPressError};
use crate::fingerprint::{self, NO_TEMPLATE};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info, warn};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS files (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    template     TEXT NOT NULL,
    fileHash     TEXT NOT NULL,
    templateHash TEXT NOT NULL
)";

/// One row of the cache table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `source_path + "_" + template_path`.
    pub key: String,
    pub source_path: String,
    /// Template path, or `"none"`.
    pub template_path: String,
    pub source_hash: String,
    pub template_hash: String,
}

/// Answer to "can this conversion be skipped?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheDecision {
    /// No entry for the pair.
    NotCached,
    /// An entry exists but a fingerprint changed.
    Stale,
    /// Both fingerprints match the stored entry.
    UpToDate,
    /// Persistence is switched off; nothing was looked up.
    CachingDisabled,
}

impl CacheDecision {
    /// Whether the caller has to run the converter.
    pub fn needs_conversion(self) -> bool {
        !matches!(self, CacheDecision::UpToDate)
    }
}

/// What [`ConversionCache::record`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    /// First entry for the pair.
    Inserted,
    /// Existing entry overwritten with new fingerprints.
    Updated,
    /// Existing entry already held these fingerprints.
    Unchanged,
    /// Caching is disabled; nothing written.
    Disabled,
    /// The storage layer failed; logged, nothing guaranteed written.
    StorageFailed,
}

/// SQLite-backed fingerprint store.
#[derive(Debug, Clone)]
pub struct ConversionCache {
    config: CacheConfig,
}

impl ConversionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Composite primary key for a `(source, template)` pair.
    pub fn key(source: &Path, template: Option<&Path>) -> String {
        format!(
            "{}_{}",
            source.to_string_lossy(),
            fingerprint::template_label(template)
        )
    }

    /// Decide whether converting `source` with `template` can be skipped.
    ///
    /// # Errors
    /// Only when `source` cannot be read. A missing template hashes to the
    /// sentinel and storage failures read as [`CacheDecision::NotCached`].
    pub fn should_skip(
        &self,
        source: &Path,
        template: Option<&Path>,
    ) -> Result<CacheDecision, MdPressError> {
        self.in_sink(|| {
            let source_hash = fingerprint::file_fingerprint(source)
                .map_err(|e| MdPressError::from_source_io(source, e))?;

            if !self.config.enabled {
                debug!(source = %source.display(), "Caching disabled");
                return Ok(CacheDecision::CachingDisabled);
            }

            let template_hash = fingerprint::template_fingerprint(template);
            let key = Self::key(source, template);

            let stored = match self.lookup(source, template) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache lookup failed, treating as not cached");
                    None
                }
            };

            let decision = match stored {
                None => CacheDecision::NotCached,
                Some(entry)
                    if entry.source_hash == source_hash
                        && entry.template_hash == template_hash =>
                {
                    CacheDecision::UpToDate
                }
                Some(_) => CacheDecision::Stale,
            };
            debug!(key = %key, ?decision, "Cache check");
            Ok(decision)
        })
    }

    /// Store the current fingerprints of `source` and `template`.
    ///
    /// Call only after a successful conversion.
    ///
    /// # Errors
    /// Only when `source` cannot be read.
    pub fn record(
        &self,
        source: &Path,
        template: Option<&Path>,
    ) -> Result<RecordOutcome, MdPressError> {
        self.in_sink(|| {
            let source_hash = fingerprint::file_fingerprint(source)
                .map_err(|e| MdPressError::from_source_io(source, e))?;

            if !self.config.enabled {
                return Ok(RecordOutcome::Disabled);
            }

            let entry = CacheEntry {
                key: Self::key(source, template),
                source_path: source.to_string_lossy().into_owned(),
                template_path: fingerprint::template_label(template),
                source_hash,
                template_hash: fingerprint::template_fingerprint(template),
            };

            match self.upsert(&entry) {
                Ok(outcome) => {
                    info!(key = %entry.key, ?outcome, "Cache recorded");
                    Ok(outcome)
                }
                Err(CacheError::DuplicateKey { key }) => {
                    warn!(key = %key, "Cache entry written concurrently, keeping the other writer's row");
                    Ok(RecordOutcome::StorageFailed)
                }
                Err(e) => {
                    error!(key = %entry.key, error = %e, "Cache write failed");
                    Ok(RecordOutcome::StorageFailed)
                }
            }
        })
    }

    /// The stored entry for a pair, if any.
    pub fn entry(&self, source: &Path, template: Option<&Path>) -> Option<CacheEntry> {
        if !self.config.enabled {
            return None;
        }
        let key = Self::key(source, template);
        self.in_sink(|| match self.lookup(source, template) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed");
                None
            }
        })
    }

    /// Every stored entry, sorted by key.
    pub fn entries(&self) -> Vec<CacheEntry> {
        if !self.config.enabled {
            return Vec::new();
        }
        self.in_sink(|| match self.load_all() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Listing cache entries failed");
                Vec::new()
            }
        })
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete the whole store. The next access recreates it empty.
    pub fn wipe(&self) -> Result<bool, MdPressError> {
        let path = &self.config.db_path;
        match std::fs::remove_file(path) {
            Ok(()) => {
                self.in_sink(|| info!(db = %path.display(), "Cache wiped"));
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MdPressError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            }),
        }
    }

    // ── Storage ──────────────────────────────────────────────────────────

    fn open(&self) -> Result<Connection, CacheError> {
        let path = &self.config.db_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| CacheError::Directory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLE)?;
        Ok(conn)
    }

    /// The row for exactly this pair. Different pairs can join to the same
    /// id (`a_b` + `c`, `a` + `b_c`), so name and template must match too.
    fn lookup(
        &self,
        source: &Path,
        template: Option<&Path>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.open()?;
        let entry = conn
            .query_row(
                "SELECT id, name, template, fileHash, templateHash FROM files
                 WHERE id = ?1 AND name = ?2 AND template = ?3",
                params![
                    Self::key(source, template),
                    source.to_string_lossy(),
                    fingerprint::template_label(template)
                ],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn load_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare("SELECT id, name, template, fileHash, templateHash FROM files ORDER BY id")?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<RecordOutcome, CacheError> {
        let conn = self.open()?;
        let existing = conn
            .query_row(
                "SELECT id, name, template, fileHash, templateHash FROM files WHERE id = ?1",
                params![entry.key],
                row_to_entry,
            )
            .optional()?;

        match existing {
            None => {
                conn.execute(
                    "INSERT INTO files (id, name, template, fileHash, templateHash)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        entry.key,
                        entry.source_path,
                        entry.template_path,
                        entry.source_hash,
                        entry.template_hash
                    ],
                )
                .map_err(|e| classify_insert_error(e, &entry.key))?;
                Ok(RecordOutcome::Inserted)
            }
            Some(old) if &old == entry => Ok(RecordOutcome::Unchanged),
            Some(old) => {
                if old.source_path != entry.source_path || old.template_path != entry.template_path
                {
                    debug!(key = %entry.key, previous = %old.source_path, "Cache id taken by another pair, replacing");
                }
                conn.execute(
                    "UPDATE files SET name = ?2, template = ?3, fileHash = ?4, templateHash = ?5
                     WHERE id = ?1",
                    params![
                        entry.key,
                        entry.source_path,
                        entry.template_path,
                        entry.source_hash,
                        entry.template_hash
                    ],
                )?;
                Ok(RecordOutcome::Updated)
            }
        }
    }

    /// Run `f` with the configured log sink as the default subscriber.
    fn in_sink<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.config.log_sink {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        key: row.get(0)?,
        source_path: row.get(1)?,
        template_path: row.get(2)?,
        source_hash: row.get(3)?,
        template_hash: row.get(4)?,
    })
}

fn classify_insert_error(err: rusqlite::Error, key: &str) -> CacheError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            CacheError::DuplicateKey {
                key: key.to_string(),
            }
        }
        _ => CacheError::Storage(err),
    }
}

/// Whether a template label is the "no template" sentinel.
pub fn is_sentinel_template(label: &str) -> bool {
    label == NO_TEMPLATE
}

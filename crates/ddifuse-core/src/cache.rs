//! Content-addressed JSON cache.
//!
//! Two namespaces live under one root:
//!
//! - `contexts/`: fused pair contexts keyed by `{pair, v}`.
//! - `responses/`: generated responses keyed by `{ctx, mode, seed, temp, model, v}`.
//!
//! Each entry is `{key}.json` holding the payload only. Writes go to a
//! uniquely named temp file in the target directory and are renamed into
//! place, so readers never observe a partial file and the last writer wins.
//! A file that fails to decode is treated as a miss and removed.
//!
//! Bumping the schema version changes every key; entries written under an
//! older version are orphaned rather than migrated.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::hash::{content_key, unordered_pair_key};

static UNSAFE_KEY_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9._-]").expect("cache key pattern must compile")
});

#[derive(Debug, thiserror::Error)]
pub enum CacheWriteError {
    #[error("failed to create cache dir {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write temp file in {dir}: {source}")]
    Write {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheWriteError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::CacheWriteFailed
    }
}

/// Replace anything outside `[a-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize_key(key: &str) -> String {
    UNSAFE_KEY_CHARS
        .replace_all(&key.to_lowercase(), "_")
        .into_owned()
}

/// Write `value` as pretty JSON to `path` through a temp file in the same
/// directory, creating the directory first.
///
/// # Errors
///
/// Returns [`CacheWriteError`] when the directory cannot be created, the
/// value cannot be encoded, or the temp file cannot be written or renamed.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CacheWriteError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|source| CacheWriteError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let encoded = serde_json::to_vec_pretty(value)?;
    let write_err = |source: io::Error| CacheWriteError::Write {
        dir: dir.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&encoded).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;

    tmp.persist(path).map_err(|err| CacheWriteError::Persist {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    debug!(path = %path.display(), bytes = encoded.len(), "json written");
    Ok(())
}

/// One directory of `{key}.json` files.
#[derive(Debug, Clone)]
pub struct JsonCache {
    root: PathBuf,
}

impl JsonCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }

    /// Load and decode an entry. Missing or undecodable entries are misses.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(
                    code = ErrorCode::CacheCorruption.code(),
                    path = %path.display(),
                    error = %err,
                    "unreadable cache entry, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    code = ErrorCode::CacheCorruption.code(),
                    path = %path.display(),
                    error = %err,
                    "corrupt cache entry, removing"
                );
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Like [`load`](Self::load), but entries last written more than
    /// `max_age` ago are misses. Stale files are left in place.
    pub fn load_fresh<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let path = self.path_for(key);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > max_age {
            debug!(path = %path.display(), age_secs = age.as_secs(), "cache entry expired");
            return None;
        }
        self.load(key)
    }

    /// Atomically write `value` under `key`, returning the final path.
    ///
    /// # Errors
    ///
    /// See [`write_json_atomic`].
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf, CacheWriteError> {
        let path = self.path_for(key);
        write_json_atomic(&path, value)?;
        Ok(path)
    }

    /// Return the cached entry or compute, store, and return it.
    ///
    /// # Errors
    ///
    /// Propagates errors from `compute` and from [`save`](Self::save).
    pub fn get_or_insert_with<T, F>(&self, key: &str, compute: F) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> anyhow::Result<T>,
    {
        if let Some(hit) = self.load(key) {
            return Ok(hit);
        }
        let value = compute()?;
        self.save(key, &value)?;
        Ok(value)
    }
}

/// Parameters that distinguish one generated response from another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseParams {
    pub mode: String,
    pub seed: Option<u64>,
    pub temperature: f64,
    pub model: String,
}

/// The context and response tiers under one cache root.
#[derive(Debug, Clone)]
pub struct CacheManager {
    pub contexts: JsonCache,
    pub responses: JsonCache,
    schema_version: u32,
}

impl CacheManager {
    #[must_use]
    pub fn new(root: impl AsRef<Path>, schema_version: u32) -> Self {
        let root = root.as_ref();
        Self {
            contexts: JsonCache::new(root.join("contexts")),
            responses: JsonCache::new(root.join("responses")),
            schema_version,
        }
    }

    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Order-independent key for the fused context of `a` and `b`.
    #[must_use]
    pub fn context_key(&self, a: &str, b: &str) -> String {
        content_key(&json!({
            "pair": unordered_pair_key(a, b),
            "v": self.schema_version,
        }))
    }

    /// Key for a response generated from `context` with `params`.
    #[must_use]
    pub fn response_key(&self, context: &Value, params: &ResponseParams) -> String {
        content_key(&json!({
            "ctx": context,
            "mode": params.mode,
            "seed": params.seed,
            "temp": round3(params.temperature),
            "model": params.model,
            "v": self.schema_version,
        }))
    }

    pub fn get_context<T: DeserializeOwned>(&self, key: &str, ttl: Option<Duration>) -> Option<T> {
        match ttl {
            Some(max_age) => self.contexts.load_fresh(key, max_age),
            None => self.contexts.load(key),
        }
    }

    /// # Errors
    ///
    /// See [`JsonCache::save`].
    pub fn put_context<T: Serialize + ?Sized>(&self, key: &str, context: &T) -> Result<PathBuf, CacheWriteError> {
        self.contexts.save(key, context)
    }

    pub fn get_response<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.responses.load(key)
    }

    /// # Errors
    ///
    /// See [`JsonCache::save`].
    pub fn put_response<T: Serialize + ?Sized>(&self, key: &str, response: &T) -> Result<PathBuf, CacheWriteError> {
        self.responses.save(key, response)
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

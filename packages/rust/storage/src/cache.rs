//! Durable key → value cache, one file per key.
//!
//! Every expensive remote call is memoized through a [`Cache`]. The file
//! backed [`DataCache`] writes synchronously, so a crash mid-run loses at most
//! the in-flight item.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use qexp_shared::{QexpError, Result};
use tracing::{debug, info};

/// Key/value capability injected into every stage.
///
/// `get` distinguishes a missing key (`None`) from a cached empty string,
/// which means "fetched, found nothing".
pub trait Cache: Send + Sync {
    /// Look up `key`; `Ok(None)` when it was never set.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str) -> Result<String>;

    /// Look up a multi-valued entry joined by `sep`. An empty value is an
    /// empty list.
    fn get_list(&self, key: &str, sep: char) -> Result<Option<Vec<String>>> {
        Ok(self.get(key)?.map(|value| split_list(&value, sep)))
    }

    /// Store a multi-valued entry joined by `sep`. Values containing `sep`
    /// do not survive a round trip.
    fn set_list(&self, key: &str, values: &[String], sep: char) -> Result<String> {
        self.set(key, &values.join(&sep.to_string()))
    }
}

/// Split a joined cache value back into its parts.
pub fn split_list(value: &str, sep: char) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(sep).map(str::to_string).collect()
}

/// Escape a key so it is usable as a single file name.
pub fn escape_key(key: &str) -> String {
    key.replace('/', "||")
}

/// Inverse of [`escape_key`].
pub fn unescape_key(name: &str) -> String {
    name.replace("||", "/")
}

// ---------------------------------------------------------------------------
// DataCache
// ---------------------------------------------------------------------------

/// File-per-key cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct DataCache {
    dir: PathBuf,
}

impl DataCache {
    /// Open the cache at `dir`, creating the directory if absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            info!(?dir, "creating cache dir");
            std::fs::create_dir_all(&dir).map_err(|e| QexpError::io(&dir, e))?;
        }
        Ok(Self { dir })
    }

    /// Directory backing this cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(escape_key(key))
    }

    /// Keys currently stored, unescaped.
    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| QexpError::io(&self.dir, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QexpError::io(&self.dir, e))?;
            if entry.path().is_file() {
                keys.push(unescape_key(&entry.file_name().to_string_lossy()));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl Cache for DataCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = %escape_key(key), "cache miss");
                Ok(None)
            }
            Err(e) => Err(QexpError::io(path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<String> {
        let path = self.path_for(key);
        debug!(key = %escape_key(key), "setting cache key");
        std::fs::write(&path, value).map_err(|e| QexpError::io(path, e))?;
        Ok(value.to_string())
    }
}

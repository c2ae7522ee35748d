//! Application configuration for qexp.
//!
//! The config lives in a TOML file (`config.toml` by default). The `[data]`
//! and `[dbpedia]` sections are required; everything else has defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{QexpError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ---------------------------------------------------------------------------
// Config structs (matching config.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and cache locations.
    pub data: DataConfig,

    /// Entity-linking and knowledge-base services.
    pub dbpedia: DbpediaConfig,

    /// MediaWiki API settings.
    #[serde(default)]
    pub wikipedia: WikipediaConfig,

    /// Random-walk profile settings.
    #[serde(default)]
    pub profiles: ProfilesConfig,

    /// Priming pipeline settings.
    #[serde(default)]
    pub priming: PrimingConfig,
}

/// `[data]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV of seed articles (`article_id`, `parent_title` columns).
    pub article_path: PathBuf,

    /// Cache of raw article revisions.
    #[serde(default = "default_extracts_path")]
    pub extracts_path: PathBuf,

    /// Cache of cleaned plain-text article bodies.
    #[serde(default = "default_clean_path")]
    pub clean_path: PathBuf,

    /// Cache of entity-linking results.
    #[serde(default = "default_surface_term_path")]
    pub surface_term_path: PathBuf,

    /// Cache of subject lookups.
    #[serde(default = "default_subject_path")]
    pub subject_path: PathBuf,

    /// Cache of category samples.
    #[serde(default = "default_category_path")]
    pub category_path: PathBuf,

    /// Cache of page links.
    #[serde(default = "default_links_path")]
    pub links_path: PathBuf,

    /// Resource → page id database.
    #[serde(default = "default_id_store_path")]
    pub id_store_path: PathBuf,

    /// Serialized knowledge graph.
    #[serde(default = "default_kg_path")]
    pub kg_path: PathBuf,

    /// Serialized seed → profile map.
    #[serde(default = "default_profiles_dump")]
    pub profiles_dump: PathBuf,

    /// Serialized parent title → sampled links map.
    #[serde(default = "default_links_dump")]
    pub links_dump: PathBuf,

    /// Serialized article → categories map.
    #[serde(default = "default_article_categories")]
    pub article_categories: PathBuf,
}

fn default_extracts_path() -> PathBuf {
    "var/cache/extracts".into()
}
fn default_clean_path() -> PathBuf {
    "var/cache/clean".into()
}
fn default_surface_term_path() -> PathBuf {
    "var/cache/surface_terms".into()
}
fn default_subject_path() -> PathBuf {
    "var/cache/subjects".into()
}
fn default_category_path() -> PathBuf {
    "var/cache/categories".into()
}
fn default_links_path() -> PathBuf {
    "var/cache/links".into()
}
fn default_id_store_path() -> PathBuf {
    "var/ids.db".into()
}
fn default_kg_path() -> PathBuf {
    "var/kg.json".into()
}
fn default_profiles_dump() -> PathBuf {
    "var/profiles.json".into()
}
fn default_links_dump() -> PathBuf {
    "var/links.json".into()
}
fn default_article_categories() -> PathBuf {
    "var/article_categories.json".into()
}

/// `[dbpedia]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbpediaConfig {
    /// Spotlight base URL (`/annotate` is appended).
    pub url: String,

    /// SPARQL endpoint.
    #[serde(default = "default_sparql_url")]
    pub sparql_url: String,

    /// Spotlight confidence threshold.
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Randomized delay bounds before each subject query.
    #[serde(default = "default_subject_delay_min_ms")]
    pub subject_delay_min_ms: u64,
    #[serde(default = "default_subject_delay_max_ms")]
    pub subject_delay_max_ms: u64,

    /// Randomized delay bounds before each page-id query.
    #[serde(default = "default_id_delay_min_ms")]
    pub id_delay_min_ms: u64,
    #[serde(default = "default_id_delay_max_ms")]
    pub id_delay_max_ms: u64,

    /// Labels never sent to the subject lookup.
    #[serde(default)]
    pub subject_blocklist: Vec<String>,
}

fn default_sparql_url() -> String {
    "https://dbpedia.org/sparql".into()
}
fn default_confidence() -> f64 {
    0.6
}
fn default_subject_delay_min_ms() -> u64 {
    200
}
fn default_subject_delay_max_ms() -> u64 {
    5000
}
fn default_id_delay_min_ms() -> u64 {
    200
}
fn default_id_delay_max_ms() -> u64 {
    1000
}

/// `[wikipedia]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    /// MediaWiki API endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Members requested per category (first page only).
    #[serde(default = "default_category_sample_limit")]
    pub category_sample_limit: u32,

    /// Randomized delay bounds before each request (0/0 disables).
    #[serde(default)]
    pub delay_min_ms: u64,
    #[serde(default)]
    pub delay_max_ms: u64,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            category_sample_limit: default_category_sample_limit(),
            delay_min_ms: 0,
            delay_max_ms: 0,
        }
    }
}

fn default_endpoint() -> String {
    "https://en.wikipedia.org/w/api.php".into()
}
fn default_category_sample_limit() -> u32 {
    10
}

/// `[profiles]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    /// Vertices visited per random walk.
    #[serde(default = "default_steps")]
    pub steps: usize,

    /// Size of the walk worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fixed RNG seed for reproducible walks.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            workers: default_workers(),
            seed: None,
        }
    }
}

fn default_steps() -> usize {
    40
}
fn default_workers() -> usize {
    4
}

/// `[priming]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimingConfig {
    /// Linked pages sampled per parent title.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Fetch only the first page of links per title.
    #[serde(default = "default_true")]
    pub no_continue: bool,
}

impl Default for PrimingConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            no_continue: true,
        }
    }
}

fn default_sample_size() -> usize {
    5
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// A starter config with placeholder service URLs.
    pub fn template() -> Self {
        Self {
            data: DataConfig {
                article_path: "var/articles.csv".into(),
                extracts_path: default_extracts_path(),
                clean_path: default_clean_path(),
                surface_term_path: default_surface_term_path(),
                subject_path: default_subject_path(),
                category_path: default_category_path(),
                links_path: default_links_path(),
                id_store_path: default_id_store_path(),
                kg_path: default_kg_path(),
                profiles_dump: default_profiles_dump(),
                links_dump: default_links_dump(),
                article_categories: default_article_categories(),
            },
            dbpedia: DbpediaConfig {
                url: "http://localhost:2222/rest".into(),
                sparql_url: default_sparql_url(),
                confidence: default_confidence(),
                subject_delay_min_ms: default_subject_delay_min_ms(),
                subject_delay_max_ms: default_subject_delay_max_ms(),
                id_delay_min_ms: default_id_delay_min_ms(),
                id_delay_max_ms: default_id_delay_max_ms(),
                subject_blocklist: Vec::new(),
            },
            wikipedia: WikipediaConfig::default(),
            profiles: ProfilesConfig::default(),
            priming: PrimingConfig::default(),
        }
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        let endpoints = [
            ("dbpedia.url", &self.dbpedia.url),
            ("dbpedia.sparql_url", &self.dbpedia.sparql_url),
            ("wikipedia.endpoint", &self.wikipedia.endpoint),
        ];
        for (name, value) in endpoints {
            let parsed = Url::parse(value)
                .map_err(|e| QexpError::config(format!("{name} is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(QexpError::config(format!("{name} must be an http(s) URL")));
            }
        }
        if self.profiles.steps == 0 {
            return Err(QexpError::config("profiles.steps must be at least 1"));
        }
        if self.profiles.workers == 0 {
            return Err(QexpError::config("profiles.workers must be at least 1"));
        }
        let delays = [
            ("wikipedia.delay", self.wikipedia.delay_min_ms, self.wikipedia.delay_max_ms),
            (
                "dbpedia.subject_delay",
                self.dbpedia.subject_delay_min_ms,
                self.dbpedia.subject_delay_max_ms,
            ),
            (
                "dbpedia.id_delay",
                self.dbpedia.id_delay_min_ms,
                self.dbpedia.id_delay_max_ms,
            ),
        ];
        for (name, min, max) in delays {
            if min > max {
                return Err(QexpError::config(format!(
                    "{name}_min_ms ({min}) exceeds {name}_max_ms ({max})"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(QexpError::config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| QexpError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        QexpError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    tracing::debug!(?path, "loaded config");
    Ok(config)
}

/// Write a starter config file at `path`. Refuses to overwrite.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(QexpError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| QexpError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::template())
        .map_err(|e| QexpError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| QexpError::io(path, e))?;
    tracing::info!(?path, "created config file");

    Ok(path.to_path_buf())
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;

/// Environment variable that replaces `cache.dir` when set.
pub const CACHE_DIR_ENV: &str = "DDIFUSE_CACHE_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::InternalUnexpected,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub pd: PdConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Maximum age of a context-cache entry. `None` keeps entries forever.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            schema_version: default_schema_version(),
            ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_initial_k")]
    pub initial_k: usize,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
    #[serde(default = "default_min_results")]
    pub min_results: usize,
    #[serde(default)]
    pub max_k: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            initial_k: default_initial_k(),
            min_relevance: default_min_relevance(),
            min_results: default_min_results(),
            max_k: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdConfig {
    #[serde(default = "default_target_topk")]
    pub target_topk: usize,
    #[serde(default = "default_pathway_topk")]
    pub pathway_topk: usize,
}

impl Default for PdConfig {
    fn default() -> Self {
        Self {
            target_topk: default_target_topk(),
            pathway_topk: default_pathway_topk(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub structured: bool,
    #[serde(default)]
    pub potency: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            structured: default_true(),
            potency: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_clinical_chars")]
    pub clinical_chars: usize,
    #[serde(default = "default_patient_chars")]
    pub patient_chars: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            clinical_chars: default_clinical_chars(),
            patient_chars: default_patient_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default = "default_side_effect_limit")]
    pub side_effect_limit: usize,
    #[serde(default = "default_faers_top_k")]
    pub faers_top_k: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            side_effect_limit: default_side_effect_limit(),
            faers_top_k: default_faers_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            keyword_weight: default_keyword_weight(),
            semantic_weight: default_semantic_weight(),
        }
    }
}

/// Load `.ddifuse/config.toml` under `project_root`, falling back to
/// defaults when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<FusionConfig, ConfigError> {
    let path = project_root.join(".ddifuse/config.toml");
    if !path.exists() {
        return Ok(FusionConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    toml::from_str::<FusionConfig>(&content).map_err(|source| ConfigError::Parse { path, source })
}

impl FusionConfig {
    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.cache.dir = PathBuf::from(dir);
        }
    }

    /// Resolve the cache root against `project_root` when it is relative.
    #[must_use]
    pub fn cache_root(&self, project_root: &Path) -> PathBuf {
        if self.cache.dir.is_absolute() {
            self.cache.dir.clone()
        } else {
            project_root.join(&self.cache.dir)
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

const fn default_schema_version() -> u32 {
    1
}

const fn default_initial_k() -> usize {
    10
}

const fn default_min_relevance() -> f64 {
    0.3
}

const fn default_min_results() -> usize {
    5
}

const fn default_target_topk() -> usize {
    32
}

const fn default_pathway_topk() -> usize {
    24
}

const fn default_clinical_chars() -> usize {
    2400
}

const fn default_patient_chars() -> usize {
    1500
}

const fn default_side_effect_limit() -> usize {
    25
}

const fn default_faers_top_k() -> usize {
    10
}

const fn default_keyword_weight() -> f64 {
    0.6
}

const fn default_semantic_weight() -> f64 {
    0.4
}

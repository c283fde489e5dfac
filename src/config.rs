use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::memory::types::{EdgeType, MemoryType};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HippocampusConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub anchors: AnchorConfig,
    pub lookup: LookupConfig,
    pub retrieval: RetrievalConfig,
    pub maintenance: MaintenanceConfig,
    pub hierarchy: HierarchyConfig,
    pub activation: ActivationConfig,
    pub sharing: SharingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Root directory the concept index scans and writes its artifacts into.
    pub workspace: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub socket_path: String,
    pub dimensions: usize,
    /// Texts are cut to this many characters before they leave the process.
    pub max_chars: usize,
    pub timeout_secs: u64,
    pub batch_timeout_secs: u64,
}

/// Concept index layout and build parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub sources: Vec<String>,
    pub skip_dirs: Vec<String>,
    pub skip_files: Vec<String>,
    pub max_file_bytes: u64,
    pub entities_dir: String,
    pub index_path: String,
    pub embeds_path: String,
    pub meta_path: String,
    /// Entries kept per anchor by a full build.
    pub k: usize,
    pub theta: f32,
    /// Entries kept per anchor once incremental updates start accumulating.
    pub k_max: usize,
    pub embed_chars: usize,
    pub preview_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub min_chunk_chars: usize,
    pub max_chunk_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnchorConfig {
    pub min_anchor_df: usize,
    pub max_anchors: usize,
    pub denylist: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LookupConfig {
    pub sem_theta: f32,
    pub max_chunks: usize,
    /// Share of the final score taken from the anchor-level similarity.
    pub anchor_weight: f32,
    pub semantic: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub vec_weight: f64,
    pub forget_query_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub episodic_decay: f64,
    pub semantic_decay: f64,
    pub procedural_decay: f64,
    pub rehearsal_per_access: f64,
    pub rehearsal_cap: f64,
    pub max_rate: f64,
    pub min_days: f64,
    pub strength_floor: f64,
    pub cluster_threshold: f64,
    pub consolidate_days: f64,
    pub snippet_chars: usize,
    pub max_snippets: usize,
    pub temporal_window_minutes: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HierarchyConfig {
    pub max_level: u32,
    pub thresholds: Vec<f64>,
    pub member_snippets: usize,
    pub snippet_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActivationConfig {
    pub iterations: usize,
    pub decay: f64,
    pub semantic: f64,
    pub temporal: f64,
    pub explicit: f64,
    pub causal: f64,
    pub inhibition_ratio: f64,
    pub inhibition_factor: f64,
    pub direct_weight: f64,
    pub injection_threshold: f64,
    pub context_items: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SharingConfig {
    pub agent_name: String,
    pub threshold: f64,
    pub episodic_sensitivity: f64,
    pub semantic_sensitivity: f64,
    pub procedural_sensitivity: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = default_hippocampus_dir();
        Self {
            db_path: home.join("memory.db").to_string_lossy().into_owned(),
            workspace: home.join("workspace").to_string_lossy().into_owned(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "socket".into(),
            socket_path: "/tmp/hippocampus-embed.sock".into(),
            dimensions: crate::embedding::EMBEDDING_DIM,
            max_chars: 2000,
            timeout_secs: 10,
            batch_timeout_secs: 60,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sources: vec!["memory".into(), "bank".into(), "docs/papers".into()],
            skip_dirs: vec![
                "archive".into(),
                "node_modules".into(),
                ".git".into(),
                "__pycache__".into(),
            ],
            skip_files: vec!["memory-index.md".into()],
            max_file_bytes: 500_000,
            entities_dir: "bank/entities".into(),
            index_path: "memory/hippocampus-index.json".into(),
            embeds_path: "memory/hippocampus-embeds.json".into(),
            meta_path: "memory/hippocampus-meta.json".into(),
            k: 20,
            theta: 0.30,
            k_max: 50,
            embed_chars: 500,
            preview_chars: 120,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: 100,
            max_chunk_chars: 2000,
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            min_anchor_df: 2,
            max_anchors: 500,
            denylist: Vec::new(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            sem_theta: 0.35,
            max_chunks: 30,
            anchor_weight: 0.5,
            semantic: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            vec_weight: 0.7,
            forget_query_limit: 5,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            episodic_decay: 0.92,
            semantic_decay: 0.98,
            procedural_decay: 0.99,
            rehearsal_per_access: 0.01,
            rehearsal_cap: 0.04,
            max_rate: 0.999,
            min_days: 0.01,
            strength_floor: 0.1,
            cluster_threshold: 0.3,
            consolidate_days: 1.0,
            snippet_chars: 200,
            max_snippets: 5,
            temporal_window_minutes: 30.0,
        }
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_level: 3,
            thresholds: vec![0.4, 0.6, 0.8],
            member_snippets: 4,
            snippet_chars: 150,
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            iterations: 3,
            decay: 0.5,
            semantic: 1.0,
            temporal: 0.5,
            explicit: 1.2,
            causal: 1.5,
            inhibition_ratio: 2.0,
            inhibition_factor: 0.5,
            direct_weight: 0.6,
            injection_threshold: 0.3,
            context_items: 3,
        }
    }
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            agent_name: "agent".into(),
            threshold: 0.5,
            episodic_sensitivity: 0.9,
            semantic_sensitivity: 0.3,
            procedural_sensitivity: 0.2,
        }
    }
}

impl MaintenanceConfig {
    /// Per-day retention rate before the rehearsal bonus.
    pub fn base_rate(&self, memory_type: MemoryType) -> f64 {
        match memory_type {
            MemoryType::Episodic => self.episodic_decay,
            MemoryType::Semantic => self.semantic_decay,
            MemoryType::Procedural => self.procedural_decay,
        }
    }
}

impl ActivationConfig {
    pub fn edge_multiplier(&self, edge_type: EdgeType) -> f64 {
        match edge_type {
            EdgeType::Semantic => self.semantic,
            EdgeType::Temporal => self.temporal,
            EdgeType::Explicit => self.explicit,
            EdgeType::Causal => self.causal,
        }
    }
}

impl SharingConfig {
    pub fn base_sensitivity(&self, memory_type: MemoryType) -> f64 {
        match memory_type {
            MemoryType::Episodic => self.episodic_sensitivity,
            MemoryType::Semantic => self.semantic_sensitivity,
            MemoryType::Procedural => self.procedural_sensitivity,
        }
    }
}

impl HierarchyConfig {
    /// Distance cutoff for building `level`; levels past the schedule reuse its last entry.
    pub fn threshold_for(&self, level: u32) -> f64 {
        let idx = (level.max(1) - 1) as usize;
        self.thresholds
            .get(idx)
            .or_else(|| self.thresholds.last())
            .copied()
            .unwrap_or(0.8)
    }
}

/// Returns `~/.hippocampus/`
pub fn default_hippocampus_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hippocampus")
}

/// Returns the default config file path: `~/.hippocampus/config.toml`
pub fn default_config_path() -> PathBuf {
    default_hippocampus_dir().join("config.toml")
}

impl HippocampusConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HippocampusConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the storage layer cannot honor.
    ///
    /// The vector table is created with a fixed width, so the embedding
    /// dimension must match it.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.embedding.dimensions == crate::embedding::EMBEDDING_DIM,
            "embedding.dimensions = {} is not supported: the memory store holds {}-dimensional vectors",
            self.embedding.dimensions,
            crate::embedding::EMBEDDING_DIM
        );
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HIPPOCAMPUS_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("HIPPOCAMPUS_WORKSPACE") {
            self.storage.workspace = val;
        }
        if let Ok(val) = std::env::var("HIPPOCAMPUS_EMBED_SOCKET") {
            self.embedding.socket_path = val;
        }
        if let Ok(val) = std::env::var("HIPPOCAMPUS_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_workspace(&self) -> PathBuf {
        expand_tilde(&self.storage.workspace)
    }
}

impl IndexConfig {
    pub fn index_file(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.index_path)
    }

    pub fn embeds_file(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.embeds_path)
    }

    pub fn meta_file(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.meta_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

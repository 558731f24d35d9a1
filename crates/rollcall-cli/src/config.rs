use anyhow::{Context, Result};
use rollcall_onnx::engine::{
    DEFAULT_DETECTOR_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_LANDMARK_MODEL,
};
use rollcall_onnx::ModelPaths;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration: defaults, then an optional TOML file, then `ROLLCALL_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    pub detector_model: String,
    pub landmark_model: String,
    pub embedding_model: String,
    /// Path to the SQLite database of enrolled faces.
    pub db_path: PathBuf,
    /// Minimum cosine similarity for a positive identification.
    pub similarity_threshold: f32,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Chroma API base, e.g. `http://localhost:8000/api/v1`. No sink when unset.
    pub chroma_url: Option<String>,
    pub chroma_collection: String,
    /// How long to wait for sink deliveries before the process exits.
    pub sink_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            model_dir: data_dir.join("models"),
            detector_model: DEFAULT_DETECTOR_MODEL.to_string(),
            landmark_model: DEFAULT_LANDMARK_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            db_path: data_dir.join("faces.db"),
            similarity_threshold: 0.40,
            intra_threads: 2,
            chroma_url: None,
            chroma_collection: "FaceEmbedding".to_string(),
            sink_grace_ms: 2000,
        }
    }
}

impl Config {
    /// Load from `ROLLCALL_CONFIG` (or the XDG config file if present) and the environment.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("ROLLCALL_CONFIG").ok().map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(|| config_dir().join("config.toml"));

        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Self::from_toml_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        } else if explicit.is_some() {
            anyhow::bail!("config file {} does not exist", path.display());
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from `ROLLCALL_*` variables; unparsable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = parse(&lookup, "ROLLCALL_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
        if let Some(v) = parse(&lookup, "ROLLCALL_INTRA_THREADS") {
            self.intra_threads = v;
        }
        if let Some(v) = lookup("ROLLCALL_CHROMA_URL") {
            self.chroma_url = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = lookup("ROLLCALL_CHROMA_COLLECTION") {
            self.chroma_collection = v;
        }
        if let Some(v) = parse(&lookup, "ROLLCALL_SINK_GRACE_MS") {
            self.sink_grace_ms = v;
        }
    }

    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            detector: self.model_dir.join(&self.detector_model),
            landmarks: self.model_dir.join(&self.landmark_model),
            embedder: self.model_dir.join(&self.embedding_model),
        }
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        Path::new(&home).join(fallback)
    })
}

fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share").join("rollcall")
}

fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config").join("rollcall")
}

//! Environment-driven configuration for the pane workers.
//!
//! The workers are configured entirely from environment variables so they
//! can be toggled in containers and CI without code changes. Boolean flags
//! use a forgiving parser to avoid surprises when flags arrive in varying
//! forms (`1`, `yes`, `on`, ...).

use std::path::PathBuf;

/// Values parsed as `true` (case-insensitive).
const TRUTHY: &[&str] = &["1", "true", "yes", "y", "on", "t"];

/// Values parsed as `false` (case-insensitive).
const FALSY: &[&str] = &["0", "false", "no", "n", "off", "f"];

/// Default Stable Diffusion WebUI endpoint.
pub const DEFAULT_STABLE_DIFFUSION_URL: &str = "http://127.0.0.1:7860";

/// Default directory illustrations are written to.
pub const DEFAULT_ILLUSTRATIONS_DIR: &str = "public/illustrations";

use crate::llm::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};

/// Parse an optional raw flag value.
///
/// Missing values return `default`; unrecognized non-empty values parse as
/// `false` rather than erroring.
fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    let value = raw.trim().to_ascii_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        return true;
    }
    if FALSY.contains(&value.as_str()) {
        return false;
    }
    false
}

/// Read a boolean flag from the environment.
#[must_use]
pub fn env_flag(name: &str, default: bool) -> bool {
    parse_flag(std::env::var(name).ok().as_deref(), default)
}

/// Configuration for the pane update workers.
#[derive(Debug, Clone)]
pub struct PanesConfig {
    /// Whether the history pane refreshes automatically after each turn.
    pub auto_history_update: bool,
    /// Whether the scene pane refreshes automatically after each turn.
    pub auto_scene_update: bool,
    /// Base URL of the Ollama API.
    pub ollama_base_url: String,
    /// Model used for pane classification and summarization.
    pub ollama_llm_id: String,
    /// Base URL of the Stable Diffusion WebUI API.
    pub stable_diffusion_api_url: String,
    /// Directory rendered illustrations are written to.
    pub illustrations_dir: PathBuf,
}

impl Default for PanesConfig {
    fn default() -> Self {
        Self {
            auto_history_update: true,
            auto_scene_update: true,
            ollama_base_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_llm_id: DEFAULT_OLLAMA_MODEL.to_string(),
            stable_diffusion_api_url: DEFAULT_STABLE_DIFFUSION_URL.to_string(),
            illustrations_dir: PathBuf::from(DEFAULT_ILLUSTRATIONS_DIR),
        }
    }
}

impl PanesConfig {
    /// Build the configuration from environment variables.
    ///
    /// Recognized variables: `ENABLE_AUTO_HISTORY_UPDATE`,
    /// `ENABLE_AUTO_SCENE_UPDATE`, `OLLAMA_BASE_URL`, `OLLAMA_LLM_ID`,
    /// `STABLE_DIFFUSION_API_URL`, `ILLUSTRATIONS_DIR`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            auto_history_update: env_flag("ENABLE_AUTO_HISTORY_UPDATE", true),
            auto_scene_update: env_flag("ENABLE_AUTO_SCENE_UPDATE", true),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            ollama_llm_id: std::env::var("OLLAMA_LLM_ID")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string()),
            stable_diffusion_api_url: std::env::var("STABLE_DIFFUSION_API_URL")
                .unwrap_or_else(|_| DEFAULT_STABLE_DIFFUSION_URL.to_string()),
            illustrations_dir: std::env::var("ILLUSTRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ILLUSTRATIONS_DIR)),
        }
    }
}

//! Backend configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use octagnosis_core::engine::{EngineConfig, ScoringMode};
use octagnosis_core::parser::parse_question_bank;
use octagnosis_core::session::DEFAULT_PAGE_SIZE;
use octagnosis_core::traits::AttemptService;

use crate::http::{
    HttpAttemptService, DEFAULT_BASE_URL, DEFAULT_RESULT_RETRIES, DEFAULT_RESULT_RETRY_DELAY_MS,
    DEFAULT_TIMEOUT_SECS,
};
use crate::offline::InMemoryBackend;

/// Environment variable that overrides the HTTP backend URL.
pub const BASE_URL_ENV: &str = "OCTAGNOSIS_BASE_URL";

/// Which backend serves attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Http {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
    /// Serve a local question bank from memory.
    Offline { bank: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Http {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Top-level octagnosis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OctagnosisConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Questions shown per page. When unset, an offline bank's own
    /// `page_size` applies, then the built-in default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// Where answers are scored.
    #[serde(default)]
    pub scoring: ScoringMode,
    /// Retries for a transient result-fetch failure.
    #[serde(default = "default_result_retries")]
    pub result_retries: u32,
    /// Delay between result-fetch retries in milliseconds.
    #[serde(default = "default_result_retry_delay")]
    pub result_retry_delay_ms: u64,
}

fn default_result_retries() -> u32 {
    DEFAULT_RESULT_RETRIES
}
fn default_result_retry_delay() -> u64 {
    DEFAULT_RESULT_RETRY_DELAY_MS
}

impl Default for OctagnosisConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            page_size: None,
            scoring: ScoringMode::default(),
            result_retries: default_result_retries(),
            result_retry_delay_ms: default_result_retry_delay(),
        }
    }
}

impl OctagnosisConfig {
    /// Engine settings derived from this config.
    pub fn engine_config(&self) -> EngineConfig {
        self.engine_config_with(None)
    }

    /// Engine settings, using `fallback_page_size` when the config leaves
    /// the page size unset.
    pub fn engine_config_with(&self, fallback_page_size: Option<usize>) -> EngineConfig {
        EngineConfig {
            page_size: self
                .page_size
                .or(fallback_page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            scoring: self.scoring,
        }
    }

    /// Point the HTTP backend at `base_url`, replacing any other backend.
    fn override_base_url(&mut self, base_url: String) {
        let timeout_secs = match &self.backend {
            BackendConfig::Http { timeout_secs, .. } => *timeout_secs,
            BackendConfig::Offline { .. } => default_timeout(),
        };
        self.backend = BackendConfig::Http {
            base_url,
            timeout_secs,
        };
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_backend_config(config: &BackendConfig) -> BackendConfig {
    match config {
        BackendConfig::Http {
            base_url,
            timeout_secs,
        } => BackendConfig::Http {
            base_url: resolve_env_vars(base_url),
            timeout_secs: *timeout_secs,
        },
        BackendConfig::Offline { bank } => BackendConfig::Offline {
            bank: PathBuf::from(resolve_env_vars(&bank.to_string_lossy())),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `octagnosis.toml` in the current directory
/// 2. `~/.config/octagnosis/config.toml`
///
/// `OCTAGNOSIS_BASE_URL` overrides the backend URL.
pub fn load_config() -> Result<OctagnosisConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<OctagnosisConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("octagnosis.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<OctagnosisConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => OctagnosisConfig::default(),
    };

    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        config.override_base_url(url);
    }

    config.backend = resolve_backend_config(&config.backend);
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("octagnosis"))
}

/// Create the configured backend.
pub fn create_service(config: &OctagnosisConfig) -> Result<Arc<dyn AttemptService>> {
    match &config.backend {
        BackendConfig::Http {
            base_url,
            timeout_secs,
        } => {
            let service = HttpAttemptService::new(base_url, *timeout_secs)?.with_result_retry(
                config.result_retries,
                Duration::from_millis(config.result_retry_delay_ms),
            );
            Ok(Arc::new(service))
        }
        BackendConfig::Offline { bank } => {
            let bank = parse_question_bank(bank)?;
            Ok(Arc::new(InMemoryBackend::new(&bank)))
        }
    }
}

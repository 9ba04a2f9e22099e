use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComparisonConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total token budget per request; the response allowance is derived
    /// from this minus the estimated prompt length.
    #[serde(default = "default_context_tokens")]
    pub context_tokens: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            context_tokens: default_context_tokens(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_context_tokens() -> usize {
    4096
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Number of most-recent reports retained; older reports are pruned
    /// after each insert.
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> i64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

fn default_access_ttl() -> i64 {
    15 * 60
}
fn default_refresh_ttl() -> i64 {
    30 * 24 * 3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    /// Directory scanned for uploaded PDFs when a compare request carries
    /// no inline documents.
    #[serde(default = "default_uploads_dir")]
    pub dir: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
        }
    }
}

fn default_uploads_dir() -> PathBuf {
    std::env::temp_dir().join("rankcentral_uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5003".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.reports.history_limit < 1 {
        anyhow::bail!("reports.history_limit must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.comparison.temperature) {
        anyhow::bail!("comparison.temperature must be in [0.0, 2.0]");
    }

    if config.comparison.context_tokens == 0 {
        anyhow::bail!("comparison.context_tokens must be > 0");
    }

    if config.auth.access_ttl_secs < 1 || config.auth.refresh_ttl_secs < 1 {
        anyhow::bail!("auth token lifetimes must be >= 1 second");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: Config = toml::from_str("[db]\npath = \"/tmp/rank.sqlite\"\n").unwrap();
        assert_eq!(config.comparison.model, "gpt-4.1-mini");
        assert_eq!(config.reports.history_limit, 3);
        assert_eq!(config.server.bind, "127.0.0.1:5003");
    }

    #[test]
    fn rejects_zero_history_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rankcentral.toml");
        std::fs::write(
            &path,
            "[db]\npath = \"/tmp/rank.sqlite\"\n[reports]\nhistory_limit = 0\n",
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }
}

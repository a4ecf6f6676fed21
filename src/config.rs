//! Application configuration module / 应用配置模块
//!
//! Manages configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SearchError};

/// Environment variable overriding `api.domain` / 覆盖API域名的环境变量
pub const API_DOMAIN_ENV: &str = "PANSOU_API_DOMAIN";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search API configuration / 搜索API配置
    #[serde(default)]
    pub api: ApiConfig,
    /// Backfill rounds configuration / 回填搜索配置
    #[serde(default)]
    pub search: SearchConfig,
    /// Health check configuration / 健康检查配置
    #[serde(default)]
    pub health: HealthConfig,
    /// Local settings store / 本地设置
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Search API configuration / 搜索API配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Domain or full base URL / 域名或完整地址
    pub domain: String,
    /// Per-request timeout (seconds) / 单次请求超时
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Total rounds including the first one / 总搜索轮数
    pub rounds: u32,
    /// Delay before each backfill round (milliseconds) / 回填间隔
    pub round_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Settings file path / 设置文件路径
    pub path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            domain: "104.194.69.89".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rounds: 4,
            round_delay_ms: 2000,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: "settings.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve the API base URL / 获取API基础地址
    ///
    /// A domain that already carries a scheme is used verbatim, a bare
    /// host gets `http://` and port 8888.
    pub fn api_base_url(&self) -> String {
        base_url_for(&self.api.domain)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn round_delay(&self) -> Duration {
        Duration::from_millis(self.search.round_delay_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health.interval_secs)
    }

    pub fn settings_path(&self) -> PathBuf {
        PathBuf::from(&self.settings.path)
    }

    /// Apply environment overrides / 应用环境变量覆盖
    pub fn apply_env(&mut self) {
        if let Ok(domain) = std::env::var(API_DOMAIN_ENV) {
            if !domain.trim().is_empty() {
                self.api.domain = domain.trim().to_string();
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.domain.trim().is_empty() {
            return Err(SearchError::Config("api.domain must not be empty".to_string()));
        }
        if self.search.rounds == 0 {
            return Err(SearchError::Config("search.rounds must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub fn base_url_for(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('/');
    if domain.starts_with("http") {
        domain.to_string()
    } else {
        format!("http://{}:8888", domain)
    }
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from the working directory / 加载配置文件
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&get_config_path())
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig> {
    let config = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| SearchError::Config(format!("Failed to parse config file: {}", e)))?;
        tracing::info!("Loaded configuration from {:?}", config_path);
        config
    } else {
        let config = AppConfig::default();
        save_config_to(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        config
    };

    config.validate()?;
    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config_to(config_path: &Path, config: &AppConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(config_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_rule() {
        assert_eq!(base_url_for("104.194.69.89"), "http://104.194.69.89:8888");
        assert_eq!(base_url_for("https://so.example.com/"), "https://so.example.com");
        assert_eq!(base_url_for("http://localhost:9000"), "http://localhost:9000");
    }

    #[test]
    fn test_first_run_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.search.rounds, 4);
        assert_eq!(config.round_delay(), Duration::from_millis(2000));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"search": {"rounds": 3, "round_delay_ms": 1500}}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.search.rounds, 3);
        assert_eq!(config.round_delay(), Duration::from_millis(1500));
        assert_eq!(config.health_interval(), Duration::from_secs(30));
        assert_eq!(config.api_base_url(), "http://104.194.69.89:8888");
    }

    #[test]
    fn test_partial_section_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"search": {"rounds": 3}, "api": {"timeout_secs": 5}}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.search.rounds, 3);
        assert_eq!(config.round_delay(), Duration::from_millis(2000));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.api.domain, "104.194.69.89");
    }

    #[test]
    fn test_rejects_zero_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"search": {"rounds": 0, "round_delay_ms": 0}}"#).unwrap();

        assert!(matches!(load_config_from(&path), Err(SearchError::Config(_))));
    }
}

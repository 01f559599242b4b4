use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_BUDGET_THRESHOLD_PERCENT, DEFAULT_CACHE_MAX_ENTRIES,
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PROJECT_ENDING_DAYS, DEFAULT_RATE_LIMIT_API_RPM,
    DEFAULT_RATE_LIMIT_AUTH_RPM, DEFAULT_RATE_LIMIT_FILES_RPM, DEFAULT_SWEEP_INTERVAL_HOURS,
    DEFAULT_TASK_DUE_DAYS, DEFAULT_TOKEN_TTL_HOURS,
};

// =============================================================================
// File Config Structs (JSON config file sections)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Authentication configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuthFileConfig {
    pub token_ttl_hours: Option<u32>,
}

/// Deadline sweep configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SweepFileConfig {
    pub enabled: Option<bool>,
    pub interval_hours: Option<u64>,
    pub task_due_days: Option<u32>,
    pub project_ending_days: Option<u32>,
    pub budget_threshold_percent: Option<u32>,
}

/// Rate limit configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RateLimitFileConfig {
    pub enabled: Option<bool>,
    pub per_ip: Option<bool>,
    pub api_rpm: Option<u32>,
    pub auth_rpm: Option<u32>,
    pub files_rpm: Option<u32>,
}

/// In-memory cache configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    pub max_entries: Option<u64>,
}

/// CORS configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CorsFileConfig {
    pub origins: Option<Vec<String>>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub auth: Option<AuthFileConfig>,
    pub sweep: Option<SweepFileConfig>,
    pub rate_limit: Option<RateLimitFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub cors: Option<CorsFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        if let Some(auth) = other.auth {
            let current = self.auth.get_or_insert_with(AuthFileConfig::default);
            if auth.token_ttl_hours.is_some() {
                tracing::trace!(token_ttl_hours = ?auth.token_ttl_hours, "Merging auth.token_ttl_hours");
                current.token_ttl_hours = auth.token_ttl_hours;
            }
        }

        if let Some(sweep) = other.sweep {
            let current = self.sweep.get_or_insert_with(SweepFileConfig::default);
            if sweep.enabled.is_some() {
                tracing::trace!(enabled = ?sweep.enabled, "Merging sweep.enabled");
                current.enabled = sweep.enabled;
            }
            if sweep.interval_hours.is_some() {
                tracing::trace!(interval_hours = ?sweep.interval_hours, "Merging sweep.interval_hours");
                current.interval_hours = sweep.interval_hours;
            }
            if sweep.task_due_days.is_some() {
                current.task_due_days = sweep.task_due_days;
            }
            if sweep.project_ending_days.is_some() {
                current.project_ending_days = sweep.project_ending_days;
            }
            if sweep.budget_threshold_percent.is_some() {
                current.budget_threshold_percent = sweep.budget_threshold_percent;
            }
        }

        if let Some(rate_limit) = other.rate_limit {
            let current = self
                .rate_limit
                .get_or_insert_with(RateLimitFileConfig::default);
            if rate_limit.enabled.is_some() {
                tracing::trace!(enabled = ?rate_limit.enabled, "Merging rate_limit.enabled");
                current.enabled = rate_limit.enabled;
            }
            if rate_limit.per_ip.is_some() {
                current.per_ip = rate_limit.per_ip;
            }
            if rate_limit.api_rpm.is_some() {
                current.api_rpm = rate_limit.api_rpm;
            }
            if rate_limit.auth_rpm.is_some() {
                current.auth_rpm = rate_limit.auth_rpm;
            }
            if rate_limit.files_rpm.is_some() {
                current.files_rpm = rate_limit.files_rpm;
            }
        }

        if let Some(cache) = other.cache
            && cache.max_entries.is_some()
        {
            tracing::trace!(max_entries = ?cache.max_entries, "Merging cache.max_entries");
            self.cache
                .get_or_insert_with(CacheFileConfig::default)
                .max_entries = cache.max_entries;
        }

        // Origins replace rather than append
        if let Some(cors) = other.cors
            && cors.origins.is_some()
        {
            tracing::trace!(origins = ?cors.origins, "Merging cors.origins");
            self.cors.get_or_insert_with(CorsFileConfig::default).origins = cors.origins;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_ttl_hours: u32,
}

/// Deadline and budget sweep configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub task_due_days: u32,
    pub project_ending_days: u32,
    pub budget_threshold_percent: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: DEFAULT_SWEEP_INTERVAL_HOURS,
            task_due_days: DEFAULT_TASK_DUE_DAYS,
            project_ending_days: DEFAULT_PROJECT_ENDING_DAYS,
            budget_threshold_percent: DEFAULT_BUDGET_THRESHOLD_PERCENT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Per-IP limiting for the API bucket. Auth endpoints are always per-IP.
    pub per_ip: bool,
    pub api_rpm: u32,
    pub auth_rpm: u32,
    pub files_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_ip: false,
            api_rpm: DEFAULT_RATE_LIMIT_API_RPM,
            auth_rpm: DEFAULT_RATE_LIMIT_AUTH_RPM,
            files_rpm: DEFAULT_RATE_LIMIT_FILES_RPM,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Origins allowed in addition to the server's own address
    pub origins: Vec<String>,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub sweep: SweepConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.projecthub/projecthub.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(file_config, cli);
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            token_ttl_hours = config.auth.token_ttl_hours,
            sweep_enabled = config.sweep.enabled,
            sweep_interval_hours = config.sweep.interval_hours,
            rate_limit_enabled = config.rate_limit.enabled,
            cache_max_entries = config.cache.max_entries,
            cors_origins = config.cors.origins.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer defaults, merged file config and CLI/env overrides
    fn from_layers(file_config: FileConfig, cli: &CliConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_auth = file_config.auth.unwrap_or_default();
        let file_sweep = file_config.sweep.unwrap_or_default();
        let file_rate_limit = file_config.rate_limit.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let file_cors = file_config.cors.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let token_ttl_hours = cli
            .token_ttl_hours
            .or(file_auth.token_ttl_hours)
            .unwrap_or(DEFAULT_TOKEN_TTL_HOURS);

        let defaults = SweepConfig::default();
        let sweep = SweepConfig {
            enabled: cli
                .sweep_enabled
                .or(file_sweep.enabled)
                .unwrap_or(defaults.enabled),
            interval_hours: cli
                .sweep_interval_hours
                .or(file_sweep.interval_hours)
                .unwrap_or(defaults.interval_hours),
            task_due_days: file_sweep.task_due_days.unwrap_or(defaults.task_due_days),
            project_ending_days: file_sweep
                .project_ending_days
                .unwrap_or(defaults.project_ending_days),
            budget_threshold_percent: file_sweep
                .budget_threshold_percent
                .unwrap_or(defaults.budget_threshold_percent),
        };

        let limits = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            enabled: cli
                .rate_limit_enabled
                .or(file_rate_limit.enabled)
                .unwrap_or(limits.enabled),
            per_ip: cli
                .rate_limit_per_ip
                .or(file_rate_limit.per_ip)
                .unwrap_or(limits.per_ip),
            api_rpm: cli
                .rate_limit_api_rpm
                .or(file_rate_limit.api_rpm)
                .unwrap_or(limits.api_rpm),
            auth_rpm: cli
                .rate_limit_auth_rpm
                .or(file_rate_limit.auth_rpm)
                .unwrap_or(limits.auth_rpm),
            files_rpm: cli
                .rate_limit_files_rpm
                .or(file_rate_limit.files_rpm)
                .unwrap_or(limits.files_rpm),
        };

        let cache = CacheConfig {
            max_entries: cli
                .cache_max_entries
                .or(file_cache.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
        };

        let cors = CorsConfig {
            origins: cli
                .cors_origins
                .clone()
                .or(file_cors.origins)
                .unwrap_or_default(),
        };

        Self {
            server: ServerConfig { host, port },
            auth: AuthConfig { token_ttl_hours },
            sweep,
            rate_limit,
            cache,
            cors,
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.auth.token_ttl_hours == 0 {
            anyhow::bail!("Configuration error: auth.token_ttl_hours must be greater than 0");
        }

        if self.sweep.enabled && self.sweep.interval_hours == 0 {
            anyhow::bail!("Configuration error: sweep.interval_hours must be greater than 0");
        }

        if self.sweep.budget_threshold_percent > 100 {
            anyhow::bail!(
                "Configuration error: sweep.budget_threshold_percent must be between 0 and 100 (got {})",
                self.sweep.budget_threshold_percent
            );
        }

        if self.cache.max_entries == 0 {
            anyhow::bail!("Configuration error: cache.max_entries must be greater than 0");
        }

        if self.rate_limit.enabled && self.rate_limit.api_rpm == 0 {
            tracing::warn!("rate_limit.api_rpm is 0, all API requests will be blocked");
        }

        if let Some(origin) = self
            .cors
            .origins
            .iter()
            .find(|o| !o.starts_with("http://") && !o.starts_with("https://"))
        {
            anyhow::bail!(
                "Configuration error: cors origin '{}' must start with http:// or https://",
                origin
            );
        }

        if is_all_interfaces(&self.server.host) {
            tracing::warn!(
                host = %self.server.host,
                "Binding to all network interfaces"
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.projecthub/projecthub.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered(json: &str, cli: CliConfig) -> AppConfig {
        let file_config: FileConfig = serde_json::from_str(json).unwrap();
        AppConfig::from_layers(file_config, &cli)
    }

    #[test]
    fn test_file_config_parse_sections() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8081 },
            "auth": { "token_ttl_hours": 12 },
            "sweep": { "enabled": false, "task_due_days": 5 },
            "cors": { "origins": ["https://app.example.com"] }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(server.port, Some(8081));
        assert_eq!(config.auth.as_ref().unwrap().token_ttl_hours, Some(12));
        assert_eq!(config.sweep.as_ref().unwrap().enabled, Some(false));
        assert_eq!(config.sweep.as_ref().unwrap().task_due_days, Some(5));
        assert!(config.rate_limit.is_none());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "server": { "host": "localhost" }, "databse": {} }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert!(config.extra.get("databse").is_some());
    }

    #[test]
    fn test_file_config_merge_overlay_wins() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{ "server": { "host": "base", "port": 1000 }, "sweep": { "interval_hours": 6 } }"#,
        )
        .unwrap();
        let overlay: FileConfig = serde_json::from_str(
            r#"{ "server": { "port": 2000 }, "sweep": { "enabled": false } }"#,
        )
        .unwrap();
        base.merge(overlay);

        let server = base.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("base"));
        assert_eq!(server.port, Some(2000));
        let sweep = base.sweep.unwrap();
        assert_eq!(sweep.interval_hours, Some(6));
        assert_eq!(sweep.enabled, Some(false));
    }

    #[test]
    fn test_defaults() {
        let config = layered("{}", CliConfig::default());
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert!(config.sweep.enabled);
        assert_eq!(config.sweep.interval_hours, 24);
        assert_eq!(config.sweep.task_due_days, 3);
        assert_eq!(config.sweep.project_ending_days, 7);
        assert_eq!(config.sweep.budget_threshold_percent, 20);
        assert!(config.rate_limit.enabled);
        assert!(config.cors.origins.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = CliConfig {
            host: Some("cli.host".to_string()),
            port: Some(3000),
            sweep_enabled: Some(true),
            token_ttl_hours: Some(2),
            ..Default::default()
        };
        let config = layered(
            r#"{ "server": { "port": 9000 }, "sweep": { "enabled": false }, "auth": { "token_ttl_hours": 48 } }"#,
            cli,
        );
        assert_eq!(config.server.host, "cli.host");
        assert_eq!(config.server.port, 3000);
        assert!(config.sweep.enabled);
        assert_eq!(config.auth.token_ttl_hours, 2);
    }

    #[test]
    fn test_validation_port_zero() {
        let config = layered(r#"{ "server": { "port": 0 } }"#, CliConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port must be greater than 0"));
    }

    #[test]
    fn test_validation_sweep_interval_zero() {
        let config = layered(r#"{ "sweep": { "interval_hours": 0 } }"#, CliConfig::default());
        assert!(config.validate().is_err());

        let disabled = layered(
            r#"{ "sweep": { "enabled": false, "interval_hours": 0 } }"#,
            CliConfig::default(),
        );
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_validation_threshold_over_100() {
        let config = layered(
            r#"{ "sweep": { "budget_threshold_percent": 120 } }"#,
            CliConfig::default(),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("budget_threshold_percent"));
    }

    #[test]
    fn test_validation_bad_origin() {
        let config = layered(
            r#"{ "cors": { "origins": ["example.com"] } }"#,
            CliConfig::default(),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/projecthub.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{ "server": { "port": 7070 } }"#).unwrap();

        let cli = CliConfig {
            config: Some(path),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 7070);
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}

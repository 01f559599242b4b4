use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CACHE_MAX_ENTRIES, ENV_CONFIG, ENV_CORS_ORIGINS, ENV_HOST, ENV_PORT,
    ENV_RATE_LIMIT_API_RPM, ENV_RATE_LIMIT_AUTH_RPM, ENV_RATE_LIMIT_ENABLED,
    ENV_RATE_LIMIT_FILES_RPM, ENV_RATE_LIMIT_PER_IP, ENV_SWEEP_ENABLED, ENV_SWEEP_INTERVAL_HOURS,
    ENV_TOKEN_TTL_HOURS,
};

#[derive(Parser)]
#[command(name = "projecthub")]
#[command(version, about = "Project management API server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Session token lifetime in hours
    #[arg(long, global = true, env = ENV_TOKEN_TTL_HOURS)]
    pub token_ttl_hours: Option<u32>,

    /// Enable or disable the scheduled deadline sweep
    #[arg(long, global = true, env = ENV_SWEEP_ENABLED)]
    pub sweep_enabled: Option<bool>,

    /// Hours between deadline sweeps
    #[arg(long, global = true, env = ENV_SWEEP_INTERVAL_HOURS)]
    pub sweep_interval_hours: Option<u64>,

    /// Maximum number of cache entries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    // Rate limit options
    /// Enable or disable rate limiting
    #[arg(long, global = true, env = ENV_RATE_LIMIT_ENABLED)]
    pub rate_limit_enabled: Option<bool>,

    /// Enable per-IP rate limiting for the API bucket
    #[arg(long, global = true, env = ENV_RATE_LIMIT_PER_IP)]
    pub rate_limit_per_ip: Option<bool>,

    /// API rate limit (requests per minute)
    #[arg(long, global = true, env = ENV_RATE_LIMIT_API_RPM)]
    pub rate_limit_api_rpm: Option<u32>,

    /// Auth rate limit (requests per minute)
    #[arg(long, global = true, env = ENV_RATE_LIMIT_AUTH_RPM)]
    pub rate_limit_auth_rpm: Option<u32>,

    /// Files rate limit (requests per minute)
    #[arg(long, global = true, env = ENV_RATE_LIMIT_FILES_RPM)]
    pub rate_limit_files_rpm: Option<u32>,

    /// Additional allowed CORS origins (comma-separated)
    #[arg(long, global = true, env = ENV_CORS_ORIGINS, value_delimiter = ',', value_parser = parse_origin)]
    pub cors_origins: Option<Vec<String>>,
}

/// Parse a CORS origin from CLI/env string
fn parse_origin(s: &str) -> Result<String, String> {
    let origin = s.trim().trim_end_matches('/');
    if origin.starts_with("http://") || origin.starts_with("https://") {
        Ok(origin.to_string())
    } else {
        Err(format!(
            "Invalid origin '{}'. Origins must start with http:// or https://",
            s
        ))
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Run the deadline and budget sweep once and exit
    Sweep,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete local data directory (database, files, keys). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub token_ttl_hours: Option<u32>,
    pub sweep_enabled: Option<bool>,
    pub sweep_interval_hours: Option<u64>,
    pub cache_max_entries: Option<u64>,
    pub rate_limit_enabled: Option<bool>,
    pub rate_limit_per_ip: Option<bool>,
    pub rate_limit_api_rpm: Option<u32>,
    pub rate_limit_auth_rpm: Option<u32>,
    pub rate_limit_files_rpm: Option<u32>,
    pub cors_origins: Option<Vec<String>>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        token_ttl_hours: cli.token_ttl_hours,
        sweep_enabled: cli.sweep_enabled,
        sweep_interval_hours: cli.sweep_interval_hours,
        cache_max_entries: cli.cache_max_entries,
        rate_limit_enabled: cli.rate_limit_enabled,
        rate_limit_per_ip: cli.rate_limit_per_ip,
        rate_limit_api_rpm: cli.rate_limit_api_rpm,
        rate_limit_auth_rpm: cli.rate_limit_auth_rpm,
        rate_limit_files_rpm: cli.rate_limit_files_rpm,
        cors_origins: cli.cors_origins,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origin() {
        assert_eq!(
            parse_origin("https://app.example.com/").unwrap(),
            "https://app.example.com"
        );
        assert!(parse_origin("app.example.com").is_err());
    }

    #[test]
    fn test_cli_sweep_subcommand() {
        let cli = Cli::try_parse_from(["projecthub", "sweep", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Sweep)));
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn test_cli_prune_flags() {
        let cli = Cli::try_parse_from(["projecthub", "system", "prune", "-y"]).unwrap();
        match cli.command {
            Some(Commands::System {
                command: SystemCommands::Prune { yes },
            }) => assert!(yes),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}

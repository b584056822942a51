//! Configuration management for pg-introspect-api.
//!
//! This module handles loading, merging, and validating configuration from files,
//! environment variables and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::fs;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_BODY_LIMIT_KB: usize = 100;

/// Database connection and pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host (default: postgres)
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Database port (default: 5432)
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name (default: devdb)
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Database user (default: devuser)
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Database password (default: devpass). Never written back out.
    #[serde(default = "default_db_password", skip_serializing)]
    pub password: String,

    /// Upper bound on pooled connections; further checkouts queue (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a checkout may wait for a free connection (default: 30000)
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_db_host() -> String {
    "postgres".into()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_name() -> String {
    "devdb".into()
}
fn default_db_user() -> String {
    "devuser".into()
}
fn default_db_password() -> String {
    "devpass".into()
}
fn default_max_connections() -> u32 {
    10
}
fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: default_db_password(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Builds sqlx connect options from the configured fields.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
            .application_name(env!("CARGO_PKG_NAME"))
    }
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    /// Maximum accepted request body size in KB
    #[serde(alias = "body-limit-kb")]
    pub body_limit_kb: Option<usize>,

    /// Pool occupancy sampling interval
    #[serde(alias = "sample-interval-ms")]
    pub sample_interval_ms: Option<u64>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            body_limit_kb: Some(DEFAULT_BODY_LIMIT_KB),
            sample_interval_ms: Some(DEFAULT_SAMPLE_INTERVAL_MS),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            database: DatabaseConfig::default(),
        }
    }
}

/// Socket address the server listens on; `bind` may be IPv4 or IPv6.
pub fn listen_addr(cfg: &Config) -> Result<SocketAddr, AddrParseError> {
    let ip: IpAddr = cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).parse()?;
    Ok(SocketAddr::new(ip, cfg.port.unwrap_or(DEFAULT_PORT)))
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.port == Some(0) {
        return Err("port must be between 1 and 65535".into());
    }

    if let Err(e) = listen_addr(cfg) {
        return Err(format!("bind must be an IPv4 or IPv6 address: {}", e).into());
    }

    if cfg.sample_interval_ms == Some(0) {
        return Err("sample_interval_ms must be greater than 0".into());
    }

    let db = &cfg.database;
    if db.host.trim().is_empty() {
        return Err("database.host must not be empty".into());
    }
    if db.name.trim().is_empty() {
        return Err("database.name must not be empty".into());
    }
    if db.user.trim().is_empty() {
        return Err("database.user must not be empty".into());
    }
    if db.port == 0 {
        return Err("database.port must be between 1 and 65535".into());
    }
    if db.max_connections == 0 {
        return Err("database.max_connections must be at least 1".into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

/// Checks that a TLS file exists, is readable and is not empty.
fn check_pem_file(path: &str, kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(format!("TLS {} file not found: {}", kind, path).into());
    }
    match fs::metadata(p) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, environment, config file, and defaults.
/// This enforces precedence: CLI > environment > config file > default.
/// Environment variables reach this function through clap's `env` fallbacks.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(interval) = args.sample_interval_ms {
        config.sample_interval_ms = Some(interval);
    }

    // Database settings
    if let Some(host) = &args.pg_host {
        config.database.host = host.clone();
    }
    if let Some(port) = args.pg_port {
        config.database.port = port;
    }
    if let Some(name) = &args.pg_database {
        config.database.name = name.clone();
    }
    if let Some(user) = &args.pg_user {
        config.database.user = user.clone();
    }
    if let Some(password) = &args.pg_password {
        config.database.password = password.clone();
    }
    if let Some(max) = args.max_connections {
        config.database.max_connections = max;
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, trying the default locations when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/pg-introspect-api/config.yaml",
                "/etc/pg-introspect-api/config.yml",
                "/etc/pg-introspect-api/config.json",
                "./pg-introspect-api.yaml",
                "./pg-introspect-api.yml",
                "./pg-introspect-api.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text; the extension picks the format and YAML is the default.
fn parse_config(content: &str, extension: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.port, Some(3000));
        assert_eq!(cfg.sample_interval_ms, Some(5000));
        assert_eq!(cfg.database.host, "postgres");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.database.name, "devdb");
        assert_eq!(cfg.database.user, "devuser");
        assert_eq!(cfg.database.password, "devpass");
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn cli_overrides_file_and_defaults() {
        let args = Args::try_parse_from([
            "pg-introspect-api",
            "--no-config",
            "--port",
            "8081",
            "--pg-host",
            "db.example",
            "--pg-database",
            "analytics",
            "--max-connections",
            "4",
        ])
        .unwrap();

        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.port, Some(8081));
        assert_eq!(cfg.database.host, "db.example");
        assert_eq!(cfg.database.name, "analytics");
        assert_eq!(cfg.database.max_connections, 4);
    }

    #[test]
    fn partial_yaml_keeps_database_defaults() {
        let cfg = parse_config("port: 9000\ndatabase:\n  host: pg-1\n", Some("yaml")).unwrap();
        assert_eq!(cfg.port, Some(9000));
        assert_eq!(cfg.database.host, "pg-1");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.database.user, "devuser");
    }

    #[test]
    fn json_and_toml_are_accepted() {
        let json = parse_config(r#"{"port": 3100, "database": {"name": "x"}}"#, Some("json")).unwrap();
        assert_eq!(json.port, Some(3100));
        assert_eq!(json.database.name, "x");

        let toml = parse_config("port = 3200\n[database]\nuser = \"ro\"\n", Some("toml")).unwrap();
        assert_eq!(toml.port, Some(3200));
        assert_eq!(toml.database.user, "ro");
    }

    #[test]
    fn password_is_never_rendered() {
        let mut cfg = Config::default();
        cfg.database.password = "s3cret-value".into();

        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let out = render_config(&cfg, &format).unwrap();
            assert!(!out.contains("s3cret-value"));
            assert!(out.contains("devuser"));
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = Config::default();
        cfg.sample_interval_ms = Some(0);
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.database.max_connections = 0;
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.database.host = "  ".into();
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn listen_addr_accepts_ipv4_and_ipv6() {
        let cfg = Config::default();
        assert_eq!(listen_addr(&cfg).unwrap(), "0.0.0.0:3000".parse().unwrap());

        let cfg = parse_config("bind: \"::\"\nport: 8080\n", Some("yaml")).unwrap();
        assert_eq!(listen_addr(&cfg).unwrap(), "[::]:8080".parse().unwrap());
        assert!(validate_effective_config(&cfg).is_ok());

        let mut cfg = Config::default();
        cfg.bind = Some("localhost".into());
        assert!(listen_addr(&cfg).is_err());
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn tls_requires_both_paths() {
        let mut cfg = Config::default();
        cfg.enable_tls = Some(true);
        cfg.tls_cert_path = Some("/nonexistent/cert.pem".into());
        let err = validate_effective_config(&cfg).unwrap_err().to_string();
        assert_eq!(err, "TLS is enabled but tls_key_path is not set");
    }

    #[test]
    fn connect_options_carry_settings() {
        let mut db = DatabaseConfig::default();
        db.host = "10.0.0.5".into();
        db.port = 6000;
        let opts = db.connect_options();
        assert_eq!(opts.get_host(), "10.0.0.5");
        assert_eq!(opts.get_port(), 6000);
        assert_eq!(opts.get_database(), Some("devdb"));
        assert_eq!(opts.get_username(), "devuser");
    }
}

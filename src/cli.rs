//! CLI arguments and subcommands for pg-introspect-api.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands. Database connection flags fall
//! back to the standard libpq environment variables (`PGHOST`, `PGPORT`, ...).

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "pg-introspect-api",
    about = "PostgreSQL introspection API with Prometheus metrics",
    long_about = "PostgreSQL introspection API with Prometheus metrics.\n\n\
                  Serves read-only database introspection endpoints (server time, \
                  public tables, table statistics, pool occupancy) and exposes request \
                  and query latency histograms plus pool gauges on /metrics.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Database host
    #[arg(long, env = "PGHOST")]
    pub pg_host: Option<String>,

    /// Database port
    #[arg(long, env = "PGPORT")]
    pub pg_port: Option<u16>,

    /// Database name
    #[arg(long, env = "PGDATABASE")]
    pub pg_database: Option<String>,

    /// Database user
    #[arg(long, env = "PGUSER")]
    pub pg_user: Option<String>,

    /// Database password
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    pub pg_password: Option<String>,

    /// Maximum number of pooled database connections
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Interval between pool occupancy samples in milliseconds
    #[arg(long)]
    pub sample_interval_ms: Option<u64>,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and database connectivity
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_parse() {
        let args = Args::try_parse_from([
            "pg-introspect-api",
            "-p",
            "8080",
            "--pg-host",
            "db.internal",
            "--pg-port",
            "6543",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.port, Some(8080));
        assert_eq!(args.pg_host.as_deref(), Some("db.internal"));
        assert_eq!(args.pg_port, Some(6543));
        assert_eq!(args.log_level, LogLevel::Debug);
        assert!(args.command.is_none());
    }

    #[test]
    fn config_subcommand_parses() {
        let args =
            Args::try_parse_from(["pg-introspect-api", "config", "-o", "-", "--commented"]).unwrap();

        match args.command {
            Some(Commands::Config {
                output, commented, ..
            }) => {
                assert_eq!(output, Some(PathBuf::from("-")));
                assert!(commented);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Args::try_parse_from(["pg-introspect-api", "--port", "70000"]).is_err());
    }
}

//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("pg-introspect-api.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# pg-introspect-api Configuration
# ================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 3000                   # HTTP port
# body_limit_kb: 100           # Maximum request body size
# sample_interval_ms: 5000     # Pool gauge sampling interval
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
#
# Database
# --------
# Every value can be overridden by PGHOST, PGPORT, PGDATABASE, PGUSER
# and PGPASSWORD, or by the matching --pg-* flag.
#
# database:
#   host: postgres
#   port: 5432
#   name: devdb
#   user: devuser
#   password: devpass          # Not written out; set it here or via PGPASSWORD
#   max_connections: 10        # Further checkouts queue
#   acquire_timeout_ms: 30000  # Checkout wait bound (not a query timeout)
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_commented_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated.yaml");

        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# pg-introspect-api Configuration"));
        let parsed: Config = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed.port, Some(3000));
        assert_eq!(parsed.database.password, "devpass");
    }
}

//! Check command implementation.
//!
//! Validates the configuration and checks the database through the pool adapter.

use crate::config::{validate_effective_config, Config};
use crate::db::DbPool;
use crate::handlers::database::TIMESTAMP_SQL;

/// Validates configuration and database connectivity.
pub async fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 pg-introspect-api - System Check");
    println!("===================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    let db = &config.database;
    println!(
        "\n🐘 Checking database {}@{}:{}/{} ...",
        db.user, db.host, db.port, db.name
    );
    let pool = DbPool::connect_lazy(db);
    match pool.query(TIMESTAMP_SQL).await {
        Ok(rows) => {
            let now = rows
                .first()
                .and_then(|row| row.get("now"))
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<no rows>".into());
            println!("   ✅ Connected, server time {}", now);
        }
        Err(e) => {
            println!("   ❌ Query failed: {}", e);
            all_ok = false;
        }
    }

    let stats = pool.stats();
    println!(
        "   ℹ️  Pool: total={} idle={} waiting={}",
        stats.total, stats.idle, stats.waiting
    );
    pool.close().await;

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - service is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        std::process::exit(1);
    }
}

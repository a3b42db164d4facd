//! Configuration inspection command.

use anyhow::{Context, Result};
use nodewarden_config::NodewardenConfig;

/// Shows the effective configuration, loaded from the same hierarchy the
/// coordinator itself uses.
pub fn show(format: &str) -> Result<()> {
    let config = NodewardenConfig::load().context("failed to load configuration")?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        "toml" => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        _ => {
            println!("nodewarden configuration");
            println!("=========================\n");

            println!("Node:");
            if config.is_standalone() {
                println!("  Name: (standalone)");
            } else {
                println!("  Name: {}", config.node.name);
            }
            println!();

            println!("Server:");
            match config.server.parse_address() {
                Ok(addr) => println!("  Address: {addr}"),
                Err(e) => println!("  Address: <invalid: {e}>"),
            }
            println!();

            println!("HA:");
            println!("  Failover delay: {}s", config.ha.failover_delay_secs);
            println!("  Audit log enabled: {}", config.ha.auditlog_enabled);
            println!();

            println!("Log:");
            println!("  Level: {}", config.log.level);
        }
    }

    Ok(())
}

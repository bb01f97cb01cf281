//! Configuration view and validation commands: `forest config`.

use anyhow::Result;
use std::path::Path;

use forest::config::{ForestConfig, ForestToml};

use super::super::ConfigCommands;

pub fn cmd_config(
    project_dir: &Path,
    config: &ForestConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Forest Configuration");
            println!("====================");
            println!();

            match &config.source {
                Some(path) => println!("Config file: {}", path.display()),
                None => {
                    println!("No forest.toml found. Using default configuration.");
                    println!("Run 'forest config init' to create one.");
                }
            }
            println!();

            let toml = &config.toml;
            println!("[server]");
            println!("  host = \"{}\"", toml.server.host);
            println!(
                "  token = {}",
                if toml.server.token.is_some() { "\"***\"" } else { "(unset)" }
            );
            println!("  websocket_path = \"{}\"", toml.server.websocket_path);
            println!();
            println!("[timeouts]");
            println!("  request_secs = {}", toml.timeouts.request_secs);
            println!("  reconnect_delay_secs = {}", toml.timeouts.reconnect_delay_secs);
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  http = \"{}\"", config.http_base_url());
            println!("  websocket = \"{}\"", config.websocket_url());
            println!("  token = {}", if config.token().is_some() { "set" } else { "unset" });
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let config_path = ForestConfig::default_path(project_dir);
            if config_path.exists() {
                println!("forest.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            ForestToml::default().save(&config_path)?;

            println!("Created forest.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, token, websocket_path");
            println!("  - [timeouts] request_secs, reconnect_delay_secs");
            println!();
        }
    }

    Ok(())
}

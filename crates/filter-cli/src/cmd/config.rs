use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use filter_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration with resolved directories
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let dirs = [
        ("workspaces", config.workspaces_dir(root)?),
        ("projects", config.projects_dir(root)?),
        ("templates", config.templates_dir(root)?),
        ("kanban", config.kanban_dir(root)?),
    ];

    if json {
        let resolved: serde_json::Map<String, serde_json::Value> = dirs
            .iter()
            .map(|(k, v)| (k.to_string(), v.display().to_string().into()))
            .collect();
        print_json(&serde_json::json!({
            "root": root,
            "config": config,
            "resolved": resolved,
        }))?;
        return Ok(());
    }

    println!("root: {}", root.display());
    for (label, dir) in &dirs {
        println!("{label:<11} {}", dir.display());
    }
    println!(
        "ports:      app {} | postgres {} | jupyter {} (scan {})",
        config.ports.app, config.ports.postgres, config.ports.jupyter, config.ports.max_attempts
    );
    println!("exec:       {}", config.exec_service);
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate(root);

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

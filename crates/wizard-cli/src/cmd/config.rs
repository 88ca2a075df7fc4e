use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use wizard_core::config::{Config, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    println!("api.base_url:              {}", config.api.base_url);
    println!(
        "api.token_env:             {} ({})",
        config.api.token_env,
        if config.api.token().is_some() { "set" } else { "unset" }
    );
    println!(
        "storage.quota_bytes:       {}",
        config
            .storage
            .quota_bytes
            .map_or_else(|| "unbounded".to_string(), |b| b.to_string())
    );
    println!("storage.history_keep:      {}", config.storage.history_keep);
    println!("reveal.mode:               {}", config.reveal.mode);
    println!("reveal.min_chunk_length:   {}", config.reveal.min_chunk_length);
    println!("reveal.stagger_ms:         {}", config.reveal.stagger_ms);
    println!("reveal.typewriter_tick_ms: {}", config.reveal.typewriter_tick_ms);
    Ok(())
}

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

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

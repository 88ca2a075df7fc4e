use anyhow::Context;
use std::path::Path;
use wizard_core::{config::Config, paths};

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing wizard in: {}", root.display());

    for dir in [paths::wizard_dir(root), paths::store_dir(root)] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::new()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    println!("\nNext: wizard workspace use <id>");
    Ok(())
}

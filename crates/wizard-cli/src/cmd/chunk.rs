use crate::cmd::read_text;
use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use wizard_core::chunk::chunk_text;
use wizard_core::config::Config;

pub fn run(root: &Path, file: &Path, min: Option<usize>, json: bool) -> anyhow::Result<()> {
    let min = match min {
        Some(n) => n,
        None => {
            Config::load(root)
                .context("failed to load config")?
                .reveal
                .min_chunk_length
        }
    };
    let text = read_text(file)?;
    let chunks = chunk_text(&text, min);

    if json {
        return print_json(&chunks);
    }
    for (i, chunk) in chunks.iter().enumerate() {
        println!("[{}] ({} chars)", i + 1, chunk.chars().count());
        println!("{chunk}");
        println!();
    }
    Ok(())
}

use crate::cmd::{read_text, runtime};
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use wizard_core::config::Config;
use wizard_core::reveal::{RevealMode, Revealer};

pub fn run(
    root: &Path,
    file: &Path,
    mode: Option<RevealMode>,
    min: Option<usize>,
    stagger_ms: Option<u64>,
) -> anyhow::Result<()> {
    let mut opts = Config::load(root).context("failed to load config")?.reveal;
    if let Some(mode) = mode {
        opts.mode = mode;
    }
    if let Some(min) = min {
        opts.min_chunk_length = min;
    }
    if let Some(ms) = stagger_ms {
        opts.stagger_ms = ms;
    }

    let text = read_text(file)?;
    let key = file.display().to_string();

    runtime()?.block_on(async move {
        let mut revealer = Revealer::new();
        let mut rx = revealer.subscribe();
        revealer.show(&key, &text, opts, || {});

        let mut out = std::io::stdout().lock();
        let mut printed = String::new();
        loop {
            let snap = rx.borrow_and_update().clone();
            let visible = snap.visible_text();
            match visible.strip_prefix(printed.as_str()) {
                Some(delta) => out.write_all(delta.as_bytes())?,
                None => write!(out, "\n{visible}")?,
            }
            out.flush()?;
            printed = visible;
            if snap.done || rx.changed().await.is_err() {
                break;
            }
        }
        writeln!(out)?;
        Ok::<_, anyhow::Error>(())
    })
}

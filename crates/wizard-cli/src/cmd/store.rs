use crate::cmd::Context;
use crate::output::print_json;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum StoreSubcommand {
    /// List persisted keys
    Keys,

    /// Delete a workspace's persisted sessions and drafts
    Clear {
        /// Workspace id to clear
        #[arg(required_unless_present = "all")]
        workspace: Option<String>,

        /// Delete everything, including the active workspace selection
        #[arg(long, conflicts_with = "workspace")]
        all: bool,
    },
}

pub fn run(root: &Path, subcmd: StoreSubcommand, json: bool) -> anyhow::Result<()> {
    let ctx = Context::load(root)?;
    match subcmd {
        StoreSubcommand::Keys => {
            let keys = ctx.registry.kv().keys();
            if json {
                print_json(&keys)?;
            } else if keys.is_empty() {
                println!("(empty)");
            } else {
                for key in keys {
                    println!("{key}");
                }
            }
        }
        StoreSubcommand::Clear { all: true, .. } => {
            ctx.registry.clear_all();
            println!("Cleared all local state.");
        }
        StoreSubcommand::Clear {
            workspace: Some(id),
            ..
        } => {
            // Load the selection first so clearing the active workspace also
            // forgets it.
            ctx.registry.bootstrap();
            ctx.registry.clear_store(&id);
            println!("Cleared workspace '{id}'.");
        }
        StoreSubcommand::Clear { workspace: None, .. } => {
            anyhow::bail!("specify a workspace id or --all");
        }
    }
    Ok(())
}

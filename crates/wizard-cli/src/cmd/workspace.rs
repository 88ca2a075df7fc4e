use crate::cmd::Context;
use crate::output::print_json;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum WorkspaceSubcommand {
    /// Make <id> the active workspace
    Use { id: String },

    /// Show the active workspace
    Show,
}

pub fn run(root: &Path, subcmd: WorkspaceSubcommand, json: bool) -> anyhow::Result<()> {
    let ctx = Context::load(root)?;
    match subcmd {
        WorkspaceSubcommand::Use { id } => {
            let store = ctx.registry.switch_to(&id)?;
            if json {
                print_json(&serde_json::json!({ "workspace": store.workspace_id() }))?;
            } else {
                println!("Active workspace: {}", store.workspace_id());
            }
        }
        WorkspaceSubcommand::Show => {
            let active = ctx.registry.bootstrap();
            let id = active.as_ref().map(|s| s.workspace_id());
            if json {
                print_json(&serde_json::json!({ "workspace": id }))?;
            } else {
                println!("Active workspace: {}", id.unwrap_or("(none)"));
            }
        }
    }
    Ok(())
}

use crate::cmd::{runtime, Context};
use crate::output::{print_json, print_table, truncate};
use anyhow::Context as _;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wizard_client::HttpSessionApi;
use wizard_core::export::{self, ExportedDocument};
use wizard_core::fields::{self, FieldKind, FieldSpec};
use wizard_core::session::{FieldValue, WizardSession};
use wizard_core::step::{StepController, StepState, SubmitOutcome};
use wizard_core::workspace::WorkspaceStore;
use wizard_core::flow::{resume_or_start, start};
use wizard_core::{io, FlowKind, WizardError};

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// Resume the server session for a flow, or start one
    Start {
        #[arg(long)]
        flow: FlowKind,
        /// Always start a new session
        #[arg(long)]
        fresh: bool,
    },

    /// Show step progress and the next question
    Show {
        #[arg(long)]
        flow: FlowKind,
    },

    /// Answer the current question (or --field) of the current step
    Answer {
        #[arg(long)]
        flow: FlowKind,
        /// Field key within the current step
        #[arg(long)]
        field: Option<String>,
        /// Answer text; selection fields take comma-separated ids
        #[arg(required = true, num_args = 1..)]
        value: Vec<String>,
    },

    /// Export the flow document as PDF
    Export {
        #[arg(long)]
        flow: FlowKind,
        /// Output path (default: <flow>-<session>.pdf in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    let ctx = Context::load(root)?;
    let store = ctx.active_store()?;
    let api = Arc::new(HttpSessionApi::from_config(&ctx.config.api));
    let rt = runtime()?;

    match subcmd {
        SessionSubcommand::Start { flow, fresh } => {
            let session = rt.block_on(async {
                if fresh {
                    start(api.as_ref(), &store, flow).await
                } else {
                    resume_or_start(api.as_ref(), &store, flow).await
                }
            })?;
            if json {
                print_json(&session)?;
            } else {
                println!(
                    "{} session {} at step {}/{}",
                    flow.title(),
                    session.id,
                    session.current_step.min(fields::step_count(flow)),
                    fields::step_count(flow)
                );
                if let Some(q) = next_question(&store, flow, &session, &api)? {
                    println!("Next: [{}] {}", q.key, q.prompt);
                }
            }
        }
        SessionSubcommand::Show { flow } => show(&store, flow, &api, json)?,
        SessionSubcommand::Answer { flow, field, value } => {
            answer(&rt, &store, flow, api, field.as_deref(), value, json)?
        }
        SessionSubcommand::Export { flow, out } => {
            let session = require_session(&store, flow)?;
            let sections = export::sections_from_session(&session);
            let doc = rt.block_on(export::export_document(
                api.as_ref(),
                flow,
                &session.id,
                &sections,
            ))?;
            let path = out.unwrap_or_else(|| {
                PathBuf::from(ExportedDocument::file_name(flow, &session.id))
            });
            io::atomic_write(&path, &doc.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if json {
                print_json(&serde_json::json!({
                    "path": path,
                    "source": doc.source.to_string(),
                    "bytes": doc.bytes.len(),
                }))?;
            } else {
                println!("Exported {} ({} source) to {}", flow.title(), doc.source, path.display());
            }
        }
    }
    Ok(())
}

fn require_session(store: &WorkspaceStore, flow: FlowKind) -> anyhow::Result<WizardSession> {
    store
        .session(flow)
        .ok_or(WizardError::NoSession(flow))
        .with_context(|| format!("run 'wizard session start --flow {flow}' first"))
}

/// The open question of the session's current step, if the flow is not done.
fn next_question(
    store: &Arc<WorkspaceStore>,
    flow: FlowKind,
    session: &WizardSession,
    api: &Arc<HttpSessionApi>,
) -> anyhow::Result<Option<&'static FieldSpec>> {
    if session.current_step > fields::step_count(flow) {
        return Ok(None);
    }
    let ctrl = StepController::new(flow, session.current_step, Arc::clone(store), Arc::clone(api))?;
    Ok(ctrl.current_question())
}

fn show(
    store: &Arc<WorkspaceStore>,
    flow: FlowKind,
    api: &Arc<HttpSessionApi>,
    json: bool,
) -> anyhow::Result<()> {
    let session = require_session(store, flow)?;
    let mut steps = Vec::new();
    for step in 1..=fields::step_count(flow) {
        let ctrl = StepController::new(flow, step, Arc::clone(store), Arc::clone(api))?;
        let (state, question) = match ctrl.state() {
            StepState::Locked => ("locked", None),
            StepState::Awaiting { question } => ("awaiting", question),
            StepState::Submitting => ("submitting", None),
            StepState::Completed => ("completed", None),
        };
        steps.push((step, state, question, store.drafts_for_step(flow, step)));
    }

    if json {
        let steps: Vec<_> = steps
            .iter()
            .map(|(step, state, question, drafts)| {
                serde_json::json!({
                    "step": step,
                    "state": state,
                    "question": question,
                    "drafts": drafts,
                })
            })
            .collect();
        return print_json(&serde_json::json!({ "session": session, "steps": steps }));
    }

    println!("{} session {}", flow.title(), session.id);
    if !session.next_action.as_str().is_empty() {
        println!("next_action: {}", session.next_action.as_str());
    }
    println!();
    let rows = steps
        .iter()
        .map(|(step, state, question, drafts)| {
            vec![
                step.to_string(),
                state.to_string(),
                question.map_or_else(String::new, |q| truncate(q.prompt, 60)),
                if drafts.is_empty() {
                    String::new()
                } else {
                    drafts.keys().cloned().collect::<Vec<_>>().join(", ")
                },
            ]
        })
        .collect();
    print_table(&["STEP", "STATE", "QUESTION", "DRAFTS"], rows);
    Ok(())
}

fn answer(
    rt: &tokio::runtime::Runtime,
    store: &Arc<WorkspaceStore>,
    flow: FlowKind,
    api: Arc<HttpSessionApi>,
    field: Option<&str>,
    words: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let session = require_session(store, flow)?;
    if session.current_step > fields::step_count(flow) {
        anyhow::bail!("{} is already complete", flow.title());
    }
    let ctrl = StepController::new(flow, session.current_step, Arc::clone(store), api)?;

    let spec = match field {
        Some(key) => fields::field(flow, key)
            .with_context(|| format!("unknown field '{key}' for {flow}"))?,
        None => ctrl
            .current_question()
            .context("no open question in the current step")?,
    };
    if spec.step != session.current_step {
        anyhow::bail!(
            "'{}' belongs to step {}, but the session is at step {}",
            spec.key,
            spec.step,
            session.current_step
        );
    }
    let value = parse_value(spec, &words);
    ctrl.set_draft(spec.key, value.clone());

    let outcome = rt.block_on(ctrl.submit_field(spec.key, value));
    report(&outcome, json)
}

fn parse_value(spec: &FieldSpec, words: &[String]) -> FieldValue {
    match spec.kind {
        FieldKind::Selection => FieldValue::Selection(
            words
                .iter()
                .flat_map(|w| w.split(','))
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect(),
        ),
        FieldKind::Text => FieldValue::text(words.join(" ")),
    }
}

fn report(outcome: &SubmitOutcome, json: bool) -> anyhow::Result<()> {
    match outcome {
        SubmitOutcome::Completed {
            current_step,
            message,
            progress,
            sections,
        } => {
            if json {
                print_json(&serde_json::json!({
                    "outcome": "completed",
                    "current_step": current_step,
                    "message": message,
                    "progress": progress,
                    "sections": sections,
                }))?;
            } else {
                if let Some(m) = message {
                    println!("{m}");
                }
                match progress {
                    Some(p) => println!(
                        "Step complete ({}/{} steps).",
                        p.completed_steps, p.total_steps
                    ),
                    None => println!("Step complete. Now at step {current_step}."),
                }
                for s in sections {
                    println!("\n## {}\n{}", s.title, s.body);
                }
            }
        }
        SubmitOutcome::NextQuestion { question, message } => {
            if json {
                print_json(&serde_json::json!({
                    "outcome": "next_question",
                    "question": question,
                    "message": message,
                }))?;
            } else {
                if let Some(m) = message {
                    println!("{m}");
                }
                println!("Next: [{}] {}", question.key, question.prompt);
            }
        }
        SubmitOutcome::AlreadyCompleted {
            current_step,
            notice,
        } => {
            if json {
                print_json(&serde_json::json!({
                    "outcome": "already_completed",
                    "current_step": current_step,
                    "notice": notice,
                }))?;
            } else {
                println!("{notice}");
            }
        }
        SubmitOutcome::Rejected(err) => anyhow::bail!("{}: {}", err.field, err.message),
        SubmitOutcome::Busy => anyhow::bail!("a submission for this step is already in flight"),
        SubmitOutcome::Failed { message, retryable } => {
            if *retryable {
                anyhow::bail!("{message} (answer kept as draft; retry later)");
            }
            anyhow::bail!("{message}");
        }
        SubmitOutcome::Blocked { message } => anyhow::bail!("{message}"),
    }
    Ok(())
}

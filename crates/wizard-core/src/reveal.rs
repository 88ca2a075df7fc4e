//! Progressive reveal of a chunked message.
//!
//! [`reveal_plan`] turns chunks and options into a pure schedule of frames.
//! [`Revealer`] plays one schedule at a time on the tokio timer and
//! publishes each step through a `watch` channel.
//!
//! Every run carries a generation number. A new `show`, `cancel` or drop
//! aborts the previous task, and a frame is only published while the
//! snapshot still belongs to the run that scheduled it, so a replaced run
//! can never write into the new one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chunk::chunk_text;
use crate::error::WizardError;

// ---------------------------------------------------------------------------
// RevealMode / RevealOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
    Immediate,
    StaggeredFade,
    Typewriter,
}

impl RevealMode {
    pub fn all() -> &'static [RevealMode] {
        &[
            RevealMode::Immediate,
            RevealMode::StaggeredFade,
            RevealMode::Typewriter,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RevealMode::Immediate => "immediate",
            RevealMode::StaggeredFade => "staggered_fade",
            RevealMode::Typewriter => "typewriter",
        }
    }
}

impl fmt::Display for RevealMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevealMode {
    type Err = WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(RevealMode::Immediate),
            "staggered_fade" | "staggered-fade" => Ok(RevealMode::StaggeredFade),
            "typewriter" => Ok(RevealMode::Typewriter),
            other => Err(WizardError::InvalidRevealMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealOptions {
    pub mode: RevealMode,
    pub min_chunk_length: usize,
    /// Interval between chunks (staggered) or pause at chunk boundaries
    /// (typewriter). Zero makes a staggered reveal immediate.
    pub stagger_ms: u64,
    pub typewriter_tick_ms: u64,
}

impl Default for RevealOptions {
    fn default() -> Self {
        Self {
            mode: RevealMode::StaggeredFade,
            min_chunk_length: 80,
            stagger_ms: 400,
            typewriter_tick_ms: 18,
        }
    }
}

impl RevealOptions {
    pub fn immediate() -> Self {
        Self {
            mode: RevealMode::Immediate,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// How much of a chunk sequence is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Fully visible chunks.
    pub chunks: usize,
    /// Characters visible of the chunk after those (typewriter only).
    pub partial_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Wait before this frame, relative to the previous one.
    pub delay: Duration,
    pub cursor: Cursor,
}

/// Schedule for revealing `chunks`. Always ends on a frame that shows
/// everything; a plan with a single zero-delay frame is instantaneous.
pub fn reveal_plan(chunks: &[String], opts: &RevealOptions) -> Vec<Frame> {
    let done = Frame {
        delay: Duration::ZERO,
        cursor: Cursor {
            chunks: chunks.len(),
            partial_chars: 0,
        },
    };
    let stagger = Duration::from_millis(opts.stagger_ms);

    let frames: Vec<Frame> = match opts.mode {
        RevealMode::Immediate => return vec![done],
        RevealMode::StaggeredFade if stagger.is_zero() => return vec![done],
        RevealMode::StaggeredFade => (1..=chunks.len())
            .map(|n| Frame {
                delay: if n == 1 { Duration::ZERO } else { stagger },
                cursor: Cursor {
                    chunks: n,
                    partial_chars: 0,
                },
            })
            .collect(),
        RevealMode::Typewriter => {
            let tick = Duration::from_millis(opts.typewriter_tick_ms);
            let mut frames = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let len = chunk.chars().count();
                for c in 1..=len {
                    let pause = if i > 0 && c == 1 { stagger } else { Duration::ZERO };
                    let cursor = if c == len {
                        Cursor {
                            chunks: i + 1,
                            partial_chars: 0,
                        }
                    } else {
                        Cursor {
                            chunks: i,
                            partial_chars: c,
                        }
                    };
                    frames.push(Frame {
                        delay: tick + pause,
                        cursor,
                    });
                }
            }
            frames
        }
    };

    if frames.iter().all(|f| f.delay.is_zero()) {
        return vec![done];
    }
    frames
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RevealSnapshot {
    pub generation: u64,
    /// Identity of the message being revealed (e.g. `ava:3`).
    pub key: String,
    pub chunks: Arc<Vec<String>>,
    pub cursor: Cursor,
    pub done: bool,
}

impl RevealSnapshot {
    /// The currently visible text of each shown chunk, including a
    /// partially typed one.
    pub fn visible(&self) -> Vec<&str> {
        let full = self.cursor.chunks.min(self.chunks.len());
        let mut out: Vec<&str> = self.chunks[..full].iter().map(String::as_str).collect();
        if self.cursor.partial_chars > 0 {
            if let Some(next) = self.chunks.get(full) {
                let end = next
                    .char_indices()
                    .nth(self.cursor.partial_chars)
                    .map_or(next.len(), |(b, _)| b);
                out.push(&next[..end]);
            }
        }
        out
    }

    pub fn visible_text(&self) -> String {
        self.visible().join("\n\n")
    }
}

// ---------------------------------------------------------------------------
// Revealer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct RunIdentity {
    key: String,
    text: String,
    opts: RevealOptions,
}

pub struct Revealer {
    tx: Arc<watch::Sender<RevealSnapshot>>,
    generation: u64,
    current: Option<RunIdentity>,
    task: Option<JoinHandle<()>>,
}

impl Default for Revealer {
    fn default() -> Self {
        Self::new()
    }
}

impl Revealer {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RevealSnapshot::default());
        Self {
            tx: Arc::new(tx),
            generation: 0,
            current: None,
            task: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RevealSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> RevealSnapshot {
        self.tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start revealing `text` under identity `key`.
    ///
    /// Returns `false` (and drops `on_complete`) when the same key, text and
    /// options are already showing; such a call neither restarts nor
    /// re-fires the callback. Otherwise any pending run is cancelled first.
    /// Instantaneous plans publish the final frame and call `on_complete`
    /// before returning. Animated plans need a tokio runtime; without one
    /// the text is shown immediately.
    pub fn show<F>(&mut self, key: &str, text: &str, opts: RevealOptions, on_complete: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let identity = RunIdentity {
            key: key.to_string(),
            text: text.to_string(),
            opts,
        };
        if self.current.as_ref() == Some(&identity) {
            return false;
        }
        self.cancel();
        self.current = Some(identity);
        self.generation += 1;
        let generation = self.generation;

        let chunks = Arc::new(chunk_text(text, opts.min_chunk_length));
        let mut plan = reveal_plan(&chunks, &opts);

        let runtime = tokio::runtime::Handle::try_current();
        if runtime.is_err() && plan.len() > 1 {
            tracing::debug!(key, "no tokio runtime; revealing immediately");
            plan = reveal_plan(&chunks, &RevealOptions::immediate());
        }

        let instant = plan.len() == 1 && plan[0].delay.is_zero();
        if instant {
            self.tx.send_replace(RevealSnapshot {
                generation,
                key: key.to_string(),
                cursor: plan[0].cursor,
                chunks,
                done: true,
            });
            on_complete();
            return true;
        }

        self.tx.send_replace(RevealSnapshot {
            generation,
            key: key.to_string(),
            chunks,
            cursor: Cursor::default(),
            done: false,
        });

        let Ok(handle) = runtime else {
            return true;
        };
        let tx = Arc::clone(&self.tx);
        let last = plan.len() - 1;
        self.task = Some(handle.spawn(async move {
            for (i, frame) in plan.into_iter().enumerate() {
                if !frame.delay.is_zero() {
                    tokio::time::sleep(frame.delay).await;
                }
                let published = tx.send_if_modified(|snap| {
                    if snap.generation != generation {
                        return false;
                    }
                    snap.cursor = frame.cursor;
                    snap.done = i == last;
                    true
                });
                if !published {
                    return;
                }
            }
            on_complete();
        }));
        true
    }

    /// Stop the pending run, if any. The visible snapshot stays where it is.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.current = None;
        // Retire the current generation so an in-flight frame cannot land.
        self.generation += 1;
        let generation = self.generation;
        self.tx.send_if_modified(|snap| {
            snap.generation = generation;
            false
        });
    }
}

impl Drop for Revealer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Headless replay of a scripted game session through a real bridge.
//!
//! A script is JSON lines, one [`ScriptStep`] per line:
//!
//! ```text
//! # game loads after the bridge
//! {"op":"activate","at_ms":0}
//! {"op":"bind","at_ms":5,"hook":"notify_score"}
//! {"op":"call","at_ms":10,"hook":"notify_score","args":[5]}
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::bridge::{EventBridge, StatsSnapshot};
use crate::channel::Transport;
use crate::clock::ManualClock;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::hooks::{HookContext, HookName};

/// One scripted action. `at_ms` is the clock reading when it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Request bridge activation (may repeat, like a re-injected script).
    Activate {
        #[serde(default)]
        at_ms: u64,
    },
    /// The game binds its implementation of `hook`.
    Bind {
        #[serde(default)]
        at_ms: u64,
        hook: HookName,
    },
    /// The game clears `hook`.
    Unbind {
        #[serde(default)]
        at_ms: u64,
        hook: HookName,
    },
    /// The game invokes `hook` with `args`.
    Call {
        #[serde(default)]
        at_ms: u64,
        hook: HookName,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl ScriptStep {
    pub fn at_ms(&self) -> u64 {
        match self {
            ScriptStep::Activate { at_ms }
            | ScriptStep::Bind { at_ms, .. }
            | ScriptStep::Unbind { at_ms, .. }
            | ScriptStep::Call { at_ms, .. } => *at_ms,
        }
    }
}

/// Parse a JSON-lines script. Blank lines and `#` comments are skipped.
///
/// # Errors
/// [`BridgeError::Script`] with a 1-based line number when a line does not
/// parse or its `at_ms` is earlier than the previous step's.
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    let mut steps: Vec<ScriptStep> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step: ScriptStep = serde_json::from_str(line).map_err(|e| BridgeError::Script {
            line: idx + 1,
            detail: e.to_string(),
        })?;
        if let Some(prev) = steps.last() {
            if step.at_ms() < prev.at_ms() {
                return Err(BridgeError::Script {
                    line: idx + 1,
                    detail: format!("at_ms {} is earlier than {}", step.at_ms(), prev.at_ms()),
                });
            }
        }
        steps.push(step);
    }
    Ok(steps)
}

/// Summary of one replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplayReport {
    pub steps: usize,
    pub activations_installed: usize,
    pub calls: usize,
    /// Invocations that reached a bound game implementation.
    pub game_calls_handled: u64,
    pub bridge: StatsSnapshot,
}

/// A fresh game context, a bridge on a manual clock, and a stand-in game.
pub struct Replay {
    ctx: HookContext,
    bridge: Arc<EventBridge>,
    clock: Arc<ManualClock>,
    handled: Arc<AtomicU64>,
}

impl Replay {
    pub fn new(config: BridgeConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(0));
        let bridge = EventBridge::builder()
            .config(config)
            .transport(transport)
            .clock(clock.clone())
            .build()?;
        Ok(Self {
            ctx: HookContext::new(),
            bridge,
            clock,
            handled: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn context(&self) -> &HookContext {
        &self.ctx
    }

    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }

    pub fn run(&self, steps: &[ScriptStep]) -> ReplayReport {
        let mut report = ReplayReport { steps: steps.len(), ..ReplayReport::default() };
        for step in steps {
            self.clock.set(step.at_ms());
            match step {
                ScriptStep::Activate { .. } => {
                    if self.bridge.activate(&self.ctx).is_installed() {
                        report.activations_installed += 1;
                    }
                }
                ScriptStep::Bind { hook, .. } => self.bind_game(*hook),
                ScriptStep::Unbind { hook, .. } => {
                    self.ctx.unbind(*hook);
                }
                ScriptStep::Call { hook, args, .. } => {
                    report.calls += 1;
                    self.ctx.invoke(*hook, args.clone());
                }
            }
        }
        report.game_calls_handled = self.handled.load(Ordering::Relaxed);
        report.bridge = self.bridge.stats();
        report
    }

    fn bind_game(&self, hook: HookName) {
        let handled = Arc::clone(&self.handled);
        self.ctx.bind(hook, move |args| {
            handled.fetch_add(1, Ordering::Relaxed);
            trace!(hook = %hook, ?args, "game handled hook");
            Value::Null
        });
    }
}

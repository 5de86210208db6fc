//! The game's execution context: the named hooks plus the activation flag.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cell::{HookCell, HookFn};

/// Hook signature as the game sees it: positional dynamic arguments in,
/// dynamic value out.
pub type GameHook = HookCell<Vec<Value>, Value>;

/// The entry points game logic calls to announce events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookName {
    #[serde(rename = "notify_run_start")]
    RunStart,
    #[serde(rename = "notify_score")]
    Score,
    #[serde(rename = "notify_checkpoint")]
    Checkpoint,
}

impl HookName {
    pub const ALL: [HookName; 3] = [HookName::RunStart, HookName::Score, HookName::Checkpoint];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::RunStart => "notify_run_start",
            HookName::Score => "notify_score",
            HookName::Checkpoint => "notify_checkpoint",
        }
    }
}

impl std::fmt::Display for HookName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookName::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| format!("unknown hook: {s}"))
    }
}

/// One game execution context.
///
/// Owns the hook cells the game binds and invokes, and the flag that keeps a
/// bridge from being installed into it twice. Pass it by reference to both the
/// game side and [`EventBridge::activate`](crate::bridge::EventBridge::activate).
pub struct HookContext {
    run_start: GameHook,
    score: GameHook,
    checkpoint: GameHook,
    bridge_active: AtomicBool,
}

impl HookContext {
    pub fn new() -> Self {
        Self {
            run_start: GameHook::new(HookName::RunStart.as_str()),
            score: GameHook::new(HookName::Score.as_str()),
            checkpoint: GameHook::new(HookName::Checkpoint.as_str()),
            bridge_active: AtomicBool::new(false),
        }
    }

    pub fn hook(&self, name: HookName) -> &GameHook {
        match name {
            HookName::RunStart => &self.run_start,
            HookName::Score => &self.score,
            HookName::Checkpoint => &self.checkpoint,
        }
    }

    /// Bind a game implementation to `name`, replacing any previous one.
    pub fn bind(&self, name: HookName, f: impl Fn(Vec<Value>) -> Value + Send + Sync + 'static) {
        self.hook(name).bind(HookFn::new(f));
    }

    pub fn unbind(&self, name: HookName) -> bool {
        self.hook(name).unbind()
    }

    pub fn invoke(&self, name: HookName, args: Vec<Value>) -> Value {
        self.hook(name).invoke(args)
    }

    pub fn notify_run_start(&self) -> Value {
        self.invoke(HookName::RunStart, Vec::new())
    }

    pub fn notify_score(&self, score: impl Into<Value>) -> Value {
        self.invoke(HookName::Score, vec![score.into()])
    }

    pub fn notify_checkpoint(&self, score: impl Into<Value>) -> Value {
        self.invoke(HookName::Checkpoint, vec![score.into()])
    }

    pub fn is_bridge_active(&self) -> bool {
        self.bridge_active.load(Ordering::SeqCst)
    }

    /// Set the activation flag. `true` only for the first caller.
    pub(crate) fn claim_activation(&self) -> bool {
        self.bridge_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Observer failures caught across all hooks.
    pub fn observer_failures(&self) -> u64 {
        HookName::ALL
            .into_iter()
            .map(|h| self.hook(h).observer_failures())
            .sum()
    }
}

impl Default for HookContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("run_start", &self.run_start)
            .field("score", &self.score)
            .field("checkpoint", &self.checkpoint)
            .field("bridge_active", &self.is_bridge_active())
            .finish()
    }
}

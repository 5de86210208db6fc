//! The event bridge: activation, per-event handlers, and construction.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::stats::{BridgeStats, StatsSnapshot};
use crate::channel::{Outbound, Transport};
use crate::clock::{Clock, SystemClock};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::hooks::{HookContext, HookName, Observer};
use crate::message::OutboundMessage;
use crate::rate_policy::{coerce_score, Decision, RatePolicy};

type Decide = Box<dyn FnOnce(&mut RatePolicy, u64) -> Decision + Send>;

thread_local! {
    // Bridges currently inside `forward` on this thread, by address.
    static FORWARDING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a bridge as forwarding on this thread until dropped, including
/// when a transport panics.
struct ForwardingGuard(usize);

impl ForwardingGuard {
    fn enter(id: usize) -> Self {
        FORWARDING.with(|f| f.borrow_mut().push(id));
        Self(id)
    }

    fn is_active(id: usize) -> bool {
        FORWARDING.with(|f| f.borrow().contains(&id))
    }
}

impl Drop for ForwardingGuard {
    fn drop(&mut self) {
        FORWARDING.with(|f| {
            let mut active = f.borrow_mut();
            if let Some(pos) = active.iter().rposition(|&id| id == self.0) {
                active.remove(pos);
            }
        });
    }
}

/// Result of [`EventBridge::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Observers were installed on the context's hooks.
    Installed,
    /// The context already had a bridge; nothing changed.
    AlreadyActive,
}

impl Activation {
    pub fn is_installed(self) -> bool {
        self == Activation::Installed
    }
}

/// Forwards observed hook invocations to the host, one message per logical
/// event.
///
/// Use [`EventBridgeBuilder`] for construction, then call
/// [`activate`](Self::activate) with the game's [`HookContext`].
pub struct EventBridge {
    config: BridgeConfig,
    // Held across decide + post so emission order matches invocation order.
    policy: Mutex<RatePolicy>,
    // Events raised by our own transport while `policy` is held on that
    // thread; drained by the outer `forward`.
    deferred: Mutex<VecDeque<(OutboundMessage, Decide)>>,
    outbound: Outbound,
    clock: Arc<dyn Clock>,
    stats: BridgeStats,
}

impl EventBridge {
    pub fn builder() -> EventBridgeBuilder {
        EventBridgeBuilder::new()
    }

    /// Install this bridge's observers on `ctx`, at most once per context.
    ///
    /// Repeated calls, from this bridge or any other, return
    /// [`Activation::AlreadyActive`] and change nothing.
    pub fn activate(self: &Arc<Self>, ctx: &HookContext) -> Activation {
        if !ctx.claim_activation() {
            debug!("event bridge already active in this context");
            return Activation::AlreadyActive;
        }

        let bridge = Arc::clone(self);
        let on_start: Observer<Vec<Value>> = Arc::new(move |_args: &Vec<Value>| {
            bridge.handle_run_start();
            Ok(())
        });
        self.install(ctx, HookName::RunStart, on_start);

        let bridge = Arc::clone(self);
        let on_score: Observer<Vec<Value>> = Arc::new(move |args: &Vec<Value>| {
            bridge.handle_score(args.first());
            Ok(())
        });
        self.install(ctx, HookName::Score, on_score);

        if self.config.forward_checkpoints {
            let bridge = Arc::clone(self);
            let on_checkpoint: Observer<Vec<Value>> = Arc::new(move |args: &Vec<Value>| {
                bridge.handle_checkpoint(args.first());
                Ok(())
            });
            self.install(ctx, HookName::Checkpoint, on_checkpoint);
        }

        info!(forward_checkpoints = self.config.forward_checkpoints, "event bridge active");
        Activation::Installed
    }

    fn install(&self, ctx: &HookContext, name: HookName, observer: Observer<Vec<Value>>) {
        if !ctx.hook(name).intercept(observer) {
            warn!(hook = %name, "hook already carries an observer, leaving it in place");
        }
    }

    /// A run began.
    pub fn handle_run_start(&self) {
        self.forward(
            OutboundMessage::RunStart,
            Box::new(|policy: &mut RatePolicy, now: u64| policy.accept_start(now)),
        );
    }

    /// The score changed to `arg` (coerced to a number).
    pub fn handle_score(&self, arg: Option<&Value>) {
        let score = coerce_score(arg);
        self.forward(
            OutboundMessage::Score { score },
            Box::new(move |policy: &mut RatePolicy, now: u64| policy.accept_score(score, now)),
        );
    }

    /// In-run progress reached `arg` (coerced to a number).
    pub fn handle_checkpoint(&self, arg: Option<&Value>) {
        let score = coerce_score(arg);
        self.forward(
            OutboundMessage::ScoreTick { score },
            Box::new(move |policy: &mut RatePolicy, now: u64| policy.accept_checkpoint(score, now)),
        );
    }

    fn forward(&self, message: OutboundMessage, decide: Decide) {
        let id = self as *const Self as usize;
        if ForwardingGuard::is_active(id) {
            // A transport called back into the game on this thread; locking
            // `policy` again would never return.
            trace!(kind = message.kind(), "deferring re-entrant event");
            self.deferred_queue().push_back((message, decide));
            return;
        }

        let mut policy = self.policy.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = ForwardingGuard::enter(id);
        let mut next = Some((message, decide));
        while let Some((message, decide)) = next {
            self.decide_and_post(&mut policy, message, decide);
            next = self.deferred_queue().pop_front();
        }
    }

    fn decide_and_post(&self, policy: &mut RatePolicy, message: OutboundMessage, decide: Decide) {
        let now = self.clock.now_ms();
        match decide(policy, now) {
            Decision::Accept => {
                self.stats.record_accepted();
                self.outbound.post(&message);
            }
            Decision::Suppress => {
                self.stats.record_suppressed();
                trace!(kind = message.kind(), now, "suppressed");
            }
        }
    }

    fn deferred_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<(OutboundMessage, Decide)>> {
        self.deferred.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.stats.accepted(),
            suppressed: self.stats.suppressed(),
            delivered: self.outbound.delivered(),
            transport_failures: self.outbound.failed(),
        }
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Builder for [`EventBridge`].
///
/// # Example
/// ```rust,ignore
/// let (transport, rx) = ChannelTransport::unbounded();
/// let bridge = EventBridge::builder()
///     .transport(Arc::new(transport))
///     .config(BridgeConfig::default())
///     .build()?;
/// bridge.activate(&ctx);
/// ```
pub struct EventBridgeBuilder {
    config: BridgeConfig,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl EventBridgeBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
            transport: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Where accepted messages go. Required.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    /// [`BridgeError::MissingTransport`] when no transport was supplied.
    pub fn build(self) -> Result<Arc<EventBridge>> {
        let transport = self.transport.ok_or(BridgeError::MissingTransport)?;
        Ok(Arc::new(EventBridge {
            policy: Mutex::new(RatePolicy::new(&self.config)),
            deferred: Mutex::new(VecDeque::new()),
            config: self.config,
            outbound: Outbound::new(transport),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            stats: BridgeStats::default(),
        }))
    }
}

impl Default for EventBridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

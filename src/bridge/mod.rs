//! # EventBridge
//!
//! Runs inside the game's execution context and relays gameplay hooks to the
//! host page.
//!
//! ## What It Does
//!
//! 1. **Activation**: installs observers on `notify_run_start`,
//!    `notify_score` and `notify_checkpoint`, once per [`HookContext`].
//! 2. **Rate policy**: at most one `RUN_START` per start window; repeated
//!    scores suppressed until the heartbeat interval passes.
//! 3. **Outbound**: accepted events go to the [`Transport`] as
//!    [`OutboundMessage`]s; delivery failures never reach the game.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let bridge = EventBridge::builder()
//!     .transport(Arc::new(browser_transport()))
//!     .build()?;
//! bridge.activate(&ctx);
//! ```
//!
//! [`HookContext`]: crate::hooks::HookContext
//! [`Transport`]: crate::channel::Transport
//! [`OutboundMessage`]: crate::message::OutboundMessage

pub mod event_bridge;
pub mod stats;

pub use event_bridge::{Activation, EventBridge, EventBridgeBuilder};
pub use stats::{BridgeStats, StatsSnapshot};

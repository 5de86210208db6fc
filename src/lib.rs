//! Game-to-host event bridge.
//!
//! Observes the hooks an embedded game calls to announce a run start, a
//! score change or an in-run checkpoint, and relays them to the hosting page
//! once per logical event: repeated starts inside the start window and
//! unchanged scores inside the heartbeat interval are suppressed. Delivery is
//! fire-and-forget; nothing the bridge does can break the game's own hooks.
//!
//! ```rust,ignore
//! let ctx = HookContext::new();
//! let (transport, mut host) = ChannelTransport::unbounded();
//! let bridge = EventBridge::builder().transport(Arc::new(transport)).build()?;
//! bridge.activate(&ctx);
//!
//! ctx.bind(HookName::Score, |_| Value::Null); // game loads later; still observed
//! ctx.notify_score(5);
//! assert_eq!(host.try_recv()?, OutboundMessage::Score { score: 5.0 });
//! ```

pub mod bridge;
pub mod channel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod hooks;
pub mod message;
pub mod rate_policy;
pub mod replay;

pub use bridge::{Activation, EventBridge, EventBridgeBuilder, StatsSnapshot};
pub use channel::{ChannelTransport, FallbackTransport, Outbound, Transport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use hooks::{GameHook, HookCell, HookContext, HookFn, HookName};
pub use message::OutboundMessage;
pub use rate_policy::{coerce_score, Decision, RatePolicy};

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use channel::post_message::{browser_transport, PostMessageTransport, WindowTarget};

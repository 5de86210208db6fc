//! # Hooks
//!
//! Named entry points the game invokes to announce events, re-expressed as
//! explicit delegate cells instead of reassignable globals.
//!
//! A [`HookCell`] holds the game's current implementation and at most one
//! observer. Binding an implementation before or after the observer is
//! attached makes no difference: every invocation runs the observer once and
//! then whatever implementation is bound at that moment.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let ctx = HookContext::new();
//! ctx.bind(HookName::Score, |args| { /* game logic */ Value::Null });
//! ctx.notify_score(12);
//! ```

pub mod cell;
pub mod context;

pub use cell::{HookCell, HookFn, Observer};
pub use context::{GameHook, HookContext, HookName};

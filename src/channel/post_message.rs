//! Browser transport: `postMessage(msg, "*")` to an ancestor window.
//!
//! Compiled only for `wasm32` with the `wasm` feature.

use js_sys::{Function, Reflect, JSON};
use wasm_bindgen::{JsCast, JsValue};

use super::{FallbackTransport, Transport};
use crate::error::{BridgeError, Result};
use crate::message::OutboundMessage;

use std::sync::Arc;

/// Which ancestor window receives the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTarget {
    Top,
    Parent,
}

impl WindowTarget {
    fn property(self) -> &'static str {
        match self {
            WindowTarget::Top => "top",
            WindowTarget::Parent => "parent",
        }
    }
}

/// Posts messages to `window.top` or `window.parent` with an open target
/// origin.
#[derive(Debug, Clone, Copy)]
pub struct PostMessageTransport {
    target: WindowTarget,
}

impl PostMessageTransport {
    pub fn new(target: WindowTarget) -> Self {
        Self { target }
    }
}

fn js_err(transport: &'static str, e: JsValue) -> BridgeError {
    BridgeError::transport(transport, format!("{e:?}"))
}

impl Transport for PostMessageTransport {
    fn name(&self) -> &'static str {
        match self.target {
            WindowTarget::Top => "postMessage(top)",
            WindowTarget::Parent => "postMessage(parent)",
        }
    }

    fn try_send(&self, message: &OutboundMessage) -> Result<()> {
        let name = self.name();
        // Plain object on the host side, not a JSON string.
        let payload = JSON::parse(&message.to_json()?).map_err(|e| js_err(name, e))?;

        let window = Reflect::get(&js_sys::global(), &JsValue::from_str(self.target.property()))
            .map_err(|e| js_err(name, e))?;
        if window.is_undefined() || window.is_null() {
            return Err(BridgeError::transport(name, "no such window"));
        }

        let post = Reflect::get(&window, &JsValue::from_str("postMessage"))
            .map_err(|e| js_err(name, e))?
            .dyn_into::<Function>()
            .map_err(|e| js_err(name, e))?;
        post.call2(&window, &payload, &JsValue::from_str("*"))
            .map_err(|e| js_err(name, e))?;
        Ok(())
    }
}

/// `top` first, then `parent`.
pub fn browser_transport() -> FallbackTransport {
    FallbackTransport::new(vec![
        Arc::new(PostMessageTransport::new(WindowTarget::Top)),
        Arc::new(PostMessageTransport::new(WindowTarget::Parent)),
    ])
}

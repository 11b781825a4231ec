//! Cross-tab delivery through the browser `BroadcastChannel` API.

use super::envelope::Envelope;
use super::transport::{Transport, TransportError};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{BroadcastChannel, MessageEvent};

/// A `BroadcastChannel` named after the share.
///
/// Messages are collected by the `onmessage` callback and drained by
/// [`Transport::poll`].
pub struct BroadcastChannelTransport {
    channel: Option<BroadcastChannel>,
    inbox: Rc<RefCell<Vec<Envelope>>>,
    // Store the closure to prevent it from being dropped
    _on_message: Option<Closure<dyn Fn(MessageEvent)>>,
}

impl BroadcastChannelTransport {
    /// Open the channel `{prefix}.{shareId}`.
    pub fn open(prefix: &str, share_id: &str) -> Result<Self, TransportError> {
        let name = format!("{}.{}", prefix, share_id);
        let channel = BroadcastChannel::new(&name)
            .map_err(|e| TransportError::Unavailable(format!("BroadcastChannel: {:?}", e)))?;

        let inbox = Rc::new(RefCell::new(Vec::new()));
        let inbox_msg = inbox.clone();
        let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
            let Some(text) = e.data().as_string() else {
                return;
            };
            match Envelope::from_json(&text) {
                Ok(envelope) => inbox_msg.borrow_mut().push(envelope),
                Err(err) => log::warn!("Ignoring malformed broadcast: {}", err),
            }
        }) as Box<dyn Fn(MessageEvent)>);
        channel.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        log::info!("Opened broadcast channel {}", name);

        Ok(Self {
            channel: Some(channel),
            inbox,
            _on_message: Some(on_message),
        })
    }
}

impl Transport for BroadcastChannelTransport {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn publish(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        let channel = self.channel.as_ref().ok_or(TransportError::Closed)?;
        let json = envelope
            .to_json()
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        channel
            .post_message(&JsValue::from_str(&json))
            .map_err(|e| TransportError::Unavailable(format!("{:?}", e)))
    }

    fn poll(&mut self, _now: u64) -> Vec<Envelope> {
        std::mem::take(&mut *self.inbox.borrow_mut())
    }

    fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.set_onmessage(None);
            channel.close();
        }
        self._on_message = None;
        self.inbox.borrow_mut().clear();
    }
}

impl Drop for BroadcastChannelTransport {
    fn drop(&mut self) {
        self.close();
    }
}

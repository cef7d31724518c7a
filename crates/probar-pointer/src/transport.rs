//! Cross-window message transports.
//!
//! Windows never share memory; the only way one window influences another
//! is a request sent through a [`FrameTransport`] and answered on a fixed
//! response channel. Two transports are provided:
//!
//! - [`DirectTransport`] calls the target window's handler in place, the way
//!   same-origin frames can reach each other directly.
//! - [`MessageBus`] serializes every message to JSON and delivers it through
//!   a per-window inbox, the way cross-origin frames exchange `postMessage`
//!   envelopes.
//!
//! Responses are correlated by `(requesting window, response channel)` only,
//! so each window has at most one pending request per channel.

use crate::dom::WindowId;
use crate::handoff::FrameMessage;
use crate::result::{PointerError, PointerResult, RemoteFailure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Receives requests addressed to one window
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Handle a request from `source` and produce the response
    async fn handle(&self, source: &WindowId, message: FrameMessage) -> PointerResult<FrameMessage>;
}

/// Sends a request to another window and awaits its response
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Send `message` to `target` and wait for the reply on `response_channel`
    async fn request(
        &self,
        source: &WindowId,
        target: &WindowId,
        message: FrameMessage,
        response_channel: &str,
    ) -> PointerResult<FrameMessage>;
}

type ChannelKey = (WindowId, String);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn expect_channel(message: FrameMessage, channel: &str) -> PointerResult<FrameMessage> {
    if message.cmd() == channel {
        Ok(message)
    } else {
        Err(PointerError::UnexpectedMessage {
            channel: channel.to_string(),
            received: message.cmd().to_string(),
        })
    }
}

/// Releases an in-flight slot when the request finishes or is dropped
struct InFlightSlot<'a> {
    slots: &'a Mutex<HashSet<ChannelKey>>,
    key: ChannelKey,
}

impl<'a> InFlightSlot<'a> {
    fn acquire(
        slots: &'a Mutex<HashSet<ChannelKey>>,
        window: &WindowId,
        channel: &str,
    ) -> PointerResult<Self> {
        let key = (window.clone(), channel.to_string());
        if !lock(slots).insert(key.clone()) {
            return Err(PointerError::HandoffInFlight {
                window: window.clone(),
                channel: channel.to_string(),
            });
        }
        Ok(Self { slots, key })
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        lock(self.slots).remove(&self.key);
    }
}

/// Same-origin transport that invokes the target's handler directly
#[derive(Default)]
pub struct DirectTransport {
    handlers: Mutex<HashMap<WindowId, Arc<dyn FrameHandler>>>,
    in_flight: Mutex<HashSet<ChannelKey>>,
}

impl fmt::Debug for DirectTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectTransport")
            .field("windows", &lock(&self.handlers).keys().cloned().collect::<Vec<_>>())
            .field("in_flight", &lock(&self.in_flight).len())
            .finish()
    }
}

impl DirectTransport {
    /// Transport with no windows registered
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route requests for `window` to `handler`
    pub fn register(&self, window: WindowId, handler: Arc<dyn FrameHandler>) {
        lock(&self.handlers).insert(window, handler);
    }

    /// Stop routing requests for `window`
    pub fn unregister(&self, window: &WindowId) {
        lock(&self.handlers).remove(window);
    }
}

#[async_trait]
impl FrameTransport for DirectTransport {
    async fn request(
        &self,
        source: &WindowId,
        target: &WindowId,
        message: FrameMessage,
        response_channel: &str,
    ) -> PointerResult<FrameMessage> {
        let _slot = InFlightSlot::acquire(&self.in_flight, source, response_channel)?;
        let handler = lock(&self.handlers)
            .get(target)
            .cloned()
            .ok_or_else(|| PointerError::WindowUnreachable {
                window: target.clone(),
            })?;

        tracing::trace!(%source, %target, cmd = message.cmd(), "direct frame request");
        let response = handler.handle(source, message).await?;
        expect_channel(response, response_channel)
    }
}

/// Body of an [`Envelope`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    /// A request, or a successful reply
    Message(FrameMessage),
    /// The receiving window failed to handle the request
    Error(RemoteFailure),
}

/// Wire envelope exchanged through the [`MessageBus`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Sending window
    pub source: WindowId,
    /// Receiving window
    pub target: WindowId,
    /// Channel the message is posted on
    pub channel: String,
    /// Channel the sender expects the reply on, for requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_channel: Option<String>,
    /// Message or failure
    #[serde(flatten)]
    pub payload: Payload,
}

type ReplySender = oneshot::Sender<PointerResult<FrameMessage>>;

/// Cross-origin transport passing JSON envelopes between window inboxes
///
/// Each attached window gets an inbox drained by one pump task, so a window
/// processes its messages one at a time.
#[derive(Default)]
pub struct MessageBus {
    inboxes: Mutex<HashMap<WindowId, mpsc::UnboundedSender<String>>>,
    pending: Mutex<HashMap<ChannelKey, ReplySender>>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("windows", &lock(&self.inboxes).keys().cloned().collect::<Vec<_>>())
            .field("pending", &lock(&self.pending).len())
            .finish()
    }
}

/// Removes a pending reply slot when the request finishes or is dropped
struct PendingReply<'a> {
    pending: &'a Mutex<HashMap<ChannelKey, ReplySender>>,
    key: ChannelKey,
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.key);
    }
}

impl MessageBus {
    /// Bus with no windows attached
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach `window` and start pumping its inbox into `handler`
    ///
    /// The pump ends when the window is detached or the bus is dropped.
    pub fn attach(
        self: &Arc<Self>,
        window: WindowId,
        handler: Arc<dyn FrameHandler>,
    ) -> JoinHandle<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inboxes).insert(window.clone(), tx);
        tracing::debug!(%window, "window attached to message bus");
        tokio::spawn(pump(Arc::downgrade(self), window, handler, rx))
    }

    /// Detach `window`; messages posted to it afterwards are rejected
    pub fn detach(&self, window: &WindowId) {
        if lock(&self.inboxes).remove(window).is_some() {
            tracing::debug!(%window, "window detached from message bus");
        }
    }

    /// Whether `window` is attached
    #[must_use]
    pub fn is_attached(&self, window: &WindowId) -> bool {
        lock(&self.inboxes).contains_key(window)
    }

    /// Serialize and post an envelope to its target's inbox
    pub fn post(&self, envelope: &Envelope) -> PointerResult<()> {
        let raw = serde_json::to_string(envelope)?;
        let inboxes = lock(&self.inboxes);
        let inbox = inboxes
            .get(&envelope.target)
            .ok_or_else(|| PointerError::WindowUnreachable {
                window: envelope.target.clone(),
            })?;
        inbox.send(raw).map_err(|_| PointerError::WindowUnreachable {
            window: envelope.target.clone(),
        })
    }

    fn deliver_reply(&self, envelope: Envelope) -> Option<Envelope> {
        let key = (envelope.target.clone(), envelope.channel.clone());
        match lock(&self.pending).remove(&key) {
            Some(reply) => {
                let result = match envelope.payload {
                    Payload::Message(message) => Ok(message),
                    Payload::Error(failure) => Err(failure.into_error(&envelope.source)),
                };
                if reply.send(result).is_err() {
                    tracing::debug!(
                        window = %key.0,
                        channel = %key.1,
                        "reply arrived after requester gave up"
                    );
                }
                None
            }
            None => Some(envelope),
        }
    }
}

async fn pump(
    bus: Weak<MessageBus>,
    window: WindowId,
    handler: Arc<dyn FrameHandler>,
    mut inbox: mpsc::UnboundedReceiver<String>,
) {
    while let Some(raw) = inbox.recv().await {
        let Some(bus) = bus.upgrade() else {
            break;
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(%window, error = %err, "dropping malformed envelope");
                continue;
            }
        };

        let Some(envelope) = bus.deliver_reply(envelope) else {
            continue;
        };

        let (Some(reply_channel), Payload::Message(message)) =
            (envelope.reply_channel, envelope.payload)
        else {
            tracing::warn!(%window, channel = %envelope.channel, "dropping unsolicited message");
            continue;
        };

        let payload = match handler.handle(&envelope.source, message).await {
            Ok(response) => Payload::Message(response),
            Err(err) => {
                tracing::warn!(
                    %window,
                    source = %envelope.source,
                    error = %err,
                    "frame request failed"
                );
                Payload::Error(RemoteFailure::from(&err))
            }
        };
        let reply = Envelope {
            source: window.clone(),
            target: envelope.source,
            channel: reply_channel,
            reply_channel: None,
            payload,
        };
        if let Err(err) = bus.post(&reply) {
            tracing::warn!(%window, error = %err, "failed to post reply");
        }
    }
    tracing::trace!(%window, "message bus pump stopped");
}

#[async_trait]
impl FrameTransport for MessageBus {
    async fn request(
        &self,
        source: &WindowId,
        target: &WindowId,
        message: FrameMessage,
        response_channel: &str,
    ) -> PointerResult<FrameMessage> {
        let key = (source.clone(), response_channel.to_string());
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if pending.contains_key(&key) {
                return Err(PointerError::HandoffInFlight {
                    window: source.clone(),
                    channel: response_channel.to_string(),
                });
            }
            pending.insert(key.clone(), tx);
        }
        let _slot = PendingReply {
            pending: &self.pending,
            key,
        };

        self.post(&Envelope {
            source: source.clone(),
            target: target.clone(),
            channel: message.cmd().to_string(),
            reply_channel: Some(response_channel.to_string()),
            payload: Payload::Message(message),
        })?;

        let response = rx.await.map_err(|_| PointerError::WindowUnreachable {
            window: target.clone(),
        })??;
        expect_channel(response, response_channel)
    }
}

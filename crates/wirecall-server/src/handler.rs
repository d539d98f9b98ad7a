//! Handler contracts for the acceptor.
//!
//! A server installs one [`Behaviour`]: an optional authenticator plus
//! message/open/close callbacks. Correlated calls resolve through a
//! single-resolution reply slot — the handler's returned future and any
//! explicit [`Responder`] call race, and the first resolution wins.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use wirecall_transport::HandshakeHeaders;

/// Error a message handler raises to answer a call with a failure reply.
///
/// This is the only recognized rejection: it becomes a wire-level reply
/// carrying the message and no payload. Anything else a handler does
/// wrong is a programming error and should panic.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ReplyError {
    /// Message delivered to the caller as the reply label.
    pub message: String,
}

impl ReplyError {
    /// Creates a reply error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rejection raised by an authenticator.
///
/// Becomes a clean close with code 4000 and the reason as description;
/// the handshake still completes so the requester learns why.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct AuthRejected {
    /// Reason delivered as the close description.
    pub reason: String,
}

impl AuthRejected {
    /// Creates an authentication rejection.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outcome of a correlated call.
pub type ReplyOutcome = Result<Option<Value>, ReplyError>;

/// Identity of a registered connection, as passed to handlers.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Registry key, generated at upgrade time.
    pub id: Uuid,
    /// Opaque result of authentication, if any.
    pub user_data: Option<Value>,
}

/// One inbound message, as passed to the message handler.
pub struct MessageContext {
    /// The connection the message arrived on.
    pub connection: ConnectionInfo,
    /// Event name from the frame label.
    pub event: String,
    /// Frame payload.
    pub payload: Option<Value>,
    responder: Responder,
}

impl MessageContext {
    pub(crate) fn new(
        connection: ConnectionInfo,
        event: String,
        payload: Option<Value>,
        responder: Responder,
    ) -> Self {
        Self {
            connection,
            event,
            payload,
            responder,
        }
    }

    /// A handle for completing the call ahead of the handler's return.
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }
}

/// Authenticates an upgrade from its negotiation headers.
pub type Authenticator =
    Arc<dyn Fn(HandshakeHeaders) -> BoxFuture<'static, Result<Option<Value>, AuthRejected>> + Send + Sync>;

/// Handles one inbound message.
pub type MessageHandler = Arc<dyn Fn(MessageContext) -> BoxFuture<'static, ReplyOutcome> + Send + Sync>;

/// Observes a connection opening or closing.
pub type LifecycleHandler = Arc<dyn Fn(ConnectionInfo) + Send + Sync>;

/// The set of handlers installed on a server.
#[derive(Clone, Default)]
pub struct Behaviour {
    pub(crate) authentication: Option<Authenticator>,
    pub(crate) message: Option<MessageHandler>,
    pub(crate) open: Option<LifecycleHandler>,
    pub(crate) close: Option<LifecycleHandler>,
}

impl Behaviour {
    /// Creates an empty behaviour; every handler defaults to a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: install the authenticator.
    pub fn with_authentication(
        mut self,
        authenticator: impl Fn(HandshakeHeaders) -> BoxFuture<'static, Result<Option<Value>, AuthRejected>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.authentication = Some(Arc::new(authenticator));
        self
    }

    /// Builder: install the message handler.
    pub fn with_message(
        mut self,
        handler: impl Fn(MessageContext) -> BoxFuture<'static, ReplyOutcome> + Send + Sync + 'static,
    ) -> Self {
        self.message = Some(Arc::new(handler));
        self
    }

    /// Builder: install the open handler.
    pub fn with_open(mut self, handler: impl Fn(ConnectionInfo) + Send + Sync + 'static) -> Self {
        self.open = Some(Arc::new(handler));
        self
    }

    /// Builder: install the close handler.
    pub fn with_close(mut self, handler: impl Fn(ConnectionInfo) + Send + Sync + 'static) -> Self {
        self.close = Some(Arc::new(handler));
        self
    }
}

#[derive(Debug)]
enum SlotState {
    Empty,
    Resolved(ReplyOutcome),
    Consumed,
}

/// Completion handle for a correlated call.
///
/// The first resolution wins: once the slot holds an outcome — from
/// `resolve`, `reject`, or the handler's returned future — later
/// completions are ignored.
#[derive(Clone)]
pub struct Responder {
    slot: Arc<Mutex<SlotState>>,
}

impl Responder {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(SlotState::Empty)),
        }
    }

    /// Completes the call successfully. Returns false if the call was
    /// already resolved.
    pub fn resolve(&self, payload: Option<Value>) -> bool {
        self.complete(Ok(payload))
    }

    /// Fails the call with a reply error. Returns false if the call was
    /// already resolved.
    pub fn reject(&self, error: ReplyError) -> bool {
        self.complete(Err(error))
    }

    fn complete(&self, outcome: ReplyOutcome) -> bool {
        let mut slot = self.slot.lock().expect("reply slot lock");
        match *slot {
            SlotState::Empty => {
                *slot = SlotState::Resolved(outcome);
                true
            }
            _ => false,
        }
    }

    /// Consumes the slot, preferring an explicit resolution over the
    /// handler's returned outcome.
    pub(crate) fn settle(&self, returned: ReplyOutcome) -> ReplyOutcome {
        let mut slot = self.slot.lock().expect("reply slot lock");
        match std::mem::replace(&mut *slot, SlotState::Consumed) {
            SlotState::Resolved(outcome) => outcome,
            _ => returned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_resolution_wins() {
        let responder = Responder::new();
        assert!(responder.resolve(Some(json!(1))));
        assert!(!responder.resolve(Some(json!(2))));
        assert!(!responder.reject(ReplyError::new("late")));

        let outcome = responder.settle(Ok(Some(json!(3))));
        assert_eq!(outcome.unwrap(), Some(json!(1)));
    }

    #[test]
    fn settle_falls_back_to_the_returned_outcome() {
        let responder = Responder::new();
        let outcome = responder.settle(Ok(Some(json!("returned"))));
        assert_eq!(outcome.unwrap(), Some(json!("returned")));
    }

    #[test]
    fn settled_slot_ignores_later_completions() {
        let responder = Responder::new();
        let _ = responder.settle(Ok(None));
        assert!(!responder.resolve(Some(json!(1))));
    }

    #[test]
    fn reject_carries_the_message() {
        let responder = Responder::new();
        assert!(responder.reject(ReplyError::new("denied")));
        match responder.settle(Ok(None)) {
            Err(error) => assert_eq!(error.message, "denied"),
            Ok(_) => panic!("expected rejection"),
        }
    }
}

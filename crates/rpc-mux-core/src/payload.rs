//! Inbound frame model: payloads and response handles.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::RpcError;
use crate::types::{Method, Params, SeqId};

/// Result/error capabilities for acknowledging an inbound call, implemented
/// by the transport.
pub trait Responder: Send + Sync {
    /// Deliver a successful result to the caller.
    fn result(&self, value: Value);

    /// Deliver an error to the caller.
    fn error(&self, err: RpcError);
}

/// Whether an inbound call expects an acknowledgement.
#[derive(Clone)]
pub enum Response {
    /// Fire-and-forget: the caller is not waiting for an ack.
    NoResponseExpected,
    /// The caller expects a reply through the handle.
    Handle(ResponseHandle),
}

impl Response {
    /// The sequence ID carried by the frame, if any.
    #[must_use]
    pub fn seqid(&self) -> Option<SeqId> {
        match self {
            Self::NoResponseExpected => None,
            Self::Handle(handle) => Some(handle.seqid()),
        }
    }

    /// Whether the frame is a cancellation notice.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::NoResponseExpected => false,
            Self::Handle(handle) => handle.is_cancelled(),
        }
    }

    /// Best-effort result delivery. Returns whether a responder capability
    /// existed to deliver it.
    pub fn result(&self, value: Value) -> bool {
        match self {
            Self::NoResponseExpected => false,
            Self::Handle(handle) => handle.result(value),
        }
    }

    /// Best-effort error delivery. Returns whether a responder capability
    /// existed to deliver it.
    pub fn error(&self, err: RpcError) -> bool {
        match self {
            Self::NoResponseExpected => false,
            Self::Handle(handle) => handle.error(err),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponseExpected => f.write_str("NoResponseExpected"),
            Self::Handle(handle) => handle.fmt(f),
        }
    }
}

/// Handle for replying to one inbound call.
///
/// Carries the sequence ID the transport assigned to the call, the
/// cancellation flag, and (when the wire frame had one) the responder
/// capability for sending the reply.
#[derive(Clone)]
pub struct ResponseHandle {
    seqid: SeqId,
    cancelled: bool,
    responder: Option<Arc<dyn Responder>>,
}

impl ResponseHandle {
    /// A handle with no responder capability.
    #[must_use]
    pub const fn new(seqid: SeqId) -> Self {
        Self {
            seqid,
            cancelled: false,
            responder: None,
        }
    }

    /// A cancellation notice for the given sequence ID.
    #[must_use]
    pub const fn cancellation(seqid: SeqId) -> Self {
        Self {
            seqid,
            cancelled: true,
            responder: None,
        }
    }

    /// Attach the responder capability.
    #[must_use]
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// The sequence ID the transport assigned to this call.
    #[must_use]
    pub const fn seqid(&self) -> SeqId {
        self.seqid
    }

    /// Whether this frame is a cancellation notice.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Best-effort result delivery. Returns whether a responder existed.
    pub fn result(&self, value: Value) -> bool {
        if let Some(responder) = &self.responder {
            responder.result(value);
            true
        } else {
            false
        }
    }

    /// Best-effort error delivery. Returns whether a responder existed.
    pub fn error(&self, err: RpcError) -> bool {
        if let Some(responder) = &self.responder {
            responder.error(err);
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("seqid", &self.seqid)
            .field("cancelled", &self.cancelled)
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

/// One inbound frame delivered by the transport.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Method name.
    pub method: Method,
    /// Call parameters.
    pub param: Params,
    /// Response expectation for the frame.
    pub response: Response,
}

impl Payload {
    /// A frame with the given response expectation.
    #[must_use]
    pub fn new(method: impl Into<Method>, param: Params, response: Response) -> Self {
        Self {
            method: method.into(),
            param,
            response,
        }
    }

    /// A fire-and-forget frame.
    #[must_use]
    pub fn call(method: impl Into<Method>, param: Params) -> Self {
        Self::new(method, param, Response::NoResponseExpected)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingResponder {
        errors: Mutex<Vec<RpcError>>,
        results: Mutex<Vec<Value>>,
    }

    impl Responder for RecordingResponder {
        fn result(&self, value: Value) {
            self.results.lock().unwrap().push(value);
        }

        fn error(&self, err: RpcError) {
            self.errors.lock().unwrap().push(err);
        }
    }

    #[test]
    fn test_no_response_expected_delivers_nothing() {
        let response = Response::NoResponseExpected;
        assert!(!response.error(RpcError::cancelled()));
        assert!(!response.result(Value::Null));
        assert_eq!(response.seqid(), None);
        assert!(!response.is_cancelled());
    }

    #[test]
    fn test_handle_without_responder_reports_undelivered() {
        let response = Response::Handle(ResponseHandle::new(7));
        assert!(!response.error(RpcError::cancelled()));
        assert_eq!(response.seqid(), Some(7));
    }

    #[test]
    fn test_handle_delivers_through_responder() {
        let responder = Arc::new(RecordingResponder::default());
        let response = Response::Handle(
            ResponseHandle::new(7).with_responder(Arc::clone(&responder) as Arc<dyn Responder>),
        );

        assert!(response.error(RpcError::cancelled()));
        assert!(response.result(Value::from(42)));
        assert_eq!(responder.errors.lock().unwrap().len(), 1);
        assert_eq!(responder.results.lock().unwrap().as_slice(), &[Value::from(42)]);
    }

    #[test]
    fn test_cancellation_flag() {
        let response = Response::Handle(ResponseHandle::cancellation(42));
        assert!(response.is_cancelled());
        assert_eq!(response.seqid(), Some(42));
    }
}

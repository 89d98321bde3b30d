//! Collaborator traits.

use crate::types::{Method, Params};

/// Waiting-state notification stream for one outgoing call.
///
/// The transport drives this with `true`/`false` transitions and must
/// terminate with a final `false` once the call's terminal response has
/// arrived.
pub type WaitingCallback = Box<dyn Fn(bool) + Send + Sync>;

/// The transport collaborator that performs actual request delivery.
///
/// Wire encoding, framing, and connection management live behind this trait;
/// the multiplexer only issues calls and reacts to the notifications the
/// transport feeds back through [`WaitingCallback`] and the dispatcher's
/// inbound entry points.
pub trait Transport: Send + Sync {
    /// Perform one outgoing call.
    ///
    /// Result/error delivery for the call is transport-specific; the
    /// `waiting` stream is the only completion signal the multiplexer
    /// observes.
    fn invoke(&self, method: Method, params: Params, waiting: WaitingCallback);

    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Tear down and re-establish the connection.
    fn reset_connection(&self);
}

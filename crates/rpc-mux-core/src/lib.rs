//! Shared types for the RPC session multiplexer.
//!
//! This crate provides the building blocks the dispatcher and sessions
//! agree on with their collaborators:
//! - `Method`, `SessionId`, `SeqId`, `Params` - call identity and payloads
//! - `Payload`, `Response`, `Responder` - the inbound frame model
//! - `RpcError`, `StatusCode` - the wire-facing error shape
//! - `Transport` - the outgoing-call collaborator trait

pub mod error;
pub mod payload;
pub mod traits;
pub mod types;

pub use error::{RpcError, StatusCode, UnknownStatusCode};
pub use payload::{Payload, Responder, Response, ResponseHandle};
pub use traits::{Transport, WaitingCallback};
pub use types::{Method, Params, SESSION_ID_KEY, SeqId, SessionId, session_id_of, with_session_id};

//! Session lifecycle and inbound routing for the RPC multiplexer.
//!
//! Provides:
//! - `Dispatcher` - owns live sessions and global handlers, routes every
//!   inbound frame, replays reconnect interest
//! - `Session` - one logical multi-step RPC exchange tied to a session ID

pub mod dispatcher;
pub mod session;

pub use dispatcher::{Dispatcher, GlobalHandler, ReconnectHandler};
pub use session::{
    IncomingCallMap, Session, SessionCallback, SessionHandler, WaitingHandler, WaitingNotifier,
};

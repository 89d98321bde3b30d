//! Routes traffic between application code and the transport.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rpc_mux_core::{
    Method, Params, Payload, Response, RpcError, SeqId, SessionId, Transport, session_id_of,
};

use crate::session::{
    EndHandler, IncomingCallMap, Invoker, Session, SessionCallback, WaitingHandler,
};

/// Handler for inbound calls that are not tied to any session.
pub type GlobalHandler = Arc<dyn Fn(Params, Response) + Send + Sync>;

/// Callback replayed whenever the transport (re)connects.
pub type ReconnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Session IDs at or below this value are reserved; the dispatcher hands out
/// IDs starting right above it and never reuses one.
const SESSION_ID_BASE: u64 = 123;

/// The RPC session multiplexer.
///
/// Owns the live-session map, the global handler map, and the
/// reconnect-interest map, and is the single inbound entry point for all
/// transport traffic. Created once per process.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    global_handlers: RwLock<HashMap<Method, GlobalHandler>>,
    reconnect_handlers: Mutex<HashMap<String, ReconnectHandler>>,
    next_session_id: AtomicU64,
    fail_on_unhandled: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher bound to the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            sessions: RwLock::new(HashMap::new()),
            global_handlers: RwLock::new(HashMap::new()),
            reconnect_handlers: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(SESSION_ID_BASE),
            fail_on_unhandled: AtomicBool::new(false),
        })
    }

    fn generate_session_id(&self) -> SessionId {
        self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Issue an outgoing call on a fresh session.
    ///
    /// The returned session ID can be used for reference and cancellation;
    /// `callback` runs exactly once when the call's terminal "not waiting"
    /// signal arrives, right before the session is discarded.
    pub fn dispatch_outgoing(
        self: &Arc<Self>,
        method: impl Into<Method>,
        params: Params,
        incoming_call_map: IncomingCallMap,
        callback: SessionCallback,
        waiting_handler: Option<WaitingHandler>,
    ) -> SessionId {
        let session = self.create_session(incoming_call_map, waiting_handler);
        session.start(method.into(), params, callback);
        session.id()
    }

    fn create_session(
        self: &Arc<Self>,
        incoming_call_map: IncomingCallMap,
        waiting_handler: Option<WaitingHandler>,
    ) -> Arc<Session> {
        let session_id = self.generate_session_id();
        tracing::debug!(session_id, "session start");

        let invoke: Invoker = {
            let transport = Arc::clone(&self.transport);
            Arc::new(move |method, params, waiting| transport.invoke(method, params, waiting))
        };
        let end_handler: EndHandler = {
            let owner = Arc::downgrade(self);
            Arc::new(move |session_id| {
                if let Some(dispatcher) = owner.upgrade() {
                    dispatcher.session_ended(session_id);
                }
            })
        };

        let session = Arc::new(Session::new(
            session_id,
            incoming_call_map,
            waiting_handler,
            invoke,
            end_handler,
        ));
        self.sessions
            .write()
            .unwrap()
            .insert(session_id, Arc::clone(&session));
        session
    }

    fn session_ended(&self, session_id: SessionId) {
        tracing::debug!(session_id, "session end");
        self.sessions.write().unwrap().remove(&session_id);
    }

    /// Single entry point for all inbound frames from the transport.
    ///
    /// Routing order: cancellation notices by sequence ID, then the session
    /// named in the params, then global handlers, then the unhandled path.
    /// Never panics in normal operation; with [`Self::set_fail_on_unhandled`]
    /// set, an unhandled call panics instead (test environments only).
    pub fn route_incoming(&self, payload: Payload) {
        let Payload {
            method,
            param,
            response,
        } = payload;

        if response.is_cancelled() {
            if let Some(seqid) = response.seqid() {
                self.handle_cancel(seqid);
            }
            return;
        }

        let session_id = session_id_of(&param);
        if let Some(session_id) = session_id {
            let session = self.sessions.read().unwrap().get(&session_id).cloned();
            if let Some(session) = session {
                if session.incoming_call(&method, &param, &response) {
                    return;
                }
            }
        }

        let handler = self.global_handlers.read().unwrap().get(&method).cloned();
        if let Some(handler) = handler {
            tracing::debug!(method = %method, "handling incoming");
            handler(param, response);
            return;
        }

        self.handle_unhandled(&method, session_id, &param, &response);
    }

    /// An abrupt, caller-initiated termination keyed only by sequence ID.
    /// No session callback fires.
    fn handle_cancel(&self, seqid: SeqId) {
        let session = {
            let sessions = self.sessions.read().unwrap();
            sessions.values().find(|s| s.has_seq_id(seqid)).cloned()
        };
        match session {
            Some(session) => {
                tracing::debug!(session_id = session.id(), seqid, "received cancel for session");
                session.end();
            }
            None => {
                tracing::debug!(seqid, "received cancel but no session claims it");
            }
        }
    }

    fn handle_unhandled(
        &self,
        method: &Method,
        session_id: Option<SessionId>,
        param: &Params,
        response: &Response,
    ) {
        tracing::warn!(method = %method, session_id, "unhandled incoming rpc");
        if self.fail_on_unhandled.load(Ordering::Relaxed) {
            panic!("unhandled incoming rpc: {session_id:?} {method} {param:?}");
        }
        response.error(RpcError::unhandled(session_id, method));
    }

    /// Register a handler for inbound calls carrying no session. The first
    /// registration for a method wins; duplicates are logged and ignored.
    pub fn register_handler(&self, method: impl Into<Method>, handler: GlobalHandler) {
        let mut handlers = self.global_handlers.write().unwrap();
        match handlers.entry(method.into()) {
            Entry::Occupied(entry) => {
                tracing::warn!(method = %entry.key(), "duplicate incoming handler, registration ignored");
            }
            Entry::Vacant(entry) => {
                tracing::debug!(method = %entry.key(), "registering incoming handler");
                entry.insert(handler);
            }
        }
    }

    /// Register a callback to run on every reconnect, keyed so callers can
    /// replace or remove it later. If the transport is already connected the
    /// callback also runs immediately.
    pub fn register_reconnect_handler(&self, key: impl Into<String>, handler: ReconnectHandler) {
        if self.transport.is_connected() {
            handler();
        }
        self.reconnect_handlers
            .lock()
            .unwrap()
            .insert(key.into(), handler);
    }

    /// Remove a reconnect callback.
    pub fn deregister_reconnect_handler(&self, key: &str) {
        self.reconnect_handlers.lock().unwrap().remove(key);
    }

    /// Called by the transport once connectivity is (re)established.
    ///
    /// Runs each registered reconnect callback exactly once, from a snapshot
    /// of the map: handlers registered during the sweep only fire on the
    /// next reconnect.
    pub fn on_reconnected(&self) {
        let handlers: Vec<ReconnectHandler> = self
            .reconnect_handlers
            .lock()
            .unwrap()
            .values()
            .cloned()
            .collect();
        for handler in handlers {
            handler();
        }
    }

    /// Report cancellation of an outstanding call through its response
    /// handle. This does not terminate any session by itself; termination
    /// flows through the normal completion or cancellation-by-seqid paths.
    pub fn cancel_outgoing(&self, response: &Response, error: Option<RpcError>) {
        if !response.error(error.unwrap_or_else(RpcError::cancelled)) {
            tracing::error!("invalid response handle passed to cancel_outgoing");
        }
    }

    /// Ask the transport to tear down and re-establish its connection.
    /// Live sessions are left in place; they end through their normal
    /// lifecycle.
    pub fn reset(&self) {
        tracing::debug!(outstanding = self.session_count(), "resetting transport connection");
        self.transport.reset_connection();
    }

    /// Force unhandled inbound calls to panic instead of degrading
    /// gracefully. Intended for test environments.
    pub fn set_fail_on_unhandled(&self, fail: bool) {
        self.fail_on_unhandled.store(fail, Ordering::Relaxed);
    }

    /// Whether unhandled inbound calls currently panic.
    #[must_use]
    pub fn fail_on_unhandled(&self) -> bool {
        self.fail_on_unhandled.load(Ordering::Relaxed)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Snapshot of live session IDs, ascending. Useful for surfacing stuck
    /// RPCs.
    #[must_use]
    pub fn outstanding_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

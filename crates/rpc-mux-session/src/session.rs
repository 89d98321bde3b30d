//! A session is a series of calls back and forth tied together with a single
//! session ID.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use rpc_mux_core::{Method, Params, Response, SeqId, SessionId, WaitingCallback, with_session_id};

/// Handler for an inbound call scoped to a session.
pub type SessionHandler = Arc<dyn Fn(Params, Response, WaitingNotifier) + Send + Sync>;

/// The inbound methods a session understands, supplied at creation.
pub type IncomingCallMap = HashMap<Method, SessionHandler>;

/// Observer invoked on every waiting-state transition, with the method name
/// and owning session ID.
pub type WaitingHandler = Arc<dyn Fn(bool, &Method, SessionId) + Send + Sync>;

/// Completion callback for the session's one outgoing call.
pub type SessionCallback = Box<dyn FnOnce() + Send>;

/// Injected capability for performing outgoing calls.
pub(crate) type Invoker = Arc<dyn Fn(Method, Params, WaitingCallback) + Send + Sync>;

/// Injected capability for telling the owner the session is finished.
pub(crate) type EndHandler = Arc<dyn Fn(SessionId) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Direction {
    Outgoing,
    Incoming,
}

struct OutgoingRequest {
    method: Method,
    callback: Option<SessionCallback>,
}

struct IncomingRequest {
    method: Method,
}

struct Inner {
    outgoing: Vec<OutgoingRequest>,
    incoming: Vec<IncomingRequest>,
    /// Sequence IDs this session owns. Value is true once a response has
    /// been sent (a cancel often arrives after the reply).
    seq_responded: HashMap<SeqId, bool>,
    ended: bool,
}

/// One logical multi-step RPC exchange.
///
/// A session owns its in-flight request bookkeeping and talks to the outside
/// world only through its injected invoke and end capabilities; it never
/// reaches into the dispatcher's maps.
pub struct Session {
    id: SessionId,
    incoming_call_map: IncomingCallMap,
    waiting_handler: Option<WaitingHandler>,
    invoke: Invoker,
    end_handler: EndHandler,
    inner: Mutex<Inner>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        incoming_call_map: IncomingCallMap,
        waiting_handler: Option<WaitingHandler>,
        invoke: Invoker,
        end_handler: EndHandler,
    ) -> Self {
        Self {
            id,
            incoming_call_map,
            waiting_handler,
            invoke,
            end_handler,
            inner: Mutex::new(Inner {
                outgoing: Vec::new(),
                incoming: Vec::new(),
                seq_responded: HashMap::new(),
                ended: false,
            }),
        }
    }

    /// This session's ID.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Issue the session's one outgoing call. Called exactly once by the
    /// dispatcher right after creation; the session ends when the call's
    /// terminal "not waiting" transition arrives.
    pub(crate) fn start(self: &Arc<Self>, method: Method, params: Params, callback: SessionCallback) {
        let params = with_session_id(params, self.id);
        tracing::debug!(session_id = self.id, method = %method, "session start call");

        self.inner.lock().unwrap().outgoing.push(OutgoingRequest {
            method: method.clone(),
            callback: Some(callback),
        });

        let notifier = WaitingNotifier::new(self, Direction::Outgoing, method.clone(), None);
        (self.invoke)(method, params, Box::new(move |waiting| notifier.notify(waiting)));
    }

    /// Deliver one inbound call scoped to this session.
    ///
    /// Returns whether the session could handle the method; on `false` the
    /// dispatcher must treat the call as unhandled.
    pub fn incoming_call(self: &Arc<Self>, method: &Method, param: &Params, response: &Response) -> bool {
        tracing::debug!(session_id = self.id, method = %method, "session incoming call");

        let Some(handler) = self.incoming_call_map.get(method) else {
            return false;
        };

        let seqid = response.seqid();
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(seqid) = seqid {
                inner.seq_responded.insert(seqid, false);
            }
            inner.incoming.push(IncomingRequest {
                method: method.clone(),
            });
        }

        let notifier = WaitingNotifier::new(self, Direction::Incoming, method.clone(), seqid);
        handler(param.clone(), response.clone(), notifier);
        true
    }

    /// Tell the owner this session is finished. Safe to call more than once;
    /// only the first call fires the end handler.
    pub fn end(&self) {
        let already_ended = {
            let mut inner = self.inner.lock().unwrap();
            std::mem::replace(&mut inner.ended, true)
        };
        if already_ended {
            return;
        }
        (self.end_handler)(self.id);
    }

    /// Whether this session owns bookkeeping for the given sequence ID.
    /// Used by the dispatcher to resolve cancellation notices that arrive
    /// keyed only by sequence ID.
    #[must_use]
    pub fn has_seq_id(&self, seqid: SeqId) -> bool {
        self.inner.lock().unwrap().seq_responded.contains_key(&seqid)
    }

    /// One waiting-state transition for a request on this session.
    ///
    /// Every transition is forwarded to the configured waiting handler. A
    /// `false` transition means the request is finished: its record is
    /// removed, its sequence ID (if any) is marked responded, and for the
    /// outgoing call the completion callback runs before the session ends.
    fn waiting_transition(&self, direction: Direction, method: &Method, seqid: Option<SeqId>, waiting: bool) {
        tracing::debug!(session_id = self.id, method = %method, waiting, "waiting state change");
        if let Some(handler) = &self.waiting_handler {
            handler(waiting, method, self.id);
        }
        if waiting {
            return;
        }

        let finished = {
            let mut inner = self.inner.lock().unwrap();
            // A terminal response racing a cancellation loses: once the
            // session ended, no record is removed and no callback fires.
            if inner.ended {
                return;
            }
            match direction {
                Direction::Outgoing => {
                    let Some(idx) = inner.outgoing.iter().position(|r| r.method == *method) else {
                        return;
                    };
                    if let Some(seqid) = seqid {
                        inner.seq_responded.insert(seqid, true);
                    }
                    let mut request = inner.outgoing.remove(idx);
                    request.callback.take()
                }
                Direction::Incoming => {
                    let Some(idx) = inner.incoming.iter().position(|r| r.method == *method) else {
                        return;
                    };
                    if let Some(seqid) = seqid {
                        inner.seq_responded.insert(seqid, true);
                    }
                    inner.incoming.remove(idx);
                    None
                }
            }
        };

        if let Some(callback) = finished {
            callback();
            self.end();
        }
    }
}

/// Per-request waiting-state notifier.
///
/// Handed to incoming-call handlers, and wrapped into the
/// [`WaitingCallback`] given to the transport for outgoing calls. Holds a
/// weak session reference, so notifications arriving after the session was
/// torn down are safe no-ops.
#[derive(Clone)]
pub struct WaitingNotifier {
    session: Weak<Session>,
    direction: Direction,
    method: Method,
    seqid: Option<SeqId>,
}

impl WaitingNotifier {
    fn new(session: &Arc<Session>, direction: Direction, method: Method, seqid: Option<SeqId>) -> Self {
        Self {
            session: Arc::downgrade(session),
            direction,
            method,
            seqid,
        }
    }

    /// Report a waiting-state transition for this request.
    pub fn notify(&self, waiting: bool) {
        if let Some(session) = self.session.upgrade() {
            session.waiting_transition(self.direction, &self.method, self.seqid, waiting);
        }
    }

    /// Report that this request is finished.
    pub fn finished(&self) {
        self.notify(false);
    }
}

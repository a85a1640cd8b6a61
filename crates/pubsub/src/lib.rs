//! Per-session event publisher. Each session owns a set of bounded
//! per-subscriber `mpsc` channels (mirroring the gateway's per-connection
//! outbound channel pattern); publishing fans a message out to every
//! subscriber of its own session only — there is no shared broadcast
//! channel, so one session's messages can never leak into another's.

use std::collections::HashMap;
use std::sync::Arc;

use agentcore_domain::config::BackpressurePolicy;
use agentcore_domain::ids::ThreadId;
use agentcore_domain::message::Envelope;
use parking_lot::RwLock;
use tokio::sync::mpsc;

pub type SubscriberId = u64;

struct Subscriber {
    tx: mpsc::Sender<Envelope>,
}

struct SessionChannels {
    next_subscriber_id: SubscriberId,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl SessionChannels {
    fn new() -> Self {
        Self {
            next_subscriber_id: 0,
            subscribers: HashMap::new(),
        }
    }
}

/// Publishes envelopes to every subscriber of a session, applying the
/// configured backpressure policy when a subscriber's channel is full:
/// `Block` awaits until there's room (bounded by the channel capacity, so a
/// stalled subscriber throttles the publisher rather than the publisher
/// growing unboundedly); `Drop` discards the message for that subscriber and
/// moves on, so one slow reader never stalls the rest.
pub struct Publisher {
    capacity: usize,
    policy: BackpressurePolicy,
    sessions: Arc<RwLock<HashMap<ThreadId, SessionChannels>>>,
}

pub struct Subscription {
    session_id: ThreadId,
    subscriber_id: SubscriberId,
    rx: mpsc::Receiver<Envelope>,
    sessions: Arc<RwLock<HashMap<ThreadId, SessionChannels>>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(session) = self.sessions.write().get_mut(&self.session_id) {
            session.subscribers.remove(&self.subscriber_id);
        }
    }
}

impl Publisher {
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            capacity,
            policy,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn subscribe(&self, session_id: ThreadId) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let subscriber_id = {
            let mut sessions = self.sessions.write();
            let session = sessions.entry(session_id).or_insert_with(SessionChannels::new);
            let id = session.next_subscriber_id;
            session.next_subscriber_id += 1;
            session.subscribers.insert(id, Subscriber { tx });
            id
        };
        Subscription {
            session_id,
            subscriber_id,
            rx,
            sessions: self.sessions.clone(),
        }
    }

    /// Explicit unsubscribe; also happens automatically when the
    /// `Subscription` is dropped.
    pub fn unsubscribe(&self, session_id: ThreadId, subscriber_id: SubscriberId) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.subscribers.remove(&subscriber_id);
        }
    }

    /// Publish to every current subscriber of `session_id`. A cancellation
    /// token lets an in-progress `Block` wait abort cooperatively rather
    /// than holding a publisher task hostage forever.
    pub async fn publish(&self, session_id: ThreadId, message: Envelope, cancel: &tokio_util::sync::CancellationToken) {
        let senders: Vec<mpsc::Sender<Envelope>> = {
            let sessions = self.sessions.read();
            match sessions.get(&session_id) {
                Some(session) => session.subscribers.values().map(|s| s.tx.clone()).collect(),
                None => return,
            }
        };

        for tx in senders {
            match self.policy {
                BackpressurePolicy::Block => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        result = tx.send(message.clone()) => {
                            let _ = result;
                        }
                    }
                }
                BackpressurePolicy::Drop => {
                    if tx.try_send(message.clone()).is_err() {
                        tracing::warn!(session_id = %session_id, "dropped message: subscriber channel full");
                    }
                }
            }
        }
    }

    /// Close out a session: drop every subscriber's sender so their `recv()`
    /// loops see the channel close and end gracefully.
    pub fn close_session(&self, session_id: ThreadId) {
        self.sessions.write().remove(&session_id);
    }

    pub fn subscriber_count(&self, session_id: ThreadId) -> usize {
        self.sessions
            .read()
            .get(&session_id)
            .map(|s| s.subscribers.len())
            .unwrap_or(0)
    }
}

//! Cooperative per-run cancellation, keyed by `RunId`. Built directly on
//! `tokio_util::sync::CancellationToken` — the same primitive
//! `agentcore-pubsub::Publisher::publish` already awaits during a `Block`
//! backpressure wait — rather than a separate `AtomicBool` flag that would
//! need to be kept in sync with it. No cascading/group semantics: a run
//! never spawns child runs that would need to cancel together.

use std::collections::HashMap;

use agentcore_domain::ids::RunId;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<RunId, CancellationToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for a newly-assigned run.
    pub fn issue(&self, run_id: RunId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.lock().insert(run_id, token.clone());
        token
    }

    /// Request cancellation of an in-flight run. Returns `false` if the run
    /// is unknown (already finished, or never existed).
    pub fn cancel(&self, run_id: RunId) -> bool {
        match self.tokens.lock().get(&run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the token once a run has finished; cancel requests against it
    /// afterward are simply no-ops.
    pub fn retire(&self, run_id: RunId) {
        self.tokens.lock().remove(&run_id);
    }
}

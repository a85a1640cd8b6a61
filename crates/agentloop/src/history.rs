//! In-memory conversation history for one thread: single-owner, mutated
//! only by the thread's own loop task, so it needs no lock of its own (the
//! per-thread session semaphore guards against a second drive starting
//! concurrently, not against concurrent mutation within one drive).
//!
//! Every entry is tagged with the run that produced it so a fork can
//! truncate at an exact run boundary.

use agentcore_domain::ids::RunId;
use agentcore_domain::message::MessageBody;

struct Entry {
    run_id: RunId,
    body: MessageBody,
}

#[derive(Default)]
pub struct History {
    entries: Vec<Entry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, run_id: RunId, body: MessageBody) {
        self.entries.push(Entry { run_id, body });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bodies(&self) -> Vec<MessageBody> {
        self.entries.iter().map(|e| e.body.clone()).collect()
    }

    /// Truncate at the end of `run_id`'s boundary, keeping everything up to
    /// and including the last entry tagged with that run and discarding
    /// everything after. A no-op if `run_id` never produced any entries.
    pub fn truncate_after_run(&mut self, run_id: RunId) {
        if let Some(pos) = self.entries.iter().rposition(|e| e.run_id == run_id) {
            self.entries.truncate(pos + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_domain::message::Role;

    fn text(role: Role, text: &str) -> MessageBody {
        MessageBody::TextMessage { role, text: text.to_string() }
    }

    #[test]
    fn append_preserves_order() {
        let mut history = History::new();
        let run = RunId::new();
        history.append(run, text(Role::User, "hi"));
        history.append(run, text(Role::Assistant, "hi back"));
        let bodies = history.bodies();
        assert_eq!(bodies.len(), 2);
        assert!(matches!(&bodies[0], MessageBody::TextMessage { text, .. } if text == "hi"));
    }

    #[test]
    fn truncate_after_run_drops_everything_from_a_later_run() {
        let mut history = History::new();
        let r1 = RunId::new();
        let r2 = RunId::new();
        history.append(r1, text(Role::User, "edit target"));
        history.append(r1, text(Role::Assistant, "r1 reply"));
        history.append(r2, text(Role::User, "should be discarded"));

        history.truncate_after_run(r1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn truncating_an_unknown_run_is_a_no_op() {
        let mut history = History::new();
        history.append(RunId::new(), text(Role::User, "hi"));
        history.truncate_after_run(RunId::new());
        assert_eq!(history.len(), 1);
    }
}

//! Commit notifications.
//!
//! Listeners registered on an [`EventHub`] are called synchronously, in
//! registration order, on the thread driving the inserter:
//!
//! ```text
//! stage rows → PreCommit → write_to_server → PostCommit → count → clear
//!                                   ✗ (error) → nothing more fires
//! ```

use bulkcopy_core::TableName;
use std::fmt;

/// Which side of the commit a notification is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitPhase {
    PreCommit,
    PostCommit,
}

/// Handle returned by listener registration, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Payload of a commit notification.
#[derive(Debug)]
pub struct BatchEvent<'a, T> {
    /// Table the batch is written to.
    pub destination: &'a TableName,
    /// Zero-based sequence of this batch among the inserter's committed batches.
    pub sequence: u64,
    /// The batch's source records, in input order.
    pub records: &'a [T],
}

impl<T> BatchEvent<'_, T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

type Listener<T> = Box<dyn FnMut(&BatchEvent<'_, T>) + Send>;

/// Registry of pre- and post-commit listeners.
pub struct EventHub<T> {
    next_id: u64,
    pre_commit: Vec<(ListenerId, Listener<T>)>,
    post_commit: Vec<(ListenerId, Listener<T>)>,
}

impl<T> EventHub<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pre_commit: Vec::new(),
            post_commit: Vec::new(),
        }
    }

    /// Register `listener` for `phase`.
    pub fn subscribe<F>(&mut self, phase: CommitPhase, listener: F) -> ListenerId
    where
        F: FnMut(&BatchEvent<'_, T>) + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let entry = (id, Box::new(listener) as Listener<T>);
        match phase {
            CommitPhase::PreCommit => self.pre_commit.push(entry),
            CommitPhase::PostCommit => self.post_commit.push(entry),
        }
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.pre_commit.len() + self.post_commit.len();
        self.pre_commit.retain(|(lid, _)| *lid != id);
        self.post_commit.retain(|(lid, _)| *lid != id);
        before != self.pre_commit.len() + self.post_commit.len()
    }

    /// Call every listener registered for `phase` with `event`.
    pub fn emit(&mut self, phase: CommitPhase, event: &BatchEvent<'_, T>) {
        let listeners = match phase {
            CommitPhase::PreCommit => &mut self.pre_commit,
            CommitPhase::PostCommit => &mut self.post_commit,
        };
        for (_, listener) in listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn listener_count(&self, phase: CommitPhase) -> usize {
        match phase {
            CommitPhase::PreCommit => self.pre_commit.len(),
            CommitPhase::PostCommit => self.post_commit.len(),
        }
    }
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventHub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("pre_commit", &self.pre_commit.len())
            .field("post_commit", &self.post_commit.len())
            .finish()
    }
}

//! Per-node lock state with fair FIFO queueing.
//!
//! A `LockNode` admits either any number of Shared holders or exactly one
//! Exclusive holder. Requests join a ticketed FIFO queue; tickets are handed
//! out in arrival order and are strictly increasing. Grant rules:
//!
//! - Shared: no Exclusive holder and no queued Exclusive request with an
//!   older ticket. Contiguous Shared requests at the front are therefore
//!   granted together, and a Shared arrival never overtakes an older
//!   Exclusive request.
//! - Exclusive: at the head of the queue and no holders at all.
//!
//! Waiters suspend on a `tokio::sync::Notify` and re-evaluate their grant
//! condition on every release, cancellation, or close. Dropping a pending
//! acquire future withdraws its ticket and re-notifies the node, so a
//! disconnected client cannot block the queue behind it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Lock access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared (read) access, compatible with other Shared holders
    Shared,
    /// Exclusive (write) access, compatible with nothing
    Exclusive,
}

/// Position of a request in a node's FIFO queue.
pub type Ticket = u64;

/// Errors from lock operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    /// The node was deleted while the request was held or queued
    #[error("Lock node removed while request was pending")]
    NodeRemoved,

    /// Release without a matching holder
    #[error("No {0:?} holder to release")]
    NotHeld(LockMode),
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    ticket: Ticket,
    mode: LockMode,
}

#[derive(Debug, Default)]
struct LockState {
    /// Current holders: all Shared, or a single Exclusive
    holders: Vec<LockMode>,
    /// Pending requests in arrival order; tickets strictly increasing
    queue: VecDeque<QueueEntry>,
    /// Tickets of queued Exclusive requests, in arrival order
    exclusive_waiters: Vec<Ticket>,
    next_ticket: Ticket,
    closed: bool,
}

impl LockState {
    fn enqueue(&mut self, mode: LockMode) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.queue.push_back(QueueEntry { ticket, mode });
        if mode == LockMode::Exclusive {
            self.exclusive_waiters.push(ticket);
        }
        ticket
    }

    fn remove_queued(&mut self, ticket: Ticket) {
        if let Some(pos) = self.queue.iter().position(|e| e.ticket == ticket) {
            self.queue.remove(pos);
        }
        self.exclusive_waiters.retain(|&t| t != ticket);
    }

    /// Checks the grant condition for `ticket`; on success the request is
    /// moved from the queue into the holder list.
    fn try_grant(&mut self, ticket: Ticket, mode: LockMode) -> bool {
        let grantable = match mode {
            LockMode::Exclusive => {
                self.holders.is_empty()
                    && self.queue.front().map(|e| e.ticket) == Some(ticket)
            }
            LockMode::Shared => {
                !self.holders.contains(&LockMode::Exclusive)
                    && !self.exclusive_waiters.iter().any(|&t| t < ticket)
            }
        };

        if grantable {
            self.remove_queued(ticket);
            self.holders.push(mode);
        }
        grantable
    }
}

/// Lock state of a single tree node.
#[derive(Debug, Default)]
pub struct LockNode {
    state: Mutex<LockState>,
    notify: Notify,
}

/// Withdraws a queued ticket if the owning acquire future is dropped
/// before its grant.
struct PendingTicket<'a> {
    node: &'a LockNode,
    ticket: Ticket,
    armed: bool,
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.node.state.lock().remove_queued(self.ticket);
            // Requests behind the withdrawn ticket may now be grantable.
            self.node.notify.notify_waiters();
        }
    }
}

impl LockNode {
    /// Creates a new, unlocked node.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquires the lock in the given mode, suspending until granted.
    ///
    /// Returns `NodeRemoved` if the node is deleted before the grant.
    /// Cancellation-safe: dropping the future withdraws the ticket.
    pub async fn acquire(&self, mode: LockMode) -> Result<(), LockError> {
        let ticket = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(LockError::NodeRemoved);
            }
            state.enqueue(mode)
        };
        let mut pending = PendingTicket {
            node: self,
            ticket,
            armed: true,
        };

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register for wakeups before checking, so a release between the
            // check and the await cannot be missed.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    pending.armed = false;
                    return Err(LockError::NodeRemoved);
                }
                if state.try_grant(ticket, mode) {
                    pending.armed = false;
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Releases one holder of the given mode and wakes eligible waiters.
    pub fn release(&self, mode: LockMode) -> Result<(), LockError> {
        {
            let mut state = self.state.lock();
            let pos = state
                .holders
                .iter()
                .position(|h| *h == mode)
                .ok_or(LockError::NotHeld(mode))?;
            state.holders.remove(pos);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Marks the node removed: clears all state and wakes every waiter
    /// with `NodeRemoved`. Called when the owning tree node is deleted.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.holders.clear();
            state.queue.clear();
            state.exclusive_waiters.clear();
        }
        self.notify.notify_waiters();
    }

    /// Returns the number of current holders.
    pub fn holder_count(&self) -> usize {
        self.state.lock().holders.len()
    }

    /// Returns true if the current holder set contains an Exclusive lock.
    pub fn has_exclusive_holder(&self) -> bool {
        self.state.lock().holders.contains(&LockMode::Exclusive)
    }

    /// Returns the number of queued requests.
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns true if the node has no holders and no queued requests.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.holders.is_empty() && state.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::JoinHandle;
    use tokio::time::sleep;

    use super::*;

    fn spawn_acquire(node: &Arc<LockNode>, mode: LockMode) -> JoinHandle<Result<(), LockError>> {
        let node = node.clone();
        tokio::spawn(async move { node.acquire(mode).await })
    }

    /// Lets spawned acquire tasks run far enough to enqueue in spawn order.
    async fn settle() {
        sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_shared_holders_coexist() {
        let node = LockNode::new();
        node.acquire(LockMode::Shared).await.unwrap();
        node.acquire(LockMode::Shared).await.unwrap();
        assert_eq!(node.holder_count(), 2);

        node.release(LockMode::Shared).unwrap();
        node.release(LockMode::Shared).unwrap();
        assert!(node.is_idle());
    }

    #[tokio::test]
    async fn test_exclusive_excludes_everything() {
        let node = LockNode::new();
        node.acquire(LockMode::Exclusive).await.unwrap();

        let reader = spawn_acquire(&node, LockMode::Shared);
        let writer = spawn_acquire(&node, LockMode::Exclusive);
        settle().await;
        assert!(!reader.is_finished());
        assert!(!writer.is_finished());

        node.release(LockMode::Exclusive).unwrap();
        reader.await.unwrap().unwrap();
        settle().await;
        assert!(!writer.is_finished(), "writer waits for the granted reader");

        node.release(LockMode::Shared).unwrap();
        writer.await.unwrap().unwrap();
        node.release(LockMode::Exclusive).unwrap();
        assert!(node.is_idle());
    }

    #[tokio::test]
    async fn test_release_without_holder_fails() {
        let node = LockNode::new();
        assert_eq!(
            node.release(LockMode::Shared),
            Err(LockError::NotHeld(LockMode::Shared))
        );

        node.acquire(LockMode::Shared).await.unwrap();
        assert_eq!(
            node.release(LockMode::Exclusive),
            Err(LockError::NotHeld(LockMode::Exclusive))
        );
        node.release(LockMode::Shared).unwrap();
    }

    #[tokio::test]
    async fn test_reader_does_not_overtake_queued_writer() {
        let node = LockNode::new();
        node.acquire(LockMode::Shared).await.unwrap();

        let writer = spawn_acquire(&node, LockMode::Exclusive);
        settle().await;
        let late_reader = spawn_acquire(&node, LockMode::Shared);
        settle().await;

        // The reader arrived after the writer and must wait behind it even
        // though the node is only Shared-locked.
        assert!(!late_reader.is_finished());

        node.release(LockMode::Shared).unwrap();
        writer.await.unwrap().unwrap();
        settle().await;
        assert!(!late_reader.is_finished());

        node.release(LockMode::Exclusive).unwrap();
        late_reader.await.unwrap().unwrap();
        node.release(LockMode::Shared).unwrap();
    }

    #[tokio::test]
    async fn test_fairness_queue_batches() {
        let node = LockNode::new();

        // A and B hold Shared.
        node.acquire(LockMode::Shared).await.unwrap();
        node.acquire(LockMode::Shared).await.unwrap();

        // Queue: C (exclusive), D..K (8 shared), L (exclusive), M, N (shared).
        let c = spawn_acquire(&node, LockMode::Exclusive);
        settle().await;
        let readers: Vec<_> = {
            let mut readers = Vec::new();
            for _ in 0..8 {
                readers.push(spawn_acquire(&node, LockMode::Shared));
                settle().await;
            }
            readers
        };
        let l = spawn_acquire(&node, LockMode::Exclusive);
        settle().await;
        let m = spawn_acquire(&node, LockMode::Shared);
        let n = spawn_acquire(&node, LockMode::Shared);
        settle().await;

        // A and B release: exactly C acquires.
        node.release(LockMode::Shared).unwrap();
        node.release(LockMode::Shared).unwrap();
        c.await.unwrap().unwrap();
        settle().await;
        assert!(readers.iter().all(|r| !r.is_finished()));
        assert!(!l.is_finished());

        // C releases: D..K acquire together.
        node.release(LockMode::Exclusive).unwrap();
        for reader in readers {
            reader.await.unwrap().unwrap();
        }
        settle().await;
        assert!(!l.is_finished());
        assert!(!m.is_finished());
        assert!(!n.is_finished());

        // The batch releases: L acquires alone.
        for _ in 0..8 {
            node.release(LockMode::Shared).unwrap();
        }
        l.await.unwrap().unwrap();
        settle().await;
        assert!(!m.is_finished());
        assert!(!n.is_finished());

        // L releases: M and N acquire together.
        node.release(LockMode::Exclusive).unwrap();
        m.await.unwrap().unwrap();
        n.await.unwrap().unwrap();
        node.release(LockMode::Shared).unwrap();
        node.release(LockMode::Shared).unwrap();
        assert!(node.is_idle());
    }

    #[tokio::test]
    async fn test_release_wakes_only_eligible_set() {
        let node = LockNode::new();
        node.acquire(LockMode::Exclusive).await.unwrap();

        // Queue: X (shared), Y (exclusive), Z (shared).
        let x = spawn_acquire(&node, LockMode::Shared);
        settle().await;
        let y = spawn_acquire(&node, LockMode::Exclusive);
        settle().await;
        let z = spawn_acquire(&node, LockMode::Shared);
        settle().await;

        // Release: X is granted alone; Z stays behind Y.
        node.release(LockMode::Exclusive).unwrap();
        x.await.unwrap().unwrap();
        settle().await;
        assert!(!y.is_finished());
        assert!(!z.is_finished());

        node.release(LockMode::Shared).unwrap();
        y.await.unwrap().unwrap();
        settle().await;
        assert!(!z.is_finished());

        node.release(LockMode::Exclusive).unwrap();
        z.await.unwrap().unwrap();
        node.release(LockMode::Shared).unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_request_unblocks_queue() {
        let node = LockNode::new();
        node.acquire(LockMode::Shared).await.unwrap();

        let writer = spawn_acquire(&node, LockMode::Exclusive);
        settle().await;
        let reader = spawn_acquire(&node, LockMode::Shared);
        settle().await;
        assert!(!reader.is_finished());

        // The queued writer goes away (client disconnect); the reader no
        // longer has an older exclusive waiter ahead of it.
        writer.abort();
        reader.await.unwrap().unwrap();

        node.release(LockMode::Shared).unwrap();
        node.release(LockMode::Shared).unwrap();
        assert!(node.is_idle());
    }

    #[tokio::test]
    async fn test_close_wakes_waiters_with_removed() {
        let node = LockNode::new();
        node.acquire(LockMode::Exclusive).await.unwrap();

        let waiter = spawn_acquire(&node, LockMode::Shared);
        settle().await;
        assert!(!waiter.is_finished());

        node.close();
        assert_eq!(waiter.await.unwrap(), Err(LockError::NodeRemoved));
        assert_eq!(
            node.acquire(LockMode::Shared).await,
            Err(LockError::NodeRemoved)
        );
    }
}

//! Connection slot pool.
//!
//! The pool owns a fixed number of slots, each holding either an open
//! connection or the not-yet-opened placeholder. Acquiring a slot is the
//! only suspension point in the client: callers queue on a semaphore until
//! a slot frees up, which also caps the number of simultaneous in-flight
//! requests at the pool capacity.

use crate::connection::Connection;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use tokio::sync::{Semaphore, SemaphorePermit};

/// One unit of pool capacity: an open connection, or `None` for a slot
/// whose connection has not been opened yet (or was dropped on failure).
pub type Slot = Option<Connection>;

/// Fixed-capacity pool of connection slots.
///
/// Capacity never changes after construction, and a slot is held by at most
/// one caller at any instant.
pub struct Pool {
    slots: Mutex<Vec<Slot>>,
    permits: Semaphore,
    capacity: usize,
}

impl Pool {
    /// Creates a pool with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new((0..capacity).map(|_| None).collect()),
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots not currently held by a caller.
    pub fn idle(&self) -> usize {
        self.slots.lock().len()
    }

    /// Acquires a slot, suspending until one is available.
    ///
    /// The slot rides in an RAII guard: dropping the guard pushes the slot
    /// back (with whatever it then holds, placeholder included) before the
    /// permit is released, so a slot can never leak, whatever the outcome
    /// of the call that held it.
    pub async fn acquire(&self) -> SlotGuard<'_> {
        // The semaphore is never closed, and holding a permit guarantees a
        // slot is present in the vector.
        let permit = self
            .permits
            .acquire()
            .await
            .expect("pool semaphore closed");
        let slot = self.slots.lock().pop().expect("pool slot missing");
        SlotGuard {
            pool: self,
            slot,
            _permit: permit,
        }
    }
}

/// Exclusive hold on one pool slot.
pub struct SlotGuard<'a> {
    pool: &'a Pool,
    slot: Slot,
    _permit: SemaphorePermit<'a>,
}

impl Deref for SlotGuard<'_> {
    type Target = Slot;

    fn deref(&self) -> &Slot {
        &self.slot
    }
}

impl DerefMut for SlotGuard<'_> {
    fn deref_mut(&mut self) -> &mut Slot {
        &mut self.slot
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        // Push the slot back before `_permit` drops so the next holder
        // always finds one.
        self.pool.slots.lock().push(self.slot.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_slots_start_empty() {
        let pool = Pool::new(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.idle(), 3);

        let guard = pool.acquire().await;
        assert!(guard.is_none());
        assert_eq!(pool.idle(), 2);
    }

    #[tokio::test]
    async fn test_dropping_guard_returns_slot() {
        let pool = Pool::new(1);
        drop(pool.acquire().await);
        assert_eq!(pool.idle(), 1);

        // The single slot can be re-acquired after release.
        let guard = pool.acquire().await;
        assert!(guard.is_none());
    }

    #[tokio::test]
    async fn test_capacity_bounds_concurrent_holders() {
        const CAPACITY: usize = 3;
        const CALLERS: usize = 12;

        let pool = Arc::new(Pool::new(CAPACITY));
        let holding = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..CALLERS {
            let pool = pool.clone();
            let holding = holding.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = pool.acquire().await;
                let now = holding.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                holding.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Every caller completed and no more than CAPACITY held at once.
        assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
        assert_eq!(pool.idle(), CAPACITY);
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded admission gate for tile fetches.
///
/// This is advisory backpressure, not a queue: a refused request is simply
/// not started, the tile stays absent, and the next paint that needs it asks
/// again. `release` must be called exactly once per successful `try_admit`,
/// on every terminal path.
#[derive(Debug)]
pub struct FetchScheduler {
    running: AtomicUsize,
    limit: usize,
}

impl FetchScheduler {
    pub fn new(limit: usize) -> Self {
        Self {
            running: AtomicUsize::new(0),
            limit: limit.max(1),
        }
    }

    /// Claims a fetch slot. Returns false when all slots are occupied.
    pub fn try_admit(&self) -> bool {
        let mut current = self.running.load(Ordering::Acquire);
        loop {
            if current >= self.limit {
                return false;
            }
            match self.running.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns a slot claimed by `try_admit`
    pub fn release(&self) {
        let mut current = self.running.load(Ordering::Acquire);
        loop {
            if current == 0 {
                log::error!("fetch scheduler released more slots than were admitted");
                return;
            }
            match self.running.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

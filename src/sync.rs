//! Admission control for the worker pools.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// A counting semaphore bounding how many workers may run at once.
///
/// Each worker holds a [`Permit`] for the duration of its unit of work. The
/// permit returns its token on drop, so a worker that fails (or panics) can
/// never starve the pool.
#[derive(Clone)]
pub struct Semaphore {
    state: Arc<State>,
}

struct State {
    capacity: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

/// RAII token released back to its [`Semaphore`] on drop.
pub struct Permit {
    state: Arc<State>,
}

impl State {
    // A worker panicking while holding the lock leaves a plain counter behind,
    // which is still consistent.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Semaphore {
    /// Create a semaphore handing out at most `capacity` permits.
    ///
    /// A capacity of zero is raised to one; a pool that can never admit work
    /// would deadlock every caller.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(State {
                capacity: capacity.max(1),
                in_use: Mutex::new(0),
                released: Condvar::new(),
            }),
        }
    }

    /// Block until a token is free, then take it.
    pub fn acquire(&self) -> Permit {
        let mut in_use = self.state.lock();
        while *in_use >= self.state.capacity {
            in_use = self
                .state
                .released
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += 1;

        Permit {
            state: Arc::clone(&self.state),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Number of permits currently held.
    pub fn in_use(&self) -> usize {
        *self.state.lock()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut in_use = self.state.lock();
        *in_use -= 1;
        self.state.released.notify_one();
    }
}

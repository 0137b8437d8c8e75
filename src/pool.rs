//! Bounded fan-out over a fixed set of work items.
//!
//! Every item gets its own worker thread, but a worker only starts its work
//! after taking a token from the pool's [`Semaphore`], so at most `jobs`
//! items are in progress at once. Results come back over one unbounded
//! channel in completion order; the caller holds the only receiving end.

use std::fmt;

use crossbeam_channel as chan;

use crate::sync::Semaphore;

/// Fans work out to threads, admitting at most `jobs` at a time.
pub struct WorkerPool {
    name: &'static str,
    permits: Semaphore,
}

impl WorkerPool {
    /// `name` prefixes worker thread names. `jobs` below 1 is treated as 1.
    pub fn new(name: &'static str, jobs: usize) -> Self {
        Self {
            name,
            permits: Semaphore::new(jobs),
        }
    }

    pub fn jobs(&self) -> usize {
        self.permits.capacity()
    }

    /// Start one worker per item and return a handle yielding exactly one
    /// result per item as each finishes.
    ///
    /// Neither admission nor delivery follows submission order; results
    /// arrive in whatever order the workers finish.
    pub fn run<T, R, F>(&self, items: Vec<T>, work: F) -> Completion<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + Clone + 'static,
    {
        let expected = items.len();
        let (tx, rx) = chan::unbounded();

        for (idx, item) in items.into_iter().enumerate() {
            let tx = tx.clone();
            let work = work.clone();
            let permits = self.permits.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("{}-{idx}", self.name))
                .spawn(move || {
                    let _permit = permits.acquire();
                    // The receiver only goes away when the consumer stopped
                    // listening; the result has nowhere to go.
                    let _ = tx.send(work(item));
                });
            if let Err(e) = spawned {
                log::error!("failed to start {} worker {idx}: {e}", self.name);
            }
        }

        Completion {
            rx,
            expected,
            received: 0,
        }
    }
}

/// Receiving end of a [`WorkerPool::run`].
///
/// Iterate it to consume results incrementally as they arrive, or call
/// [`Completion::drain`] to get all of them at once.
pub struct Completion<R> {
    rx: chan::Receiver<R>,
    expected: usize,
    received: usize,
}

impl<R> Completion<R> {
    /// A completion whose results have all arrived already, in order.
    #[cfg(test)]
    pub(crate) fn ready(results: Vec<R>) -> Self {
        let (tx, rx) = chan::unbounded();
        let expected = results.len();
        for result in results {
            let _ = tx.send(result);
        }
        Self {
            rx,
            expected,
            received: 0,
        }
    }

    /// Number of results the run will deliver.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Results not yet received. Once iteration has ended, anything still
    /// missing belongs to a worker that died without reporting.
    pub fn missing(&self) -> usize {
        self.expected - self.received
    }

    /// Wait for every result.
    ///
    /// Returns the full set or, if a worker died without reporting, an error
    /// and none of the results.
    pub fn drain(mut self) -> Result<Vec<R>, IncompleteRun> {
        let results: Vec<R> = self.by_ref().collect();
        if results.len() == self.expected {
            Ok(results)
        } else {
            Err(IncompleteRun {
                expected: self.expected,
                received: results.len(),
            })
        }
    }
}

impl<R> Iterator for Completion<R> {
    type Item = R;

    /// Block until the next result arrives. `None` once all results have
    /// been delivered, or once every worker has exited.
    fn next(&mut self) -> Option<R> {
        if self.received == self.expected {
            return None;
        }
        let result = self.rx.recv().ok()?;
        self.received += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.missing()))
    }
}

/// Some workers exited without delivering a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteRun {
    pub expected: usize,
    pub received: usize,
}

impl fmt::Display for IncompleteRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "only {} of {} workers reported a result",
            self.received, self.expected
        )
    }
}

impl std::error::Error for IncompleteRun {}

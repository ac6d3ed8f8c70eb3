use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread::ThreadId;

use log::{error, trace};

use crate::errors::UsageError;

pub type RenderCommand = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Work that has to happen on the render thread, queued from any thread.
///
/// The first thread to drain the queue becomes the render thread; draining from any other thread afterwards is a
/// usage error. Commands run exactly once, in submission order across all producers.
#[derive(Default)]
pub struct RenderCommandQueue {
    queue: Mutex<VecDeque<(u64, RenderCommand)>>,
    render_thread: OnceLock<ThreadId>,
    submitted: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub executed: u64,
    pub failed: u64,
    pub pending: usize,
}

impl RenderCommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never blocks on the render thread and never runs `command` inline.
    pub fn enqueue<F>(&self, command: F) -> u64
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let mut queue = self.queue.lock().expect("Render queue lock");
        // numbered under the lock, so numbers follow queue order
        let sequence = self.submitted.fetch_add(1, Ordering::AcqRel);
        queue.push_back((sequence, Box::new(command)));
        sequence
    }

    pub fn bind_render_thread(&self) -> Result<(), UsageError> {
        let current = std::thread::current().id();
        let bound = self.render_thread.get_or_init(|| current);
        if *bound != current {
            return Err(UsageError::WrongThread);
        }
        Ok(())
    }

    pub fn is_render_thread(&self) -> bool {
        self.render_thread
            .get()
            .is_some_and(|bound| *bound == std::thread::current().id())
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().expect("Render queue lock").len()
    }

    /// Runs everything queued at the time of the call. Commands queued while draining wait for the next drain.
    /// Failing and panicking commands are logged and skipped.
    pub fn drain(&self) -> Result<usize, UsageError> {
        self.bind_render_thread()?;
        profiling::scope!("RenderCommandQueue::drain");

        let batch = std::mem::take(&mut *self.queue.lock().expect("Render queue lock"));
        let count = batch.len();
        for (sequence, command) in batch {
            match catch_unwind(AssertUnwindSafe(command)) {
                Ok(Ok(())) => {
                    trace!("Render command {} done", sequence);
                }
                Ok(Err(e)) => {
                    self.failed.fetch_add(1, Ordering::AcqRel);
                    error!("Render command {} failed: {:?}", sequence, e);
                }
                Err(_) => {
                    self.failed.fetch_add(1, Ordering::AcqRel);
                    error!("Render command {} panicked", sequence);
                }
            }
            self.executed.fetch_add(1, Ordering::AcqRel);
        }

        Ok(count)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Acquire),
            executed: self.executed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            pending: self.pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RenderCommandQueue;
    use crate::errors::UsageError;
    use std::sync::{Arc, Mutex};

    #[test]
    pub fn runs_in_order_exactly_once_across_producers() {
        let queue = Arc::new(RenderCommandQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let producers = (0..4)
            .map(|producer| {
                let queue = queue.clone();
                let seen = seen.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let seen = seen.clone();
                        let sequence = queue.enqueue(move || {
                            seen.lock().unwrap().push((producer, i));
                            Ok(())
                        });
                        assert!(sequence < 400);
                    }
                })
            })
            .collect::<Vec<_>>();
        for producer in producers {
            producer.join().unwrap();
        }

        // nothing ran inline
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(queue.drain().unwrap(), 400);
        assert_eq!(queue.drain().unwrap(), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 400);
        for producer in 0..4 {
            let own = seen.iter().filter(|(p, _)| *p == producer).map(|(_, i)| *i).collect::<Vec<_>>();
            assert_eq!(own, (0..100).collect::<Vec<_>>());
        }
    }

    #[test]
    pub fn failures_are_skipped() {
        let queue = RenderCommandQueue::new();
        let ran = Arc::new(Mutex::new(0));

        queue.enqueue(|| Err(anyhow::anyhow!("device lost")));
        queue.enqueue(|| panic!("broken command"));
        let counter = ran.clone();
        queue.enqueue(move || {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(queue.drain().unwrap(), 3);
        assert_eq!(*ran.lock().unwrap(), 1);
        let stats = queue.stats();
        assert_eq!((stats.executed, stats.failed, stats.pending), (3, 2, 0));
    }

    #[test]
    pub fn only_the_render_thread_drains() {
        let queue = Arc::new(RenderCommandQueue::new());
        queue.drain().unwrap();
        assert!(queue.is_render_thread());

        let other = queue.clone();
        let result = std::thread::spawn(move || other.drain()).join().unwrap();
        assert_eq!(result, Err(UsageError::WrongThread));
    }

    #[test]
    pub fn commands_queued_while_draining_wait() {
        let queue = Arc::new(RenderCommandQueue::new());
        let inner = queue.clone();
        queue.enqueue(move || {
            inner.enqueue(|| Ok(()));
            Ok(())
        });

        assert_eq!(queue.drain().unwrap(), 1);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.drain().unwrap(), 1);
    }
}

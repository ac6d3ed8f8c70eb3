use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, TryLockError};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::interface::shared_state::SharedState;
use crate::rendering::command_queue::RenderCommandQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    /// Only meaningful as a filter: nothing passes.
    None = 4,
}

impl LogLevel {
    pub fn from_u8(value: u8) -> Option<LogLevel> {
        match value {
            0 => Some(LogLevel::Debug),
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Warning),
            3 => Some(LogLevel::Error),
            4 => Some(LogLevel::None),
            _ => None,
        }
    }

    fn as_log_level(self) -> Option<log::Level> {
        match self {
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Warning => Some(log::Level::Warn),
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

/// Bounded FIFO of host visible log entries. When full, the oldest entry goes.
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    dropped: u64,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<LogEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub type LogCallback = Box<dyn Fn(&LogEntry) + Send + Sync>;

/// Routes engine messages to the `log` facade and to the host: either its callback or the poppable buffer in the
/// shared state. Worker threads never take the shared state lock, they post through the render queue.
pub struct LogSink {
    min_level: AtomicU8,
    callback: ArcSwapOption<LogCallback>,
    shared: Arc<SharedState>,
    queue: Arc<RenderCommandQueue>,
}

impl LogSink {
    pub fn new(min_level: LogLevel, shared: Arc<SharedState>, queue: Arc<RenderCommandQueue>) -> Self {
        Self {
            min_level: AtomicU8::new(min_level as u8),
            callback: ArcSwapOption::empty(),
            shared,
            queue,
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Acquire)).unwrap_or(LogLevel::None)
    }

    pub fn set_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Release);
    }

    pub fn set_callback(&self, callback: Option<LogCallback>) {
        self.callback.store(callback.map(Arc::new));
    }

    fn accept(&self, level: LogLevel, message: &str) -> Option<LogEntry> {
        if let Some(log_level) = level.as_log_level() {
            log::log!(log_level, "{}", message);
        }

        if level == LogLevel::None || level < self.level() {
            return None;
        }

        let entry = LogEntry {
            level,
            message: message.to_string(),
            timestamp: Local::now(),
        };

        if let Some(callback) = self.callback.load().as_ref() {
            callback(&entry);
            return None;
        }
        Some(entry)
    }

    /// For the control and render threads. Falls back to posting if the host currently holds the shared lock.
    pub fn log(&self, level: LogLevel, message: &str) {
        let Some(entry) = self.accept(level, message) else {
            return;
        };

        match self.shared.try_lock() {
            Ok(mut guard) => guard.push_log(entry),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().push_log(entry),
            Err(TryLockError::WouldBlock) => self.enqueue(entry),
        }
    }

    /// For worker threads: the entry reaches the buffer with the next render queue drain.
    pub fn post(&self, level: LogLevel, message: &str) {
        if let Some(entry) = self.accept(level, message) {
            self.enqueue(entry);
        }
    }

    /// The command never waits for the shared lock, so a host holding it cannot stall the drain.
    fn enqueue(&self, entry: LogEntry) {
        let shared = self.shared.clone();
        self.queue.enqueue(move || {
            shared.push_log_nonblocking(entry);
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn sink(level: LogLevel) -> (LogSink, Arc<SharedState>, Arc<RenderCommandQueue>) {
        let shared = Arc::new(SharedState::new(4));
        let queue = Arc::new(RenderCommandQueue::new());
        (LogSink::new(level, shared.clone(), queue.clone()), shared, queue)
    }

    #[test]
    pub fn filters_and_pops_in_order() {
        let (sink, shared, _) = sink(LogLevel::Info);
        sink.log(LogLevel::Debug, "too chatty");
        sink.log(LogLevel::Info, "first");
        sink.log(LogLevel::Error, "second");
        sink.log(LogLevel::None, "never");

        let mut guard = shared.lock();
        assert_eq!(guard.pop_log_entry().map(|entry| entry.message), Some("first".to_string()));
        assert_eq!(guard.pop_log_entry().map(|entry| entry.level), Some(LogLevel::Error));
        assert_eq!(guard.pop_log_entry(), None);
    }

    #[test]
    pub fn posts_while_the_host_holds_the_lock() {
        let (sink, shared, queue) = sink(LogLevel::Debug);
        {
            let _guard = shared.lock();
            sink.log(LogLevel::Warning, "deferred");
            sink.post(LogLevel::Info, "from a worker");
        }
        assert_eq!(shared.lock().pop_log_entry(), None);

        queue.drain().unwrap();
        let mut guard = shared.lock();
        assert_eq!(guard.pop_log_entry().unwrap().message, "deferred");
        assert_eq!(guard.pop_log_entry().unwrap().message, "from a worker");
    }

    #[test]
    pub fn draining_while_the_host_holds_the_lock_does_not_wait() {
        let (sink, shared, queue) = sink(LogLevel::Debug);
        let mut guard = shared.lock();
        sink.post(LogLevel::Info, "posted while locked");

        let started = Instant::now();
        assert_eq!(queue.drain().unwrap(), 1);
        assert!(started.elapsed() < Duration::from_millis(50));

        assert_eq!(guard.pop_log_entry().unwrap().message, "posted while locked");
    }

    #[test]
    pub fn callback_replaces_the_buffer() {
        let (sink, shared, _) = sink(LogLevel::Debug);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let target = seen.clone();
        sink.set_callback(Some(Box::new(move |entry: &LogEntry| target.lock().unwrap().push(entry.message.clone()))));

        sink.log(LogLevel::Info, "hello");
        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(shared.lock().pop_log_entry(), None);

        sink.set_callback(None);
        sink.set_level(LogLevel::Error);
        sink.log(LogLevel::Warning, "filtered");
        assert_eq!(shared.lock().pop_log_entry(), None);
    }

    #[test]
    pub fn buffer_drops_the_oldest() {
        let mut buffer = LogBuffer::new(2);
        for message in ["a", "b", "c"] {
            buffer.push(LogEntry {
                level: LogLevel::Info,
                message: message.into(),
                timestamp: Local::now(),
            });
        }
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.pop().unwrap().message, "b");
    }
}

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use crate::interface::log_buffer::{LogBuffer, LogEntry};
use crate::util::handle_table::Handle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneEntry {
    pub handle: Handle,
    pub name: String,
    pub type_name: String,
}

#[derive(Debug)]
struct SharedData {
    scene: Vec<SceneEntry>,
    map: HashMap<String, String>,
    log: LogBuffer,
}

/// Plain host visible state behind one coarse lock: the scene registry, a key/value map and the log buffer.
#[derive(Debug)]
pub struct SharedState {
    data: Mutex<SharedData>,
    /// Log entries that arrived while the host held the lock. Only ever locked for a push or a swap.
    parked: Mutex<VecDeque<LogEntry>>,
}

/// Holding this is the "locked" state; dropping it unlocks.
pub struct SharedStateGuard<'a> {
    data: MutexGuard<'a, SharedData>,
    parked: &'a Mutex<VecDeque<LogEntry>>,
}

impl SharedState {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            data: Mutex::new(SharedData {
                scene: Vec::new(),
                map: HashMap::new(),
                log: LogBuffer::new(log_capacity),
            }),
            parked: Mutex::new(VecDeque::new()),
        }
    }

    pub fn lock(&self) -> SharedStateGuard<'_> {
        SharedStateGuard {
            data: self.data.lock().expect("Shared state lock"),
            parked: &self.parked,
        }
    }

    pub fn try_lock(&self) -> Result<SharedStateGuard<'_>, TryLockError<SharedStateGuard<'_>>> {
        match self.data.try_lock() {
            Ok(data) => Ok(SharedStateGuard {
                data,
                parked: &self.parked,
            }),
            Err(TryLockError::Poisoned(poisoned)) => Err(TryLockError::Poisoned(PoisonError::new(SharedStateGuard {
                data: poisoned.into_inner(),
                parked: &self.parked,
            }))),
            Err(TryLockError::WouldBlock) => Err(TryLockError::WouldBlock),
        }
    }

    /// Adds a log entry without waiting for the lock. If the host holds it, the entry is kept aside and joins the
    /// buffer with the next push or pop.
    pub fn push_log_nonblocking(&self, entry: LogEntry) {
        match self.try_lock() {
            Ok(mut guard) => guard.push_log(entry),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().push_log(entry),
            Err(TryLockError::WouldBlock) => self.parked.lock().expect("Parked log lock").push_back(entry),
        }
    }
}

impl SharedStateGuard<'_> {
    /// Registers an entity under a display name. Returns false if the handle is already registered.
    pub fn scene_add(&mut self, handle: Handle, name: &str, type_name: &str) -> bool {
        if handle.is_null() || self.data.scene.iter().any(|entry| entry.handle == handle) {
            return false;
        }

        self.data.scene.push(SceneEntry {
            handle,
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
        true
    }

    pub fn scene_remove(&mut self, handle: Handle) -> bool {
        let before = self.data.scene.len();
        self.data.scene.retain(|entry| entry.handle != handle);
        self.data.scene.len() != before
    }

    pub fn scene_count(&self) -> usize {
        self.data.scene.len()
    }

    pub fn scene_handle_at(&self, index: usize) -> Handle {
        self.data
            .scene
            .get(index)
            .map(|entry| entry.handle)
            .unwrap_or(Handle::INVALID)
    }

    pub fn scene_handle_by_name(&self, name: &str) -> Handle {
        self.data
            .scene
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.handle)
            .unwrap_or(Handle::INVALID)
    }

    fn scene_entry(&self, handle: Handle) -> Option<&SceneEntry> {
        self.data.scene.iter().find(|entry| entry.handle == handle)
    }

    pub fn scene_name(&self, handle: Handle) -> Option<&str> {
        self.scene_entry(handle).map(|entry| entry.name.as_str())
    }

    pub fn scene_type(&self, handle: Handle) -> Option<&str> {
        self.scene_entry(handle).map(|entry| entry.type_name.as_str())
    }

    pub fn map_set(&mut self, key: &str, value: &str) {
        self.data.map.insert(key.to_string(), value.to_string());
    }

    pub fn map_get(&self, key: &str) -> Option<&str> {
        self.data.map.get(key).map(String::as_str)
    }

    pub fn map_contains(&self, key: &str) -> bool {
        self.data.map.contains_key(key)
    }

    pub fn map_remove(&mut self, key: &str) -> Option<String> {
        self.data.map.remove(key)
    }

    fn flush_parked(&mut self) {
        let parked = std::mem::take(&mut *self.parked.lock().expect("Parked log lock"));
        for entry in parked {
            self.data.log.push(entry);
        }
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.flush_parked();
        self.data.log.push(entry);
    }

    pub fn pop_log_entry(&mut self) -> Option<LogEntry> {
        self.flush_parked();
        self.data.log.pop()
    }

    pub fn log_len(&mut self) -> usize {
        self.flush_parked();
        self.data.log.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SharedState;
    use chrono::Local;
    use crate::interface::log_buffer::{LogEntry, LogLevel};
    use crate::util::handle_table::{Handle, HandleKind, HandleTable};

    #[test]
    pub fn scene_registry() {
        let actors = HandleTable::new(HandleKind::Actor);
        let (first, _) = actors.insert(()).unwrap();
        let (second, _) = actors.insert(()).unwrap();

        let state = SharedState::new(8);
        let mut guard = state.lock();
        assert!(guard.scene_add(first, "dancer", "Actor"));
        assert!(guard.scene_add(second, "singer", "Actor"));
        assert!(!guard.scene_add(first, "again", "Actor"));
        assert!(!guard.scene_add(Handle::INVALID, "nobody", "Actor"));

        assert_eq!(guard.scene_count(), 2);
        assert_eq!(guard.scene_handle_at(1), second);
        assert_eq!(guard.scene_handle_at(7), Handle::INVALID);
        assert_eq!(guard.scene_handle_by_name("dancer"), first);
        assert_eq!(guard.scene_type(second), Some("Actor"));

        assert!(guard.scene_remove(first));
        assert!(!guard.scene_remove(first));
        assert_eq!(guard.scene_name(first), None);
    }

    #[test]
    pub fn key_value_map() {
        let state = SharedState::new(8);
        let mut guard = state.lock();
        guard.map_set("quality", "high");
        guard.map_set("quality", "low");
        assert_eq!(guard.map_get("quality"), Some("low"));
        assert!(guard.map_contains("quality"));
        assert_eq!(guard.map_remove("quality"), Some("low".to_string()));
        assert!(!guard.map_contains("quality"));
    }

    #[test]
    pub fn try_lock_reports_contention() {
        let state = SharedState::new(8);
        let _held = state.lock();
        assert!(state.try_lock().is_err());
    }

    #[test]
    pub fn logs_pushed_while_locked_join_in_order() {
        let state = SharedState::new(8);
        let entry = |message: &str| LogEntry {
            level: LogLevel::Info,
            message: message.to_string(),
            timestamp: Local::now(),
        };

        {
            let mut held = state.lock();
            held.push_log(entry("first"));
            state.push_log_nonblocking(entry("second"));
            assert_eq!(held.pop_log_entry().unwrap().message, "first");
            assert_eq!(held.pop_log_entry().unwrap().message, "second");
            state.push_log_nonblocking(entry("third"));
        }
        state.push_log_nonblocking(entry("fourth"));

        let mut guard = state.lock();
        assert_eq!(guard.log_len(), 2);
        assert_eq!(guard.pop_log_entry().unwrap().message, "third");
        assert_eq!(guard.pop_log_entry().unwrap().message, "fourth");
    }
}

use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

use crate::errors::{HandleError, UsageError};

const KIND_SHIFT: u32 = 29;
const GENERATION_SHIFT: u32 = 16;
const GENERATION_MASK: u32 = 0x1FFF;
const SLOT_MASK: u32 = 0xFFFF;
/// Slot numbers are stored off by one so that no valid handle can be zero.
const MAX_SLOTS: usize = SLOT_MASK as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HandleKind {
    Player = 1,
    Actor = 2,
    Asset = 3,
    RenderMethod = 4,
    Viewport = 5,
}

impl HandleKind {
    fn from_bits(bits: u32) -> Option<HandleKind> {
        match bits {
            1 => Some(HandleKind::Player),
            2 => Some(HandleKind::Actor),
            3 => Some(HandleKind::Asset),
            4 => Some(HandleKind::RenderMethod),
            5 => Some(HandleKind::Viewport),
            _ => None,
        }
    }
}

impl Display for HandleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandleKind::Player => "player",
            HandleKind::Actor => "actor",
            HandleKind::Asset => "asset",
            HandleKind::RenderMethod => "render method",
            HandleKind::Viewport => "viewport",
        };
        f.write_str(name)
    }
}

/// Opaque, non-zero identifier handed out to the host. Encodes the kind, a slot generation and the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(u32);

impl Handle {
    pub const INVALID: Handle = Handle(0);

    fn new(kind: HandleKind, generation: u32, slot: usize) -> Handle {
        Handle(((kind as u32) << KIND_SHIFT) | ((generation & GENERATION_MASK) << GENERATION_SHIFT) | (slot as u32 + 1))
    }

    pub fn from_raw(raw: u32) -> Handle {
        Handle(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn kind(&self) -> Option<HandleKind> {
        HandleKind::from_bits(self.0 >> KIND_SHIFT)
    }

    fn generation(&self) -> u32 {
        (self.0 >> GENERATION_SHIFT) & GENERATION_MASK
    }

    fn slot(&self) -> Option<usize> {
        match self.0 & SLOT_MASK {
            0 => None,
            n => Some(n as usize - 1),
        }
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

struct Slots<T> {
    entries: Vec<Slot<T>>,
    free: Vec<usize>,
}

/// Generation tagged slot table. A removed slot bumps its generation, so stale handles never resolve again.
/// Slots whose generation would wrap around are retired instead of being reused.
pub struct HandleTable<T> {
    kind: HandleKind,
    slots: RwLock<Slots<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(kind: HandleKind) -> Self {
        Self {
            kind,
            slots: RwLock::new(Slots {
                entries: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn insert(&self, value: T) -> Result<(Handle, Arc<T>), HandleError> {
        self.insert_with(|_| value)
    }

    /// Allocates a slot and builds the value with knowledge of its own handle.
    pub fn insert_with<F: FnOnce(Handle) -> T>(&self, create: F) -> Result<(Handle, Arc<T>), HandleError> {
        let mut slots = self.slots.write().expect("Write Lock on handle slots");
        let slot = match slots.free.pop() {
            Some(slot) => slot,
            None if slots.entries.len() < MAX_SLOTS => {
                slots.entries.push(Slot {
                    generation: 0,
                    value: None,
                });
                slots.entries.len() - 1
            }
            None => return Err(HandleError::Exhausted { kind: self.kind }),
        };

        let handle = Handle::new(self.kind, slots.entries[slot].generation, slot);
        let value = Arc::new(create(handle));
        slots.entries[slot].value = Some(value.clone());
        Ok((handle, value))
    }

    pub fn get(&self, handle: Handle) -> Option<Arc<T>> {
        if handle.kind() != Some(self.kind) {
            return None;
        }

        let slots = self.slots.read().expect("Read Lock on handle slots");
        let entry = slots.entries.get(handle.slot()?)?;
        if entry.generation != handle.generation() {
            return None;
        }

        entry.value.clone()
    }

    /// Like `get`, but an unknown handle is a usage error.
    pub fn require(&self, handle: Handle) -> Result<Arc<T>, UsageError> {
        self.get(handle).ok_or(UsageError::InvalidHandle {
            kind: self.kind,
            handle,
        })
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        if handle.kind() != Some(self.kind) {
            return None;
        }

        let mut slots = self.slots.write().expect("Write Lock on handle slots");
        let slot = handle.slot()?;
        let entry = slots.entries.get_mut(slot)?;
        if entry.generation != handle.generation() {
            return None;
        }

        let value = entry.value.take()?;
        entry.generation += 1;
        if entry.generation <= GENERATION_MASK {
            slots.free.push(slot);
        }

        Some(value)
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.read().expect("Read Lock on handle slots");
        slots.entries.iter().filter(|entry| entry.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<(Handle, Arc<T>)> {
        let slots = self.slots.read().expect("Read Lock on handle slots");
        slots
            .entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| {
                entry
                    .value
                    .as_ref()
                    .map(|value| (Handle::new(self.kind, entry.generation, slot), value.clone()))
            })
            .collect()
    }

    /// Removes every entry, e.g. on shutdown.
    pub fn drain(&self) -> Vec<(Handle, Arc<T>)> {
        let entries = self.entries();
        for (handle, _) in &entries {
            self.remove(*handle);
        }
        entries
    }
}

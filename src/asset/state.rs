use bitflags::bitflags;
use log::trace;

bitflags! {
    /// Externally visible asset state. Bits combine, e.g. `PLAYING | CACHING`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AssetState: u32 {
        const INITIALISING = 1 << 0;
        const PLAYING = 1 << 1;
        const SEEKING = 1 << 2;
        const CACHING = 1 << 3;
        const OFFLINE = 1 << 4;
        const FULLY_CACHED = 1 << 5;
        const INVALID = 1 << 6;
    }
}

impl AssetState {
    pub fn is_invalid(&self) -> bool {
        self.contains(AssetState::INVALID)
    }

    pub fn is_ready(&self) -> bool {
        !self.intersects(AssetState::INITIALISING | AssetState::INVALID)
    }

    /// Paused is not a bit of its own: a ready asset that is neither playing nor seeking.
    pub fn is_paused(&self) -> bool {
        self.is_ready() && !self.intersects(AssetState::PLAYING | AssetState::SEEKING)
    }
}

/// Guards the transitions of `AssetState`. `INVALID` is terminal and clears every other bit.
#[derive(Debug, Clone)]
pub struct AssetStateMachine {
    state: AssetState,
}

impl Default for AssetStateMachine {
    fn default() -> Self {
        Self {
            state: AssetState::INITIALISING,
        }
    }
}

impl AssetStateMachine {
    pub fn state(&self) -> AssetState {
        self.state
    }

    pub fn is_invalid(&self) -> bool {
        self.state.is_invalid()
    }

    pub fn is_initialising(&self) -> bool {
        self.state.contains(AssetState::INITIALISING)
    }

    fn set(&mut self, flag: AssetState, on: bool) -> bool {
        if self.state.is_invalid() || self.state.contains(flag) == on {
            return false;
        }

        self.state.set(flag, on);
        trace!("Asset state {:?} -> {:?}", flag, self.state);
        true
    }

    /// Initialising -> ready. Returns false if the asset was not initialising (or is invalid).
    pub fn mark_ready(&mut self) -> bool {
        self.set(AssetState::INITIALISING, false)
    }

    /// Returns true only for the call that actually invalidated the asset.
    pub fn invalidate(&mut self) -> bool {
        if self.state.is_invalid() {
            return false;
        }

        self.state = AssetState::INVALID;
        true
    }

    pub fn set_playing(&mut self, playing: bool) -> bool {
        self.set(AssetState::PLAYING, playing)
    }

    pub fn set_seeking(&mut self, seeking: bool) -> bool {
        self.set(AssetState::SEEKING, seeking)
    }

    pub fn set_offline(&mut self, offline: bool) -> bool {
        self.set(AssetState::OFFLINE, offline)
    }

    /// `CACHING` and `FULLY_CACHED` are mutually exclusive; the latter wins.
    pub fn set_cache_status(&mut self, caching: bool, fully_cached: bool) {
        self.set(AssetState::FULLY_CACHED, fully_cached);
        self.set(AssetState::CACHING, caching && !fully_cached);
    }
}

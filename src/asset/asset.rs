use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, trace};
use tokio::sync::Notify;

use crate::asset::catalog::SelectionPolicy;
use crate::asset::frame::DecodedFrame;
use crate::asset::playback::{AssetCore, SeekOutcome};
use crate::asset::state::AssetState;
use crate::errors::AssetError;
use crate::io::common::loader::SegmentLoader;
use crate::util::handle_table::Handle;

/// Receives 0 once the asset is ready or the `AssetError::code` of the failure that made it invalid.
pub type InitCallback = Box<dyn FnOnce(i32) + Send>;

/// `(mime_type, codec, start_time, data)` for every fetched segment. The data is only borrowed for the call.
pub type RepresentationDataCallback = Arc<dyn Fn(&str, &str, f64, &[u8]) + Send + Sync>;

pub struct AssetCreationInfo {
    /// Manifest url, manifest file or directory holding a `manifest.xml`.
    /// With a custom `loader` this is the manifest location relative to it.
    pub asset_path: String,
    /// HTTP responses are mirrored here and served from it while the network is unreachable.
    pub cache_dir: Option<PathBuf>,
    pub on_initialised: Option<InitCallback>,
    pub on_select_representation: Option<SelectionPolicy>,
    pub on_representation_data: Option<RepresentationDataCallback>,
    /// Seconds of content to buffer ahead of the playback position.
    pub buffer_time: f64,
    pub loader: Option<Arc<dyn SegmentLoader>>,
}

impl AssetCreationInfo {
    pub fn new(asset_path: impl Into<String>) -> Self {
        Self {
            asset_path: asset_path.into(),
            cache_dir: None,
            on_initialised: None,
            on_select_representation: None,
            on_representation_data: None,
            buffer_time: 2.0,
            loader: None,
        }
    }
}

/// One asset, shared between the control thread, its streamer task and the frame pipeline.
///
/// Everything mutable sits behind the per asset lock in `AssetCore`; assets never block each other. The epoch
/// changes whenever in-flight work became pointless (a seek that discarded the buffer, a stall, deletion), and
/// every completion compares it before touching the asset.
pub struct Asset {
    handle: Handle,
    core: Mutex<AssetCore>,
    frame_arrived: Condvar,
    epoch: Arc<AtomicU64>,
    deleted: AtomicBool,
    wake: Notify,
    on_initialised: Mutex<Option<InitCallback>>,
    selection_policy: Option<SelectionPolicy>,
    data_callback: Option<RepresentationDataCallback>,
}

impl Asset {
    pub fn new(
        handle: Handle,
        core: AssetCore,
        on_initialised: Option<InitCallback>,
        selection_policy: Option<SelectionPolicy>,
        data_callback: Option<RepresentationDataCallback>,
    ) -> Self {
        Self {
            handle,
            core: Mutex::new(core),
            frame_arrived: Condvar::new(),
            epoch: Arc::new(AtomicU64::new(0)),
            deleted: AtomicBool::new(false),
            wake: Notify::new(),
            on_initialised: Mutex::new(on_initialised),
            selection_policy,
            data_callback,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn lock(&self) -> MutexGuard<'_, AssetCore> {
        self.core.lock().expect("Asset lock")
    }

    pub fn state(&self) -> AssetState {
        self.lock().state()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn epoch_ref(&self) -> Arc<AtomicU64> {
        self.epoch.clone()
    }

    /// Makes everything currently in flight moot. Returns the new epoch.
    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn selection_policy(&self) -> Option<&SelectionPolicy> {
        self.selection_policy.as_ref()
    }

    pub fn data_callback(&self) -> Option<&RepresentationDataCallback> {
        self.data_callback.as_ref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// The handle is already gone at this point, this only stops the streamer and any waiting render call.
    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        self.bump_epoch();
        self.wake_streamer();
        self.frame_arrived.notify_all();
    }

    /// Nudges the streamer to re-plan: the forward window moved or the state changed.
    pub fn wake_streamer(&self) {
        self.wake.notify_one();
    }

    pub fn woken(&self) -> &Notify {
        &self.wake
    }

    pub fn notify_frames(&self) {
        self.frame_arrived.notify_all();
    }

    /// Invokes the initialisation callback, at most once over the lifetime of the asset. Deleted assets drop it
    /// without calling it.
    pub fn report_initialised(&self, code: i32) {
        let callback = self.on_initialised.lock().expect("Init callback lock").take();
        let Some(callback) = callback else {
            return;
        };

        if self.is_deleted() {
            debug!("Asset {} deleted before initialisation finished", self.handle);
            return;
        }

        trace!("Asset {} initialised with code {}", self.handle, code);
        callback(code);
    }

    /// Waits up to `timeout` for a frame at the current playback position to be decoded.
    pub fn wait_for_frame(&self, timeout: Duration) -> Option<Arc<DecodedFrame>> {
        let deadline = Instant::now() + timeout;
        let mut core = self.lock();
        loop {
            if let Some(frame) = core.presentable_frame() {
                return Some(frame);
            }

            let now = Instant::now();
            if now >= deadline || self.is_deleted() || core.is_invalid() {
                return None;
            }

            let (guard, _) = self
                .frame_arrived
                .wait_timeout(core, deadline - now)
                .expect("Asset lock");
            core = guard;
        }
    }

    fn apply(&self, outcome: SeekOutcome) {
        match outcome {
            SeekOutcome::Ignored => {}
            SeekOutcome::Reset => {
                self.bump_epoch();
                self.wake_streamer();
            }
            SeekOutcome::Deferred | SeekOutcome::Retained => self.wake_streamer(),
        }
    }

    pub fn seek(&self, target: f64) -> Result<(), AssetError> {
        let result = self.lock().seek(target);
        match result {
            Ok(outcome) => {
                self.apply(outcome);
                Ok(())
            }
            Err(error) => {
                // the streamer reports the failure and exits
                self.wake_streamer();
                Err(error)
            }
        }
    }

    pub fn play(&self) {
        let outcome = self.lock().play();
        self.apply(outcome);
    }

    pub fn pause(&self) {
        self.lock().pause();
    }

    pub fn stop(&self) {
        let outcome = self.lock().stop();
        self.apply(outcome);
    }

    pub fn step(&self, frames: i32) {
        let outcome = self.lock().step(frames);
        self.apply(outcome);
    }

    pub fn set_looping(&self, looping: bool) {
        self.lock().set_looping(looping);
        self.wake_streamer();
    }

    pub fn update(&self, absolute_time: f64) {
        self.lock().update(absolute_time);
        self.wake_streamer();
    }
}

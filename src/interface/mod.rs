use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::asset::asset::Asset;
use crate::asset::state::AssetState;
use crate::asset::streamer::StreamerContext;
use crate::errors::{InterfaceError, UsageError};
use crate::interface::log_buffer::{LogCallback, LogEntry, LogLevel, LogSink};
use crate::interface::shared_state::{SharedState, SharedStateGuard};
use crate::networking::ingest::{IngestClient, NetworkStats, NetworkStatsTracker};
use crate::rendering::actor::Actor;
use crate::rendering::command_queue::RenderCommandQueue;
use crate::rendering::player::Player;
use crate::rendering::render_method::{RenderMethod, RenderMethodType};
use crate::rendering::viewport::Viewport;
use crate::settings::engine::EngineConfig;
use crate::util::handle_table::{Handle, HandleKind, HandleTable};
use crate::util::memory::{MemoryStats, MemoryTracker};

pub mod actors;
pub mod assets;
pub mod info;
pub mod log_buffer;
pub mod players;
pub mod render_methods;
pub mod shared_state;
pub mod viewports;

/// The engine context. Everything created through it lives and dies with it, separate instances share nothing.
///
/// Calls come from three sides: the host control thread (creation, playback control, `update`), the render
/// thread (`drain_render_queue`, `prepare_render`, `render`) and the worker runtime owned by this struct, which
/// runs one streamer task per asset.
pub struct Interface {
    config: Arc<EngineConfig>,
    runtime: Mutex<Option<Runtime>>,
    runtime_handle: tokio::runtime::Handle,
    initialised: AtomicBool,

    assets: HandleTable<Asset>,
    players: HandleTable<Player>,
    actors: HandleTable<RwLock<Actor>>,
    viewports: HandleTable<RwLock<Viewport>>,
    render_methods: HandleTable<RwLock<RenderMethod>>,

    streamers: DashMap<Handle, JoinHandle<()>>,
    published_states: DashMap<Handle, AssetState>,

    render_queue: Arc<RenderCommandQueue>,
    shared: Arc<SharedState>,
    log: Arc<LogSink>,
    memory: Arc<MemoryTracker>,
    network: Arc<NetworkStatsTracker>,
    ingest: Arc<IngestClient>,
}

fn removed<T>(table: &HandleTable<T>, handle: Handle) -> Result<Arc<T>, UsageError> {
    table.remove(handle).ok_or(UsageError::InvalidHandle {
        kind: table.kind(),
        handle,
    })
}

impl Interface {
    pub fn initialise(config: EngineConfig) -> Result<Interface, InterfaceError> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.thread_pool_size)
            .max_blocking_threads(config.thread_pool_size)
            .thread_name("volstream-worker")
            .enable_all()
            .build()?;
        let runtime_handle = runtime.handle().clone();

        let render_queue = Arc::new(RenderCommandQueue::new());
        let shared = Arc::new(SharedState::new(config.log_capacity));
        let log = Arc::new(LogSink::new(config.log_level, shared.clone(), render_queue.clone()));
        let network = Arc::new(NetworkStatsTracker::default());
        let ingest = Arc::new(IngestClient::new(
            runtime_handle.clone(),
            config.retry.clone(),
            config.segment_cache_capacity,
            network.clone(),
        ));

        info!(
            "Interface initialised with {} worker threads ({})",
            config.thread_pool_size,
            info::build_info()
        );

        Ok(Interface {
            memory: Arc::new(MemoryTracker::new(config.memory_budget_bytes)),
            config: Arc::new(config),
            runtime: Mutex::new(Some(runtime)),
            runtime_handle,
            initialised: AtomicBool::new(true),
            assets: HandleTable::new(HandleKind::Asset),
            players: HandleTable::new(HandleKind::Player),
            actors: HandleTable::new(HandleKind::Actor),
            viewports: HandleTable::new(HandleKind::Viewport),
            render_methods: HandleTable::new(HandleKind::RenderMethod),
            streamers: DashMap::new(),
            published_states: DashMap::new(),
            render_queue,
            shared,
            log,
            network,
            ingest,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised.load(Ordering::Acquire)
    }

    fn ensure_initialised(&self) -> Result<(), UsageError> {
        if !self.is_initialised() {
            return Err(UsageError::NotInitialised);
        }
        Ok(())
    }

    /// Stops every streamer and the worker runtime. Handles created before are invalid afterwards.
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        if !self.initialised.swap(false, Ordering::AcqRel) {
            return;
        }

        for (_, asset) in self.assets.drain() {
            asset.mark_deleted();
        }

        let streamers = self.streamers.iter().map(|entry| *entry.key()).collect::<Vec<_>>();
        for handle in streamers {
            if let Some((_, task)) = self.streamers.remove(&handle) {
                task.abort();
            }
        }

        for (_, player) in self.players.drain() {
            self.release_gpu_frames(&player);
        }
        self.actors.drain();
        self.viewports.drain();
        self.render_methods.drain();
        self.published_states.clear();

        // shutdown_background never blocks, so this is fine from any thread, including async contexts
        if let Some(runtime) = self.runtime.lock().expect("Runtime lock").take() {
            runtime.shutdown_background();
        }
        info!("Interface shut down");
    }

    /// The per tick call of the control thread: begins a new frame on every player and publishes asset state
    /// changes to the log.
    pub fn update(&self) -> Result<(), UsageError> {
        self.ensure_initialised()?;
        profiling::scope!("Interface::update");

        for (_, player) in self.players.entries() {
            player.begin_frame();
        }

        self.streamers.retain(|handle, task| {
            let running = !task.is_finished();
            if !running {
                debug!("Reaped the streamer of asset {}", handle);
            }
            running
        });

        for (handle, asset) in self.assets.entries() {
            let state = asset.state();
            let previous = self.published_states.insert(handle, state);
            if previous != Some(state) {
                self.log
                    .log(LogLevel::Debug, &format!("Asset {} state {:?}", handle, state));
            }
        }

        Ok(())
    }

    /// Tells every offline asset to try again right away instead of waiting for its next probe.
    pub fn reconnect(&self) -> Result<(), UsageError> {
        self.ensure_initialised()?;
        self.log.log(LogLevel::Info, "Reconnect requested");
        self.ingest.signal_reconnect();
        for (_, asset) in self.assets.entries() {
            asset.wake_streamer();
        }
        Ok(())
    }

    pub fn get_info(&self, key: &str) -> Option<String> {
        info::system_info(key, &self.config)
    }

    pub fn pop_log_entry(&self) -> Option<LogEntry> {
        self.shared.lock().pop_log_entry()
    }

    /// With a callback set, entries go to it instead of the poppable buffer.
    pub fn set_log_callback(&self, callback: Option<LogCallback>) {
        self.log.set_callback(callback);
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.log.set_level(level);
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.log.log(level, message);
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.network.stats()
    }

    pub fn render_method_types(&self) -> Vec<&'static str> {
        RenderMethodType::ALL.iter().map(RenderMethodType::as_str).collect()
    }

    pub fn render_method_default_type(&self) -> &'static str {
        RenderMethodType::DEFAULT.as_str()
    }

    /// The coarse lock over the scene registry, the key/value map and the log buffer. Unlocks on drop.
    pub fn lock(&self) -> SharedStateGuard<'_> {
        self.shared.lock()
    }

    pub fn render_queue(&self) -> &Arc<RenderCommandQueue> {
        &self.render_queue
    }

    /// Runs everything queued for the render thread. The first thread to call this becomes the render thread.
    pub fn drain_render_queue(&self) -> Result<usize, UsageError> {
        self.render_queue.drain()
    }

    fn streamer_context(&self) -> StreamerContext {
        StreamerContext {
            ingest: self.ingest.clone(),
            memory: self.memory.clone(),
            config: self.config.clone(),
            log: self.log.clone(),
        }
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        if self.is_initialised() {
            warn!("Interface dropped without shutdown");
            self.shutdown();
        }
    }
}

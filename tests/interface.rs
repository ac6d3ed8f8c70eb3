use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use volstream::asset::asset::AssetCreationInfo;
use volstream::asset::catalog::{AbrConfig, AdaptationSetInfo, RepresentationInfo};
use volstream::asset::state::AssetState;
use volstream::errors::{InterfaceError, UsageError};
use volstream::interface::Interface;
use volstream::interface::log_buffer::{LogEntry, LogLevel};
use volstream::io::authoring::SyntheticAsset;
use volstream::io::common::loader::{LoadError, LoadedBytes, SegmentLoader};
use volstream::io::fs::loader::FsLoader;
use volstream::io::source::MANIFEST_FILE_NAME;
use volstream::networking::retry::RetryPolicy;
use volstream::rendering::device::{FrameContext, NullDevice, RendererType};
use volstream::settings::engine::EngineConfig;
use volstream::util::handle_table::Handle;

const DEADLINE: Duration = Duration::from_secs(10);

fn config() -> EngineConfig {
    EngineConfig {
        prepare_timeout_ms: 50,
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 5,
            max_backoff_ms: 10,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Creation info that records the initialisation result, -1 while pending.
fn creation_info(path: &Path) -> (AssetCreationInfo, Arc<AtomicI32>) {
    let code = Arc::new(AtomicI32::new(-1));
    let reported = code.clone();
    let mut info = AssetCreationInfo::new(path.to_string_lossy());
    info.on_initialised = Some(Box::new(move |result: i32| reported.store(result, Ordering::Release)));
    (info, code)
}

fn ready_asset(interface: &Interface, asset: &SyntheticAsset, dir: &Path) -> anyhow::Result<Handle> {
    asset.write_to(dir)?;
    let (info, code) = creation_info(dir);
    let handle = interface.create_asset_from_info(info)?;
    assert!(wait_until(DEADLINE, || code.load(Ordering::Acquire) != -1));
    assert_eq!(code.load(Ordering::Acquire), 0);
    Ok(handle)
}

#[test_log::test]
fn initialises_and_plays() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let interface = Interface::initialise(config())?;
    let asset = ready_asset(&interface, &SyntheticAsset::default(), dir.path())?;

    assert!(interface.asset_state(asset)?.is_ready());
    assert_eq!(interface.asset_duration(asset)?, Some(4.0));
    assert!(interface.asset_bounds(asset)?.is_some());
    assert!(interface.asset_buffer_fill_ratio(asset)? > 0.0);
    assert!(interface.asset_track_meta(asset)?.is_some_and(|meta| meta.contains("geometry")));
    assert!(interface.asset_frame_meta(asset)?.is_some());
    assert!(interface.memory_stats().used_bytes > 0);

    interface.asset_play(asset)?;
    interface.asset_update(asset, 10.0)?;
    interface.asset_update(asset, 10.5)?;
    let time = interface.asset_current_time(asset)?;
    assert!((time - 0.5).abs() < 1e-6, "{}", time);
    assert!(interface.asset_state(asset)?.contains(AssetState::PLAYING));
    assert!(interface.asset_decode_time(asset)?.is_some_and(|decoded| decoded <= time + 1e-6));
    assert!(interface.asset_voxel_count(asset)? > 0);

    interface.asset_pause(asset)?;
    interface.asset_update(asset, 11.0)?;
    assert!((interface.asset_current_time(asset)? - 0.5).abs() < 1e-6);
    assert!(interface.asset_state(asset)?.is_paused());

    interface.delete_asset(asset)?;
    assert!(!interface.is_asset_valid(asset));
    interface.shutdown();
    Ok(())
}

#[test_log::test]
fn looping_never_reaches_the_duration() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let interface = Interface::initialise(config())?;
    let asset = ready_asset(
        &interface,
        &SyntheticAsset {
            duration: 2.0,
            ..Default::default()
        },
        dir.path(),
    )?;

    interface.asset_set_looping(asset, true)?;
    interface.asset_play(asset)?;

    let mut clock = 0.0;
    let mut previous = 0.0;
    let mut wrapped = false;
    interface.asset_update(asset, clock)?;
    for _ in 0..500 {
        clock += 0.1;
        interface.asset_update(asset, clock)?;
        let time = interface.asset_current_time(asset)?;
        assert!(time < 2.0, "{}", time);
        if time < previous {
            wrapped = true;
            break;
        }
        previous = time;
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(wrapped);
    interface.shutdown();
    Ok(())
}

#[test_log::test]
fn seeks_are_clamped_unless_unclampable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let interface = Interface::initialise(config())?;
    let asset = ready_asset(&interface, &SyntheticAsset::default(), dir.path())?;

    interface.asset_seek(asset, -3.0)?;
    assert_eq!(interface.asset_current_time(asset)?, 0.0);

    interface.asset_seek(asset, 100.0)?;
    assert_eq!(interface.asset_current_time(asset)?, 4.0);
    assert!(!interface.asset_state(asset)?.is_invalid());

    interface.asset_set_looping(asset, true)?;
    interface.asset_seek(asset, 9.0)?;
    assert!((interface.asset_current_time(asset)? - 1.0).abs() < 1e-9);

    assert_eq!(interface.asset_seek(asset, f64::NAN), Err(UsageError::AssetInvalid(asset)));
    assert!(interface.asset_state(asset)?.is_invalid());
    // invalid, but the handle lives until it is deleted
    assert!(interface.is_asset_valid(asset));
    assert_eq!(interface.asset_buffer_fill_ratio(asset)?, 0.0);

    interface.shutdown();
    Ok(())
}

#[test_log::test]
fn deleted_assets_stay_invalid() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    SyntheticAsset::default().write_to(dir.path())?;
    let interface = Interface::initialise(config())?;

    let (info, code) = creation_info(dir.path());
    let asset = interface.create_asset_from_info(info)?;
    interface.delete_asset(asset)?;
    assert!(!interface.is_asset_valid(asset));
    assert!(matches!(interface.asset_play(asset), Err(UsageError::InvalidHandle { .. })));
    assert!(matches!(interface.delete_asset(asset), Err(UsageError::InvalidHandle { .. })));

    // the slot gets reused, the old handle must not resolve to the new asset
    let (info, _) = creation_info(dir.path());
    let replacement = interface.create_asset_from_info(info)?;
    assert_ne!(replacement, asset);
    assert!(!interface.is_asset_valid(asset));

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(code.load(Ordering::Acquire), -1);

    interface.shutdown();
    Ok(())
}

/// Serves the manifest always and segments only while `online` is set.
struct FlakyLoader {
    inner: FsLoader,
    online: Arc<AtomicBool>,
}

impl SegmentLoader for FlakyLoader {
    fn load(&self, location: &str) -> Result<LoadedBytes, LoadError> {
        if location != MANIFEST_FILE_NAME && !self.online.load(Ordering::Acquire) {
            return Err(LoadError::Transient("connection reset".to_string()));
        }
        self.inner.load(location)
    }

    fn describe(&self) -> String {
        format!("flaky {}", self.inner.describe())
    }
}

#[test_log::test]
fn goes_offline_and_recovers_on_reconnect() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    SyntheticAsset::default().write_to(dir.path())?;
    let interface = Interface::initialise(EngineConfig {
        offline_probe_interval_ms: 60_000,
        ..config()
    })?;

    let online = Arc::new(AtomicBool::new(false));
    let (mut info, code) = creation_info(Path::new(MANIFEST_FILE_NAME));
    info.loader = Some(Arc::new(FlakyLoader {
        inner: FsLoader::new(dir.path()),
        online: online.clone(),
    }));
    let asset = interface.create_asset_from_info(info)?;

    assert!(wait_until(DEADLINE, || {
        interface
            .asset_state(asset)
            .is_ok_and(|state| state.contains(AssetState::OFFLINE))
    }));
    assert_eq!(code.load(Ordering::Acquire), -1);
    assert!(!interface.asset_state(asset)?.is_invalid());

    online.store(true, Ordering::Release);
    interface.reconnect()?;

    assert!(wait_until(DEADLINE, || code.load(Ordering::Acquire) == 0));
    assert!(!interface.asset_state(asset)?.contains(AssetState::OFFLINE));
    interface.shutdown();
    Ok(())
}

/// Serves segments at `rate_bps`, the manifest without delay.
struct ThrottledLoader {
    inner: FsLoader,
    rate_bps: Arc<AtomicU64>,
}

impl SegmentLoader for ThrottledLoader {
    fn load(&self, location: &str) -> Result<LoadedBytes, LoadError> {
        let loaded = self.inner.load(location)?;
        if location != MANIFEST_FILE_NAME {
            let rate = self.rate_bps.load(Ordering::Acquire) as f64;
            std::thread::sleep(Duration::from_secs_f64(loaded.data.len() as f64 * 8.0 / rate));
        }
        Ok(loaded)
    }

    fn describe(&self) -> String {
        format!("throttled {}", self.inner.describe())
    }
}

#[test_log::test]
fn measured_throughput_moves_the_representation() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    SyntheticAsset {
        duration: 8.0,
        segment_duration: 0.125,
        fps: 8.0,
        bandwidths: vec![1_000_000, 4_000_000],
        ..Default::default()
    }
    .write_to(dir.path())?;

    let interface = Interface::initialise(EngineConfig {
        abr: AbrConfig {
            initial_throughput_bps: 10_000_000.0,
            ..Default::default()
        },
        ..config()
    })?;

    let rate_bps = Arc::new(AtomicU64::new(2_000_000));
    let chosen = Arc::new(Mutex::new(Vec::new()));
    let record = chosen.clone();
    let (mut info, code) = creation_info(Path::new(MANIFEST_FILE_NAME));
    info.loader = Some(Arc::new(ThrottledLoader {
        inner: FsLoader::new(dir.path()),
        rate_bps: rate_bps.clone(),
    }));
    info.on_select_representation = Some(Arc::new(
        move |_: &AdaptationSetInfo, index: usize, representations: &[RepresentationInfo]| {
            record.lock().unwrap().push(representations[index].id.clone());
            true
        },
    ));
    let asset = interface.create_asset_from_info(info)?;
    assert!(wait_until(DEADLINE, || code.load(Ordering::Acquire) != -1));
    assert_eq!(code.load(Ordering::Acquire), 0);
    assert_eq!(chosen.lock().unwrap().first().map(String::as_str), Some("4000k"));

    interface.asset_set_looping(asset, true)?;
    interface.asset_play(asset)?;
    let started = Instant::now();
    let active_is = |representation: &str| {
        let needle = format!("\"representation\":\"{}\"", representation);
        interface.asset_update(asset, started.elapsed().as_secs_f64()).is_ok()
            && interface
                .asset_track_meta(asset)
                .is_ok_and(|meta| meta.is_some_and(|meta| meta.contains(&needle)))
    };

    // 2 Mbps is below the 4 Mbps tier, two such segments demote
    assert!(wait_until(DEADLINE, || active_is("1000k")));
    assert_eq!(chosen.lock().unwrap().as_slice(), ["4000k", "1000k"]);

    rate_bps.store(16_000_000, Ordering::Release);
    assert!(wait_until(DEADLINE, || active_is("4000k")));
    assert_eq!(chosen.lock().unwrap().as_slice(), ["4000k", "1000k", "4000k"]);
    assert!(!interface.asset_state(asset)?.is_invalid());

    interface.shutdown();
    Ok(())
}

#[test_log::test]
fn unsupported_codecs_need_a_data_callback() -> anyhow::Result<()> {
    let with_audio = SyntheticAsset {
        extra_tracks: vec![("audio".to_string(), "audio/opus".to_string(), "opus".to_string())],
        ..Default::default()
    };
    let interface = Interface::initialise(config())?;

    let rejected = tempfile::tempdir()?;
    with_audio.write_to(rejected.path())?;
    let (info, code) = creation_info(rejected.path());
    interface.create_asset_from_info(info)?;
    assert!(wait_until(DEADLINE, || code.load(Ordering::Acquire) != -1));
    assert_eq!(code.load(Ordering::Acquire), 3);

    let passthrough = tempfile::tempdir()?;
    with_audio.write_to(passthrough.path())?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let (mut info, code) = creation_info(passthrough.path());
    info.on_representation_data = Some(Arc::new(move |mime_type: &str, codec: &str, start: f64, data: &[u8]| {
        assert!(!data.is_empty());
        sink.lock().unwrap().push((mime_type.to_string(), codec.to_string(), start));
    }));
    interface.create_asset_from_info(info)?;

    assert!(wait_until(DEADLINE, || code.load(Ordering::Acquire) != -1));
    assert_eq!(code.load(Ordering::Acquire), 0);
    assert!(wait_until(DEADLINE, || {
        seen.lock()
            .unwrap()
            .iter()
            .any(|(mime_type, codec, _)| mime_type == "audio/opus" && codec == "opus")
    }));

    interface.shutdown();
    Ok(())
}

#[test_log::test]
fn renders_in_pipeline_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let interface = Interface::initialise(config())?;
    let asset = ready_asset(&interface, &SyntheticAsset::default(), dir.path())?;

    let device = Arc::new(NullDevice::new(RendererType::Metal));
    let player = interface.create_player(device.clone())?;
    let viewport = interface.create_viewport()?;
    interface.viewport_set_dimensions(viewport, 0, 0, 1280, 720)?;
    interface.viewport_set_view_matrix(viewport, Mat4::look_at_rh(Vec3::new(0.0, 1.0, 3.0), Vec3::Y, Vec3::Y))?;
    interface.viewport_set_proj_matrix(viewport, Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0))?;

    let method = interface.create_render_method("PointSprite")?;
    interface.render_method_set_shader_subroutines(method, "SoftEdges")?;
    assert!(matches!(
        interface.create_render_method("Wireframe"),
        Err(UsageError::UnknownRenderMethodType(_))
    ));

    let actor = interface.create_actor()?;
    interface.actor_set_asset(actor, asset)?;
    interface.actor_set_render_method(actor, method)?;
    let context = FrameContext::default();

    interface.update()?;
    assert_eq!(
        interface.render(player, actor, viewport, &context),
        Err(UsageError::RenderBeforePrepare)
    );
    interface.will_render(player, actor, viewport)?;
    interface.will_render(player, actor, viewport)?;
    let summary = interface.prepare_render(player, &context)?;
    assert_eq!(summary.prepared, 1);
    assert_eq!(summary.uploaded, 1);
    assert_eq!(
        interface.will_render(player, actor, viewport),
        Err(UsageError::WillRenderAfterPrepare)
    );
    assert_eq!(interface.prepare_render(player, &context), Err(UsageError::PrepareTwice));
    assert_eq!(interface.render(player, actor, viewport, &context), Ok(true));
    assert_eq!(device.draw_count(), 1);

    interface.update()?;
    assert_eq!(
        interface.render(player, actor, viewport, &context),
        Err(UsageError::RenderBeforePrepare)
    );
    assert_eq!(device.draw_count(), 1);

    interface.detach_player(player)?;
    interface.drain_render_queue()?;
    assert_eq!(device.resident_frames(), 0);

    interface.delete_player(player)?;
    assert!(!interface.is_player_valid(player));
    interface.shutdown();
    Ok(())
}

#[test_log::test]
fn log_entries_reach_the_host() -> anyhow::Result<()> {
    let interface = Interface::initialise(config())?;
    interface.set_log_level(LogLevel::Warning);
    interface.log(LogLevel::Info, "filtered");
    interface.log(LogLevel::Error, "kept");

    let entry = interface.pop_log_entry().map(|entry| (entry.level, entry.message));
    assert_eq!(entry, Some((LogLevel::Error, "kept".to_string())));
    assert!(interface.pop_log_entry().is_none());

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    interface.set_log_callback(Some(Box::new(move |entry: &LogEntry| {
        sink.lock().unwrap().push(entry.message.clone());
    })));
    interface.log(LogLevel::Warning, "to the callback");
    assert!(interface.pop_log_entry().is_none());
    assert_eq!(*received.lock().unwrap(), vec!["to the callback".to_string()]);

    {
        let mut shared = interface.lock();
        shared.map_set("quality", "high");
    }
    assert_eq!(interface.lock().map_get("quality"), Some("high"));

    interface.shutdown();
    Ok(())
}

#[test_log::test]
fn lifecycle_and_info() -> anyhow::Result<()> {
    let broken = EngineConfig {
        thread_pool_size: 0,
        ..Default::default()
    };
    assert!(matches!(Interface::initialise(broken), Err(InterfaceError::Config(_))));

    let interface = Interface::initialise(EngineConfig {
        app_id: "viewer".to_string(),
        ..config()
    })?;
    assert!(interface.is_initialised());
    assert_eq!(interface.get_info("APP_ID").as_deref(), Some("viewer"));
    assert_eq!(interface.get_info("UNKNOWN"), None);
    assert_eq!(interface.render_method_types(), vec!["PointSprite", "PointBlend", "Mesh"]);
    assert_eq!(interface.render_method_default_type(), "PointBlend");

    let actor = interface.create_actor()?;
    interface.shutdown();
    interface.shutdown();
    assert!(!interface.is_initialised());
    assert!(!interface.is_actor_valid(actor));
    assert_eq!(interface.create_actor(), Err(UsageError::NotInitialised));
    Ok(())
}

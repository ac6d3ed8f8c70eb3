use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use glam::{Mat4, Vec3};
use log::{info, warn};

use volstream::asset::asset::AssetCreationInfo;
use volstream::asset::state::AssetState;
use volstream::interface::Interface;
use volstream::interface::log_buffer::LogLevel;
use volstream::io::authoring::SyntheticAsset;
use volstream::rendering::device::{FrameContext, NullDevice, RendererType};
use volstream::settings::engine::EngineConfig;
use volstream::settings::{CliArgs, OperationMode, ViewportSize};

const TICK: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match args.operation_mode {
        OperationMode::Generate {
            out,
            duration,
            segment_duration,
            fps,
            representations,
        } => generate(&out, duration, segment_duration, fps, representations),
        OperationMode::Play {
            asset,
            looping,
            seconds,
            viewport,
        } => {
            let interface = Interface::initialise(config)?;
            let result = play(&interface, &asset, looping, seconds, viewport);
            interface.shutdown();
            result
        }
    }
}

fn generate(out: &Path, duration: f64, segment_duration: f64, fps: f32, representations: Vec<u32>) -> anyhow::Result<()> {
    std::fs::create_dir_all(out).with_context(|| out.display().to_string())?;
    let manifest = SyntheticAsset {
        duration,
        segment_duration,
        fps,
        bandwidths: representations,
        ..Default::default()
    }
    .write_to(out)?;

    info!(
        "Generated {:.1}s in {} segments at {}",
        manifest.duration,
        manifest.segment_count(),
        out.display()
    );
    Ok(())
}

fn play(interface: &Interface, path: &str, looping: bool, seconds: Option<f64>, size: ViewportSize) -> anyhow::Result<()> {
    let (init_tx, init_rx) = mpsc::channel();
    let mut creation = AssetCreationInfo::new(path);
    creation.buffer_time = interface.config().buffer_time;
    creation.on_initialised = Some(Box::new(move |code: i32| {
        let _ = init_tx.send(code);
    }));

    let asset = interface.create_asset_from_info(creation)?;
    interface.asset_set_looping(asset, looping)?;
    interface.asset_play(asset)?;

    let device = Arc::new(NullDevice::new(RendererType::OpenGl));
    let player = interface.create_player(device.clone())?;
    let viewport = interface.create_viewport()?;
    interface.viewport_set_dimensions(viewport, 0, 0, size.width, size.height)?;
    interface.viewport_set_view_matrix(viewport, Mat4::look_at_rh(Vec3::new(0.0, 1.0, 3.0), Vec3::Y, Vec3::Y))?;
    interface.viewport_set_proj_matrix(
        viewport,
        Mat4::perspective_rh(
            60f32.to_radians(),
            size.width as f32 / size.height as f32,
            0.1,
            100.0,
        ),
    )?;

    let actor = interface.create_actor()?;
    interface.actor_set_asset(actor, asset)?;
    interface.lock().scene_add(actor, "main", "Actor");

    let context = FrameContext::default();
    let started = Instant::now();
    let mut initialised = false;
    let mut last_report = Instant::now();
    let mut last_state = AssetState::empty();

    loop {
        let elapsed = started.elapsed().as_secs_f64();
        if seconds.is_some_and(|limit| elapsed >= limit) {
            break;
        }

        if !initialised {
            match init_rx.try_recv() {
                Ok(0) => {
                    initialised = true;
                    info!("Asset ready after {:.2}s", elapsed);
                }
                Ok(code) => bail!("Asset failed to initialise with code {}", code),
                Err(_) => {}
            }
        }

        interface.update()?;
        interface.asset_update(asset, elapsed)?;
        interface.drain_render_queue()?;

        interface.will_render(player, actor, viewport)?;
        interface.prepare_render(player, &context)?;
        interface.render(player, actor, viewport, &context)?;

        while let Some(entry) = interface.pop_log_entry() {
            if entry.level >= LogLevel::Warning {
                warn!("[{}] {}", entry.timestamp.format("%H:%M:%S%.3f"), entry.message);
            }
        }

        let state = interface.asset_state(asset)?;
        if state != last_state {
            info!("State {:?}", state);
            last_state = state;
        }

        if state.is_invalid() {
            bail!("Asset became invalid");
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            let network = interface.network_stats();
            info!(
                "t={:.2}s fill={:.2} voxels={} draws={} received={}kbit rate={}bit/s",
                interface.asset_current_time(asset)?,
                interface.asset_buffer_fill_ratio(asset)?,
                interface.asset_voxel_count(asset)?,
                device.draw_count(),
                network.received_bits / 1000,
                network.bits_per_second
            );
        }

        let ended = initialised && !looping && !state.contains(AssetState::PLAYING) && !state.contains(AssetState::SEEKING);
        if ended && seconds.is_none() {
            info!("Reached the end of the asset");
            break;
        }

        std::thread::sleep(TICK);
    }

    info!(
        "Played {:.2}s, {} draws, memory {:?}",
        started.elapsed().as_secs_f64(),
        device.draw_count(),
        interface.memory_stats()
    );
    Ok(())
}

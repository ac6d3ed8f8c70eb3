use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use glam::Mat4;
use log::{error, trace, warn};

use crate::asset::asset::Asset;
use crate::asset::frame::DecodedFrame;
use crate::errors::UsageError;
use crate::rendering::device::{FrameContext, GpuFrameId, RenderDevice, RendererType};
use crate::rendering::frame_pipeline::FrameAccumulator;
use crate::rendering::lod::{Lod, LodConfig, projected_height};
use crate::rendering::viewport::Viewport;
use crate::util::handle_table::Handle;

/// What PrepareRender needs to know about one announced actor.
pub struct ActorWork {
    pub actor: Handle,
    pub asset: Option<Arc<Asset>>,
    pub transform: Mat4,
    pub viewports: Vec<Viewport>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedActor {
    pub lod: Lod,
    /// None if no frame was ever available for this actor; Render then draws nothing.
    pub frame: Option<GpuFrameId>,
    pub voxel_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareSummary {
    pub prepared: usize,
    pub culled: usize,
    pub uploaded: usize,
    pub released: usize,
}

struct ResidentFrame {
    id: GpuFrameId,
    source: Arc<DecodedFrame>,
    lod: Lod,
}

struct PlayerFrame {
    accumulator: FrameAccumulator,
    resident: HashMap<Handle, ResidentFrame>,
    prepared: HashMap<Handle, PreparedActor>,
}

/// One host render target with its graphics device. Owns the gpu copies of the frames its actors show.
pub struct Player {
    device: Arc<dyn RenderDevice>,
    frame: Mutex<PlayerFrame>,
}

impl Player {
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self {
            device,
            frame: Mutex::new(PlayerFrame {
                accumulator: FrameAccumulator::new(),
                resident: HashMap::new(),
                prepared: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerFrame> {
        self.frame.lock().expect("Player frame lock")
    }

    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    pub fn renderer_type(&self) -> RendererType {
        self.device.renderer_type()
    }

    pub fn frame_index(&self) -> u64 {
        self.lock().accumulator.frame_index()
    }

    pub fn begin_frame(&self) {
        let mut frame = self.lock();
        frame.accumulator.begin_frame();
        frame.prepared.clear();
    }

    pub fn will_render(&self, actor: Handle, viewport: Handle) -> Result<bool, UsageError> {
        self.lock().accumulator.will_render(actor, viewport)
    }

    pub fn begin_prepare(&self) -> Result<Vec<(Handle, Vec<Handle>)>, UsageError> {
        self.lock().accumulator.begin_prepare()
    }

    /// Picks a level of detail per actor and uploads what changed. Waiting for late frames shares one `timeout`
    /// across all actors. Frames of actors for which `alive` returns false are released.
    pub fn finish_prepare(
        &self,
        work: Vec<ActorWork>,
        lod_config: &LodConfig,
        timeout: Duration,
        context: &FrameContext,
        alive: impl Fn(Handle) -> bool,
    ) -> PrepareSummary {
        profiling::scope!("Player::finish_prepare");
        let deadline = Instant::now() + timeout;
        let mut summary = PrepareSummary::default();
        let mut guard = self.lock();
        let frame = &mut *guard;

        for item in work {
            let Some(asset) = item.asset else {
                continue;
            };

            let Some(lod) = select_lod(&asset, &item.transform, &item.viewports, lod_config) else {
                summary.culled += 1;
                continue;
            };

            if let Some(decoded) = asset.wait_for_frame(deadline.saturating_duration_since(Instant::now())) {
                let current = frame.resident.get(&item.actor);
                let up_to_date = current.is_some_and(|resident| {
                    Arc::ptr_eq(&resident.source, &decoded) && resident.lod == lod
                });

                if !up_to_date {
                    match self.device.upload_frame(&decoded, lod, context) {
                        Ok(id) => {
                            summary.uploaded += 1;
                            let previous = frame.resident.insert(item.actor, ResidentFrame {
                                id,
                                source: decoded,
                                lod,
                            });
                            if let Some(previous) = previous {
                                self.release(previous.id);
                                summary.released += 1;
                            }
                        }
                        Err(e) => error!("Uploading a frame of actor {} failed: {:?}", item.actor, e),
                    }
                }
            } else {
                trace!("No frame ready for actor {}, keeping the last one", item.actor);
            }

            let resident = frame.resident.get(&item.actor);
            frame.prepared.insert(item.actor, PreparedActor {
                lod: resident.map(|resident| resident.lod).unwrap_or(lod),
                frame: resident.map(|resident| resident.id),
                voxel_count: resident.map(|resident| resident.source.voxel_count).unwrap_or(0),
            });
            summary.prepared += 1;
        }

        let stale = frame
            .resident
            .keys()
            .copied()
            .filter(|actor| !alive(*actor))
            .collect::<Vec<_>>();
        for actor in stale {
            if let Some(resident) = frame.resident.remove(&actor) {
                self.release(resident.id);
                summary.released += 1;
            }
        }

        summary
    }

    fn release(&self, id: GpuFrameId) {
        if let Err(e) = self.device.release_frame(id) {
            warn!("Releasing gpu frame {:?} failed: {:?}", id, e);
        }
    }

    /// The prepared state of `actor`, or None if it was culled or has no asset.
    pub fn prepared(&self, actor: Handle, viewport: Handle) -> Result<Option<PreparedActor>, UsageError> {
        let frame = self.lock();
        frame.accumulator.check_render(actor, viewport)?;
        Ok(frame.prepared.get(&actor).copied())
    }

    pub fn resident_count(&self) -> usize {
        self.lock().resident.len()
    }

    /// Forgets every gpu frame. The caller releases them on the render thread.
    pub fn take_resident(&self) -> Vec<GpuFrameId> {
        let mut frame = self.lock();
        frame.prepared.clear();
        frame.resident.drain().map(|(_, resident)| resident.id).collect()
    }
}

/// The highest level of detail any of the viewports asks for, None if the actor is visible in none of them.
/// Actors whose bounds are not known yet are treated as close up.
fn select_lod(asset: &Asset, transform: &Mat4, viewports: &[Viewport], lod_config: &LodConfig) -> Option<Lod> {
    let bounds = {
        let core = asset.lock();
        core.bounds()
            .or_else(|| core.presentable_frame().and_then(|frame| frame.bounds))
    };
    let Some(bounds) = bounds else {
        return Some(Lod::High);
    };

    viewports
        .iter()
        .filter_map(|viewport| {
            projected_height(
                &bounds,
                transform,
                &viewport.view,
                &viewport.proj,
                viewport.rect.height as f32,
            )
        })
        .map(|pixels| lod_config.lod_for(pixels))
        .max()
}

use std::sync::Arc;

use log::debug;

use crate::errors::UsageError;
use crate::interface::log_buffer::LogLevel;
use crate::interface::{Interface, removed};
use crate::rendering::device::{DrawCall, FrameContext, RenderDevice};
use crate::rendering::player::{ActorWork, Player, PrepareSummary};
use crate::rendering::render_method::RenderMethodType;
use crate::util::handle_table::Handle;

impl Interface {
    pub fn create_player(&self, device: Arc<dyn RenderDevice>) -> Result<Handle, UsageError> {
        self.ensure_initialised()?;
        let renderer = device.renderer_type();
        let (handle, _) = self.players.insert(Player::new(device))?;
        debug!("Created player {} for {:?}", handle, renderer);
        Ok(handle)
    }

    pub fn delete_player(&self, handle: Handle) -> Result<(), UsageError> {
        let player = removed(&self.players, handle)?;
        self.release_gpu_frames(&player);
        Ok(())
    }

    pub fn is_player_valid(&self, handle: Handle) -> bool {
        self.players.is_valid(handle)
    }

    /// Lets go of every gpu frame the player holds, e.g. when the host loses its device. The player stays usable
    /// and uploads again on the next PrepareRender.
    pub fn detach_player(&self, handle: Handle) -> Result<(), UsageError> {
        let player = self.players.require(handle)?;
        self.release_gpu_frames(&player);
        Ok(())
    }

    pub(super) fn release_gpu_frames(&self, player: &Player) {
        let frames = player.take_resident();
        if frames.is_empty() {
            return;
        }

        let device = player.device().clone();
        self.render_queue.enqueue(move || {
            for frame in frames {
                device.release_frame(frame)?;
            }
            Ok(())
        });
    }

    /// Announces that `actor` is going to be drawn into `viewport` this frame. Repeating it is harmless.
    pub fn will_render(&self, player: Handle, actor: Handle, viewport: Handle) -> Result<(), UsageError> {
        let player = self.players.require(player)?;
        self.actors.require(actor)?;
        self.viewports.require(viewport)?;
        player.will_render(actor, viewport)?;
        Ok(())
    }

    /// Must run on the render thread, once per frame after every WillRender. May wait up to the configured
    /// prepare timeout for frames that are still decoding.
    pub fn prepare_render(&self, player: Handle, context: &FrameContext) -> Result<PrepareSummary, UsageError> {
        self.render_queue.bind_render_thread()?;
        let player = self.players.require(player)?;
        let announced = player.begin_prepare()?;

        let work = announced
            .into_iter()
            .map(|(actor, viewports)| {
                let placed = self.actors.get(actor).map(|placed| {
                    let placed = placed.read().expect("Actor lock");
                    (placed.asset, placed.transform)
                });
                let (asset, transform) = placed.unwrap_or_default();

                ActorWork {
                    actor,
                    asset: self.assets.get(asset).filter(|asset| !asset.state().is_invalid()),
                    transform,
                    viewports: viewports
                        .into_iter()
                        .filter_map(|viewport| self.viewports.get(viewport))
                        .map(|viewport| viewport.read().expect("Viewport lock").clone())
                        .collect(),
                }
            })
            .collect::<Vec<_>>();

        Ok(player.finish_prepare(
            work,
            &self.config.lod,
            self.config.prepare_timeout(),
            context,
            |actor| self.actors.is_valid(actor),
        ))
    }

    /// Draws what PrepareRender made resident for `actor`. Never blocks. Returns whether anything was drawn.
    pub fn render(
        &self,
        player: Handle,
        actor: Handle,
        viewport: Handle,
        context: &FrameContext,
    ) -> Result<bool, UsageError> {
        self.render_queue.bind_render_thread()?;
        let player = self.players.require(player)?;
        let Some(prepared) = player.prepared(actor, viewport)? else {
            return Ok(false);
        };
        let Some(frame) = prepared.frame else {
            return Ok(false);
        };

        let (Some(placed), Some(target)) = (self.actors.get(actor), self.viewports.get(viewport)) else {
            return Ok(false);
        };
        let placed = placed.read().expect("Actor lock").clone();
        let target = target.read().expect("Viewport lock").clone();

        let (render_method, subroutines) = self
            .render_methods
            .get(placed.render_method)
            .map(|method| {
                let method = method.read().expect("Render method lock");
                (method.method_type, method.subroutines.clone())
            })
            .unwrap_or((RenderMethodType::DEFAULT, Vec::new()));

        let call = DrawCall {
            actor,
            frame,
            lod: prepared.lod,
            transform: placed.transform,
            render_method,
            subroutines: &subroutines,
            uniforms: &placed.uniforms,
            viewport: &target,
            voxel_count: prepared.voxel_count,
        };

        match player.device().draw(&call, context) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.log
                    .log(LogLevel::Error, &format!("Drawing actor {} failed: {:?}", actor, e));
                Ok(false)
            }
        }
    }
}

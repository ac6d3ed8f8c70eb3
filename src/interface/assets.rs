use std::sync::Arc;

use log::debug;

use crate::asset::asset::{Asset, AssetCreationInfo};
use crate::asset::frame::Aabb;
use crate::asset::playback::AssetCore;
use crate::asset::state::AssetState;
use crate::asset::streamer::{AssetOrigin, run_streamer};
use crate::errors::UsageError;
use crate::interface::{Interface, removed};
use crate::util::handle_table::Handle;

impl Interface {
    pub fn create_asset(&self, path: &str) -> Result<Handle, UsageError> {
        let mut info = AssetCreationInfo::new(path);
        info.buffer_time = self.config.buffer_time;
        self.create_asset_from_info(info)
    }

    /// Returns right away; the manifest is loaded on the worker runtime and the outcome reported through
    /// `on_initialised`.
    pub fn create_asset_from_info(&self, info: AssetCreationInfo) -> Result<Handle, UsageError> {
        self.ensure_initialised()?;
        if !(info.buffer_time.is_finite() && info.buffer_time > 0.0) {
            return Err(UsageError::InvalidArgument("buffer_time must be a positive number of seconds"));
        }

        let AssetCreationInfo {
            asset_path,
            cache_dir,
            on_initialised,
            on_select_representation,
            on_representation_data,
            buffer_time,
            loader,
        } = info;

        let core = AssetCore::new(buffer_time, self.config.back_buffer_window);
        let (handle, asset) = self.assets.insert_with(|handle| {
            Asset::new(handle, core, on_initialised, on_select_representation, on_representation_data)
        })?;

        debug!("Created asset {} for {}", handle, asset_path);
        let origin = AssetOrigin {
            path: asset_path,
            cache_dir,
            loader,
        };
        let task = self
            .runtime_handle
            .spawn(run_streamer(asset, origin, self.streamer_context()));
        self.streamers.insert(handle, task);
        Ok(handle)
    }

    /// The handle is invalid once this returns; work still in flight for the asset is discarded when it lands.
    pub fn delete_asset(&self, handle: Handle) -> Result<(), UsageError> {
        let asset = removed(&self.assets, handle)?;
        asset.mark_deleted();
        self.published_states.remove(&handle);
        debug!("Deleted asset {}", handle);
        Ok(())
    }

    pub fn is_asset_valid(&self, handle: Handle) -> bool {
        self.assets.is_valid(handle)
    }

    fn asset(&self, handle: Handle) -> Result<Arc<Asset>, UsageError> {
        self.assets.require(handle)
    }

    /// Advances a playing asset by the time passed since the previous call. The first call only sets the
    /// reference point.
    pub fn asset_update(&self, handle: Handle, absolute_time: f64) -> Result<(), UsageError> {
        if !absolute_time.is_finite() {
            return Err(UsageError::InvalidArgument("absolute_time must be finite"));
        }
        self.asset(handle)?.update(absolute_time);
        Ok(())
    }

    pub fn asset_play(&self, handle: Handle) -> Result<(), UsageError> {
        self.asset(handle)?.play();
        Ok(())
    }

    pub fn asset_pause(&self, handle: Handle) -> Result<(), UsageError> {
        self.asset(handle)?.pause();
        Ok(())
    }

    pub fn asset_stop(&self, handle: Handle) -> Result<(), UsageError> {
        self.asset(handle)?.stop();
        Ok(())
    }

    /// Targets outside of the asset are clamped. Only targets that can not be clamped (NaN, infinite) fail, and
    /// they leave the asset invalid.
    pub fn asset_seek(&self, handle: Handle, time: f64) -> Result<(), UsageError> {
        self.asset(handle)?
            .seek(time)
            .map_err(|_| UsageError::AssetInvalid(handle))
    }

    pub fn asset_step(&self, handle: Handle, frames: i32) -> Result<(), UsageError> {
        self.asset(handle)?.step(frames);
        Ok(())
    }

    pub fn asset_set_looping(&self, handle: Handle, looping: bool) -> Result<(), UsageError> {
        self.asset(handle)?.set_looping(looping);
        Ok(())
    }

    pub fn asset_state(&self, handle: Handle) -> Result<AssetState, UsageError> {
        Ok(self.asset(handle)?.state())
    }

    /// Unknown until the manifest is loaded, or if it carries none.
    pub fn asset_bounds(&self, handle: Handle) -> Result<Option<Aabb>, UsageError> {
        Ok(self.asset(handle)?.lock().bounds())
    }

    pub fn asset_buffer_fill_ratio(&self, handle: Handle) -> Result<f64, UsageError> {
        Ok(self.asset(handle)?.lock().fill_ratio())
    }

    pub fn asset_current_time(&self, handle: Handle) -> Result<f64, UsageError> {
        Ok(self.asset(handle)?.lock().current_time())
    }

    pub fn asset_decode_time(&self, handle: Handle) -> Result<Option<f64>, UsageError> {
        Ok(self.asset(handle)?.lock().decode_time())
    }

    pub fn asset_duration(&self, handle: Handle) -> Result<Option<f64>, UsageError> {
        Ok(self.asset(handle)?.lock().duration())
    }

    pub fn asset_frame_meta(&self, handle: Handle) -> Result<Option<String>, UsageError> {
        Ok(self.asset(handle)?.lock().frame_meta())
    }

    pub fn asset_track_meta(&self, handle: Handle) -> Result<Option<String>, UsageError> {
        Ok(self.asset(handle)?.lock().track_meta())
    }

    pub fn asset_voxel_count(&self, handle: Handle) -> Result<u32, UsageError> {
        Ok(self.asset(handle)?.lock().voxel_count())
    }
}

use std::sync::RwLock;

use glam::Mat4;

use crate::errors::UsageError;
use crate::interface::{Interface, removed};
use crate::rendering::viewport::{ColourSpace, Viewport, ViewportRect};
use crate::util::handle_table::Handle;

impl Interface {
    pub fn create_viewport(&self) -> Result<Handle, UsageError> {
        self.ensure_initialised()?;
        let (handle, _) = self.viewports.insert(RwLock::new(Viewport::default()))?;
        Ok(handle)
    }

    pub fn delete_viewport(&self, handle: Handle) -> Result<(), UsageError> {
        removed(&self.viewports, handle)?;
        Ok(())
    }

    pub fn is_viewport_valid(&self, handle: Handle) -> bool {
        self.viewports.is_valid(handle)
    }

    fn with_viewport<F: FnOnce(&mut Viewport)>(&self, handle: Handle, change: F) -> Result<(), UsageError> {
        let viewport = self.viewports.require(handle)?;
        change(&mut viewport.write().expect("Viewport lock"));
        Ok(())
    }

    pub fn viewport_set_view_matrix(&self, handle: Handle, view: Mat4) -> Result<(), UsageError> {
        if !view.is_finite() {
            return Err(UsageError::InvalidArgument("view matrix must be finite"));
        }
        self.with_viewport(handle, |viewport| viewport.view = view)
    }

    pub fn viewport_set_proj_matrix(&self, handle: Handle, proj: Mat4) -> Result<(), UsageError> {
        if !proj.is_finite() {
            return Err(UsageError::InvalidArgument("projection matrix must be finite"));
        }
        self.with_viewport(handle, |viewport| viewport.proj = proj)
    }

    pub fn viewport_set_dimensions(&self, handle: Handle, x: i32, y: i32, width: u32, height: u32) -> Result<(), UsageError> {
        self.with_viewport(handle, |viewport| {
            viewport.rect = ViewportRect { x, y, width, height };
        })
    }

    pub fn viewport_set_colour_space(&self, handle: Handle, colour_space: ColourSpace) -> Result<(), UsageError> {
        self.with_viewport(handle, |viewport| viewport.colour_space = colour_space)
    }

    pub fn viewport_set_reverse_depth(&self, handle: Handle, reverse_depth: bool) -> Result<(), UsageError> {
        self.with_viewport(handle, |viewport| viewport.reverse_depth = reverse_depth)
    }
}

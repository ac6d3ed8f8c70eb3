use std::sync::RwLock;

use crate::errors::UsageError;
use crate::interface::{Interface, removed};
use crate::rendering::render_method::{RenderMethod, RenderMethodType};
use crate::util::handle_table::Handle;

impl Interface {
    /// `method_type` is one of `render_method_types`.
    pub fn create_render_method(&self, method_type: &str) -> Result<Handle, UsageError> {
        self.ensure_initialised()?;
        let method_type = method_type.parse::<RenderMethodType>()?;
        let (handle, _) = self.render_methods.insert(RwLock::new(RenderMethod::new(method_type)))?;
        Ok(handle)
    }

    pub fn delete_render_method(&self, handle: Handle) -> Result<(), UsageError> {
        removed(&self.render_methods, handle)?;
        Ok(())
    }

    pub fn is_render_method_valid(&self, handle: Handle) -> bool {
        self.render_methods.is_valid(handle)
    }

    pub fn render_method_set_shader_subroutines(&self, handle: Handle, source: &str) -> Result<(), UsageError> {
        let method = self.render_methods.require(handle)?;
        method
            .write()
            .expect("Render method lock")
            .set_subroutines_from_source(source);
        Ok(())
    }

    pub fn render_method_set_shader_subroutines_array(&self, handle: Handle, names: &[String]) -> Result<(), UsageError> {
        let method = self.render_methods.require(handle)?;
        method.write().expect("Render method lock").set_subroutines(names);
        Ok(())
    }
}

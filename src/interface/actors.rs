use std::sync::RwLock;

use glam::Mat4;

use crate::errors::UsageError;
use crate::interface::{Interface, removed};
use crate::rendering::actor::{Actor, UniformValue};
use crate::util::handle_table::Handle;

impl Interface {
    /// A new actor shows nothing until an asset is assigned.
    pub fn create_actor(&self) -> Result<Handle, UsageError> {
        self.ensure_initialised()?;
        let (handle, _) = self
            .actors
            .insert(RwLock::new(Actor::new(Handle::INVALID, Handle::INVALID)))?;
        Ok(handle)
    }

    /// Gpu frames of the actor are released by the next PrepareRender of each player.
    pub fn delete_actor(&self, handle: Handle) -> Result<(), UsageError> {
        removed(&self.actors, handle)?;
        Ok(())
    }

    pub fn is_actor_valid(&self, handle: Handle) -> bool {
        self.actors.is_valid(handle)
    }

    fn with_actor<F: FnOnce(&mut Actor)>(&self, handle: Handle, change: F) -> Result<(), UsageError> {
        let actor = self.actors.require(handle)?;
        change(&mut actor.write().expect("Actor lock"));
        Ok(())
    }

    /// `Handle::INVALID` detaches the current asset.
    pub fn actor_set_asset(&self, actor: Handle, asset: Handle) -> Result<(), UsageError> {
        if !asset.is_null() {
            self.assets.require(asset)?;
        }
        self.with_actor(actor, |actor| actor.asset = asset)
    }

    /// `Handle::INVALID` falls back to the default render method.
    pub fn actor_set_render_method(&self, actor: Handle, render_method: Handle) -> Result<(), UsageError> {
        if !render_method.is_null() {
            self.render_methods.require(render_method)?;
        }
        self.with_actor(actor, |actor| actor.render_method = render_method)
    }

    pub fn actor_set_transform(&self, actor: Handle, transform: Mat4) -> Result<(), UsageError> {
        if !transform.is_finite() {
            return Err(UsageError::InvalidArgument("transform must be finite"));
        }
        self.with_actor(actor, |actor| actor.transform = transform)
    }

    pub fn actor_set_uniform(&self, actor: Handle, name: &str, value: UniformValue) -> Result<(), UsageError> {
        if name.is_empty() {
            return Err(UsageError::InvalidArgument("uniform name must not be empty"));
        }
        if let UniformValue::Texture2D { player, .. } = value {
            self.players.require(player)?;
        }
        self.with_actor(actor, |actor| {
            actor.uniforms.insert(name.to_string(), value);
        })
    }
}

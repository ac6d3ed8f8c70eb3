use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::util::handle_table::Handle;

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    /// A host texture, only valid for the player that registered it.
    Texture2D {
        player: Handle,
        native: u64,
    },
}

/// One placed instance of an asset in the scene.
#[derive(Debug, Clone)]
pub struct Actor {
    pub asset: Handle,
    pub render_method: Handle,
    pub transform: Mat4,
    pub uniforms: HashMap<String, UniformValue>,
}

impl Actor {
    pub fn new(asset: Handle, render_method: Handle) -> Self {
        Self {
            asset,
            render_method,
            transform: Mat4::IDENTITY,
            uniforms: HashMap::new(),
        }
    }
}

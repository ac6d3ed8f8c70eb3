use glam::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColourSpace {
    Gamma,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A camera into the scene: where it looks from, how it projects and the part of the target it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub view: Mat4,
    pub proj: Mat4,
    pub rect: ViewportRect,
    pub colour_space: ColourSpace,
    /// The projection maps the far plane to 0 and the near plane to 1.
    pub reverse_depth: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            rect: ViewportRect::default(),
            colour_space: ColourSpace::Gamma,
            reverse_depth: false,
        }
    }
}

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

use crate::asset::frame::Aabb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lod {
    Low,
    Medium,
    High,
}

/// Projected on-screen height (in pixels) an asset needs for each level of detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub high_min_pixels: f32,
    pub medium_min_pixels: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            high_min_pixels: 400.0,
            medium_min_pixels: 120.0,
        }
    }
}

impl LodConfig {
    pub fn lod_for(&self, pixels: f32) -> Lod {
        if pixels >= self.high_min_pixels {
            Lod::High
        } else if pixels >= self.medium_min_pixels {
            Lod::Medium
        } else {
            Lod::Low
        }
    }
}

/// Height in pixels of the bounding sphere of `bounds` once placed by `transform` and seen through the camera.
/// None if the sphere lies behind the camera or entirely outside the view.
pub fn projected_height(bounds: &Aabb, transform: &Mat4, view: &Mat4, proj: &Mat4, viewport_height: f32) -> Option<f32> {
    let center = transform.transform_point3(bounds.center());
    let (scale, _, _) = transform.to_scale_rotation_translation();
    let radius = bounds.half_dims().length() * scale.abs().max_element();

    let eye = view.transform_point3(center);
    let clip = *proj * Vec4::new(eye.x, eye.y, eye.z, 1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }

    let ndc_radius_y = proj.y_axis.y.abs() * radius / clip.w;
    let ndc_radius_x = proj.x_axis.x.abs() * radius / clip.w;
    let (ndc_x, ndc_y) = (clip.x / clip.w, clip.y / clip.w);
    if ndc_x.abs() - ndc_radius_x > 1.0 || ndc_y.abs() - ndc_radius_y > 1.0 {
        return None;
    }

    // the ndc range [-1, 1] spans the viewport, so the radius maps to half of the diameter
    Some(ndc_radius_y * viewport_height)
}

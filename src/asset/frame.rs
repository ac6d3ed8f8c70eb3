use std::sync::Arc;

use glam::Vec3;
use serde::Serialize;

use crate::util::memory::TrackedBuffer;

/// Tolerance for comparing segment boundaries computed from different float paths.
pub const TIME_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_half_dims(center: Vec3, half_dims: Vec3) -> Self {
        Self {
            min: center - half_dims,
            max: center + half_dims,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_dims(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// The decoded data of one adaptation set for one frame.
#[derive(Debug)]
pub struct FrameLayer {
    pub adaptation_set: String,
    pub representation: String,
    pub data: Arc<TrackedBuffer>,
}

#[derive(Debug)]
pub struct DecodedFrame {
    /// Position on the playback timeline, which keeps counting across loops.
    pub stream_time: f64,
    /// Position inside the asset, in `[0, duration]`.
    pub asset_time: f64,
    pub seq: u64,
    pub voxel_count: u32,
    pub bounds: Option<Aabb>,
    pub layers: Vec<FrameLayer>,
}

impl DecodedFrame {
    pub fn byte_len(&self) -> usize {
        self.layers.iter().map(|layer| layer.data.len()).sum()
    }
}

/// All frames of one segment slot, covering `[start, end)` on the playback timeline.
#[derive(Debug, Clone)]
pub struct DecodedSegment {
    pub seq: u64,
    pub start: f64,
    pub end: f64,
    pub frames: Vec<Arc<DecodedFrame>>,
}

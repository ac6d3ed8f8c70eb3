use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Mat4;

use crate::asset::frame::DecodedFrame;
use crate::rendering::actor::UniformValue;
use crate::rendering::lod::Lod;
use crate::rendering::render_method::RenderMethodType;
use crate::rendering::viewport::Viewport;
use crate::util::handle_table::Handle;

/// The graphics api of the host, numbered the way hosts pass it in.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererType {
    OpenGl = 0,
    Direct3D11 = 1,
    Gnmx = 2,
    Metal = 3,
}

impl RendererType {
    pub fn from_u32(value: u32) -> Option<RendererType> {
        match value {
            0 => Some(RendererType::OpenGl),
            1 => Some(RendererType::Direct3D11),
            2 => Some(RendererType::Gnmx),
            3 => Some(RendererType::Metal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgba16Float,
    Rgb10A2,
}

/// An opaque host object (command queue, encoder, texture). Only ever handed back to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Per-frame host objects passed to PrepareRender and Render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub pixel_format: PixelFormat,
    pub command_queue: NativeHandle,
    pub command_encoder: NativeHandle,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Rgba8,
            command_queue: NativeHandle::default(),
            command_encoder: NativeHandle::default(),
        }
    }
}

/// A decoded frame resident on the gpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuFrameId(pub u64);

pub struct DrawCall<'a> {
    pub actor: Handle,
    pub frame: GpuFrameId,
    pub lod: Lod,
    pub transform: Mat4,
    pub render_method: RenderMethodType,
    pub subroutines: &'a [String],
    pub uniforms: &'a HashMap<String, UniformValue>,
    pub viewport: &'a Viewport,
    pub voxel_count: u32,
}

/// The seam to the host graphics api. All calls happen on the render thread.
pub trait RenderDevice: Send + Sync {
    fn renderer_type(&self) -> RendererType;

    fn upload_frame(&self, frame: &DecodedFrame, lod: Lod, context: &FrameContext) -> anyhow::Result<GpuFrameId>;

    fn release_frame(&self, frame: GpuFrameId) -> anyhow::Result<()>;

    fn draw(&self, call: &DrawCall<'_>, context: &FrameContext) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Upload {
        id: GpuFrameId,
        stream_time: f64,
        lod: Lod,
        bytes: usize,
    },
    Release {
        id: GpuFrameId,
    },
    Draw {
        actor: Handle,
        id: GpuFrameId,
        lod: Lod,
    },
}

/// Keeps track of what would have been sent to a gpu. Used headless and in tests.
pub struct NullDevice {
    renderer_type: RendererType,
    next_id: AtomicU64,
    resident: Mutex<HashSet<GpuFrameId>>,
    events: Mutex<Vec<DeviceEvent>>,
}

impl NullDevice {
    pub fn new(renderer_type: RendererType) -> Self {
        Self {
            renderer_type,
            next_id: AtomicU64::new(1),
            resident: Mutex::new(HashSet::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().expect("Device events lock").clone()
    }

    pub fn resident_frames(&self) -> usize {
        self.resident.lock().expect("Device resident lock").len()
    }

    pub fn draw_count(&self) -> usize {
        self.events
            .lock()
            .expect("Device events lock")
            .iter()
            .filter(|event| matches!(event, DeviceEvent::Draw { .. }))
            .count()
    }

    fn record(&self, event: DeviceEvent) {
        self.events.lock().expect("Device events lock").push(event);
    }
}

impl RenderDevice for NullDevice {
    fn renderer_type(&self) -> RendererType {
        self.renderer_type
    }

    fn upload_frame(&self, frame: &DecodedFrame, lod: Lod, _context: &FrameContext) -> anyhow::Result<GpuFrameId> {
        let id = GpuFrameId(self.next_id.fetch_add(1, Ordering::AcqRel));
        self.resident.lock().expect("Device resident lock").insert(id);
        self.record(DeviceEvent::Upload {
            id,
            stream_time: frame.stream_time,
            lod,
            bytes: frame.byte_len(),
        });
        Ok(id)
    }

    fn release_frame(&self, frame: GpuFrameId) -> anyhow::Result<()> {
        if !self.resident.lock().expect("Device resident lock").remove(&frame) {
            anyhow::bail!("Frame {:?} is not resident", frame);
        }
        self.record(DeviceEvent::Release { id: frame });
        Ok(())
    }

    fn draw(&self, call: &DrawCall<'_>, _context: &FrameContext) -> anyhow::Result<()> {
        if !self.resident.lock().expect("Device resident lock").contains(&call.frame) {
            anyhow::bail!("Drawing frame {:?} which is not resident", call.frame);
        }
        self.record(DeviceEvent::Draw {
            actor: call.actor,
            id: call.frame,
            lod: call.lod,
        });
        Ok(())
    }
}

use std::io::Read;

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use num_enum::TryFromPrimitive;

use crate::ParserError;
use crate::common::reader::{Parseable, read_cstring};
use crate::common::types::CAaBox;

pub const VSEG_VERSION: u32 = 1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        const HAS_BOUNDS = 0x1;
        /// The last segment of a stream, nothing follows.
        const END_OF_STREAM = 0x2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum PayloadEncoding {
    Raw = 0,
    RunLength = 1,
}

/// One segment of one representation: a run of frames of a single track.
#[derive(Debug, Clone)]
pub struct VSegAsset {
    pub header: SHDRChunk,
    pub frames: Vec<FrameIndexEntry>,
    pub bounds: Option<Vec<CAaBox>>,
    pub payload: Vec<u8>,
}

impl VSegAsset {
    pub fn frame_payload(&self, index: usize) -> Option<&[u8]> {
        let entry = self.frames.get(index)?;
        let start = entry.offset as usize;
        self.payload.get(start..start + entry.size as usize)
    }

    pub fn frame_bounds(&self, index: usize) -> Option<CAaBox> {
        self.bounds.as_ref().and_then(|bounds| bounds.get(index).copied())
    }

    pub fn end_time(&self) -> f64 {
        self.header.start_time + self.header.duration
    }
}

#[derive(Debug, Clone)]
pub struct SHDRChunk {
    pub start_time: f64,
    pub duration: f64,
    pub frame_rate: f32,
    pub frame_count: u32,
    pub flags: SegmentFlags,
    pub encoding: PayloadEncoding,
    pub mime_type: String,
    pub codec: String,
}

impl Parseable<SHDRChunk> for SHDRChunk {
    fn parse<R: Read>(rdr: &mut R) -> Result<SHDRChunk, ParserError> {
        let start_time = rdr.read_f64::<LittleEndian>()?;
        let duration = rdr.read_f64::<LittleEndian>()?;
        let frame_rate = rdr.read_f32::<LittleEndian>()?;
        let frame_count = rdr.read_u32::<LittleEndian>()?;
        let flags = SegmentFlags::from_bits_truncate(rdr.read_u32::<LittleEndian>()?);
        let encoding = PayloadEncoding::try_from(rdr.read_u32::<LittleEndian>()?).map_err(|_| {
            ParserError::FormatError {
                reason: "Unknown payload encoding",
            }
        })?;
        let mime_type = read_cstring(rdr)?.into_string()?;
        let codec = read_cstring(rdr)?.into_string()?;

        Ok(SHDRChunk {
            start_time,
            duration,
            frame_rate,
            frame_count,
            flags,
            encoding,
            mime_type,
            codec,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameIndexEntry {
    pub timestamp: f64,
    pub offset: u32,
    pub size: u32,
    pub voxel_count: u32,
}

impl Parseable<FrameIndexEntry> for FrameIndexEntry {
    fn parse<R: Read>(rdr: &mut R) -> Result<FrameIndexEntry, ParserError> {
        Ok(FrameIndexEntry {
            timestamp: rdr.read_f64::<LittleEndian>()?,
            offset: rdr.read_u32::<LittleEndian>()?,
            size: rdr.read_u32::<LittleEndian>()?,
            voxel_count: rdr.read_u32::<LittleEndian>()?,
        })
    }
}

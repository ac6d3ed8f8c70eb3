use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;
use crate::common::types::{CAaBox, IffChunk};
use crate::common::writer::{Writable, write_cstring};
use crate::vseg::payload::encode_payload;
use crate::vseg::types::{FrameIndexEntry, PayloadEncoding, SHDRChunk, SegmentFlags, VSEG_VERSION};

/// A frame as handed to the writer, before encoding.
#[derive(Debug, Clone)]
pub struct FrameSource {
    pub timestamp: f64,
    pub voxel_count: u32,
    pub bounds: Option<CAaBox>,
    pub data: Vec<u8>,
}

pub struct VSegWriter {
    header: SHDRChunk,
    frames: Vec<FrameSource>,
}

impl VSegWriter {
    pub fn new(
        start_time: f64,
        duration: f64,
        frame_rate: f32,
        mime_type: &str,
        codec: &str,
        encoding: PayloadEncoding,
    ) -> Self {
        VSegWriter {
            header: SHDRChunk {
                start_time,
                duration,
                frame_rate,
                frame_count: 0,
                flags: SegmentFlags::empty(),
                encoding,
                mime_type: mime_type.to_owned(),
                codec: codec.to_owned(),
            },
            frames: Vec::new(),
        }
    }

    pub fn end_of_stream(mut self, end: bool) -> Self {
        self.header.flags.set(SegmentFlags::END_OF_STREAM, end);
        self
    }

    pub fn push_frame(&mut self, frame: FrameSource) {
        self.frames.push(frame);
    }

    pub fn write<W: Write>(mut self, wr: &mut W) -> Result<(), ParserError> {
        let with_bounds = !self.frames.is_empty() && self.frames.iter().all(|frame| frame.bounds.is_some());
        self.header.flags.set(SegmentFlags::HAS_BOUNDS, with_bounds);
        self.header.frame_count = self.frames.len() as u32;

        let mut payload = Vec::new();
        let mut index = Vec::new();
        let mut bounds = Vec::new();
        for frame in &self.frames {
            let encoded = encode_payload(self.header.encoding, &frame.data);
            let entry = FrameIndexEntry {
                timestamp: frame.timestamp,
                offset: payload.len() as u32,
                size: encoded.len() as u32,
                voxel_count: frame.voxel_count,
            };
            payload.extend_from_slice(&encoded);

            index.write_f64::<LittleEndian>(entry.timestamp)?;
            index.write_u32::<LittleEndian>(entry.offset)?;
            index.write_u32::<LittleEndian>(entry.size)?;
            index.write_u32::<LittleEndian>(entry.voxel_count)?;

            if let Some(aabb) = frame.bounds.filter(|_| with_bounds) {
                aabb.write(&mut bounds)?;
            }
        }

        let mut sver = Vec::new();
        sver.write_u32::<LittleEndian>(VSEG_VERSION)?;
        IffChunk::new(b"SVER", sver).write(wr)?;
        IffChunk::new(b"SHDR", self.header_bytes()?).write(wr)?;
        IffChunk::new(b"FIDX", index).write(wr)?;
        if with_bounds {
            IffChunk::new(b"FBND", bounds).write(wr)?;
        }
        IffChunk::new(b"FDAT", payload).write(wr)?;
        Ok(())
    }

    fn header_bytes(&self) -> Result<Vec<u8>, ParserError> {
        let mut out = Vec::new();
        out.write_f64::<LittleEndian>(self.header.start_time)?;
        out.write_f64::<LittleEndian>(self.header.duration)?;
        out.write_f32::<LittleEndian>(self.header.frame_rate)?;
        out.write_u32::<LittleEndian>(self.header.frame_count)?;
        out.write_u32::<LittleEndian>(self.header.flags.bits())?;
        out.write_u32::<LittleEndian>(self.header.encoding as u32)?;
        write_cstring(&mut out, &self.header.mime_type)?;
        write_cstring(&mut out, &self.header.codec)?;
        Ok(out)
    }
}

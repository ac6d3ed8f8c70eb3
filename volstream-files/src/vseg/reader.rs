use std::io::{Cursor, Read};

use crate::ParserError;
use crate::common::reader::{get_mandatory_chunk_by_name, read_all_chunks, read_chunk_array};
use crate::common::types::{CAaBox, IffChunk, SVerChunk};
use crate::vseg::types::{FrameIndexEntry, SHDRChunk, SegmentFlags, VSEG_VERSION, VSegAsset};

pub struct VSegReader {}

impl VSegReader {
    pub fn parse_asset<R: Read>(rdr: &mut R) -> Result<VSegAsset, ParserError> {
        let chunk_list = read_all_chunks(rdr)?;
        let version_hdr = chunk_list.first().ok_or(ParserError::EmptySource)?;
        if !version_hdr.magic_str().eq("SVER") {
            return Err(ParserError::InvalidMagicValue {
                magic: version_hdr.magic,
            });
        }

        let sver = version_hdr.parse::<SVerChunk>()?;
        if sver.version != VSEG_VERSION {
            return Err(ParserError::UnsupportedVersion { version: sver.version });
        }

        let header = get_mandatory_chunk_by_name(&chunk_list, "SHDR")?.parse::<SHDRChunk>()?;
        if !(header.frame_rate.is_finite() && header.frame_rate > 0.0) {
            return Err(ParserError::FormatError {
                reason: "Frame rate must be positive",
            });
        }

        if !(header.duration.is_finite() && header.duration > 0.0) || !header.start_time.is_finite() {
            return Err(ParserError::FormatError {
                reason: "Segment timing is not finite and positive",
            });
        }

        let fidx = get_mandatory_chunk_by_name(&chunk_list, "FIDX")?;
        let frames = read_chunk_array::<FrameIndexEntry, _>(&mut Cursor::new(&fidx.data))?;
        if frames.len() != header.frame_count as usize {
            return Err(ParserError::FormatError {
                reason: "Frame index does not match the header frame count",
            });
        }

        if frames.windows(2).any(|pair| pair[1].timestamp < pair[0].timestamp) {
            return Err(ParserError::FormatError {
                reason: "Frame timestamps are not ordered",
            });
        }

        let payload = get_mandatory_chunk_by_name(&chunk_list, "FDAT")?.data.clone();
        let out_of_range = frames
            .iter()
            .any(|frame| frame.offset as usize + frame.size as usize > payload.len());
        if out_of_range {
            return Err(ParserError::FormatError {
                reason: "Frame index points outside of FDAT",
            });
        }

        let bounds = Self::parse_bounds(&chunk_list, &header)?;

        Ok(VSegAsset {
            header,
            frames,
            bounds,
            payload,
        })
    }

    fn parse_bounds(chunk_list: &[IffChunk], header: &SHDRChunk) -> Result<Option<Vec<CAaBox>>, ParserError> {
        if !header.flags.contains(SegmentFlags::HAS_BOUNDS) {
            return Ok(None);
        }

        let fbnd = get_mandatory_chunk_by_name(chunk_list, "FBND")?;
        let bounds = read_chunk_array::<CAaBox, _>(&mut Cursor::new(&fbnd.data))?;
        if bounds.len() != header.frame_count as usize {
            return Err(ParserError::FormatError {
                reason: "FBND does not contain one box per frame",
            });
        }

        Ok(Some(bounds))
    }
}

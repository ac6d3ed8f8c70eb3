use std::io::Cursor;
use std::sync::Arc;

use glam::Vec3;
use itertools::Itertools;
use volstream_files::ParserError;
use volstream_files::common::types::CAaBox;
use volstream_files::vseg::payload::{decode_payload_into, decoded_len};
use volstream_files::vseg::reader::VSegReader;
use volstream_files::vseg::types::SegmentFlags;

use crate::asset::catalog::AdaptationSetInfo;
use crate::asset::frame::{Aabb, DecodedFrame, DecodedSegment, FrameLayer, TIME_EPSILON};
use crate::errors::AssetError;
use crate::util::memory::{MemoryTracker, TrackedBuffer};

pub const VOXEL_MIME_TYPE: &str = "application/vnd.volstream.voxels";
pub const VOXEL_CODEC: &str = "vox1";

/// Tracks the engine decodes itself. Anything else can only be handed to a data callback.
pub fn is_supported(info: &AdaptationSetInfo) -> bool {
    info.codec == VOXEL_CODEC
}

/// Where a decoded segment belongs: which slot, and where that slot sits on the asset and playback timelines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPlacement {
    pub seq: u64,
    /// Offset of the current loop on the playback timeline.
    pub loop_offset: f64,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug)]
pub struct TrackFrame {
    pub asset_time: f64,
    pub voxel_count: u32,
    pub bounds: Option<Aabb>,
    pub data: Arc<TrackedBuffer>,
}

#[derive(Debug)]
pub struct DecodedTrack {
    pub adaptation_set: String,
    pub representation: String,
    pub end_of_stream: bool,
    pub frames: Vec<TrackFrame>,
}

fn to_aabb(aabb: CAaBox) -> Aabb {
    Aabb {
        min: Vec3::new(aabb.min.x, aabb.min.y, aabb.min.z),
        max: Vec3::new(aabb.max.x, aabb.max.y, aabb.max.z),
    }
}

fn decode_error(error: ParserError) -> AssetError {
    AssetError::Decode(error.to_string())
}

/// Parses and expands one fetched segment of one adaptation set. Runs on the worker pool.
pub fn decode_track(
    bytes: &[u8],
    info: &AdaptationSetInfo,
    representation: &str,
    placement: &SegmentPlacement,
    tracker: &Arc<MemoryTracker>,
) -> Result<DecodedTrack, AssetError> {
    profiling::scope!("decode_track");
    let segment = VSegReader::parse_asset(&mut Cursor::new(bytes)).map_err(decode_error)?;

    if segment.header.codec != info.codec || segment.header.mime_type != info.mime_type {
        return Err(AssetError::Decode(format!(
            "{} segment carries {} ({}), expected {} ({})",
            info.id, segment.header.codec, segment.header.mime_type, info.codec, info.mime_type
        )));
    }

    if (segment.header.start_time - placement.start).abs() > 1e-3 {
        return Err(AssetError::Decode(format!(
            "{} segment starts at {:.3}, expected {:.3}",
            info.id, segment.header.start_time, placement.start
        )));
    }

    let mut frames = Vec::with_capacity(segment.frames.len());
    for (index, entry) in segment.frames.iter().enumerate() {
        if entry.timestamp < placement.start - TIME_EPSILON || entry.timestamp > placement.end + TIME_EPSILON {
            return Err(AssetError::Decode(format!(
                "{} frame at {:.3} lies outside of [{:.3}, {:.3}]",
                info.id, entry.timestamp, placement.start, placement.end
            )));
        }

        let payload = segment
            .frame_payload(index)
            .ok_or_else(|| AssetError::Decode(format!("{} frame {} has no payload", info.id, index)))?;
        let len = decoded_len(segment.header.encoding, payload).map_err(decode_error)?;
        let data = TrackedBuffer::try_fill(tracker, len, |out| {
            decode_payload_into(segment.header.encoding, payload, out)
        })
        .map_err(decode_error)?
        .ok_or(AssetError::OutOfMemory { bytes: len })?;

        frames.push(TrackFrame {
            asset_time: entry.timestamp,
            voxel_count: entry.voxel_count,
            bounds: segment.frame_bounds(index).map(to_aabb),
            data: Arc::new(data),
        });
    }

    Ok(DecodedTrack {
        adaptation_set: info.id.clone(),
        representation: representation.to_string(),
        end_of_stream: segment.header.flags.contains(SegmentFlags::END_OF_STREAM),
        frames,
    })
}

/// Combines the decoded tracks of one slot into renderable frames. The first track drives the frame timing,
/// the others contribute their latest frame at or before each of its timestamps.
pub fn assemble_segment(placement: &SegmentPlacement, tracks: Vec<DecodedTrack>) -> DecodedSegment {
    let mut tracks = tracks.into_iter();
    let Some(primary) = tracks.next() else {
        return DecodedSegment {
            seq: placement.seq,
            start: placement.loop_offset + placement.start,
            end: placement.loop_offset + placement.end,
            frames: Vec::new(),
        };
    };
    let secondary = tracks.collect_vec();

    let frames = primary
        .frames
        .iter()
        .map(|frame| {
            let mut layers = vec![FrameLayer {
                adaptation_set: primary.adaptation_set.clone(),
                representation: primary.representation.clone(),
                data: frame.data.clone(),
            }];

            for track in &secondary {
                let matching = track
                    .frames
                    .iter()
                    .take_while(|other| other.asset_time <= frame.asset_time + TIME_EPSILON)
                    .last()
                    .or(track.frames.first());
                if let Some(other) = matching {
                    layers.push(FrameLayer {
                        adaptation_set: track.adaptation_set.clone(),
                        representation: track.representation.clone(),
                        data: other.data.clone(),
                    });
                }
            }

            Arc::new(DecodedFrame {
                stream_time: placement.loop_offset + frame.asset_time,
                asset_time: frame.asset_time,
                seq: placement.seq,
                voxel_count: frame.voxel_count,
                bounds: frame.bounds,
                layers,
            })
        })
        .collect_vec();

    DecodedSegment {
        seq: placement.seq,
        start: placement.loop_offset + placement.start,
        end: placement.loop_offset + placement.end,
        frames,
    }
}

use std::io::Cursor;

use crate::ParserError;
use crate::common::types::{C3Vector, CAaBox};
use crate::vseg::payload::{decode_payload, encode_payload};
use crate::vseg::reader::VSegReader;
use crate::vseg::types::{PayloadEncoding, SegmentFlags};
use crate::vseg::writer::{FrameSource, VSegWriter};

fn unit_box(offset: f32) -> CAaBox {
    CAaBox {
        min: C3Vector {
            x: offset - 1.0,
            y: 0.0,
            z: -1.0,
        },
        max: C3Vector {
            x: offset + 1.0,
            y: 2.0,
            z: 1.0,
        },
    }
}

fn write_segment(encoding: PayloadEncoding, frames: usize) -> Result<Vec<u8>, ParserError> {
    let mut writer = VSegWriter::new(1.0, 0.5, 10.0, "application/vnd.volstream.mesh", "vox1", encoding);
    for i in 0..frames {
        writer.push_frame(FrameSource {
            timestamp: 1.0 + i as f64 * 0.1,
            voxel_count: 100 + i as u32,
            bounds: Some(unit_box(i as f32)),
            data: vec![i as u8; 32],
        });
    }

    let mut out = Vec::new();
    writer.end_of_stream(true).write(&mut out)?;
    Ok(out)
}

#[test]
fn parses_written_segment() -> Result<(), anyhow::Error> {
    let bytes = write_segment(PayloadEncoding::RunLength, 5)?;
    let asset = VSegReader::parse_asset(&mut Cursor::new(bytes))?;

    assert_eq!(asset.header.frame_count, 5);
    assert_eq!(asset.header.codec, "vox1");
    assert!(asset.header.flags.contains(SegmentFlags::HAS_BOUNDS | SegmentFlags::END_OF_STREAM));
    assert_eq!(asset.frames[3].voxel_count, 103);
    assert_eq!(asset.frame_bounds(2), Some(unit_box(2.0)));
    assert!((asset.end_time() - 1.5).abs() < 1e-9);

    // 32 equal bytes collapse into a single run
    let payload = asset.frame_payload(4).expect("frame 4");
    assert_eq!(payload, &[32, 4]);
    assert_eq!(decode_payload(asset.header.encoding, payload)?, vec![4u8; 32]);
    Ok(())
}

#[test]
fn rejects_wrong_magic() {
    let mut bytes = b"NOPE".to_vec();
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());

    let result = VSegReader::parse_asset(&mut Cursor::new(bytes));
    assert!(matches!(result, Err(ParserError::InvalidMagicValue { .. })));
}

#[test]
fn rejects_empty_and_truncated_sources() -> Result<(), anyhow::Error> {
    let result = VSegReader::parse_asset(&mut Cursor::new(Vec::new()));
    assert!(matches!(result, Err(ParserError::EmptySource)));

    let mut bytes = write_segment(PayloadEncoding::Raw, 2)?;
    bytes.truncate(bytes.len() - 3);
    let result = VSegReader::parse_asset(&mut Cursor::new(bytes));
    assert!(matches!(result, Err(ParserError::IOError(_))));
    Ok(())
}

#[test]
fn rejects_chunk_sizes_beyond_the_source() -> Result<(), anyhow::Error> {
    let mut bytes = write_segment(PayloadEncoding::Raw, 1)?;
    // SVER is 12 bytes, the next chunk header claims nearly 4 GiB
    bytes[16..20].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

    let result = VSegReader::parse_asset(&mut Cursor::new(bytes));
    assert!(
        matches!(result, Err(ParserError::IOError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof),
        "{:?}",
        result.err()
    );
    Ok(())
}

#[test]
fn run_length_rejects_garbage() {
    assert!(decode_payload(PayloadEncoding::RunLength, &[3]).is_err());
    assert!(decode_payload(PayloadEncoding::RunLength, &[0, 7]).is_err());
}

#[test]
fn run_length_splits_long_runs() -> Result<(), anyhow::Error> {
    let data = vec![9u8; 300];
    let encoded = encode_payload(PayloadEncoding::RunLength, &data);
    assert_eq!(encoded, vec![255, 9, 45, 9]);
    assert_eq!(decode_payload(PayloadEncoding::RunLength, &encoded)?, data);
    Ok(())
}

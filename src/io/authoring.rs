use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use log::info;
use volstream_files::common::types::{C3Vector, CAaBox};
use volstream_files::vseg::types::PayloadEncoding;
use volstream_files::vseg::writer::{FrameSource, VSegWriter};
use volstream_manifest::serialize_manifest;
use volstream_manifest::typedefs::{AdaptationSet, Bounds, Manifest, Representation, Vec3Attr};

use crate::asset::decoder::{VOXEL_CODEC, VOXEL_MIME_TYPE};
use crate::io::source::MANIFEST_FILE_NAME;

pub const MEDIA_TEMPLATE: &str = "$RepresentationID$/seg_$Number%04d$.vseg";

/// Describes a generated test asset: one voxel track plus optional extra tracks of arbitrary codecs.
#[derive(Debug, Clone)]
pub struct SyntheticAsset {
    pub duration: f64,
    pub segment_duration: f64,
    pub fps: f32,
    /// One geometry representation per entry, bits per second.
    pub bandwidths: Vec<u32>,
    pub encoding: PayloadEncoding,
    pub extra_tracks: Vec<(String, String, String)>,
}

impl Default for SyntheticAsset {
    fn default() -> Self {
        Self {
            duration: 4.0,
            segment_duration: 1.0,
            fps: 10.0,
            bandwidths: vec![250_000, 1_000_000],
            encoding: PayloadEncoding::Raw,
            extra_tracks: Vec::new(),
        }
    }
}

impl SyntheticAsset {
    fn manifest(&self) -> Manifest {
        let geometry = AdaptationSet {
            id: "geometry".to_string(),
            mime_type: VOXEL_MIME_TYPE.to_string(),
            codec: VOXEL_CODEC.to_string(),
            media: format!("geometry/{}", MEDIA_TEMPLATE),
            representations: self
                .bandwidths
                .iter()
                .map(|bandwidth| Representation {
                    id: format!("{}k", bandwidth / 1000),
                    bandwidth: *bandwidth,
                    max_fps: self.fps,
                })
                .collect(),
        };

        let extras = self.extra_tracks.iter().map(|(id, mime_type, codec)| AdaptationSet {
            id: id.clone(),
            mime_type: mime_type.clone(),
            codec: codec.clone(),
            media: format!("{}/{}", id, MEDIA_TEMPLATE),
            representations: vec![Representation {
                id: "main".to_string(),
                bandwidth: 64_000,
                max_fps: self.fps,
            }],
        });

        Manifest {
            duration: self.duration,
            segment_duration: self.segment_duration,
            start_number: 1,
            bounds: Some(Bounds {
                center: Vec3Attr([0.0, 1.0, 0.0]),
                half_dims: Vec3Attr([0.5, 1.0, 0.5]),
            }),
            adaptation_sets: std::iter::once(geometry).chain(extras).collect(),
        }
    }

    /// Writes the manifest and every segment of every representation below `dir`.
    pub fn write_to(&self, dir: &Path) -> anyhow::Result<Manifest> {
        let manifest = self.manifest();
        manifest.validate()?;
        std::fs::write(dir.join(MANIFEST_FILE_NAME), serialize_manifest(&manifest)?)?;

        for set in &manifest.adaptation_sets {
            for rep in &set.representations {
                for index in 0..manifest.segment_count() {
                    let location = set.segment_path(&manifest, &rep.id, index)?;
                    let path = dir.join(&location);
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }

                    let writer = self.segment_writer(&manifest, set, rep, index);
                    let mut out = BufWriter::new(File::create(&path).with_context(|| location.clone())?);
                    writer.write(&mut out)?;
                }
            }
        }

        info!(
            "Wrote {} segments per representation to {}",
            manifest.segment_count(),
            dir.display()
        );
        Ok(manifest)
    }

    fn segment_writer(&self, manifest: &Manifest, set: &AdaptationSet, rep: &Representation, index: u32) -> VSegWriter {
        let start = manifest.segment_start(index);
        let end = (start + manifest.segment_duration).min(manifest.duration);
        let frame_bytes = ((rep.bandwidth as f64 / 8.0) / self.fps as f64).max(1.0) as usize;

        let mut writer = VSegWriter::new(start, end - start, self.fps, &set.mime_type, &set.codec, self.encoding)
            .end_of_stream(index + 1 == manifest.segment_count());

        let frame_count = ((end - start) * self.fps as f64 - 1e-9).ceil().max(1.0) as u32;
        for frame in 0..frame_count {
            let timestamp = start + frame as f64 / self.fps as f64;
            let sway = (timestamp as f32).sin() * 0.25;
            writer.push_frame(FrameSource {
                timestamp,
                voxel_count: (frame_bytes / 4) as u32,
                bounds: Some(CAaBox {
                    min: C3Vector {
                        x: -0.5 + sway,
                        y: 0.0,
                        z: -0.5,
                    },
                    max: C3Vector {
                        x: 0.5 + sway,
                        y: 2.0,
                        z: 0.5,
                    },
                }),
                data: (0..frame_bytes).map(|i| ((i / 64) as u32 + frame + index) as u8).collect(),
            });
        }

        writer
    }
}

#[cfg(test)]
mod tests {
    use super::SyntheticAsset;
    use std::fs::File;
    use std::io::BufReader;
    use volstream_files::vseg::reader::VSegReader;

    #[test]
    pub fn writes_readable_segments() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let asset = SyntheticAsset {
            duration: 2.5,
            ..Default::default()
        };
        let manifest = asset.write_to(dir.path())?;
        assert_eq!(manifest.segment_count(), 3);

        let last = dir.path().join("geometry/1000k/seg_0003.vseg");
        let segment = VSegReader::parse_asset(&mut BufReader::new(File::open(last)?))?;
        assert_eq!(segment.header.start_time, 2.0);
        assert_eq!(segment.header.frame_count, 5);
        Ok(())
    }
}

use crate::ManifestError;
use crate::template::expand_template;
use log::warn;
use serde::{Deserializer, Serializer};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Root of a volumetric asset manifest. Times are in seconds.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename = "Manifest")]
pub struct Manifest {
    #[serde(rename = "@duration")]
    pub duration: f64,
    #[serde(rename = "@segmentDuration")]
    pub segment_duration: f64,
    #[serde(rename = "@startNumber")]
    #[serde(default = "default_start_number")]
    pub start_number: u32,
    #[serde(rename = "Bounds")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(rename = "AdaptationSet")]
    #[serde(default)]
    pub adaptation_sets: Vec<AdaptationSet>,
}

fn default_start_number() -> u32 {
    1
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    #[serde(rename = "@center")]
    pub center: Vec3Attr,
    #[serde(rename = "@halfDims")]
    pub half_dims: Vec3Attr,
}

/// A whitespace separated triple, e.g. `center="0 1.5 0"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3Attr(pub [f32; 3]);

impl FromStr for Vec3Attr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split_whitespace()
            .map(|part| part.parse::<f32>().map_err(|e| format!("{}: {}", part, e)))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [x, y, z] => Ok(Vec3Attr([*x, *y, *z])),
            _ => Err(format!("Expected three components, got {}", parts.len())),
        }
    }
}

impl Display for Vec3Attr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.0[0], self.0[1], self.0[2])
    }
}

impl<'de> serde::Deserialize<'de> for Vec3Attr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for Vec3Attr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One media track, e.g. geometry or texture.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AdaptationSet {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@mimeType")]
    pub mime_type: String,
    #[serde(rename = "@codec")]
    pub codec: String,
    #[serde(rename = "@media")]
    pub media: String,
    #[serde(rename = "Representation")]
    #[serde(default)]
    pub representations: Vec<Representation>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Representation {
    #[serde(rename = "@id")]
    pub id: String,
    /// bits per second
    #[serde(rename = "@bandwidth")]
    pub bandwidth: u32,
    #[serde(rename = "@maxFps")]
    pub max_fps: f32,
}

impl Manifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |reason: String| Err(ManifestError::Invalid { reason });

        if !(self.duration.is_finite() && self.duration > 0.0) {
            return invalid(format!("duration must be positive, got {}", self.duration));
        }

        if !(self.segment_duration.is_finite() && self.segment_duration > 0.0) {
            return invalid(format!("segmentDuration must be positive, got {}", self.segment_duration));
        }

        if self.adaptation_sets.is_empty() {
            return invalid("no AdaptationSet".into());
        }

        let mut set_ids = HashSet::new();
        for set in &self.adaptation_sets {
            if !set_ids.insert(set.id.as_str()) {
                return invalid(format!("duplicate AdaptationSet id {}", set.id));
            }

            if set.representations.is_empty() {
                return invalid(format!("AdaptationSet {} has no Representation", set.id));
            }

            let mut rep_ids = HashSet::new();
            for rep in &set.representations {
                if !rep_ids.insert(rep.id.as_str()) {
                    return invalid(format!("duplicate Representation id {} in {}", rep.id, set.id));
                }

                if !(rep.max_fps.is_finite() && rep.max_fps > 0.0) {
                    return invalid(format!("Representation {} has no positive maxFps", rep.id));
                }

                if rep.bandwidth == 0 {
                    warn!("Representation {} in {} advertises zero bandwidth", rep.id, set.id);
                }
            }

            // Fail early on broken templates instead of on the first fetch.
            expand_template(&set.media, &set.representations[0].id, self.start_number)?;
        }

        Ok(())
    }

    pub fn segment_count(&self) -> u32 {
        (self.duration / self.segment_duration).ceil().max(1.0) as u32
    }

    pub fn segment_start(&self, index: u32) -> f64 {
        index as f64 * self.segment_duration
    }

    /// Index of the segment covering `time`, clamped to the last segment.
    pub fn segment_index_at(&self, time: f64) -> u32 {
        let index = (time.max(0.0) / self.segment_duration).floor() as u32;
        index.min(self.segment_count() - 1)
    }

    pub fn adaptation_set(&self, id: &str) -> Option<&AdaptationSet> {
        self.adaptation_sets.iter().find(|set| set.id == id)
    }
}

impl AdaptationSet {
    /// Relative location of segment `index` (zero based) of the given representation.
    pub fn segment_path(&self, manifest: &Manifest, representation: &str, index: u32) -> Result<String, ManifestError> {
        expand_template(&self.media, representation, manifest.start_number + index)
    }
}

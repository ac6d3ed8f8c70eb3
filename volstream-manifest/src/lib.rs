use crate::typedefs::Manifest;
use quick_xml::de::Deserializer;
use serde::Deserialize;
use std::io::BufRead;
use thiserror::Error;

pub mod template;
pub mod typedefs;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Malformed manifest xml: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Cannot write manifest xml: {0}")]
    Write(#[from] quick_xml::SeError),

    #[error("Invalid manifest: {reason}")]
    Invalid { reason: String },

    #[error("Invalid media template {template}: {reason}")]
    Template { template: String, reason: &'static str },
}

pub fn deserialize_manifest<T: BufRead>(read: T) -> Result<Manifest, ManifestError> {
    let mut deserializer = Deserializer::from_reader(read);
    let manifest = Manifest::deserialize(&mut deserializer)?;
    manifest.validate()?;
    Ok(manifest)
}

pub fn serialize_manifest(manifest: &Manifest) -> Result<String, ManifestError> {
    Ok(quick_xml::se::to_string(manifest)?)
}

//! GeoSource: an addressable, versioned handle to a geospatial data product.
//!
//! GeoSources are immutable by convention: every transformation (calculation,
//! mosaic, styling) produces a new value wrapping a new process definition.
//! Derived sources get content-addressed ids so equal derivations are stable
//! across runs.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::spec::PipelineSpecification;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// RFC3339 creation timestamp; `None` for in-process derived sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

impl Metadata {
    pub fn named(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            owner: None,
            created: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoSource {
    pub id: Uuid,
    pub version: Uuid,
    pub specification: PipelineSpecification,
    /// Serialized description of how to reconstruct the underlying process.
    /// The grid data engine owns the format; the calculator treats it as an
    /// opaque string that round-trips through `GridEngine::get_process`.
    pub definition: String,
    pub metadata: Metadata,
    /// Publishing references. Empty means the source has never been
    /// published, which permits stripping its cache wrapper during mosaics.
    #[serde(default)]
    pub providers: Vec<String>,
}

impl GeoSource {
    pub fn new(
        id: Uuid,
        version: Uuid,
        specification: PipelineSpecification,
        definition: String,
        metadata: Metadata,
    ) -> Self {
        Self {
            id,
            version,
            specification,
            definition,
            metadata,
            providers: Vec::new(),
        }
    }

    /// Construct a derived GeoSource around a new process definition.
    ///
    /// `id` and `version` are both derived from a blake3 hash of the
    /// definition, so building the same derivation twice yields the same
    /// handle.
    pub fn derived(
        name: impl Into<String>,
        description: impl Into<String>,
        specification: PipelineSpecification,
        definition: String,
    ) -> Self {
        let digest = content_id(&definition);
        Self {
            id: digest.0,
            version: digest.1,
            specification,
            definition,
            metadata: Metadata::named(name, description),
            providers: Vec::new(),
        }
    }

    pub fn is_published(&self) -> bool {
        !self.providers.is_empty()
    }
}

/// Derive a stable (id, version) pair from a definition string.
fn content_id(definition: &str) -> (Uuid, Uuid) {
    let mut h = Hasher::new();
    h.update(definition.as_bytes());
    let bytes: [u8; 32] = h.finalize().into();
    let id = Uuid::from_slice(&bytes[..16]).expect("16-byte slice");
    let version = Uuid::from_slice(&bytes[16..]).expect("16-byte slice");
    (id, version)
}

//! Error taxonomy for the layer-extension core.
//!
//! | Error | Raised by | Recovery |
//! |-------|-----------|----------|
//! | [`ShaderCompileError`] | composer / naga validation | layer omitted until reconfigured |
//! | [`AttributeShapeError`] | attribute registration / recompute | none (configuration bug) |
//! | [`UniformTypeError`] | uniform binding | draw skipped for one frame |
//! | [`TileDecodeError`] | tile fetch / decode | tile absent for one frame |

use crate::tile::TileKey;
use crate::uniform::UniformKind;

/// A composed program could not be built for a layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShaderCompileError {
    /// An injection targets a section the base template does not expose.
    #[error("layer `{layer}`: template `{template}` has no {stage} section `{section}`")]
    UnknownSection {
        layer: String,
        template: String,
        stage: String,
        section: String,
    },

    /// A template declares the same hook twice in one stage.
    #[error("template `{template}`: duplicate {stage} hook `{section}`")]
    DuplicateHook {
        template: String,
        stage: String,
        section: String,
    },

    /// Two uniform declarations share a name but not a type.
    #[error("layer `{layer}`: uniform `{name}` declared as both {first} and {second}")]
    ConflictingUniform {
        layer: String,
        name: String,
        first: UniformKind,
        second: UniformKind,
    },

    /// WGSL front-end rejected the merged source.
    #[error("layer `{layer}`: WGSL parse error\n{diagnostic}")]
    Parse { layer: String, diagnostic: String },

    /// Merged source parsed but did not validate.
    #[error("layer `{layer}`: WGSL validation error\n{diagnostic}")]
    Validation { layer: String, diagnostic: String },
}

impl ShaderCompileError {
    /// Re-labels the error with the layer that owns the failing program.
    ///
    /// Programs are cached across layers, so a cached failure carries the id of
    /// whichever layer compiled it first.
    pub fn for_layer(self, id: &str) -> Self {
        let id = id.to_string();
        match self {
            Self::UnknownSection {
                template,
                stage,
                section,
                ..
            } => Self::UnknownSection {
                layer: id,
                template,
                stage,
                section,
            },
            Self::ConflictingUniform {
                name,
                first,
                second,
                ..
            } => Self::ConflictingUniform {
                layer: id,
                name,
                first,
                second,
            },
            Self::Parse { diagnostic, .. } => Self::Parse {
                layer: id,
                diagnostic,
            },
            Self::Validation { diagnostic, .. } => Self::Validation {
                layer: id,
                diagnostic,
            },
            other @ Self::DuplicateHook { .. } => other,
        }
    }
}

/// An instanced attribute was declared or computed with the wrong shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeShapeError {
    #[error("attribute `{name}`: element width {width} is outside 1..=4")]
    InvalidWidth { name: String, width: u8 },

    #[error("attribute `{name}` is already registered")]
    Duplicate { name: String },

    #[error("attribute `{name}`: accessor returned width {found} for record {record}, declared {declared}")]
    WidthMismatch {
        name: String,
        declared: u8,
        found: u8,
        record: usize,
    },
}

/// A per-draw uniform set does not match the program's declarations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UniformTypeError {
    #[error("uniform `{name}` is declared as {declared} but was bound as {bound}")]
    KindMismatch {
        name: String,
        declared: UniformKind,
        bound: UniformKind,
    },

    #[error("uniform `{name}` is declared but was not supplied")]
    Missing { name: String },

    #[error("uniform `{name}` was supplied but is not declared by the program")]
    Undeclared { name: String },
}

/// A tile could not be turned into pixels.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TileDecodeError {
    #[error("tile {key}: fetch failed: {reason}")]
    Fetch { key: TileKey, reason: String },

    #[error("tile {key}: decode failed: {reason}")]
    Decode { key: TileKey, reason: String },
}

impl TileDecodeError {
    pub fn key(&self) -> TileKey {
        match self {
            Self::Fetch { key, .. } | Self::Decode { key, .. } => *key,
        }
    }
}

/// Construction-time failure of an extended layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    #[error("layer `{layer}`: {source}")]
    Attribute {
        layer: String,
        #[source]
        source: AttributeShapeError,
    },
}

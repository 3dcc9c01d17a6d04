use std::path::PathBuf;

use thiserror::Error;

use crate::schema::ParamField;

/// A patch field that is outside the range the hardware accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("octave {value} is out of range {min}..={max}")]
    OctaveOutOfRange { value: i64, min: i64, max: i64 },
    #[error("adsr {index} value {value} is out of bounds {min}..={max}")]
    AdsrOutOfBounds {
        index: usize,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{field} {index} value {value} is not allowed for {variant} (bounds {min}..={max})")]
    ParamNotAllowed {
        field: ParamField,
        variant: &'static str,
        index: usize,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("unknown {kind} variant: {name}")]
    UnknownVariant { kind: &'static str, name: String },
    #[error("slot {slot} start {start} is after end {end}")]
    SlotInverted { slot: usize, start: i64, end: i64 },
    #[error("slot {slot} value {value} is outside 0..={max}")]
    SlotOutOfRange { slot: usize, value: i64, max: i64 },
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("invalid patch: {0}")]
    Validation(#[from] ValidationError),
    #[error("no {tag} chunk found")]
    MissingChunk { tag: &'static str },
    #[error("container padding did not converge after {iterations} iterations (alignment {alignment})")]
    AlignmentDiverged { iterations: usize, alignment: usize },
    #[error("container is too large for a 32-bit size field: {len} bytes")]
    ContainerTooLarge { len: usize },
    #[error("failed to encode patch metadata: {0}")]
    Encoding(#[source] serde_json::Error),
    #[error("failed to decode patch metadata: {0}")]
    Decoding(#[source] serde_json::Error),
    #[error("no segments found")]
    NoSegments,
    #[error("segment {index} lasts {duration:.3}s, longer than the {cap:.3}s group cap")]
    SegmentExceedsCap {
        index: usize,
        duration: f64,
        cap: f64,
    },
    #[error("group cap must be positive, got {0}")]
    InvalidCap(f64),
    #[error("output path must end in .aif: {0}")]
    InvalidOutputPath(PathBuf),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

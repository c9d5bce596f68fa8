//! # Error Types
//!
//! Every failure the engine can report is local to one flute or one
//! fingering. Geometry problems are caught before any acoustics run, so the
//! solver itself never sees a zero-length segment or a zero diameter.

use thiserror::Error;

use crate::geometry::PartKind;

/// Malformed or discontinuous bore description.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{part}: no bore segments")]
    EmptyPart { part: String },

    #[error("{part}: segment {index} has non-positive length {length} m")]
    NonPositiveLength {
        part: String,
        index: usize,
        length: f64,
    },

    #[error("{part}: segment {index} has non-positive diameter {diameter} m")]
    NonPositiveDiameter {
        part: String,
        index: usize,
        diameter: f64,
    },

    #[error("{part}: segment {index} starts at {position} m, not after {previous} m")]
    NonIncreasingPosition {
        part: String,
        index: usize,
        position: f64,
        previous: f64,
    },

    #[error("{part}: gap of {gap} m before segment {index}")]
    SegmentGap {
        part: String,
        index: usize,
        gap: f64,
    },

    #[error(
        "{from} -> {to}: bore is discontinuous (position gap {position_gap} m, diameter gap {diameter_gap} m)"
    )]
    Discontinuity {
        from: PartKind,
        to: PartKind,
        position_gap: f64,
        diameter_gap: f64,
    },

    #[error("hole '{label}' at {position} m is outside the bore of {part}")]
    HoleOutsideBore {
        label: String,
        part: String,
        position: f64,
    },

    #[error("hole '{label}' is invalid: {reason}")]
    InvalidHole { label: String, reason: String },

    #[error("hole label '{label}' is used twice")]
    DuplicateHoleLabel { label: String },
}

/// The chimney optimizer could not reach its target.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error(
        "no sign change between {lower} m and {upper} m; best estimate {best_estimate} m leaves {residual_hz:+.3} Hz"
    )]
    Convergence {
        lower: f64,
        upper: f64,
        best_estimate: f64,
        residual_hz: f64,
    },

    #[error(
        "no convergence after {iterations} iterations; best estimate {best_estimate} m leaves {residual_hz:+.4} Hz"
    )]
    IterationLimit {
        iterations: usize,
        best_estimate: f64,
        residual_hz: f64,
    },

    #[error("no resonance in the sweep range with a chimney of {chimney_height} m")]
    NoResonance { chimney_height: f64 },

    #[error("target frequency {0} Hz is not a positive finite value")]
    InvalidTarget(f64),

    #[error("chimney search interval [{lower}, {upper}] m is invalid")]
    InvalidInterval { lower: f64, upper: f64 },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Problems reading a fingering chart.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FingeringError {
    #[error("fingering chart is empty")]
    Empty,

    #[error("fingering chart header must start with 'label'")]
    MissingHeader,

    #[error("line {line}: expected {expected} states, found {found}")]
    RowLength {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unknown hole state '{symbol}' (expected 'x' or 'o')")]
    InvalidSymbol { line: usize, symbol: String },

    #[error("note '{0}' is not in the fingering chart")]
    UnknownNote(String),

    #[error("note '{note}' sets hole '{label}', which the flute does not have")]
    UnknownHole { note: String, label: String },
}

/// Problems reading or writing flute documents.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("{part}: {reason}")]
    Legacy { part: String, reason: String },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Crate-level error wrapping the subsystem errors so `?` propagates.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error(transparent)]
    Fingering(#[from] FingeringError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid frequency range: {0}")]
    InvalidRange(String),
}

pub type Result<T> = std::result::Result<T, Error>;

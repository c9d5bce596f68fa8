// traverso-core/src/lib.rs

//! The core logic for traverso (baroque flute) acoustic analysis.
//! This crate turns a piecewise bore geometry into input admittance curves,
//! resonances, inharmonicity, flow/pressure envelopes and the MOC and
//! BI_ESPE descriptors, and solves the embouchure chimney height that tunes
//! a note. It is completely headless and reads no ambient state: callers
//! pass the flute, the fingering chart and the configuration in.

pub mod air;
pub mod analysis;
pub mod config;
pub mod descriptors;
pub mod document;
pub mod error;
pub mod field;
pub mod fingering;
pub mod geometry;
pub mod inharmonicity;
pub mod legacy;
pub mod optimizer;
pub mod reflectance;
pub mod solver;
pub mod spectrum;
pub mod transfer;
pub mod tuning;

pub use analysis::{FluteAnalysis, NoteAnalysis, analyze_batch, analyze_flute, analyze_note};
pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use fingering::{Fingering, FingeringChart, HoleState};
pub use geometry::{BoreProfile, BoreSegment, Flute, FlutePart, PartKind, ToneHole};
pub use optimizer::{ChimneySolution, optimize_chart, optimize_chimney_length};
pub use solver::{AcousticSolver, Instrument, PhysicsConfig};
pub use spectrum::{AdmittanceCurve, FrequencyRange};
pub use tuning::TuningTarget;

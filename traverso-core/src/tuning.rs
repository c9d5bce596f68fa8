//! # Tuning Module
//!
//! Note names of the traverso chart, their semitone offsets from the
//! reference A and equal-tempered target frequencies.
//!
//! ## Features
//! - Sharp and flat spellings (`Fs`, `Bb`, ...), optional octave digits
//! - Targets from any reference pitch (415 Hz baroque pitch by default)
//! - Cent deviation between two frequencies

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::FingeringError;

/// Default reference pitch for A, in Hz.
pub const BAROQUE_PITCH: f64 = 415.0;

/// Semitone offset of each note name from A, within the traverso's first
/// octave (D up to C sharp).
static NOTE_OFFSETS: Lazy<BTreeMap<&'static str, i32>> = Lazy::new(|| {
    [
        ("D", -7),
        ("Ds", -6),
        ("Eb", -6),
        ("E", -5),
        ("F", -4),
        ("Fs", -3),
        ("Gb", -3),
        ("G", -2),
        ("Gs", -1),
        ("Ab", -1),
        ("A", 0),
        ("As", 1),
        ("Bb", 1),
        ("B", 2),
        ("C", 3),
        ("Cs", 4),
        ("Db", 4),
    ]
    .into_iter()
    .collect()
});

/// Semitones from the reference A.
///
/// A trailing digit raises the note by that many octaves, so `D2` is the
/// second-octave D.
pub fn note_offset(name: &str) -> Option<i32> {
    let trimmed = name.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (base, octave) = trimmed.split_at(split);
    let offset = *NOTE_OFFSETS.get(base)?;
    let octave: i32 = if octave.is_empty() {
        1
    } else {
        octave.parse::<i32>().ok().filter(|&o| o >= 1)?
    };
    Some(offset + 12 * (octave - 1))
}

/// Equal-tempered frequency of `name` for the given reference A.
pub fn target_frequency(name: &str, reference_pitch: f64) -> Option<f64> {
    note_offset(name).map(|n| reference_pitch * 2f64.powf(n as f64 / 12.0))
}

/// Deviation of `frequency` from `target` in cents (positive = sharp).
pub fn cents_deviation(frequency: f64, target: f64) -> f64 {
    1200.0 * (frequency / target).log2()
}

/// The frequency a note should sound at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningTarget {
    pub note: Option<String>,
    pub frequency: f64,
}

impl TuningTarget {
    pub fn from_note(note: &str, reference_pitch: f64) -> Result<Self, FingeringError> {
        let frequency = target_frequency(note, reference_pitch)
            .ok_or_else(|| FingeringError::UnknownNote(note.to_string()))?;
        Ok(Self {
            note: Some(note.to_string()),
            frequency,
        })
    }

    pub fn frequency(frequency: f64) -> Self {
        Self {
            note: None,
            frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_is_the_reference() {
        assert_eq!(target_frequency("A", 415.0), Some(415.0));
    }

    #[test]
    fn enharmonic_spellings_agree() {
        assert_eq!(note_offset("Fs"), note_offset("Gb"));
        assert_eq!(note_offset("As"), note_offset("Bb"));
        assert_eq!(note_offset("Ds"), Some(-6));
    }

    #[test]
    fn d_sits_a_fifth_below_a() {
        let d = target_frequency("D", 415.0).unwrap();
        assert!((d - 415.0 * 2f64.powf(-7.0 / 12.0)).abs() < 1e-12);
        assert!((d - 277.0).abs() < 0.1);
    }

    #[test]
    fn octave_suffix_raises_by_octaves() {
        assert_eq!(note_offset("E2"), Some(7));
        assert_eq!(note_offset("E1"), note_offset("E"));
        let a2 = target_frequency("A2", 415.0).unwrap();
        assert!((a2 - 830.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(note_offset("H"), None);
        assert_eq!(note_offset("A0"), None);
        assert!(TuningTarget::from_note("X", 415.0).is_err());
    }

    #[test]
    fn cents_of_an_octave() {
        assert!((cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-12);
        assert!(cents_deviation(439.0, 440.0) < 0.0);
    }
}

//! # Fingering Module
//!
//! Open/closed hole states per note, and the plain-text fingering chart
//! format:
//!
//! ```text
//! label  D E Fs G
//! hole1  x x x  x
//! hole2  x x x  o
//! hole3  x x o  o
//! ```
//!
//! `x` closes a hole, `o` leaves it open. A row labelled `embouchure` is
//! ignored; the embouchure is always the excitation point.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FingeringError, SchemaError};

const EMBOUCHURE_ROW: &str = "embouchure";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoleState {
    Open,
    Closed,
}

impl HoleState {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "x" | "X" => Some(HoleState::Closed),
            "o" | "O" => Some(HoleState::Open),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, HoleState::Open)
    }
}

/// The hole states used to play one note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingering {
    pub note: String,
    pub states: BTreeMap<String, HoleState>,
}

impl Fingering {
    /// Every hole open.
    pub fn all_open(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            states: BTreeMap::new(),
        }
    }

    pub fn with_state(mut self, label: impl Into<String>, state: HoleState) -> Self {
        self.states.insert(label.into(), state);
        self
    }

    /// Holes missing from the fingering are open.
    pub fn state_of(&self, label: &str) -> HoleState {
        self.states.get(label).copied().unwrap_or(HoleState::Open)
    }

    /// Fails on the first state whose hole is not among `labels`.
    pub fn check_labels(&self, labels: &[&str]) -> Result<(), FingeringError> {
        match self.states.keys().find(|label| !labels.contains(&label.as_str())) {
            Some(label) => Err(FingeringError::UnknownHole {
                note: self.note.clone(),
                label: label.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// A set of fingerings, in the order the chart lists the notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingeringChart {
    pub fingerings: Vec<Fingering>,
}

impl FingeringChart {
    pub fn new(fingerings: Vec<Fingering>) -> Self {
        Self { fingerings }
    }

    pub fn parse(text: &str) -> Result<Self, FingeringError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (_, header) = lines.next().ok_or(FingeringError::Empty)?;
        let mut columns = header.split_whitespace();
        if columns.next() != Some("label") {
            return Err(FingeringError::MissingHeader);
        }
        let notes: Vec<&str> = columns.collect();
        if notes.is_empty() {
            return Err(FingeringError::Empty);
        }

        let mut fingerings: Vec<Fingering> =
            notes.iter().map(|note| Fingering::all_open(*note)).collect();

        for (line, row) in lines {
            let mut fields = row.split_whitespace();
            let Some(label) = fields.next() else {
                continue;
            };
            let symbols: Vec<&str> = fields.collect();
            if symbols.len() != notes.len() {
                return Err(FingeringError::RowLength {
                    line,
                    expected: notes.len(),
                    found: symbols.len(),
                });
            }
            if label == EMBOUCHURE_ROW {
                continue;
            }
            for (fingering, symbol) in fingerings.iter_mut().zip(&symbols) {
                let state = HoleState::from_symbol(symbol).ok_or_else(|| {
                    FingeringError::InvalidSymbol {
                        line,
                        symbol: symbol.to_string(),
                    }
                })?;
                fingering.states.insert(label.to_string(), state);
            }
        }

        Ok(Self { fingerings })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let chart = Self::parse(&text)?;
        log::info!(
            "[ANALYSIS] Loaded fingering chart {} ({} notes)",
            path.display(),
            chart.fingerings.len()
        );
        Ok(chart)
    }

    pub fn notes(&self) -> impl Iterator<Item = &str> {
        self.fingerings.iter().map(|f| f.note.as_str())
    }

    pub fn fingering(&self, note: &str) -> Result<&Fingering, FingeringError> {
        self.fingerings
            .iter()
            .find(|f| f.note == note)
            .ok_or_else(|| FingeringError::UnknownNote(note.to_string()))
    }

    pub fn check_labels(&self, labels: &[&str]) -> Result<(), FingeringError> {
        self.fingerings.iter().try_for_each(|f| f.check_labels(labels))
    }

    pub fn len(&self) -> usize {
        self.fingerings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = "\
label      A B C D
embouchure o o o o
hole1      x x x x
hole2      x x x o
hole3      x x o o
";

    #[test]
    fn parses_notes_in_order() {
        let chart = FingeringChart::parse(CHART).unwrap();
        assert_eq!(chart.notes().collect::<Vec<_>>(), ["A", "B", "C", "D"]);
    }

    #[test]
    fn reads_states_per_note() {
        let chart = FingeringChart::parse(CHART).unwrap();
        let c = chart.fingering("C").unwrap();
        assert_eq!(c.state_of("hole1"), HoleState::Closed);
        assert_eq!(c.state_of("hole3"), HoleState::Open);
        assert!(!c.states.contains_key("embouchure"));
    }

    #[test]
    fn unlisted_holes_are_open() {
        let chart = FingeringChart::parse(CHART).unwrap();
        assert_eq!(chart.fingering("A").unwrap().state_of("hole9"), HoleState::Open);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = FingeringChart::parse("label A B\nhole1 x\n").unwrap_err();
        assert_eq!(
            err,
            FingeringError::RowLength {
                line: 2,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn rejects_unknown_symbols() {
        let err = FingeringChart::parse("label A\nhole1 ?\n").unwrap_err();
        assert!(matches!(err, FingeringError::InvalidSymbol { line: 2, .. }));
    }

    #[test]
    fn requires_label_header() {
        assert_eq!(
            FingeringChart::parse("notes A B\n").unwrap_err(),
            FingeringError::MissingHeader
        );
        assert_eq!(FingeringChart::parse("  \n").unwrap_err(), FingeringError::Empty);
    }

    #[test]
    fn states_must_name_existing_holes() {
        let chart = FingeringChart::parse(CHART).unwrap();
        assert!(chart.check_labels(&["hole1", "hole2", "hole3", "hole4"]).is_ok());
        assert_eq!(
            chart.check_labels(&["hole1", "hole3"]).unwrap_err(),
            FingeringError::UnknownHole {
                note: "A".into(),
                label: "hole2".into()
            }
        );
    }

    #[test]
    fn unknown_note_lookup_fails() {
        let chart = FingeringChart::parse(CHART).unwrap();
        assert_eq!(
            chart.fingering("G").unwrap_err(),
            FingeringError::UnknownNote("G".into())
        );
    }
}

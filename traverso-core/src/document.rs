//! Versioned JSON flute documents.
//!
//! Documents store lengths in millimetres, the unit flutes are measured in.
//! The domain model works in metres; conversion happens here and nowhere
//! else.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::geometry::{BoreSegment, Flute, FlutePart, MM_TO_M, M_TO_MM, PartKind, ToneHole};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluteDocument {
    pub schema_version: u32,
    pub name: String,
    pub embouchure: HoleDocument,
    pub parts: PartsDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartsDocument {
    pub headjoint: PartDocument,
    pub left: PartDocument,
    pub right: PartDocument,
    pub foot: PartDocument,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartDocument {
    pub segments: Vec<SegmentDocument>,
    #[serde(default)]
    pub holes: Vec<HoleDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentDocument {
    pub position: f64,
    pub length: f64,
    pub start_diameter: f64,
    pub end_diameter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleDocument {
    pub label: String,
    pub position: f64,
    pub diameter: f64,
    pub chimney_height: f64,
    #[serde(default)]
    pub outer_diameter: Option<f64>,
}

#[derive(Deserialize)]
struct VersionHeader {
    schema_version: u32,
}

impl From<&BoreSegment> for SegmentDocument {
    fn from(segment: &BoreSegment) -> Self {
        Self {
            position: segment.position * M_TO_MM,
            length: segment.length * M_TO_MM,
            start_diameter: segment.start_diameter * M_TO_MM,
            end_diameter: segment.end_diameter * M_TO_MM,
        }
    }
}

impl From<&SegmentDocument> for BoreSegment {
    fn from(segment: &SegmentDocument) -> Self {
        BoreSegment::new(
            segment.position * MM_TO_M,
            segment.length * MM_TO_M,
            segment.start_diameter * MM_TO_M,
            segment.end_diameter * MM_TO_M,
        )
    }
}

impl From<&ToneHole> for HoleDocument {
    fn from(hole: &ToneHole) -> Self {
        Self {
            label: hole.label.clone(),
            position: hole.position * M_TO_MM,
            diameter: hole.diameter * M_TO_MM,
            chimney_height: hole.chimney_height * M_TO_MM,
            outer_diameter: hole.outer_diameter.map(|d| d * M_TO_MM),
        }
    }
}

impl From<&HoleDocument> for ToneHole {
    fn from(hole: &HoleDocument) -> Self {
        ToneHole {
            label: hole.label.clone(),
            position: hole.position * MM_TO_M,
            diameter: hole.diameter * MM_TO_M,
            chimney_height: hole.chimney_height * MM_TO_M,
            outer_diameter: hole.outer_diameter.map(|d| d * MM_TO_M),
        }
    }
}

impl PartDocument {
    fn from_part(part: &FlutePart) -> Self {
        Self {
            segments: part.segments.iter().map(SegmentDocument::from).collect(),
            holes: part.holes.iter().map(HoleDocument::from).collect(),
        }
    }

    fn to_part(&self, kind: PartKind) -> FlutePart {
        FlutePart::new(kind)
            .with_segments(self.segments.iter().map(BoreSegment::from).collect())
            .with_holes(self.holes.iter().map(ToneHole::from).collect())
    }
}

impl FluteDocument {
    pub fn from_flute(flute: &Flute) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: flute.name.clone(),
            embouchure: HoleDocument::from(&flute.embouchure),
            parts: PartsDocument {
                headjoint: PartDocument::from_part(&flute.headjoint),
                left: PartDocument::from_part(&flute.left),
                right: PartDocument::from_part(&flute.right),
                foot: PartDocument::from_part(&flute.foot),
            },
        }
    }

    /// Converts to the domain model. Geometry is not validated here.
    pub fn to_flute(&self) -> Result<Flute, SchemaError> {
        check_version(self.schema_version)?;
        Ok(Flute {
            name: self.name.clone(),
            headjoint: self.parts.headjoint.to_part(PartKind::Headjoint),
            left: self.parts.left.to_part(PartKind::Left),
            right: self.parts.right.to_part(PartKind::Right),
            foot: self.parts.foot.to_part(PartKind::Foot),
            embouchure: ToneHole::from(&self.embouchure),
        })
    }

    pub fn from_json(json: &str, origin: &str) -> Result<Self, SchemaError> {
        let json_error = |source| SchemaError::Json {
            path: origin.to_string(),
            source,
        };
        let header: VersionHeader = serde_json::from_str(json).map_err(json_error)?;
        check_version(header.schema_version)?;
        serde_json::from_str(json).map_err(json_error)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        serde_json::to_string_pretty(self).map_err(|source| SchemaError::Json {
            path: self.name.clone(),
            source,
        })
    }
}

fn check_version(found: u32) -> Result<(), SchemaError> {
    if found != SCHEMA_VERSION {
        return Err(SchemaError::UnsupportedVersion {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// Reads a flute document from disk.
pub fn load_flute(path: impl AsRef<Path>) -> Result<Flute, SchemaError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let json = fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: origin.clone(),
        source,
    })?;
    let flute = FluteDocument::from_json(&json, &origin)?.to_flute()?;
    log::info!("[GEOMETRY] Loaded flute '{}' from {}", flute.name, origin);
    Ok(flute)
}

/// Writes a flute document to disk.
pub fn save_flute(flute: &Flute, path: impl AsRef<Path>) -> Result<(), SchemaError> {
    let path = path.as_ref();
    let json = FluteDocument::from_flute(flute).to_json()?;
    fs::write(path, json).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::info!("[GEOMETRY] Saved flute '{}' to {}", flute.name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "schema_version": 1,
        "name": "test",
        "embouchure": {"label": "embouchure", "position": 20.0, "diameter": 8.0, "chimney_height": 5.0},
        "parts": {
            "headjoint": {"segments": [{"position": 0.0, "length": 100.0, "start_diameter": 10.0, "end_diameter": 10.0}]},
            "left": {"segments": [{"position": 100.0, "length": 100.0, "start_diameter": 10.0, "end_diameter": 9.0}],
                     "holes": [{"label": "hole1", "position": 150.0, "diameter": 6.0, "chimney_height": 3.0, "outer_diameter": 7.2}]},
            "right": {"segments": [{"position": 200.0, "length": 100.0, "start_diameter": 9.0, "end_diameter": 8.0}]},
            "foot": {"segments": [{"position": 300.0, "length": 100.0, "start_diameter": 8.0, "end_diameter": 8.0}]}
        }
    }"#;

    #[test]
    fn converts_millimetres_to_metres() {
        let flute = FluteDocument::from_json(DOCUMENT, "inline")
            .unwrap()
            .to_flute()
            .unwrap();
        assert!((flute.embouchure.position - 0.020).abs() < 1e-15);
        assert!((flute.left.holes[0].outer_diameter.unwrap() - 0.0072).abs() < 1e-15);
        assert!(flute.validate(1e-6).is_ok());
    }

    #[test]
    fn rejects_unknown_versions() {
        let json = DOCUMENT.replace("\"schema_version\": 1", "\"schema_version\": 2");
        assert!(matches!(
            FluteDocument::from_json(&json, "inline"),
            Err(SchemaError::UnsupportedVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn missing_outer_diameter_means_straight_chimney() {
        let flute = FluteDocument::from_json(DOCUMENT, "inline")
            .unwrap()
            .to_flute()
            .unwrap();
        assert_eq!(flute.embouchure.outer_diameter, None);
        assert_eq!(flute.embouchure.outer_radius(), flute.embouchure.radius());
    }

    #[test]
    fn save_and_load_preserve_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flute.json");
        let flute = FluteDocument::from_json(DOCUMENT, "inline")
            .unwrap()
            .to_flute()
            .unwrap();
        save_flute(&flute, &path).unwrap();
        let loaded = load_flute(&path).unwrap();
        assert_eq!(loaded.name, flute.name);
        assert_eq!(loaded.left.holes[0].label, "hole1");
        for (a, b) in loaded.parts().iter().zip(flute.parts()) {
            for (sa, sb) in a.segments.iter().zip(&b.segments) {
                assert!((sa.position - sb.position).abs() < 1e-12);
                assert!((sa.end_diameter - sb.end_diameter).abs() < 1e-12);
            }
        }
    }
}

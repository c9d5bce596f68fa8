//! Importer for the legacy per-joint measurement files.
//!
//! A legacy flute is a directory with `headjoint.json`, `left.json`,
//! `right.json` and `foot.json`. Each holds bore measurement points in joint
//! coordinates (mm), the joint's total and mortise lengths, and its holes.
//! Joints are placed on the assembled flute at their carrier offsets and the
//! points are joined into conical segments.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::SchemaError;
use crate::geometry::{BoreSegment, Flute, FlutePart, MM_TO_M, PartKind, ToneHole};

/// Chimney height assumed for tone holes without one (mm).
pub const DEFAULT_CHIMNEY_MM: f64 = 3.0;
/// Chimney height assumed for the embouchure without one (mm).
pub const DEFAULT_EMBOUCHURE_CHIMNEY_MM: f64 = 5.0;
/// Outer diameter assumed for holes without one, relative to the inner one.
pub const DEFAULT_OUTER_DIAMETER_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, Copy, Deserialize)]
struct LegacyPoint {
    position: f64,
    diameter: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyPart {
    #[serde(default)]
    measurements: Vec<LegacyPoint>,
    #[serde(rename = "Total length", default)]
    total_length: f64,
    #[serde(rename = "Mortise length", default)]
    mortise_length: f64,
    #[serde(rename = "Holes position", default)]
    holes_position: Vec<f64>,
    #[serde(rename = "Holes diameter", default)]
    holes_diameter: Vec<f64>,
    #[serde(rename = "Holes chimney", default)]
    holes_chimney: Option<Vec<f64>>,
    #[serde(rename = "Holes diameter_out", default)]
    holes_diameter_out: Option<Vec<f64>>,
}

/// A measurement hole in assembled coordinates, still in millimetres.
struct RawHole {
    position: f64,
    diameter: f64,
    chimney: f64,
    outer_diameter: f64,
}

impl LegacyPart {
    fn read(dir: &Path, kind: PartKind) -> Result<Self, SchemaError> {
        let path = dir.join(format!("{}.json", kind.name()));
        let origin = path.display().to_string();
        let json = fs::read_to_string(&path).map_err(|source| SchemaError::Io {
            path: origin.clone(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SchemaError::Json {
            path: origin,
            source,
        })
    }

    /// Measurement points kept after tenon overlap, in assembled coordinates.
    fn kept_points(&self, kind: PartKind, carrier: f64) -> Vec<LegacyPoint> {
        self.measurements
            .iter()
            .filter(|p| match kind {
                PartKind::Headjoint => p.position < self.total_length - self.mortise_length,
                PartKind::Left => true,
                PartKind::Right | PartKind::Foot => p.position > self.mortise_length,
            })
            .map(|p| LegacyPoint {
                position: p.position + carrier,
                diameter: p.diameter,
            })
            .collect()
    }

    fn holes(&self, kind: PartKind, carrier: f64, default_chimney: f64) -> Result<Vec<RawHole>, SchemaError> {
        let count = self.holes_position.len();
        let check = |name: &str, len: usize| {
            if len == count {
                Ok(())
            } else {
                Err(SchemaError::Legacy {
                    part: kind.to_string(),
                    reason: format!("{count} hole positions but {len} entries in '{name}'"),
                })
            }
        };
        check("Holes diameter", self.holes_diameter.len())?;
        if let Some(chimney) = &self.holes_chimney {
            check("Holes chimney", chimney.len())?;
        }
        if let Some(outer) = &self.holes_diameter_out {
            check("Holes diameter_out", outer.len())?;
        }

        Ok((0..count)
            .map(|i| {
                let diameter = self.holes_diameter[i];
                RawHole {
                    position: self.holes_position[i] + carrier,
                    diameter,
                    chimney: self
                        .holes_chimney
                        .as_ref()
                        .map_or(default_chimney, |c| c[i]),
                    outer_diameter: self
                        .holes_diameter_out
                        .as_ref()
                        .map_or(diameter * DEFAULT_OUTER_DIAMETER_FACTOR, |d| d[i]),
                }
            })
            .collect())
    }
}

impl RawHole {
    fn into_tone_hole(self, label: String) -> ToneHole {
        ToneHole::new(
            label,
            self.position * MM_TO_M,
            self.diameter * MM_TO_M,
            self.chimney * MM_TO_M,
        )
        .with_outer_diameter(self.outer_diameter * MM_TO_M)
    }
}

/// Where each joint's local zero sits on the assembled flute (mm).
fn carrier_offsets(parts: &[LegacyPart; 4]) -> [f64; 4] {
    let [head, left, right, foot] = parts;
    let left_carrier = head.total_length - head.mortise_length;
    let right_carrier = left_carrier + left.total_length - right.mortise_length;
    let foot_carrier = right_carrier + right.total_length - foot.mortise_length;
    [0.0, left_carrier, right_carrier, foot_carrier]
}

/// Joins consecutive points into segments (m).
///
/// Points that do not advance along the bore are skipped; a repeated
/// position becomes a diameter step.
fn segments_between(points: &[LegacyPoint], kind: PartKind) -> Vec<BoreSegment> {
    let mut segments = Vec::new();
    let mut previous: Option<LegacyPoint> = None;
    for &point in points {
        match previous {
            Some(prev) if point.position < prev.position => {
                log::warn!(
                    "[IMPORT] {}: point at {:.2} mm goes backwards, skipped",
                    kind,
                    point.position
                );
                continue;
            }
            Some(prev) if point.position > prev.position => {
                segments.push(BoreSegment::between(
                    prev.position * MM_TO_M,
                    prev.diameter * MM_TO_M,
                    point.position * MM_TO_M,
                    point.diameter * MM_TO_M,
                ));
            }
            _ => {}
        }
        previous = Some(point);
    }
    segments
}

/// Imports a legacy flute directory. The result is validated.
pub fn import_legacy(dir: impl AsRef<Path>, tolerance: f64) -> Result<Flute, SchemaError> {
    let dir = dir.as_ref();
    let parts = [
        LegacyPart::read(dir, PartKind::Headjoint)?,
        LegacyPart::read(dir, PartKind::Left)?,
        LegacyPart::read(dir, PartKind::Right)?,
        LegacyPart::read(dir, PartKind::Foot)?,
    ];
    let carriers = carrier_offsets(&parts);

    let points: Vec<Vec<LegacyPoint>> = PartKind::ORDER
        .iter()
        .zip(&parts)
        .zip(carriers)
        .map(|((&kind, part), carrier)| part.kept_points(kind, carrier))
        .collect();

    let mut flute_parts = Vec::with_capacity(4);
    let mut next_label = 1;
    let mut embouchure = None;

    for (index, &kind) in PartKind::ORDER.iter().enumerate() {
        if points[index].is_empty() {
            return Err(SchemaError::Legacy {
                part: kind.to_string(),
                reason: "no measurement points left after removing the tenon".to_string(),
            });
        }
        // The segment bridging two joints belongs to the earlier joint.
        let mut own = points[index].clone();
        if let Some(first_of_next) = points.get(index + 1).and_then(|p| p.first()) {
            own.push(*first_of_next);
        }
        let segments = segments_between(&own, kind);

        let default_chimney = DEFAULT_CHIMNEY_MM;
        let mut raw = parts[index].holes(kind, carriers[index], default_chimney)?;
        if kind == PartKind::Headjoint {
            if raw.is_empty() {
                return Err(SchemaError::Legacy {
                    part: kind.to_string(),
                    reason: "the first head joint hole must be the embouchure".to_string(),
                });
            }
            let mut hole = raw.remove(0);
            if parts[index].holes_chimney.is_none() {
                hole.chimney = DEFAULT_EMBOUCHURE_CHIMNEY_MM;
            }
            embouchure = Some(hole.into_tone_hole("embouchure".to_string()));
        }
        let holes = raw
            .into_iter()
            .map(|hole| {
                let label = format!("hole{next_label}");
                next_label += 1;
                hole.into_tone_hole(label)
            })
            .collect();

        flute_parts.push(FlutePart::new(kind).with_segments(segments).with_holes(holes));
    }

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "imported".to_string());
    let mut iter = flute_parts.into_iter();
    let (Some(headjoint), Some(left), Some(right), Some(foot), Some(embouchure)) =
        (iter.next(), iter.next(), iter.next(), iter.next(), embouchure)
    else {
        return Err(SchemaError::Legacy {
            part: "flute".to_string(),
            reason: "incomplete import".to_string(),
        });
    };

    let flute = Flute {
        name,
        headjoint,
        left,
        right,
        foot,
        embouchure,
    };
    flute.validate(tolerance)?;
    log::info!(
        "[IMPORT] Imported '{}' from {}: {} tone holes, bore {:.1} mm",
        flute.name,
        dir.display(),
        flute.tone_holes().len(),
        flute.concatenate(tolerance)?.length() * 1e3
    );
    Ok(flute)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(position: f64, diameter: f64) -> LegacyPoint {
        LegacyPoint { position, diameter }
    }

    #[test]
    fn carriers_subtract_mortises() {
        let part = |total: f64, mortise: f64| LegacyPart {
            measurements: vec![],
            total_length: total,
            mortise_length: mortise,
            holes_position: vec![],
            holes_diameter: vec![],
            holes_chimney: None,
            holes_diameter_out: None,
        };
        let carriers = carrier_offsets(&[
            part(200.0, 20.0),
            part(220.0, 0.0),
            part(180.0, 15.0),
            part(120.0, 10.0),
        ]);
        assert_eq!(carriers, [0.0, 180.0, 385.0, 555.0]);
    }

    #[test]
    fn repeated_positions_become_steps() {
        let segments = segments_between(
            &[point(0.0, 10.0), point(5.0, 10.0), point(5.0, 12.0), point(9.0, 12.0)],
            PartKind::Left,
        );
        assert_eq!(segments.len(), 2);
        assert!((segments[1].start_diameter - 0.012).abs() < 1e-15);
    }

    #[test]
    fn backwards_points_are_skipped() {
        let segments = segments_between(
            &[point(0.0, 10.0), point(5.0, 10.0), point(4.0, 11.0), point(9.0, 12.0)],
            PartKind::Foot,
        );
        assert_eq!(segments.len(), 2);
        assert!((segments[1].position - 0.005).abs() < 1e-15);
    }
}

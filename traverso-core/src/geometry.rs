//! # Geometry Module
//!
//! Describes a traverso as four joints (head, left hand, right hand, foot),
//! each an ordered run of cylindrical or conical bore segments carrying tone
//! holes, plus the embouchure hole on the head joint.
//!
//! ## Features
//! - Segment, hole and joint validation (no zero lengths, no zero diameters)
//! - Continuity check between consecutive joints
//! - Concatenation into a single [`BoreProfile`] with diameter interpolation
//!
//! All lengths are in metres. Flute documents on disk use millimetres and are
//! converted at the document boundary.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Millimetre to metre conversion factor.
pub const MM_TO_M: f64 = 1e-3;
/// Metre to millimetre conversion factor.
pub const M_TO_MM: f64 = 1e3;

/// Relative radius difference below which a frustum is treated as a cylinder.
const CYLINDER_EPSILON: f64 = 1e-9;

/// The four joints of a traverso, in assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Headjoint,
    Left,
    Right,
    Foot,
}

impl PartKind {
    /// Assembly order, from the cork to the foot.
    pub const ORDER: [PartKind; 4] = [
        PartKind::Headjoint,
        PartKind::Left,
        PartKind::Right,
        PartKind::Foot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PartKind::Headjoint => "headjoint",
            PartKind::Left => "left",
            PartKind::Right => "right",
            PartKind::Foot => "foot",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A cylindrical or conical piece of the main bore.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoreSegment {
    /// Position of the segment start along the assembled flute (m).
    pub position: f64,
    /// Axial length (m).
    pub length: f64,
    /// Diameter at `position` (m).
    pub start_diameter: f64,
    /// Diameter at `position + length` (m).
    pub end_diameter: f64,
}

impl BoreSegment {
    pub fn new(position: f64, length: f64, start_diameter: f64, end_diameter: f64) -> Self {
        Self {
            position,
            length,
            start_diameter,
            end_diameter,
        }
    }

    /// Builds the segment joining two measurement points.
    pub fn between(x0: f64, d0: f64, x1: f64, d1: f64) -> Self {
        Self::new(x0, x1 - x0, d0, d1)
    }

    pub fn end(&self) -> f64 {
        self.position + self.length
    }

    pub fn is_cylindrical(&self) -> bool {
        let scale = self.start_diameter.abs().max(self.end_diameter.abs());
        (self.end_diameter - self.start_diameter).abs() <= CYLINDER_EPSILON * scale
    }

    /// Diameter at `x`, linear along the segment and clamped to its ends.
    pub fn diameter_at(&self, x: f64) -> f64 {
        if self.is_cylindrical() || self.length <= 0.0 {
            return self.start_diameter;
        }
        let t = ((x - self.position) / self.length).clamp(0.0, 1.0);
        self.start_diameter + (self.end_diameter - self.start_diameter) * t
    }

    /// The part of this segment between `a` and `b`, both inside it.
    pub fn slice(&self, a: f64, b: f64) -> BoreSegment {
        BoreSegment::between(a, self.diameter_at(a), b, self.diameter_at(b))
    }
}

/// A side hole: a tone hole or the embouchure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneHole {
    pub label: String,
    /// Position of the hole centre along the assembled flute (m).
    pub position: f64,
    /// Inner diameter where the chimney meets the bore (m).
    pub diameter: f64,
    /// Chimney height (m).
    pub chimney_height: f64,
    /// Outer diameter of the chimney; `None` means a straight chimney.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_diameter: Option<f64>,
}

impl ToneHole {
    pub fn new(label: impl Into<String>, position: f64, diameter: f64, chimney_height: f64) -> Self {
        Self {
            label: label.into(),
            position,
            diameter,
            chimney_height,
            outer_diameter: None,
        }
    }

    pub fn with_outer_diameter(mut self, outer_diameter: f64) -> Self {
        self.outer_diameter = Some(outer_diameter);
        self
    }

    pub fn radius(&self) -> f64 {
        0.5 * self.diameter
    }

    pub fn outer_radius(&self) -> f64 {
        0.5 * self.outer_diameter.unwrap_or(self.diameter)
    }

    fn validate(&self) -> Result<(), GeometryError> {
        let invalid = |reason: String| GeometryError::InvalidHole {
            label: self.label.clone(),
            reason,
        };
        if !(self.diameter.is_finite() && self.diameter > 0.0) {
            return Err(invalid(format!("diameter {} m is not positive", self.diameter)));
        }
        if !(self.chimney_height.is_finite() && self.chimney_height >= 0.0) {
            return Err(invalid(format!(
                "chimney height {} m is negative",
                self.chimney_height
            )));
        }
        if let Some(outer) = self.outer_diameter {
            if !(outer.is_finite() && outer > 0.0) {
                return Err(invalid(format!("outer diameter {outer} m is not positive")));
            }
        }
        if !self.position.is_finite() {
            return Err(invalid("position is not finite".to_string()));
        }
        Ok(())
    }
}

/// One joint of the flute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlutePart {
    pub kind: PartKind,
    pub segments: Vec<BoreSegment>,
    #[serde(default)]
    pub holes: Vec<ToneHole>,
}

impl FlutePart {
    pub fn new(kind: PartKind) -> Self {
        Self {
            kind,
            segments: Vec::new(),
            holes: Vec::new(),
        }
    }

    pub fn with_segments(mut self, segments: Vec<BoreSegment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_holes(mut self, holes: Vec<ToneHole>) -> Self {
        self.holes = holes;
        self
    }

    /// Start and end position of the joint's bore.
    pub fn span(&self) -> Option<(f64, f64)> {
        let first = self.segments.first()?;
        let last = self.segments.last()?;
        Some((first.position, last.end()))
    }
}

/// A complete traverso geometry. Immutable during an analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flute {
    pub name: String,
    pub headjoint: FlutePart,
    pub left: FlutePart,
    pub right: FlutePart,
    pub foot: FlutePart,
    pub embouchure: ToneHole,
}

impl Flute {
    pub fn parts(&self) -> [&FlutePart; 4] {
        [&self.headjoint, &self.left, &self.right, &self.foot]
    }

    pub fn part(&self, kind: PartKind) -> &FlutePart {
        match kind {
            PartKind::Headjoint => &self.headjoint,
            PartKind::Left => &self.left,
            PartKind::Right => &self.right,
            PartKind::Foot => &self.foot,
        }
    }

    /// Joins the four joints into one bore profile, checking continuity.
    pub fn concatenate(&self, tolerance: f64) -> Result<BoreProfile, GeometryError> {
        concatenate(&self.parts(), tolerance)
    }

    /// Concatenates the bore and checks every hole against it.
    ///
    /// Holes must sit strictly inside the bore, and no tone hole may share
    /// the embouchure's position.
    pub fn validate(&self, tolerance: f64) -> Result<BoreProfile, GeometryError> {
        let profile = self.concatenate(tolerance)?;

        let mut labels = BTreeSet::new();
        let all_holes = std::iter::once((PartKind::Headjoint, &self.embouchure, true)).chain(
            self.parts()
                .into_iter()
                .flat_map(|part| part.holes.iter().map(move |hole| (part.kind, hole, false))),
        );

        for (kind, hole, is_embouchure) in all_holes {
            hole.validate()?;
            if !labels.insert(hole.label.as_str()) {
                return Err(GeometryError::DuplicateHoleLabel {
                    label: hole.label.clone(),
                });
            }
            let inside_part = self
                .part(kind)
                .span()
                .is_some_and(|(start, end)| hole.position >= start - tolerance && hole.position <= end + tolerance);
            let interior = hole.position > profile.start() && hole.position < profile.end();
            if !inside_part || !interior {
                return Err(GeometryError::HoleOutsideBore {
                    label: hole.label.clone(),
                    part: kind.to_string(),
                    position: hole.position,
                });
            }
            if !is_embouchure && (hole.position - self.embouchure.position).abs() <= tolerance {
                return Err(GeometryError::InvalidHole {
                    label: hole.label.clone(),
                    reason: format!(
                        "shares the embouchure position {} m",
                        self.embouchure.position
                    ),
                });
            }
            if let Some(bore) = profile.profile_at(hole.position) {
                if hole.diameter > bore {
                    log::warn!(
                        "[GEOMETRY] Hole '{}' ({:.2} mm) is wider than the bore ({:.2} mm)",
                        hole.label,
                        hole.diameter * M_TO_MM,
                        bore * M_TO_MM
                    );
                }
            }
        }

        Ok(profile)
    }

    /// All tone holes except the embouchure, ordered by position.
    pub fn tone_holes(&self) -> Vec<ToneHole> {
        let mut holes: Vec<ToneHole> = self
            .parts()
            .into_iter()
            .flat_map(|part| part.holes.iter().cloned())
            .collect();
        holes.sort_by(|a, b| a.position.total_cmp(&b.position));
        holes
    }

    /// Labels of the tone holes, embouchure excluded.
    pub fn hole_labels(&self) -> Vec<&str> {
        self.parts()
            .into_iter()
            .flat_map(|part| part.holes.iter().map(|hole| hole.label.as_str()))
            .collect()
    }

    /// A copy of this flute with a different embouchure chimney height.
    pub fn with_embouchure_chimney(&self, chimney_height: f64) -> Flute {
        let mut flute = self.clone();
        flute.embouchure.chimney_height = chimney_height;
        flute
    }
}

fn validate_segments(
    name: &str,
    segments: &[BoreSegment],
    tolerance: f64,
) -> Result<(), GeometryError> {
    if segments.is_empty() {
        return Err(GeometryError::EmptyPart {
            part: name.to_string(),
        });
    }
    for (index, segment) in segments.iter().enumerate() {
        if !(segment.length.is_finite() && segment.length > 0.0) {
            return Err(GeometryError::NonPositiveLength {
                part: name.to_string(),
                index,
                length: segment.length,
            });
        }
        for diameter in [segment.start_diameter, segment.end_diameter] {
            if !(diameter.is_finite() && diameter > 0.0) {
                return Err(GeometryError::NonPositiveDiameter {
                    part: name.to_string(),
                    index,
                    diameter,
                });
            }
        }
        if index > 0 {
            let previous = &segments[index - 1];
            if segment.position <= previous.position {
                return Err(GeometryError::NonIncreasingPosition {
                    part: name.to_string(),
                    index,
                    position: segment.position,
                    previous: previous.position,
                });
            }
            let gap = segment.position - previous.end();
            if gap.abs() > tolerance {
                return Err(GeometryError::SegmentGap {
                    part: name.to_string(),
                    index,
                    gap,
                });
            }
        }
    }
    Ok(())
}

/// Joins parts in the given order into one bore profile.
///
/// Each part is validated on its own, then the end of every part is compared
/// with the start of the next one. A position or diameter mismatch larger
/// than `tolerance` is a [`GeometryError::Discontinuity`].
pub fn concatenate(parts: &[&FlutePart], tolerance: f64) -> Result<BoreProfile, GeometryError> {
    for part in parts {
        validate_segments(part.kind.name(), &part.segments, tolerance)?;
    }

    for pair in parts.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        // Both parts were validated as non-empty above.
        let (Some(last), Some(first)) = (prev.segments.last(), next.segments.first()) else {
            continue;
        };
        let position_gap = first.position - last.end();
        let diameter_gap = first.start_diameter - last.end_diameter;
        if position_gap.abs() > tolerance || diameter_gap.abs() > tolerance {
            return Err(GeometryError::Discontinuity {
                from: prev.kind,
                to: next.kind,
                position_gap,
                diameter_gap,
            });
        }
    }

    let segments = parts
        .iter()
        .flat_map(|part| part.segments.iter().copied())
        .collect();
    Ok(BoreProfile { segments })
}

/// The concatenated main bore.
#[derive(Debug, Clone, PartialEq)]
pub struct BoreProfile {
    segments: Vec<BoreSegment>,
}

impl BoreProfile {
    /// A bore made of the given segments, validated as one contiguous run.
    pub fn from_segments(segments: Vec<BoreSegment>, tolerance: f64) -> Result<Self, GeometryError> {
        validate_segments("bore", &segments, tolerance)?;
        Ok(Self { segments })
    }

    /// A single cylinder starting at position 0.
    pub fn cylinder(length: f64, diameter: f64) -> Result<Self, GeometryError> {
        Self::from_segments(vec![BoreSegment::new(0.0, length, diameter, diameter)], 0.0)
    }

    /// A single cone starting at position 0.
    pub fn cone(length: f64, start_diameter: f64, end_diameter: f64) -> Result<Self, GeometryError> {
        Self::from_segments(
            vec![BoreSegment::new(0.0, length, start_diameter, end_diameter)],
            0.0,
        )
    }

    pub fn segments(&self) -> &[BoreSegment] {
        &self.segments
    }

    pub fn start(&self) -> f64 {
        self.segments.first().map_or(0.0, |s| s.position)
    }

    pub fn end(&self) -> f64 {
        self.segments.last().map_or(0.0, |s| s.end())
    }

    pub fn length(&self) -> f64 {
        self.end() - self.start()
    }

    /// Index of the segment owning `position`.
    ///
    /// Segments own the half-open range `[position, end)`; the last segment
    /// also owns the bore's end point.
    pub fn segment_index_at(&self, position: f64) -> Option<usize> {
        let last = self.segments.len().checked_sub(1)?;
        self.segments.iter().enumerate().find_map(|(index, s)| {
            let owns = position >= s.position
                && (position < s.end() || (index == last && position <= s.end()));
            owns.then_some(index)
        })
    }

    pub fn segment_at(&self, position: f64) -> Option<&BoreSegment> {
        self.segment_index_at(position).map(|i| &self.segments[i])
    }

    /// Bore diameter at `position`: constant in cylinders, linear in cones.
    pub fn profile_at(&self, position: f64) -> Option<f64> {
        self.segment_at(position).map(|s| s.diameter_at(position))
    }

    pub fn radius_at(&self, position: f64) -> Option<f64> {
        self.profile_at(position).map(|d| 0.5 * d)
    }

    /// Segment boundaries strictly between `a` and `b`, framed by `a` and `b`.
    pub fn cut_points(&self, a: f64, b: f64) -> Vec<f64> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut points = vec![lo];
        points.extend(
            self.segments
                .iter()
                .map(|s| s.position)
                .chain(self.segments.last().map(|s| s.end()))
                .filter(|&x| x > lo && x < hi),
        );
        points.push(hi);
        points.dedup();
        points
    }

    /// The bore between `a` and `b` as frusta, in increasing position.
    ///
    /// Each piece takes its diameters from the segment containing its
    /// midpoint, so a diameter step at a boundary is kept as a step.
    pub fn slices(&self, a: f64, b: f64) -> Vec<BoreSegment> {
        self.cut_points(a, b)
            .windows(2)
            .filter(|w| w[1] > w[0])
            .filter_map(|w| {
                let mid = 0.5 * (w[0] + w[1]);
                self.segment_at(mid).map(|s| s.slice(w[0], w[1]))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(kind: PartKind, segments: Vec<BoreSegment>) -> FlutePart {
        FlutePart::new(kind).with_segments(segments)
    }

    fn simple_parts() -> [FlutePart; 4] {
        [
            part(PartKind::Headjoint, vec![BoreSegment::new(0.0, 0.1, 0.02, 0.02)]),
            part(PartKind::Left, vec![BoreSegment::new(0.1, 0.1, 0.02, 0.018)]),
            part(PartKind::Right, vec![BoreSegment::new(0.2, 0.1, 0.018, 0.016)]),
            part(PartKind::Foot, vec![BoreSegment::new(0.3, 0.1, 0.016, 0.016)]),
        ]
    }

    #[test]
    fn concatenates_continuous_parts() {
        let parts = simple_parts();
        let refs: Vec<&FlutePart> = parts.iter().collect();
        let profile = concatenate(&refs, 1e-6).unwrap();
        assert_eq!(profile.segments().len(), 4);
        assert!((profile.length() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn diameter_jump_between_parts_is_a_discontinuity() {
        let mut parts = simple_parts();
        parts[2].segments[0].start_diameter = 0.017;
        let refs: Vec<&FlutePart> = parts.iter().collect();
        match concatenate(&refs, 1e-6) {
            Err(GeometryError::Discontinuity { from, to, .. }) => {
                assert_eq!(from, PartKind::Left);
                assert_eq!(to, PartKind::Right);
            }
            other => panic!("expected discontinuity, got {other:?}"),
        }
    }

    #[test]
    fn mismatch_within_tolerance_is_accepted() {
        let mut parts = simple_parts();
        parts[1].segments[0].position += 5e-7;
        let refs: Vec<&FlutePart> = parts.iter().collect();
        assert!(concatenate(&refs, 1e-6).is_ok());
    }

    #[test]
    fn zero_length_segment_is_rejected() {
        let result = BoreProfile::from_segments(vec![BoreSegment::new(0.0, 0.0, 0.01, 0.01)], 1e-6);
        assert!(matches!(result, Err(GeometryError::NonPositiveLength { .. })));
    }

    #[test]
    fn zero_diameter_is_rejected() {
        let result = BoreProfile::cone(0.2, 0.01, 0.0);
        assert!(matches!(result, Err(GeometryError::NonPositiveDiameter { .. })));
    }

    #[test]
    fn profile_interpolates_cones_and_holds_cylinders() {
        let profile = BoreProfile::from_segments(
            vec![
                BoreSegment::new(0.0, 0.1, 0.02, 0.02),
                BoreSegment::new(0.1, 0.2, 0.02, 0.01),
            ],
            1e-9,
        )
        .unwrap();
        assert_eq!(profile.profile_at(0.05), Some(0.02));
        assert!((profile.profile_at(0.2).unwrap() - 0.015).abs() < 1e-12);
        assert!((profile.profile_at(0.3).unwrap() - 0.01).abs() < 1e-12);
        assert_eq!(profile.profile_at(0.31), None);
        assert_eq!(profile.profile_at(-0.01), None);
    }

    #[test]
    fn boundary_position_belongs_to_the_next_segment() {
        let profile = BoreProfile::from_segments(
            vec![
                BoreSegment::new(0.0, 0.1, 0.02, 0.02),
                BoreSegment::new(0.1, 0.1, 0.03, 0.03),
            ],
            1e-9,
        )
        .unwrap();
        assert_eq!(profile.segment_index_at(0.1), Some(1));
        assert_eq!(profile.segment_index_at(0.2), Some(1));
        assert_eq!(profile.profile_at(0.1), Some(0.03));
    }

    #[test]
    fn slices_keep_segment_boundaries() {
        let profile = BoreProfile::from_segments(
            vec![
                BoreSegment::new(0.0, 0.1, 0.02, 0.02),
                BoreSegment::new(0.1, 0.2, 0.02, 0.01),
            ],
            1e-9,
        )
        .unwrap();
        let slices = profile.slices(0.05, 0.2);
        assert_eq!(slices.len(), 2);
        assert!((slices[0].length - 0.05).abs() < 1e-12);
        assert!((slices[1].end_diameter - 0.015).abs() < 1e-12);
    }

    #[test]
    fn hole_outside_its_part_is_rejected() {
        let [headjoint, left, right, foot] = simple_parts();
        let flute = Flute {
            name: "test".into(),
            headjoint,
            left: left.with_holes(vec![ToneHole::new("hole1", 0.35, 0.006, 0.003)]),
            right,
            foot,
            embouchure: ToneHole::new("embouchure", 0.02, 0.008, 0.005),
        };
        assert!(matches!(
            flute.validate(1e-6),
            Err(GeometryError::HoleOutsideBore { .. })
        ));
    }

    fn flute_with_head_hole(position: f64) -> Flute {
        let [headjoint, left, right, foot] = simple_parts();
        Flute {
            name: "test".into(),
            headjoint: headjoint.with_holes(vec![ToneHole::new("hole1", position, 0.006, 0.003)]),
            left,
            right,
            foot,
            embouchure: ToneHole::new("embouchure", 0.02, 0.008, 0.005),
        }
    }

    #[test]
    fn hole_at_the_bore_end_is_rejected() {
        let [headjoint, left, right, foot] = simple_parts();
        let flute = Flute {
            name: "test".into(),
            headjoint,
            left,
            right,
            foot: foot.with_holes(vec![ToneHole::new("hole1", 0.4, 0.006, 0.003)]),
            embouchure: ToneHole::new("embouchure", 0.02, 0.008, 0.005),
        };
        assert!(matches!(
            flute.validate(1e-6),
            Err(GeometryError::HoleOutsideBore { .. })
        ));
        assert!(matches!(
            flute_with_head_hole(0.0).validate(1e-6),
            Err(GeometryError::HoleOutsideBore { .. })
        ));
    }

    #[test]
    fn tone_hole_on_the_embouchure_is_rejected() {
        let err = flute_with_head_hole(0.02).validate(1e-6).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidHole { ref label, .. } if label == "hole1"));
        assert!(flute_with_head_hole(0.02 + 5e-7).validate(1e-6).is_err());
        assert!(flute_with_head_hole(0.05).validate(1e-6).is_ok());
    }

    #[test]
    fn embouchure_chimney_copy_leaves_original_untouched() {
        let [headjoint, left, right, foot] = simple_parts();
        let flute = Flute {
            name: "test".into(),
            headjoint,
            left,
            right,
            foot,
            embouchure: ToneHole::new("embouchure", 0.02, 0.008, 0.005),
        };
        let modified = flute.with_embouchure_chimney(0.007);
        assert_eq!(flute.embouchure.chimney_height, 0.005);
        assert_eq!(modified.embouchure.chimney_height, 0.007);
    }
}

//! # Acoustic Solver Module
//!
//! Input impedance and admittance of an instrument at one frequency.
//!
//! The bore is cut at every segment boundary and every tone hole. Starting
//! from each far termination, the (pressure, flow) state is carried back
//! towards the excitation point through the frustum matrices, picking up the
//! shunt of each tone hole on the way. With a side-hole excitation (the
//! embouchure) two such branches meet at the junction: one towards the cork,
//! one towards the foot.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::air::Air;
use crate::error::GeometryError;
use crate::fingering::{Fingering, HoleState};
use crate::geometry::{BoreProfile, Flute, ToneHole};
use crate::transfer::{AcousticState, Radiation, TransferMatrix};

/// Physical model options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Air temperature in °C.
    pub temperature: f64,
    /// Visco-thermal boundary-layer losses.
    pub losses: bool,
    /// Termination at the bore entrance (the cork for a flute).
    pub entrance: Radiation,
    /// Radiation of open tone holes.
    pub holes: Radiation,
    /// Radiation at the foot.
    pub bell: Radiation,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            losses: true,
            entrance: Radiation::Closed,
            holes: Radiation::Unflanged,
            bell: Radiation::Unflanged,
        }
    }
}

/// Where the instrument is driven.
#[derive(Debug, Clone, PartialEq)]
pub enum Excitation {
    /// At the bore entrance, like a measurement head on a plain pipe.
    Entrance,
    /// Through a side hole, like the embouchure of a flute.
    SideHole(ToneHole),
}

/// A bore, its tone holes and its excitation point, ready for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    profile: BoreProfile,
    holes: Vec<ToneHole>,
    excitation: Excitation,
}

impl Instrument {
    /// A plain pipe driven at its entrance.
    pub fn pipe(profile: BoreProfile) -> Self {
        Self {
            profile,
            holes: Vec::new(),
            excitation: Excitation::Entrance,
        }
    }

    pub fn new(
        profile: BoreProfile,
        mut holes: Vec<ToneHole>,
        excitation: Excitation,
    ) -> Result<Self, GeometryError> {
        let side = match &excitation {
            Excitation::SideHole(hole) => Some(hole),
            Excitation::Entrance => None,
        };
        let outside = |hole: &ToneHole| GeometryError::HoleOutsideBore {
            label: hole.label.clone(),
            part: "bore".to_string(),
            position: hole.position,
        };
        if let Some(hole) = side {
            if profile.segment_index_at(hole.position).is_none() {
                return Err(outside(hole));
            }
        }
        // Tone holes at either bore end or at the source would fall outside
        // every branch interval and be ignored.
        for hole in &holes {
            if !(hole.position > profile.start() && hole.position < profile.end()) {
                return Err(outside(hole));
            }
            if let Some(source) = side.filter(|s| s.position == hole.position) {
                return Err(GeometryError::InvalidHole {
                    label: hole.label.clone(),
                    reason: format!("shares the excitation position {} m", source.position),
                });
            }
        }
        holes.sort_by(|a, b| a.position.total_cmp(&b.position));
        Ok(Self {
            profile,
            holes,
            excitation,
        })
    }

    /// Validates the flute and drives it through its embouchure.
    pub fn from_flute(flute: &Flute, tolerance: f64) -> Result<Self, GeometryError> {
        let profile = flute.validate(tolerance)?;
        Self::new(
            profile,
            flute.tone_holes(),
            Excitation::SideHole(flute.embouchure.clone()),
        )
    }

    pub fn profile(&self) -> &BoreProfile {
        &self.profile
    }

    pub fn holes(&self) -> &[ToneHole] {
        &self.holes
    }

    pub fn excitation(&self) -> &Excitation {
        &self.excitation
    }

    pub fn source_position(&self) -> f64 {
        match &self.excitation {
            Excitation::Entrance => self.profile.start(),
            Excitation::SideHole(hole) => hole.position,
        }
    }

    fn bore_radius_at(&self, position: f64) -> f64 {
        self.profile
            .radius_at(position)
            .or_else(|| self.profile.segments().last().map(|s| 0.5 * s.end_diameter))
            .unwrap_or(0.0)
    }
}

/// Inner length correction of a side hole of radius `b` on a bore of radius `a`.
pub fn inner_length_correction(hole_radius: f64, bore_radius: f64, open: bool) -> f64 {
    let delta = hole_radius / bore_radius;
    if open {
        hole_radius
            * (0.82 - 0.193 * delta - 1.09 * delta.powi(2) + 1.27 * delta.powi(3)
                - 0.71 * delta.powi(4))
    } else {
        hole_radius * (0.82 - 1.4 * delta.powi(2) + 0.75 * delta.powf(2.7))
    }
}

/// A stretch of bore between the source side (`near`) and the far side.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Interval {
    pub near: f64,
    pub far: f64,
    /// State just on the near side of `far`, flow pointing away from the source.
    pub far_state: AcousticState,
}

/// One side of the excitation point, carried back from its termination.
#[derive(Debug, Clone)]
pub(crate) struct Branch {
    /// Ordered from the source outwards.
    pub intervals: Vec<Interval>,
    pub source_state: AcousticState,
}

impl Branch {
    pub fn covers(&self, x: f64) -> bool {
        self.intervals.iter().any(|i| i.contains(x))
    }
}

impl Interval {
    fn contains(&self, x: f64) -> bool {
        x >= self.near.min(self.far) && x <= self.near.max(self.far)
    }
}

/// Both branches of a driven instrument and the state at the driving point.
#[derive(Debug, Clone)]
pub(crate) struct Response {
    pub input: AcousticState,
    /// Each branch with the factor bringing it to the input's scale, and
    /// `+1`/`-1` for flow along/against increasing position.
    pub branches: Vec<(Branch, Complex64, f64)>,
}

/// Transmission-line solver for a fixed set of physics options.
#[derive(Debug, Clone)]
pub struct AcousticSolver {
    physics: PhysicsConfig,
    air: Air,
}

impl AcousticSolver {
    pub fn new(physics: PhysicsConfig) -> Self {
        Self {
            air: Air::at(physics.temperature),
            physics,
        }
    }

    pub fn physics(&self) -> &PhysicsConfig {
        &self.physics
    }

    pub fn air(&self) -> &Air {
        &self.air
    }

    /// Input impedance seen from the excitation point.
    pub fn impedance(&self, instrument: &Instrument, fingering: &Fingering, frequency: f64) -> Complex64 {
        self.response(instrument, fingering, frequency).input.impedance()
    }

    pub fn admittance(&self, instrument: &Instrument, fingering: &Fingering, frequency: f64) -> Complex64 {
        self.response(instrument, fingering, frequency).input.admittance()
    }

    pub(crate) fn response(&self, instrument: &Instrument, fingering: &Fingering, frequency: f64) -> Response {
        let profile = instrument.profile();
        let bell = self.physics.bell.state(
            &self.air,
            frequency,
            instrument.bore_radius_at(profile.end()),
        );
        let one = Complex64::new(1.0, 0.0);

        match instrument.excitation() {
            Excitation::Entrance => {
                let down = self.branch(instrument, fingering, frequency, profile.start(), profile.end(), bell);
                Response {
                    input: down.source_state,
                    branches: vec![(down, one, 1.0)],
                }
            }
            Excitation::SideHole(hole) => {
                let cork = self.physics.entrance.state(
                    &self.air,
                    frequency,
                    instrument.bore_radius_at(profile.start()),
                );
                let down = self.branch(instrument, fingering, frequency, hole.position, profile.end(), bell);
                let up = self.branch(instrument, fingering, frequency, hole.position, profile.start(), cork);

                let junction = down.source_state.in_parallel(&up.source_state);
                let inner = junction.with_series(self.inner_correction(
                    hole,
                    instrument.bore_radius_at(hole.position),
                    frequency,
                    true,
                ));
                let chimney = TransferMatrix::frustum(
                    &self.air,
                    frequency,
                    hole.outer_radius(),
                    hole.radius(),
                    hole.chimney_height,
                    self.physics.losses,
                );
                let down_factor = up.source_state.pressure;
                let up_factor = down.source_state.pressure;
                Response {
                    input: chimney.apply(&inner),
                    branches: vec![(down, down_factor, 1.0), (up, up_factor, -1.0)],
                }
            }
        }
    }

    /// Carries `end_state` from `end` back to `source`.
    fn branch(
        &self,
        instrument: &Instrument,
        fingering: &Fingering,
        frequency: f64,
        source: f64,
        end: f64,
        end_state: AcousticState,
    ) -> Branch {
        let (lo, hi) = if source <= end { (source, end) } else { (end, source) };
        let mut holes: Vec<&ToneHole> = instrument
            .holes()
            .iter()
            .filter(|h| h.position > lo && h.position < hi)
            .collect();
        // Walk from the far end towards the source.
        if source <= end {
            holes.reverse();
        }

        let mut intervals = Vec::with_capacity(holes.len() + 1);
        let mut far = end;
        let mut state = end_state;
        for hole in holes {
            intervals.push(Interval {
                near: hole.position,
                far,
                far_state: state,
            });
            state = self
                .duct(instrument.profile(), hole.position, far, frequency)
                .apply(&state);
            let shunt = self.hole_shunt(
                hole,
                fingering.state_of(&hole.label),
                instrument.bore_radius_at(hole.position),
                frequency,
            );
            state = with_shunt(&state, &shunt);
            far = hole.position;
        }
        intervals.push(Interval {
            near: source,
            far,
            far_state: state,
        });
        let source_state = self.duct(instrument.profile(), source, far, frequency).apply(&state);
        intervals.reverse();

        Branch {
            intervals,
            source_state,
        }
    }

    /// State at `x` on a branch, in the branch's own scale.
    pub(crate) fn branch_state_at(
        &self,
        profile: &BoreProfile,
        branch: &Branch,
        x: f64,
        frequency: f64,
    ) -> Option<AcousticState> {
        let interval = branch.intervals.iter().find(|i| i.contains(x))?;
        Some(self.duct(profile, x, interval.far, frequency).apply(&interval.far_state))
    }

    /// Transfer matrix of the bore from `from` to `to`, in either direction.
    pub fn duct(&self, profile: &BoreProfile, from: f64, to: f64, frequency: f64) -> TransferMatrix {
        let losses = self.physics.losses;
        let slices = profile.slices(from, to);
        let matrix = |r1: f64, r2: f64, length: f64| {
            TransferMatrix::frustum(&self.air, frequency, r1, r2, length, losses)
        };
        if from <= to {
            slices.iter().fold(TransferMatrix::identity(), |acc, s| {
                acc.chain(&matrix(0.5 * s.start_diameter, 0.5 * s.end_diameter, s.length))
            })
        } else {
            slices.iter().rev().fold(TransferMatrix::identity(), |acc, s| {
                acc.chain(&matrix(0.5 * s.end_diameter, 0.5 * s.start_diameter, s.length))
            })
        }
    }

    /// State at the base of a tone hole, looking into the hole.
    fn hole_shunt(
        &self,
        hole: &ToneHole,
        state: HoleState,
        bore_radius: f64,
        frequency: f64,
    ) -> AcousticState {
        let open = state.is_open();
        let outer = if open {
            self.physics
                .holes
                .state(&self.air, frequency, hole.outer_radius())
        } else {
            AcousticState::closed()
        };
        let chimney = TransferMatrix::frustum(
            &self.air,
            frequency,
            hole.radius(),
            hole.outer_radius(),
            hole.chimney_height,
            self.physics.losses,
        );
        chimney
            .apply(&outer)
            .with_series(self.inner_correction(hole, bore_radius, frequency, open))
    }

    fn inner_correction(&self, hole: &ToneHole, bore_radius: f64, frequency: f64, open: bool) -> Complex64 {
        let b = hole.radius();
        let omega = 2.0 * PI * frequency;
        let length = inner_length_correction(b, bore_radius, open);
        Complex64::new(0.0, omega * self.air.density * length / (PI * b * b))
    }
}

/// Adds a shunt in parallel without rescaling the main state.
fn with_shunt(state: &AcousticState, shunt: &AcousticState) -> AcousticState {
    if shunt.pressure == Complex64::new(0.0, 0.0) {
        // A pressure node at the hole.
        return state.in_parallel(shunt);
    }
    AcousticState::new(
        state.pressure,
        state.flow + state.pressure * shunt.admittance(),
    )
}

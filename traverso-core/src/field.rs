//! Pressure and flow along the main bore for a unit volume flow injected at
//! the excitation point.

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::fingering::Fingering;
use crate::geometry::BoreProfile;
use crate::solver::{AcousticSolver, Instrument};

/// Complex pressure and flow sampled along the bore at one frequency.
///
/// Flow is counted positive towards the foot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticField {
    pub frequency: f64,
    pub positions: Vec<f64>,
    #[serde(with = "complex_vec")]
    pub pressure: Vec<Complex64>,
    #[serde(with = "complex_vec")]
    pub flow: Vec<Complex64>,
}

impl AcousticField {
    /// |p(x)|.
    pub fn pressure_envelope(&self) -> Vec<f64> {
        self.pressure.iter().map(|p| p.norm()).collect()
    }

    /// |U(x)|.
    pub fn flow_envelope(&self) -> Vec<f64> {
        self.flow.iter().map(|u| u.norm()).collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Regular grid over the bore, always including both ends.
pub fn grid(profile: &BoreProfile, spacing: f64) -> Vec<f64> {
    let (start, end) = (profile.start(), profile.end());
    if !(spacing.is_finite() && spacing > 0.0) || end <= start {
        return vec![start, end];
    }
    let steps = ((end - start) / spacing).floor() as usize;
    let mut points: Vec<f64> = (0..=steps)
        .map(|i| (start + i as f64 * spacing).min(end))
        .collect();
    if points.last().is_some_and(|&x| end - x > 1e-12) {
        points.push(end);
    }
    points.dedup();
    points
}

impl AcousticSolver {
    /// Samples p(x) and U(x) on a grid of `spacing` metres.
    ///
    /// Scaled for a unit flow entering at the excitation point. If the input
    /// flow vanishes the field is scaled to unit input pressure instead.
    pub fn field(
        &self,
        instrument: &Instrument,
        fingering: &Fingering,
        frequency: f64,
        spacing: f64,
    ) -> AcousticField {
        let response = self.response(instrument, fingering, frequency);
        let zero = Complex64::new(0.0, 0.0);
        let normalization = if response.input.flow != zero {
            response.input.flow.inv()
        } else if response.input.pressure != zero {
            response.input.pressure.inv()
        } else {
            Complex64::new(1.0, 0.0)
        };

        let profile = instrument.profile();
        let positions = grid(profile, spacing);
        let mut pressure = Vec::with_capacity(positions.len());
        let mut flow = Vec::with_capacity(positions.len());

        for &x in &positions {
            let state = response
                .branches
                .iter()
                .find(|(branch, _, _)| branch.covers(x))
                .and_then(|(branch, factor, sign)| {
                    self.branch_state_at(profile, branch, x, frequency)
                        .map(|s| (s.scaled(factor * normalization), *sign))
                });
            match state {
                Some((s, sign)) => {
                    pressure.push(s.pressure);
                    flow.push(s.flow * sign);
                }
                None => {
                    pressure.push(zero);
                    flow.push(zero);
                }
            }
        }

        log::trace!(
            "[SOLVER] Field at {:.2} Hz over {} points",
            frequency,
            positions.len()
        );

        AcousticField {
            frequency,
            positions,
            pressure,
            flow,
        }
    }
}

/// Complex vectors as `[[re, im], ...]` in JSON.
pub(crate) mod complex_vec {
    use rustfft::num_complex::Complex64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[Complex64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|c| [c.re, c.im])
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Complex64>, D::Error> {
        let pairs = Vec::<[f64; 2]>::deserialize(deserializer)?;
        Ok(pairs.into_iter().map(|[re, im]| Complex64::new(re, im)).collect())
    }
}

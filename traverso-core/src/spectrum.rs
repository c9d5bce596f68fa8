//! # Spectral Analyzer Module
//!
//! Frequency sweeps of the input admittance and resonance detection.
//!
//! ## Features
//! - Admittance curves on a regular frequency grid
//! - Peak picking on the sampled curve with parabolic refinement
//! - Resonances refined by golden-section search on the solver itself

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fingering::Fingering;
use crate::solver::{AcousticSolver, Instrument};

const GOLDEN: f64 = 0.618_033_988_749_894_9;
const GOLDEN_TOLERANCE_HZ: f64 = 1e-6;
const GOLDEN_MAX_STEPS: usize = 100;

/// A regular frequency grid, `min..=max` by `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyRange {
    #[serde(rename = "min_frequency")]
    pub min: f64,
    #[serde(rename = "max_frequency")]
    pub max: f64,
    pub step: f64,
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min: 100.0,
            max: 3000.0,
            step: 2.0,
        }
    }
}

impl FrequencyRange {
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self, Error> {
        let range = Self { min, max, step };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.min.is_finite() && self.min > 0.0) {
            return Err(Error::InvalidRange(format!(
                "minimum {} Hz must be positive",
                self.min
            )));
        }
        if !(self.max.is_finite() && self.max > self.min) {
            return Err(Error::InvalidRange(format!(
                "maximum {} Hz must exceed minimum {} Hz",
                self.max, self.min
            )));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(Error::InvalidRange(format!(
                "step {} Hz must be positive",
                self.step
            )));
        }
        Ok(())
    }

    /// Grid frequencies; the maximum is included when it falls on the grid.
    pub fn frequencies(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize;
        (0..=count).map(|i| self.min + i as f64 * self.step).collect()
    }

    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.min && frequency <= self.max
    }
}

/// Input admittance sampled over a frequency grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmittanceCurve {
    pub frequencies: Vec<f64>,
    #[serde(with = "crate::field::complex_vec")]
    pub admittance: Vec<Complex64>,
}

impl AdmittanceCurve {
    pub fn magnitudes(&self) -> Vec<f64> {
        self.admittance.iter().map(|y| y.norm()).collect()
    }

    /// 20 log10 |Y|, relative to 1 m³/(Pa·s).
    pub fn magnitudes_db(&self) -> Vec<f64> {
        self.admittance
            .iter()
            .map(|y| 20.0 * y.norm().log10())
            .collect()
    }

    /// Interior local maxima of |Y| refined by parabolic interpolation.
    ///
    /// Interpolation runs on ln|Y| over the three samples around each peak,
    /// like a spectral-bin refinement. Only the sampled data is used.
    pub fn peak_frequencies(&self) -> Vec<f64> {
        let magnitudes = self.magnitudes();
        local_maxima(&magnitudes)
            .map(|i| {
                let f = self.frequencies[i];
                let (y1, y2, y3) = (
                    magnitudes[i - 1].ln(),
                    magnitudes[i].ln(),
                    magnitudes[i + 1].ln(),
                );
                if !(y1.is_finite() && y2.is_finite() && y3.is_finite()) {
                    return f;
                }
                let denominator = 2.0 * y2 - y1 - y3;
                if denominator.abs() < 1e-12 {
                    return f;
                }
                let shift = ((y3 - y1) / (2.0 * denominator)).clamp(-0.5, 0.5);
                let spacing = if shift >= 0.0 {
                    self.frequencies[i + 1] - f
                } else {
                    f - self.frequencies[i - 1]
                };
                f + shift * spacing
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// Indices `i` with `y[i-1] < y[i] >= y[i+1]`.
fn local_maxima(values: &[f64]) -> impl Iterator<Item = usize> + '_ {
    (1..values.len().saturating_sub(1))
        .filter(move |&i| values[i] > values[i - 1] && values[i] >= values[i + 1])
}

/// Evaluates the admittance over the range.
pub fn sweep(
    solver: &AcousticSolver,
    instrument: &Instrument,
    fingering: &Fingering,
    range: &FrequencyRange,
) -> Result<AdmittanceCurve, Error> {
    range.validate()?;
    let frequencies = range.frequencies();
    let admittance = frequencies
        .iter()
        .map(|&f| solver.admittance(instrument, fingering, f))
        .collect();
    log::debug!(
        "[SOLVER] Swept '{}' over {} points ({:.0}-{:.0} Hz)",
        fingering.note,
        frequencies.len(),
        range.min,
        range.max
    );
    Ok(AdmittanceCurve {
        frequencies,
        admittance,
    })
}

/// Admittance maxima inside the range, in increasing order.
///
/// Each grid peak is refined by golden-section search on |Y| between its two
/// neighbouring grid points.
pub fn resonances(
    solver: &AcousticSolver,
    instrument: &Instrument,
    fingering: &Fingering,
    range: &FrequencyRange,
) -> Result<Vec<f64>, Error> {
    let curve = sweep(solver, instrument, fingering, range)?;
    Ok(resonances_from_curve(solver, instrument, fingering, &curve, range))
}

/// Golden-section refinement of the grid peaks of an existing sweep.
pub fn resonances_from_curve(
    solver: &AcousticSolver,
    instrument: &Instrument,
    fingering: &Fingering,
    curve: &AdmittanceCurve,
    range: &FrequencyRange,
) -> Vec<f64> {
    let magnitude = |f: f64| solver.admittance(instrument, fingering, f).norm();
    let magnitudes = curve.magnitudes();

    let mut peaks: Vec<f64> = Vec::new();
    for i in local_maxima(&magnitudes) {
        let peak = golden_section_max(
            &magnitude,
            curve.frequencies[i - 1],
            curve.frequencies[i + 1],
        );
        if !range.contains(peak) {
            continue;
        }
        // Two grid peaks can refine onto the same maximum.
        if peaks.last().is_some_and(|&last| peak <= last + GOLDEN_TOLERANCE_HZ) {
            continue;
        }
        peaks.push(peak);
    }
    peaks
}

/// The lowest resonance in the range, stopping the sweep at the first peak.
///
/// Gives the same value as the first entry of [`resonances`].
pub fn first_resonance(
    solver: &AcousticSolver,
    instrument: &Instrument,
    fingering: &Fingering,
    range: &FrequencyRange,
) -> Result<Option<f64>, Error> {
    range.validate()?;
    let magnitude = |f: f64| solver.admittance(instrument, fingering, f).norm();
    let frequencies = range.frequencies();

    let mut window = [0.0; 3];
    for (i, &f) in frequencies.iter().enumerate() {
        window = [window[1], window[2], magnitude(f)];
        if i < 2 || !(window[1] > window[0] && window[1] >= window[2]) {
            continue;
        }
        let peak = golden_section_max(&magnitude, frequencies[i - 2], f);
        if range.contains(peak) {
            return Ok(Some(peak));
        }
    }
    Ok(None)
}

/// Maximizes `f` on `[a, b]`.
pub fn golden_section_max(f: &impl Fn(f64) -> f64, mut a: f64, mut b: f64) -> f64 {
    let mut c = b - GOLDEN * (b - a);
    let mut d = a + GOLDEN * (b - a);
    let (mut fc, mut fd) = (f(c), f(d));
    for _ in 0..GOLDEN_MAX_STEPS {
        if (b - a).abs() <= GOLDEN_TOLERANCE_HZ {
            break;
        }
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - GOLDEN * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + GOLDEN * (b - a);
            fd = f(d);
        }
    }
    0.5 * (a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoreProfile;
    use crate::solver::PhysicsConfig;
    use crate::transfer::Radiation;

    #[test]
    fn range_rejects_bad_bounds() {
        assert!(FrequencyRange::new(0.0, 100.0, 1.0).is_err());
        assert!(FrequencyRange::new(200.0, 100.0, 1.0).is_err());
        assert!(FrequencyRange::new(100.0, 200.0, 0.0).is_err());
    }

    #[test]
    fn grid_includes_both_ends() {
        let range = FrequencyRange::new(100.0, 3000.0, 2.0).unwrap();
        let f = range.frequencies();
        assert_eq!(f.len(), 1451);
        assert_eq!(f[0], 100.0);
        assert_eq!(f[f.len() - 1], 3000.0);
    }

    #[test]
    fn golden_section_finds_parabola_vertex() {
        let peak = golden_section_max(&|x: f64| -(x - 3.3) * (x - 3.3), 2.0, 5.0);
        assert!((peak - 3.3).abs() < 1e-5);
    }

    #[test]
    fn parabolic_peak_recovers_gaussian_centre() {
        let frequencies: Vec<f64> = (0..50).map(|i| 400.0 + 2.0 * i as f64).collect();
        let admittance = frequencies
            .iter()
            .map(|f| Complex64::new((-(f - 441.3_f64).powi(2) / 200.0).exp(), 0.0))
            .collect();
        let curve = AdmittanceCurve {
            frequencies,
            admittance,
        };
        let peaks = curve.peak_frequencies();
        assert_eq!(peaks.len(), 1);
        // ln of a Gaussian is a parabola, so the refinement is exact.
        assert!((peaks[0] - 441.3).abs() < 1e-9);
    }

    #[test]
    fn open_pipe_resonances_are_increasing_and_in_range() {
        let solver = AcousticSolver::new(PhysicsConfig {
            bell: Radiation::Unflanged,
            ..PhysicsConfig::default()
        });
        let pipe = Instrument::pipe(BoreProfile::cylinder(0.6, 0.018).unwrap());
        let range = FrequencyRange::new(100.0, 2000.0, 5.0).unwrap();
        let peaks = resonances(&solver, &pipe, &Fingering::default(), &range).unwrap();
        assert!(peaks.len() >= 5);
        assert!(peaks.windows(2).all(|w| w[1] > w[0]));
        assert!(peaks.iter().all(|&f| range.contains(f)));
    }
}

//! # Reflectance Module
//!
//! Time-domain reflection function of an instrument, computed from its input
//! impedance with an inverse FFT.
//!
//! ## Features
//! - Reflection coefficient `R = (Z - Zc) / (Z + Zc)` at the excitation point
//! - Half-Hann taper towards the Nyquist frequency to limit ringing
//! - Hermitian spectrum completion so the impulse response is real

use rustfft::{FftPlanner, num_complex::Complex64};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fingering::Fingering;
use crate::solver::{AcousticSolver, Excitation, Instrument};

/// Fraction of `df` used in place of 0 Hz, where the model is singular.
const DC_FRACTION: f64 = 1e-3;

/// Real impulse response of the input reflection coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionFunction {
    /// Sampling rate of `samples`, `n · df` in Hz.
    pub sample_rate: f64,
    pub samples: Vec<f64>,
}

impl ReflectionFunction {
    pub fn times(&self) -> Vec<f64> {
        (0..self.samples.len())
            .map(|i| i as f64 / self.sample_rate)
            .collect()
    }

    /// Index of the most negative sample at or after `skip`.
    pub fn strongest_negative(&self, skip: usize) -> Option<usize> {
        self.samples
            .iter()
            .enumerate()
            .skip(skip)
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Applies a half-Hann window to a one-sided spectrum: 1 at DC, 0 at Nyquist.
fn apply_half_hann_window(spectrum: &mut [Complex64]) {
    let n = spectrum.len();
    if n < 2 {
        return;
    }
    let last = (n - 1) as f64;
    for (k, value) in spectrum.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 + (std::f64::consts::PI * k as f64 / last).cos());
        *value *= multiplier;
    }
}

/// Samples R on `k · df` for `k = 0..=n/2` and transforms it to `n` real
/// samples at `n · df` Hz.
pub fn reflection_function(
    solver: &AcousticSolver,
    instrument: &Instrument,
    fingering: &Fingering,
    df: f64,
    n: usize,
) -> Result<ReflectionFunction, Error> {
    if !(df.is_finite() && df > 0.0) {
        return Err(Error::InvalidRange(format!("frequency step {df} Hz must be positive")));
    }
    if n < 4 || n % 2 != 0 {
        return Err(Error::InvalidRange(format!(
            "FFT length {n} must be even and at least 4"
        )));
    }

    let radius = match instrument.excitation() {
        Excitation::Entrance => instrument.profile().radius_at(instrument.profile().start()),
        Excitation::SideHole(hole) => Some(hole.outer_radius()),
    }
    .unwrap_or_default();
    let zc = solver.air().characteristic_impedance(radius);

    let half = n / 2;
    let mut one_sided: Vec<Complex64> = (0..=half)
        .map(|k| {
            let f = (k as f64 * df).max(df * DC_FRACTION);
            let z = solver.impedance(instrument, fingering, f);
            if z.re.is_infinite() {
                return Complex64::new(1.0, 0.0);
            }
            (z - zc) / (z + zc)
        })
        .collect();
    apply_half_hann_window(&mut one_sided);

    let mut buffer = vec![Complex64::new(0.0, 0.0); n];
    buffer[..=half].copy_from_slice(&one_sided);
    for (k, slot) in buffer.iter_mut().enumerate().skip(half + 1) {
        *slot = one_sided[n - k].conj();
    }

    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(n);
    ifft.process(&mut buffer);

    let scale = 1.0 / n as f64;
    let samples = buffer.iter().map(|c| c.re * scale).collect();

    log::debug!(
        "[SOLVER] Reflection function: {} samples at {:.0} Hz",
        n,
        n as f64 * df
    );

    Ok(ReflectionFunction {
        sample_rate: n as f64 * df,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_runs_from_one_to_zero() {
        let mut spectrum = vec![Complex64::new(1.0, 0.0); 5];
        apply_half_hann_window(&mut spectrum);
        assert_eq!(spectrum[0], Complex64::new(1.0, 0.0));
        assert!((spectrum[2].re - 0.5).abs() < 1e-12);
        assert!(spectrum[4].re.abs() < 1e-12);
    }

    #[test]
    fn rejects_odd_lengths() {
        let solver = AcousticSolver::new(Default::default());
        let pipe = Instrument::pipe(crate::geometry::BoreProfile::cylinder(0.5, 0.016).unwrap());
        assert!(reflection_function(&solver, &pipe, &Fingering::default(), 10.0, 1023).is_err());
        assert!(reflection_function(&solver, &pipe, &Fingering::default(), 0.0, 1024).is_err());
    }
}

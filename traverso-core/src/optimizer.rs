//! # Tuning Optimizer Module
//!
//! Finds the embouchure chimney height that puts a note's fundamental on its
//! target frequency.
//!
//! The fundamental falls as the chimney grows, so the residual
//! `fundamental(h) - target` is bracketed on the configured interval and
//! solved with the Illinois variant of regula falsi. Every evaluation works
//! on a fresh copy of the flute; the caller's flute is never touched.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::{Error, OptimizeError};
use crate::field::AcousticField;
use crate::fingering::{Fingering, FingeringChart};
use crate::geometry::Flute;
use crate::solver::{AcousticSolver, Instrument};
use crate::spectrum::{AdmittanceCurve, first_resonance, sweep};
use crate::tuning::{TuningTarget, cents_deviation};

/// Bracket width below which the search stops, in metres.
const MIN_BRACKET: f64 = 1e-9;

/// Result of a chimney optimization for one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChimneySolution {
    pub note: String,
    pub target_frequency: f64,
    /// Solved embouchure chimney height (m).
    pub chimney_height: f64,
    /// The input flute with the solved chimney.
    pub flute: Flute,
    /// Fundamental reached with the solved chimney (Hz).
    pub fundamental: f64,
    pub residual_hz: f64,
    pub residual_cents: f64,
    pub iterations: usize,
    pub initial_chimney: f64,
    pub initial_fundamental: Option<f64>,
    /// First-guess chimney from the end-correction shift, for reference.
    pub low_frequency_estimate: Option<f64>,
    pub initial_curve: AdmittanceCurve,
    pub optimized_curve: AdmittanceCurve,
    /// Fields at the target frequency and its octave.
    pub fields: Vec<AcousticField>,
}

/// First-guess chimney height from a frequency error.
///
/// Converts the end-correction shift between the resonance `f_res` and
/// the target into a chimney length, scaled by the embouchure-to-bore area
/// ratio `(d_emb / d_bore)²`.
pub fn low_frequency_estimate(
    current_height: f64,
    target_frequency: f64,
    resonance_frequency: f64,
    speed_of_sound: f64,
    area_ratio: f64,
) -> f64 {
    let shift = 0.5 * speed_of_sound * (1.0 / target_frequency - 1.0 / resonance_frequency);
    (current_height + shift) * area_ratio
}

struct Problem<'a> {
    flute: &'a Flute,
    fingering: &'a Fingering,
    solver: AcousticSolver,
    config: &'a AnalysisConfig,
    target: f64,
}

impl Problem<'_> {
    fn instrument(&self, chimney_height: f64) -> Result<Instrument, Error> {
        let flute = self.flute.with_embouchure_chimney(chimney_height);
        Ok(Instrument::from_flute(
            &flute,
            self.config.geometry.continuity_tolerance,
        )?)
    }

    fn fundamental(&self, chimney_height: f64) -> Result<f64, Error> {
        let instrument = self.instrument(chimney_height)?;
        first_resonance(&self.solver, &instrument, self.fingering, &self.config.sweep)?
            .ok_or_else(|| OptimizeError::NoResonance { chimney_height }.into())
    }

    fn residual(&self, chimney_height: f64) -> Result<f64, Error> {
        let residual = self.fundamental(chimney_height)? - self.target;
        log::trace!(
            "[OPTIM] h = {:.6} mm -> residual {:+.5} Hz",
            chimney_height * 1e3,
            residual
        );
        Ok(residual)
    }

    fn curve(&self, chimney_height: f64) -> Result<AdmittanceCurve, Error> {
        let instrument = self.instrument(chimney_height)?;
        sweep(&self.solver, &instrument, self.fingering, &self.config.sweep)
    }
}

/// Solves the embouchure chimney height for one fingering.
pub fn optimize_chimney_length(
    flute: &Flute,
    fingering: &Fingering,
    target: &TuningTarget,
    config: &AnalysisConfig,
) -> Result<ChimneySolution, Error> {
    let target_frequency = target.frequency;
    if !(target_frequency.is_finite() && target_frequency > 0.0) {
        return Err(OptimizeError::InvalidTarget(target_frequency).into());
    }
    let options = &config.optimizer;
    let (lower, upper) = (options.min_chimney, options.max_chimney);
    if !(lower.is_finite() && upper.is_finite() && lower >= 0.0 && upper > lower) {
        return Err(OptimizeError::InvalidInterval { lower, upper }.into());
    }
    config.sweep.validate()?;
    fingering.check_labels(&flute.hole_labels())?;

    let problem = Problem {
        flute,
        fingering,
        solver: AcousticSolver::new(config.physics),
        config,
        target: target_frequency,
    };

    let initial_chimney = flute.embouchure.chimney_height;
    let initial_curve = problem.curve(initial_chimney)?;
    let initial_fundamental = problem.fundamental(initial_chimney).ok();
    let low_frequency_estimate = initial_fundamental.and_then(|f_res| {
        let instrument = problem.instrument(initial_chimney).ok()?;
        let bore = instrument.profile().profile_at(flute.embouchure.position)?;
        let ratio = (flute.embouchure.diameter / bore).powi(2);
        Some(low_frequency_estimate(
            initial_chimney,
            target_frequency,
            f_res,
            problem.solver.air().speed_of_sound,
            ratio,
        ))
    });

    log::info!(
        "[OPTIM] '{}': target {:.3} Hz, start h = {:.3} mm (f1 = {})",
        fingering.note,
        target_frequency,
        initial_chimney * 1e3,
        initial_fundamental.map_or("none".to_string(), |f| format!("{f:.3} Hz"))
    );

    let (chimney_height, iterations) = match initial_fundamental {
        Some(f)
            if (f - target_frequency).abs() <= options.tolerance_hz
                && (lower..=upper).contains(&initial_chimney) =>
        {
            (initial_chimney, 0)
        }
        _ => illinois(
            |h| problem.residual(h),
            lower,
            upper,
            options.tolerance_hz,
            options.max_iterations,
        )?,
    };

    let fundamental = problem.fundamental(chimney_height)?;
    let residual_hz = fundamental - target_frequency;
    let optimized = flute.with_embouchure_chimney(chimney_height);
    let instrument = problem.instrument(chimney_height)?;
    let optimized_curve = sweep(&problem.solver, &instrument, fingering, &config.sweep)?;
    let fields = [target_frequency, 2.0 * target_frequency]
        .into_iter()
        .map(|f| {
            problem
                .solver
                .field(&instrument, fingering, f, config.fields.grid_spacing)
        })
        .collect();

    log::info!(
        "[OPTIM] '{}': h = {:.4} mm after {} iterations, f1 = {:.3} Hz ({:+.3} cents)",
        fingering.note,
        chimney_height * 1e3,
        iterations,
        fundamental,
        cents_deviation(fundamental, target_frequency)
    );

    Ok(ChimneySolution {
        note: fingering.note.clone(),
        target_frequency,
        chimney_height,
        flute: optimized,
        fundamental,
        residual_hz,
        residual_cents: cents_deviation(fundamental, target_frequency),
        iterations,
        initial_chimney,
        initial_fundamental,
        low_frequency_estimate,
        initial_curve,
        optimized_curve,
        fields,
    })
}

/// Illinois regula falsi on `[lower, upper]`; returns the root and the
/// number of iterations.
///
/// An iterate with no resonance in the sweep stops the search with
/// `IterationLimit`, keeping the best estimate found so far.
fn illinois(
    residual: impl Fn(f64) -> Result<f64, Error>,
    lower: f64,
    upper: f64,
    tolerance_hz: f64,
    max_iterations: usize,
) -> Result<(f64, usize), Error> {
    let (mut a, mut b) = (lower, upper);
    let (mut fa, mut fb) = (residual(a)?, residual(b)?);

    let mut best = if fa.abs() <= fb.abs() { (a, fa) } else { (b, fb) };
    if best.1.abs() <= tolerance_hz {
        return Ok((best.0, 0));
    }
    if fa.signum() == fb.signum() {
        return Err(OptimizeError::Convergence {
            lower,
            upper,
            best_estimate: best.0,
            residual_hz: best.1,
        }
        .into());
    }

    let mut side = 0i8;
    for iteration in 1..=max_iterations {
        let c = (a * fb - b * fa) / (fb - fa);
        let fc = match residual(c) {
            Ok(fc) => fc,
            Err(Error::Optimize(OptimizeError::NoResonance { chimney_height })) => {
                log::warn!(
                    "[OPTIM] no resonance at h = {:.6} mm; stopping at h = {:.6} mm",
                    chimney_height * 1e3,
                    best.0 * 1e3
                );
                return Err(OptimizeError::IterationLimit {
                    iterations: iteration,
                    best_estimate: best.0,
                    residual_hz: best.1,
                }
                .into());
            }
            Err(err) => return Err(err),
        };
        if fc.abs() < best.1.abs() {
            best = (c, fc);
        }
        log::debug!(
            "[OPTIM] iteration {}: h = {:.6} mm, residual {:+.5} Hz",
            iteration,
            c * 1e3,
            fc
        );

        if fc.abs() <= tolerance_hz {
            return Ok((c, iteration));
        }

        if fc.signum() == fb.signum() {
            b = c;
            fb = fc;
            if side == -1 {
                fa *= 0.5;
            }
            side = -1;
        } else {
            a = c;
            fa = fc;
            if side == 1 {
                fb *= 0.5;
            }
            side = 1;
        }

        if (b - a).abs() < MIN_BRACKET {
            return Ok((best.0, iteration));
        }
    }

    Err(OptimizeError::IterationLimit {
        iterations: max_iterations,
        best_estimate: best.0,
        residual_hz: best.1,
    }
    .into())
}

/// Optimizes every note of `chart` independently from the same flute.
///
/// One result per note, in chart order; a failing note does not stop the
/// others.
pub fn optimize_chart(
    flute: &Flute,
    chart: &FingeringChart,
    config: &AnalysisConfig,
) -> Vec<(String, Result<ChimneySolution, Error>)> {
    chart
        .fingerings
        .iter()
        .map(|fingering| {
            let result = TuningTarget::from_note(&fingering.note, config.tuning.reference_pitch)
                .map_err(Error::from)
                .and_then(|target| optimize_chimney_length(flute, fingering, &target, config));
            if let Err(err) = &result {
                log::warn!("[OPTIM] '{}' failed: {}", fingering.note, err);
            }
            (fingering.note.clone(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_adds_the_length_shift() {
        // Resonance too high -> longer effective length needed.
        let h = low_frequency_estimate(0.003, 400.0, 410.0, 343.0, 1.0);
        let expected = 0.003 + 0.5 * 343.0 * (1.0 / 400.0 - 1.0 / 410.0);
        assert!((h - expected).abs() < 1e-15);
        assert!(h > 0.003);
    }

    #[test]
    fn estimate_scales_with_area_ratio() {
        let full = low_frequency_estimate(0.004, 500.0, 500.0, 343.0, 1.0);
        let quarter = low_frequency_estimate(0.004, 500.0, 500.0, 343.0, 0.25);
        assert!((full - 0.004).abs() < 1e-15);
        assert!((quarter - 0.001).abs() < 1e-15);
    }

    #[test]
    fn illinois_finds_the_root_of_a_line() {
        let (root, iterations) = illinois(|h| Ok(100.0 - 400.0 * h), 0.0, 1.0, 1e-9, 50).unwrap();
        assert!((root - 0.25).abs() < 1e-9);
        assert!(iterations >= 1);
    }

    #[test]
    fn lost_resonance_keeps_the_best_estimate() {
        let residual = |h: f64| -> Result<f64, Error> {
            if (0.3..0.7).contains(&h) {
                Err(OptimizeError::NoResonance { chimney_height: h }.into())
            } else {
                Ok(0.5 - h)
            }
        };
        match illinois(residual, 0.0, 1.0, 1e-6, 20) {
            Err(Error::Optimize(OptimizeError::IterationLimit {
                iterations,
                best_estimate,
                residual_hz,
            })) => {
                assert_eq!(iterations, 1);
                assert_eq!(best_estimate, 0.0);
                assert_eq!(residual_hz, 0.5);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

use linreg::linear_regression;
use serde::{Deserialize, Serialize};

use crate::tuning::cents_deviation;

/// Deviation of one resonance from the harmonic series of the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partial {
    pub order: u32,          // k = 1 for the fundamental
    pub frequency: f64,      // resonance frequency in Hz
    pub ideal: f64,          // k × f1
    pub deviation_hz: f64,
    pub deviation_cents: f64,
}

/// Inharmonicity of one note's resonances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inharmonicity {
    pub partials: Vec<Partial>,
    /// Stretch coefficient B of `f_n = n f0 sqrt(1 + B n²)`.
    pub stretch: Option<f64>,
}

impl Inharmonicity {
    /// Compares every resonance with the matching multiple of the first one.
    pub fn from_resonances(resonances: &[f64]) -> Self {
        let Some(&fundamental) = resonances.first() else {
            return Self::default();
        };

        let partials: Vec<Partial> = resonances
            .iter()
            .enumerate()
            .map(|(i, &frequency)| {
                let order = (i + 1) as u32;
                let ideal = order as f64 * fundamental;
                Partial {
                    order,
                    frequency,
                    ideal,
                    deviation_hz: frequency - ideal,
                    deviation_cents: cents_deviation(frequency, ideal),
                }
            })
            .collect();

        let stretch = stretch_coefficient(&partials);
        Self { partials, stretch }
    }

    /// Second resonance against twice the first, in cents.
    pub fn octave_cents(&self) -> Option<f64> {
        self.partials.get(1).map(|p| p.deviation_cents)
    }
}

/// Fits `(f_n / n)²` against `n²`; B = slope / intercept.
pub fn stretch_coefficient(partials: &[Partial]) -> Option<f64> {
    if partials.len() < 3 {
        return None; // Need at least 3 points for a meaningful regression
    }

    let (xs, ys): (Vec<f64>, Vec<f64>) = partials
        .iter()
        .filter(|p| p.order > 0 && p.frequency > 0.0)
        .map(|p| {
            let n = p.order as f64;
            let per_order = p.frequency / n;
            (n * n, per_order * per_order)
        })
        .unzip();

    let (slope, intercept) = linear_regression::<_, _, f64>(&xs, &ys).ok()?;
    (intercept.abs() > 1e-6).then(|| slope / intercept)
}

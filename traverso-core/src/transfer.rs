//! # Transfer Matrix Module
//!
//! Plane-wave (cylinder) and spherical-wave (cone) two-port matrices relating
//! acoustic pressure and volume flow at the two ends of a duct, plus the
//! low-frequency radiation loads used to terminate them.
//!
//! A matrix `M` for a duct running from `x1` to `x2` maps the state at `x2`
//! to the state at `x1`: `[p1, U1] = M [p2, U2]`, with the flow counted in
//! the direction `x1 → x2`.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::air::Air;

const J: Complex64 = Complex64::new(0.0, 1.0);

/// Pressure and volume flow at one point of a duct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcousticState {
    pub pressure: Complex64,
    pub flow: Complex64,
}

impl AcousticState {
    pub fn new(pressure: Complex64, flow: Complex64) -> Self {
        Self { pressure, flow }
    }

    /// Rigid termination: no flow.
    pub fn closed() -> Self {
        Self::new(Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0))
    }

    /// Ideal pressure release: no pressure.
    pub fn pressure_release() -> Self {
        Self::new(Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0))
    }

    /// State seen by a load of impedance `z`, for unit flow.
    pub fn with_impedance(z: Complex64) -> Self {
        Self::new(z, Complex64::new(1.0, 0.0))
    }

    pub fn scaled(self, factor: Complex64) -> Self {
        Self::new(self.pressure * factor, self.flow * factor)
    }

    /// `p / U`; infinite when the flow vanishes.
    pub fn impedance(&self) -> Complex64 {
        if self.flow == Complex64::new(0.0, 0.0) {
            return Complex64::new(f64::INFINITY, 0.0);
        }
        self.pressure / self.flow
    }

    /// `U / p`; infinite when the pressure vanishes.
    pub fn admittance(&self) -> Complex64 {
        if self.pressure == Complex64::new(0.0, 0.0) {
            return Complex64::new(f64::INFINITY, 0.0);
        }
        self.flow / self.pressure
    }

    /// Adds a shunt branch of the given state in parallel at this point.
    ///
    /// Both branches share the pressure, so the combined state is scaled to
    /// the product of the two pressures instead of dividing by either.
    pub fn in_parallel(&self, other: &AcousticState) -> AcousticState {
        AcousticState::new(
            self.pressure * other.pressure,
            self.flow * other.pressure + other.flow * self.pressure,
        )
    }

    /// Inserts a series impedance upstream of this point.
    pub fn with_series(&self, z: Complex64) -> AcousticState {
        AcousticState::new(self.pressure + z * self.flow, self.flow)
    }
}

/// A 2×2 complex transfer matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferMatrix {
    pub a: Complex64,
    pub b: Complex64,
    pub c: Complex64,
    pub d: Complex64,
}

impl TransferMatrix {
    pub fn identity() -> Self {
        Self {
            a: Complex64::new(1.0, 0.0),
            b: Complex64::new(0.0, 0.0),
            c: Complex64::new(0.0, 0.0),
            d: Complex64::new(1.0, 0.0),
        }
    }

    /// `self · next`: this element followed by `next` further downstream.
    pub fn chain(&self, next: &TransferMatrix) -> TransferMatrix {
        TransferMatrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
        }
    }

    pub fn determinant(&self) -> Complex64 {
        self.a * self.d - self.b * self.c
    }

    /// Upstream state from the downstream one.
    pub fn apply(&self, state: &AcousticState) -> AcousticState {
        AcousticState::new(
            self.a * state.pressure + self.b * state.flow,
            self.c * state.pressure + self.d * state.flow,
        )
    }

    /// Input impedance of this element loaded by `load`.
    pub fn input_impedance(&self, load: &AcousticState) -> Complex64 {
        self.apply(load).impedance()
    }

    /// A uniform duct of radius `radius` and length `length`.
    pub fn cylinder(air: &Air, frequency: f64, radius: f64, length: f64, losses: bool) -> Self {
        let gamma = propagation_constant(air, frequency, radius, losses);
        let zc = air.characteristic_impedance(radius);
        let (ch, sh) = ((gamma * length).cosh(), (gamma * length).sinh());
        Self {
            a: ch,
            b: sh * zc,
            c: sh / zc,
            d: ch,
        }
    }

    /// A frustum from radius `r1` to radius `r2` over `length`.
    ///
    /// Falls back to a cylinder of the mean radius when the two radii agree
    /// to 1e-9 relative. Losses use the mean radius.
    pub fn frustum(air: &Air, frequency: f64, r1: f64, r2: f64, length: f64, losses: bool) -> Self {
        if length <= 0.0 {
            return Self::identity();
        }
        let mean = 0.5 * (r1 + r2);
        if (r2 - r1).abs() < 1e-9 * r1.max(r2) {
            return Self::cylinder(air, frequency, mean, length, losses);
        }

        let gamma = propagation_constant(air, frequency, mean, losses);
        let (ch, sh) = ((gamma * length).cosh(), (gamma * length).sinh());
        let rho_c = air.rho_c();

        // Signed distances from the cone apex; negative when converging.
        let x1 = r1 * length / (r2 - r1);
        let x2 = x1 + length;

        Self {
            a: ch * (x2 / x1) - sh / (gamma * x1),
            b: sh * (rho_c / (PI * r1 * r2)),
            c: (sh * (x2 / x1) + ch * length / (gamma * x1 * x1)
                - sh / (gamma * gamma * x1 * x1))
                * (PI * r1 * r1 / rho_c),
            d: ch * (x1 / x2) + sh / (gamma * x2),
        }
    }
}

/// Complex propagation constant Γ.
///
/// Lossless: `jω/c`. Lossy: boundary-layer attenuation α added to both the
/// real and the imaginary part.
pub fn propagation_constant(air: &Air, frequency: f64, radius: f64, losses: bool) -> Complex64 {
    let k = air.wavenumber(frequency);
    if !losses {
        return J * k;
    }
    let alpha = air.attenuation(frequency, radius);
    J * k + Complex64::new(alpha, alpha)
}

/// How an open end of a duct radiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Radiation {
    /// Rigidly closed.
    Closed,
    /// Ideal pressure release.
    Open,
    /// Thin-walled pipe end.
    Unflanged,
    /// Pipe end in an infinite baffle.
    Flanged,
}

impl Radiation {
    /// Radiation impedance; `None` for a closed end.
    pub fn impedance(&self, air: &Air, frequency: f64, radius: f64) -> Option<Complex64> {
        let zc = air.characteristic_impedance(radius);
        let ka = air.wavenumber(frequency) * radius;
        match self {
            Radiation::Closed => None,
            Radiation::Open => Some(Complex64::new(0.0, 0.0)),
            Radiation::Unflanged => Some(Complex64::new(0.25 * ka * ka, 0.6133 * ka) * zc),
            Radiation::Flanged => Some(Complex64::new(0.5 * ka * ka, 0.8216 * ka) * zc),
        }
    }

    /// Termination state, finite for every kind.
    pub fn state(&self, air: &Air, frequency: f64, radius: f64) -> AcousticState {
        match self {
            Radiation::Closed => AcousticState::closed(),
            Radiation::Open => AcousticState::pressure_release(),
            _ => self
                .impedance(air, frequency, radius)
                .map_or_else(AcousticState::closed, AcousticState::with_impedance),
        }
    }
}

//! Air properties as a function of temperature.
//!
//! Linear fits around 300 K for density, speed of sound, shear viscosity,
//! ratio of specific heats and the square root of the Prandtl number.

use serde::{Deserialize, Serialize};

/// Properties of air at a given temperature, in SI units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Air {
    /// Temperature in °C.
    pub temperature: f64,
    /// Density (kg/m³).
    pub density: f64,
    /// Speed of sound (m/s).
    pub speed_of_sound: f64,
    /// Shear viscosity (Pa·s).
    pub viscosity: f64,
    /// Ratio of specific heats.
    pub gamma: f64,
    /// Square root of the Prandtl number.
    pub prandtl_root: f64,
}

impl Air {
    pub fn at(temperature: f64) -> Self {
        let dt = temperature - 26.85;
        Self {
            temperature,
            density: 1.1769 * (1.0 - 0.00335 * dt),
            speed_of_sound: 347.23 * (1.0 + 0.00166 * dt),
            viscosity: 1.846e-5 * (1.0 + 0.0025 * dt),
            gamma: 1.4017 * (1.0 - 0.00002 * dt),
            prandtl_root: 0.8410 * (1.0 - 0.0002 * dt),
        }
    }

    /// ρc, the specific acoustic impedance of air.
    pub fn rho_c(&self) -> f64 {
        self.density * self.speed_of_sound
    }

    /// Characteristic impedance ρc/S of a duct of radius `radius`.
    pub fn characteristic_impedance(&self, radius: f64) -> f64 {
        self.rho_c() / (std::f64::consts::PI * radius * radius)
    }

    pub fn wavenumber(&self, frequency: f64) -> f64 {
        2.0 * std::f64::consts::PI * frequency / self.speed_of_sound
    }

    /// Visco-thermal boundary-layer attenuation (Np/m) in a duct of `radius`.
    pub fn attenuation(&self, frequency: f64, radius: f64) -> f64 {
        let omega = 2.0 * std::f64::consts::PI * frequency;
        let viscous = (omega * self.viscosity / (2.0 * self.density)).sqrt();
        viscous / (radius * self.speed_of_sound) * (1.0 + (self.gamma - 1.0) / self.prandtl_root)
    }
}

/// Speed of sound used by the descriptors: `331.3 sqrt(1 + T/273.15)`.
pub fn reference_speed_of_sound(temperature: f64) -> f64 {
    331.3 * (1.0 + temperature / 273.15).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_of_sound_at_room_temperature() {
        let air = Air::at(20.0);
        assert!((air.speed_of_sound - 343.28).abs() < 0.01);
        assert!((air.density - 1.2039).abs() < 1e-3);
    }

    #[test]
    fn warmer_air_is_faster_and_lighter() {
        let cold = Air::at(15.0);
        let warm = Air::at(30.0);
        assert!(warm.speed_of_sound > cold.speed_of_sound);
        assert!(warm.density < cold.density);
    }

    #[test]
    fn attenuation_grows_with_frequency_and_narrower_bores() {
        let air = Air::at(25.0);
        assert!(air.attenuation(1000.0, 0.008) > air.attenuation(250.0, 0.008));
        assert!(air.attenuation(500.0, 0.004) > air.attenuation(500.0, 0.008));
    }

    #[test]
    fn reference_speed_matches_textbook_value() {
        assert!((reference_speed_of_sound(0.0) - 331.3).abs() < 1e-12);
        assert!((reference_speed_of_sound(20.0) - 343.21).abs() < 0.01);
    }
}

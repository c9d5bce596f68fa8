//! Analysis configuration
//!
//! Every parameter of an analysis or optimization run lives here, loaded
//! from a JSON file whose missing fields fall back to their defaults. The
//! caller owns the configuration and passes it into every entry point.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::solver::PhysicsConfig;
use crate::spectrum::FrequencyRange;
use crate::tuning::BAROQUE_PITCH;

/// Complete analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub physics: PhysicsConfig,
    pub sweep: FrequencyRange,
    pub fields: FieldConfig,
    pub tuning: TuningConfig,
    pub optimizer: OptimizerConfig,
    pub geometry: GeometryConfig,
    /// Worker threads for per-note analysis (1 = inline)
    pub workers: usize,
}

impl Default for AnalysisConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            sweep: FrequencyRange::default(),
            fields: FieldConfig::default(),
            tuning: TuningConfig::default(),
            optimizer: OptimizerConfig::default(),
            geometry: GeometryConfig::default(),
            workers: 1,
        }
    }
}

/// Flow/pressure envelope sampling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Grid spacing along the bore, in metres
    pub grid_spacing: f64,
    /// Number of resonances per note for which fields are computed
    pub modes: usize,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            grid_spacing: 0.001,
            modes: 2,
        }
    }
}

/// Pitch reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Frequency of A, in Hz
    pub reference_pitch: f64,
    /// Temperature (°C) for the descriptors' reference speed of sound
    pub descriptor_temperature: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            reference_pitch: BAROQUE_PITCH,
            descriptor_temperature: 20.0,
        }
    }
}

/// Embouchure chimney search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Lower end of the chimney search interval, in metres
    pub min_chimney: f64,
    /// Upper end of the chimney search interval, in metres
    pub max_chimney: f64,
    pub max_iterations: usize,
    /// Accepted |fundamental - target|, in Hz
    pub tolerance_hz: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_chimney: 0.001,
            max_chimney: 0.010,
            max_iterations: 60,
            tolerance_hz: 1e-3,
        }
    }
}

/// Geometry validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Accepted position/diameter mismatch at part joints, in metres
    pub continuity_tolerance: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            continuity_tolerance: 1e-6,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file, falling back to defaults.
    ///
    /// Read and parse failures are logged and replaced by the default
    /// configuration. Use [`AnalysisConfig::try_load`] to surface them.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("[CONFIG] {:#}. Using defaults.", err);
                Self::default()
            }
        }
    }

    /// Load configuration from a JSON file.
    pub fn try_load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
        log::info!("[CONFIG] Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    /// Workers actually used; zero counts as one.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

//! Application state for one CLI invocation: the loaded flutes, the chart
//! and the configuration with command-line overrides applied. Everything is
//! passed into the core explicitly.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;

use traverso_core::document::{load_flute, save_flute};
use traverso_core::reflectance::{ReflectionFunction, reflection_function};
use traverso_core::{
    AcousticSolver, AnalysisConfig, ChimneySolution, FingeringChart, Flute, FluteAnalysis,
    Instrument, analyze_batch, optimize_chart,
};

/// Configuration file and the fields that can be overridden from the command line
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Configuration file (JSON); missing fields take their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Air temperature in °C
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Reference pitch of A in Hz
    #[arg(long)]
    pub pitch: Option<f64>,

    /// Disable visco-thermal losses
    #[arg(long)]
    pub lossless: bool,

    /// Worker threads for per-note analysis
    #[arg(long)]
    pub workers: Option<usize>,
}

impl Overrides {
    pub fn resolve(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::try_load(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(temperature) = self.temperature {
            config.physics.temperature = temperature;
        }
        if let Some(pitch) = self.pitch {
            if !(pitch.is_finite() && pitch > 0.0) {
                bail!("reference pitch must be positive, got {pitch}");
            }
            config.tuning.reference_pitch = pitch;
        }
        if self.lossless {
            config.physics.losses = false;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        Ok(config)
    }
}

pub struct Session {
    pub flutes: Vec<Flute>,
    pub chart: FingeringChart,
    pub config: AnalysisConfig,
}

impl Session {
    pub fn load(flutes: &[PathBuf], chart: &Path, overrides: &Overrides) -> Result<Self> {
        let config = overrides.resolve()?;
        let chart = FingeringChart::from_file(chart)
            .with_context(|| format!("Failed to read fingering chart {}", chart.display()))?;
        let flutes = flutes
            .iter()
            .map(|path| {
                load_flute(path).with_context(|| format!("Failed to load flute {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(
            "Loaded {} flute(s) and {} fingerings (A = {} Hz, {} °C)",
            flutes.len(),
            chart.len(),
            config.tuning.reference_pitch,
            config.physics.temperature
        );
        Ok(Self {
            flutes,
            chart,
            config,
        })
    }

    /// Keeps only `notes` in the chart, in the order given. Empty keeps all.
    pub fn with_notes(mut self, notes: &[String]) -> Result<Self> {
        if notes.is_empty() {
            return Ok(self);
        }
        let fingerings = notes
            .iter()
            .map(|note| self.chart.fingering(note).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        self.chart = FingeringChart::new(fingerings);
        Ok(self)
    }

    fn flute(&self) -> Result<&Flute> {
        self.flutes.first().context("no flute loaded")
    }

    pub fn analyze(&self) -> Vec<(String, traverso_core::Result<FluteAnalysis>)> {
        analyze_batch(&self.flutes, &self.chart, &self.config)
    }

    pub fn optimize(&self) -> Result<Vec<(String, traverso_core::Result<ChimneySolution>)>> {
        Ok(optimize_chart(self.flute()?, &self.chart, &self.config))
    }

    pub fn reflect(&self, note: &str, df: f64, samples: usize) -> Result<ReflectionFunction> {
        let fingering = self.chart.fingering(note)?;
        let instrument =
            Instrument::from_flute(self.flute()?, self.config.geometry.continuity_tolerance)?;
        let solver = AcousticSolver::new(self.config.physics);
        Ok(reflection_function(&solver, &instrument, fingering, df, samples)?)
    }
}

/// Writes every solved flute to `dir`.
pub fn save_solutions(
    results: &[(String, traverso_core::Result<ChimneySolution>)],
    dir: &Path,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    for solution in results.iter().filter_map(|(_, r)| r.as_ref().ok()) {
        let path = dir.join(format!("{}-{}.json", solution.flute.name, solution.note));
        save_flute(&solution.flute, &path)?;
    }
    Ok(())
}

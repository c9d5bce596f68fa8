//! # Analysis Module
//!
//! Runs the full per-note analysis over a fingering chart: admittance sweep,
//! resonances, inharmonicity, envelopes and descriptors.
//!
//! Notes are independent, so a chart can be spread over worker threads. Jobs
//! go out over a channel, results come back tagged with their chart index
//! and are put back in chart order.

use std::thread;

use serde::{Deserialize, Serialize};

use crate::air::reference_speed_of_sound;
use crate::config::AnalysisConfig;
use crate::descriptors::{BiEspe, Descriptor, DescriptorValue};
use crate::error::Error;
use crate::field::AcousticField;
use crate::fingering::{Fingering, FingeringChart};
use crate::geometry::Flute;
use crate::inharmonicity::Inharmonicity;
use crate::solver::{AcousticSolver, Instrument};
use crate::spectrum::{AdmittanceCurve, resonances_from_curve, sweep};
use crate::tuning::{TuningTarget, cents_deviation};

/// Everything computed for one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteAnalysis {
    pub note: String,
    /// `None` when the note name is not in the tuning table.
    pub target_frequency: Option<f64>,
    pub curve: AdmittanceCurve,
    pub resonances: Vec<f64>,
    pub inharmonicity: Inharmonicity,
    /// Fields at the first resonances.
    pub fields: Vec<AcousticField>,
    pub moc: Option<f64>,
    pub bi_espe: Option<BiEspe>,
    /// First resonance against the target, in cents.
    pub cents_deviation: Option<f64>,
}

impl NoteAnalysis {
    pub fn fundamental(&self) -> Option<f64> {
        self.resonances.first().copied()
    }
}

/// Analysis of every note of a chart on one flute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluteAnalysis {
    pub flute: String,
    pub reference_pitch: f64,
    pub notes: Vec<NoteAnalysis>,
}

/// Analyzes one fingering of an already validated instrument.
pub fn analyze_note(
    solver: &AcousticSolver,
    instrument: &Instrument,
    fingering: &Fingering,
    config: &AnalysisConfig,
) -> Result<NoteAnalysis, Error> {
    let curve = sweep(solver, instrument, fingering, &config.sweep)?;
    let resonances = resonances_from_curve(solver, instrument, fingering, &curve, &config.sweep);
    let inharmonicity = Inharmonicity::from_resonances(&resonances);

    let fields = resonances
        .iter()
        .take(config.fields.modes)
        .map(|&f| solver.field(instrument, fingering, f, config.fields.grid_spacing))
        .collect();

    let target_frequency = TuningTarget::from_note(&fingering.note, config.tuning.reference_pitch)
        .ok()
        .map(|t| t.frequency);

    let (mut moc, mut bi_espe) = (None, None);
    if let Some(target) = target_frequency {
        let c = reference_speed_of_sound(config.tuning.descriptor_temperature);
        for descriptor in Descriptor::ALL {
            match descriptor.compute(&curve, target, c) {
                Some(DescriptorValue::Moc(value)) => moc = Some(value),
                Some(DescriptorValue::BiEspe(value)) => bi_espe = Some(value),
                None => {}
            }
        }
    }

    let cents = target_frequency
        .zip(resonances.first().copied())
        .map(|(target, f1)| cents_deviation(f1, target));

    log::debug!(
        "[ANALYSIS] '{}': {} resonances, f1 = {:?} Hz, MOC = {:?}",
        fingering.note,
        resonances.len(),
        resonances.first(),
        moc
    );

    Ok(NoteAnalysis {
        note: fingering.note.clone(),
        target_frequency,
        curve,
        resonances,
        inharmonicity,
        fields,
        moc,
        bi_espe,
        cents_deviation: cents,
    })
}

/// Analyzes every note of `chart` on `flute`.
///
/// Geometry problems, and chart rows naming holes the flute lacks, abort the
/// whole flute. With `workers > 1` notes are
/// spread over scoped worker threads; the output is in chart order either
/// way.
pub fn analyze_flute(
    flute: &Flute,
    chart: &FingeringChart,
    config: &AnalysisConfig,
) -> Result<FluteAnalysis, Error> {
    config.sweep.validate()?;
    let instrument = Instrument::from_flute(flute, config.geometry.continuity_tolerance)?;
    chart.check_labels(&flute.hole_labels())?;
    let solver = AcousticSolver::new(config.physics);
    let workers = config.worker_count().min(chart.len().max(1));

    log::info!(
        "[ANALYSIS] '{}': {} notes on {} worker(s)",
        flute.name,
        chart.len(),
        workers
    );

    let notes = if workers <= 1 {
        chart
            .fingerings
            .iter()
            .map(|fingering| analyze_note(&solver, &instrument, fingering, config))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        analyze_parallel(&solver, &instrument, chart, config, workers)?
    };

    Ok(FluteAnalysis {
        flute: flute.name.clone(),
        reference_pitch: config.tuning.reference_pitch,
        notes,
    })
}

fn analyze_parallel(
    solver: &AcousticSolver,
    instrument: &Instrument,
    chart: &FingeringChart,
    config: &AnalysisConfig,
    workers: usize,
) -> Result<Vec<NoteAnalysis>, Error> {
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &Fingering)>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded();

    for job in chart.fingerings.iter().enumerate() {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (index, fingering) in job_rx.iter() {
                    let result = analyze_note(solver, instrument, fingering, config);
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut tagged: Vec<(usize, Result<NoteAnalysis, Error>)> = result_rx.iter().collect();
    tagged.sort_by_key(|(index, _)| *index);
    tagged.into_iter().map(|(_, result)| result).collect()
}

/// Analyzes several flutes with the same chart, one result per flute.
pub fn analyze_batch(
    flutes: &[Flute],
    chart: &FingeringChart,
    config: &AnalysisConfig,
) -> Vec<(String, Result<FluteAnalysis, Error>)> {
    flutes
        .iter()
        .map(|flute| {
            let result = analyze_flute(flute, chart, config);
            if let Err(err) = &result {
                log::warn!("[ANALYSIS] '{}' skipped: {}", flute.name, err);
            }
            (flute.name.clone(), result)
        })
        .collect()
}

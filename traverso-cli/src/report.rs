//! Text and JSON rendering of analysis, optimization and reflection results.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use traverso_core::reflectance::ReflectionFunction;
use traverso_core::{ChimneySolution, FluteAnalysis, NoteAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// One flute or note of a batch: either its result or the error message.
#[derive(Serialize)]
struct Entry<'a, T> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn entries<'a, T>(results: &'a [(String, traverso_core::Result<T>)]) -> Vec<Entry<'a, T>> {
    results
        .iter()
        .map(|(name, result)| Entry {
            name,
            result: result.as_ref().ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        })
        .collect()
}

fn value(v: Option<f64>, precision: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

fn signed(v: Option<f64>, precision: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:+.precision$}"))
}

fn note_row(note: &NoteAnalysis) -> String {
    let bi_espe = note.bi_espe;
    format!(
        "{:<6} {:>9} {:>9} {:>8} {:>9} {:>8} {:>7} {:>8} {:>8}",
        note.note,
        value(note.target_frequency, 2),
        value(note.fundamental(), 2),
        signed(note.cents_deviation, 1),
        value(note.resonances.get(1).copied(), 2),
        signed(note.inharmonicity.octave_cents(), 1),
        value(note.moc, 3),
        signed(bi_espe.map(|b| b.bi_cents), 1),
        signed(bi_espe.and_then(|b| b.espe_cents), 1),
    )
}

pub fn analysis(
    results: &[(String, traverso_core::Result<FluteAnalysis>)],
    format: Format,
) -> Result<String> {
    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(&entries(results))?);
    }

    let mut out = String::new();
    for (name, result) in results {
        match result {
            Ok(analysis) => {
                writeln!(out, "Flute '{}' (A = {:.1} Hz)", name, analysis.reference_pitch)?;
                writeln!(
                    out,
                    "{:<6} {:>9} {:>9} {:>8} {:>9} {:>8} {:>7} {:>8} {:>8}",
                    "note", "target", "f1", "cents", "f2", "octave", "MOC", "BI", "ESPE"
                )?;
                for note in &analysis.notes {
                    writeln!(out, "{}", note_row(note))?;
                }
            }
            Err(err) => writeln!(out, "Flute '{}': {}", name, err)?,
        }
        writeln!(out)?;
    }
    Ok(out)
}

pub fn optimization(
    results: &[(String, traverso_core::Result<ChimneySolution>)],
    format: Format,
) -> Result<String> {
    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(&entries(results))?);
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<6} {:>10} {:>11} {:>10} {:>9} {:>6}",
        "note", "target", "chimney mm", "f1", "cents", "iter"
    )?;
    for (note, result) in results {
        match result {
            Ok(s) => writeln!(
                out,
                "{:<6} {:>10.3} {:>11.4} {:>10.3} {:>+9.3} {:>6}",
                note,
                s.target_frequency,
                s.chimney_height * 1e3,
                s.fundamental,
                s.residual_cents,
                s.iterations
            )?,
            Err(err) => writeln!(out, "{:<6} failed: {}", note, err)?,
        }
    }
    Ok(out)
}

pub fn reflection(note: &str, reflection: &ReflectionFunction, format: Format) -> Result<String> {
    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(reflection)?);
    }

    let mut out = String::new();
    writeln!(out, "# reflection function of '{}' at {:.0} Hz", note, reflection.sample_rate)?;
    if let Some(echo) = reflection.strongest_negative(1) {
        writeln!(
            out,
            "# strongest negative sample {} at {:.3} ms",
            echo,
            echo as f64 / reflection.sample_rate * 1e3
        )?;
    }
    for (t, r) in reflection.times().iter().zip(&reflection.samples) {
        writeln!(out, "{:.6e} {:+.6e}", t, r)?;
    }
    Ok(out)
}

/// Prints the report, or writes it to `path`.
pub fn emit(report: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, report).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => print!("{report}"),
    }
    Ok(())
}

//! # Descriptor Engine
//!
//! Research descriptors derived from the first two admittance peaks of a
//! note and the frequency the note is meant to sound at.
//!
//! - **MOC**: detuning of the second resonance from the octave, relative to
//!   the detuning of the first resonance, in period terms.
//! - **BI_ESPE**: the first resonance's detuning in cents (B_I) and the
//!   mismatch of the length corrections of the two resonances, also in
//!   cents (ESPE).
//!
//! Both are pure functions of the curve: the same curve always gives the
//! same bits.

use serde::{Deserialize, Serialize};

use crate::spectrum::AdmittanceCurve;

const DENOMINATOR_EPSILON: f64 = 1e-9;

/// The closed set of descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Descriptor {
    Moc,
    BiEspe,
}

impl Descriptor {
    pub const ALL: [Descriptor; 2] = [Descriptor::Moc, Descriptor::BiEspe];

    pub fn name(&self) -> &'static str {
        match self {
            Descriptor::Moc => "MOC",
            Descriptor::BiEspe => "BI_ESPE",
        }
    }

    /// Evaluates this descriptor.
    ///
    /// `speed_of_sound` is only used by BI_ESPE.
    pub fn compute(
        &self,
        curve: &AdmittanceCurve,
        playing_frequency: f64,
        speed_of_sound: f64,
    ) -> Option<DescriptorValue> {
        match self {
            Descriptor::Moc => compute_moc(curve, playing_frequency).map(DescriptorValue::Moc),
            Descriptor::BiEspe => compute_bi_espe(curve, playing_frequency, speed_of_sound)
                .map(DescriptorValue::BiEspe),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorValue {
    Moc(f64),
    BiEspe(BiEspe),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiEspe {
    /// First resonance detuning, `1200 log2(f_play / f0)`.
    pub bi_cents: f64,
    /// Length-correction mismatch; `None` when the corrected length is not positive.
    pub espe_cents: Option<f64>,
}

fn first_two_peaks(curve: &AdmittanceCurve) -> Option<(f64, f64)> {
    let peaks = curve.peak_frequencies();
    match peaks.as_slice() {
        [f0, f1, ..] => Some((*f0, *f1)),
        _ => None,
    }
}

pub fn moc(f0: f64, f1: f64, playing_frequency: f64) -> Option<f64> {
    if f0 == playing_frequency || f1 == 2.0 * playing_frequency {
        return None;
    }
    let numerator = 1.0 / f1 - 1.0 / (2.0 * playing_frequency);
    let denominator = 1.0 / f0 - 1.0 / playing_frequency;
    if denominator.abs() <= DENOMINATOR_EPSILON {
        return None;
    }
    Some(numerator / denominator)
}

pub fn bi_espe(f0: f64, f1: f64, playing_frequency: f64, speed_of_sound: f64) -> BiEspe {
    let c = speed_of_sound;
    let bi_cents = 1200.0 * (playing_frequency / f0).log2();

    let delta_first = 0.5 * c * (1.0 / playing_frequency - 1.0 / f0);
    let delta_second = c * (1.0 / (2.0 * playing_frequency) - 1.0 / f1);
    let mismatch = delta_second - delta_first;
    let effective_length = c / (2.0 * playing_frequency);

    let corrected = effective_length + mismatch;
    let espe_cents =
        (corrected > DENOMINATOR_EPSILON).then(|| 1200.0 * (effective_length / corrected).log2());

    BiEspe {
        bi_cents,
        espe_cents,
    }
}

/// MOC from the first two peaks of `curve`.
pub fn compute_moc(curve: &AdmittanceCurve, playing_frequency: f64) -> Option<f64> {
    let (f0, f1) = first_two_peaks(curve)?;
    moc(f0, f1, playing_frequency)
}

/// BI and ESPE from the first two peaks of `curve`.
pub fn compute_bi_espe(
    curve: &AdmittanceCurve,
    playing_frequency: f64,
    speed_of_sound: f64,
) -> Option<BiEspe> {
    let (f0, f1) = first_two_peaks(curve)?;
    Some(bi_espe(f0, f1, playing_frequency, speed_of_sound))
}

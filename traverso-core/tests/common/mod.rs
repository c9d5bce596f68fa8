#![allow(dead_code)]

use traverso_core::{
    BoreSegment, Fingering, FingeringChart, Flute, FlutePart, HoleState, PartKind, ToneHole,
};

pub const DEMO_CHART: &str = include_str!("../../../demos/demo_chart.txt");

/// Diameter of the demo bore's conical section at `x` (m).
fn cone_diameter(x: f64) -> f64 {
    0.010 - 0.004 * (x - 0.075) / 0.325
}

fn cone(x0: f64, x1: f64) -> BoreSegment {
    BoreSegment::between(x0, cone_diameter(x0), x1, cone_diameter(x1))
}

fn hole(label: &str, position: f64, diameter: f64) -> ToneHole {
    ToneHole::new(label, position, diameter, 0.003)
}

/// A small five-hole traverso: cylindrical head, conical body.
pub fn demo_flute() -> Flute {
    Flute {
        name: "demo-traverso".to_string(),
        headjoint: FlutePart::new(PartKind::Headjoint).with_segments(vec![
            BoreSegment::new(0.0, 0.075, 0.010, 0.010),
            cone(0.075, 0.090),
        ]),
        left: FlutePart::new(PartKind::Left)
            .with_segments(vec![cone(0.090, 0.225)])
            .with_holes(vec![hole("hole1", 0.100, 0.007), hole("hole2", 0.200, 0.005)]),
        right: FlutePart::new(PartKind::Right)
            .with_segments(vec![cone(0.225, 0.325)])
            .with_holes(vec![hole("hole3", 0.250, 0.005), hole("hole4", 0.300, 0.004)]),
        foot: FlutePart::new(PartKind::Foot)
            .with_segments(vec![cone(0.325, 0.400)])
            .with_holes(vec![hole("hole5", 0.350, 0.004)]),
        embouchure: ToneHole::new("embouchure", 0.020, 0.008, 0.005),
    }
}

pub fn demo_chart() -> FingeringChart {
    FingeringChart::parse(DEMO_CHART).expect("demo chart parses")
}

/// Only the first hole closed.
pub fn one_closed(note: &str) -> Fingering {
    Fingering::all_open(note).with_state("hole1", HoleState::Closed)
}

mod common;

use common::{DEMO_CHART, demo_chart, demo_flute};
use traverso_core::error::{FingeringError, GeometryError};
use traverso_core::{
    AcousticSolver, AnalysisConfig, BoreSegment, Error, FingeringChart, Instrument, ToneHole,
    analyze_batch, analyze_flute, analyze_note,
};

#[test]
fn demo_chart_matches_the_demo_flute() {
    let chart = demo_chart();
    let flute = demo_flute();
    assert_eq!(chart.notes().collect::<Vec<_>>(), ["A", "D2", "F2", "A2"]);
    for hole in flute.tone_holes() {
        assert!(chart.fingerings.iter().all(|f| f.states.contains_key(&hole.label)));
    }
}

#[test]
fn demo_flute_document_loads_and_validates() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/demo_flute.json");
    let loaded = traverso_core::document::load_flute(path).unwrap();
    let profile = loaded.validate(1e-6).unwrap();
    let reference = demo_flute().validate(1e-6).unwrap();
    assert!((profile.length() - reference.length()).abs() < 1e-9);
    assert_eq!(loaded.tone_holes().len(), 5);
}

#[test]
fn fundamentals_rise_as_holes_open() {
    let config = AnalysisConfig::default();
    let analysis = analyze_flute(&demo_flute(), &demo_chart(), &config).unwrap();
    let fundamentals: Vec<f64> = analysis
        .notes
        .iter()
        .map(|n| n.fundamental().unwrap())
        .collect();
    assert!(fundamentals.windows(2).all(|w| w[0] < w[1]), "{fundamentals:?}");
    for note in &analysis.notes {
        assert!(note.resonances.windows(2).all(|w| w[0] < w[1]));
        assert!(note.target_frequency.is_some());
        assert!(note.moc.is_some());
        assert_eq!(note.fields.len(), config.fields.modes);
    }
}

#[test]
fn parallel_analysis_matches_inline_analysis() {
    let inline = AnalysisConfig::default();
    let parallel = AnalysisConfig {
        workers: 3,
        ..AnalysisConfig::default()
    };
    let a = analyze_flute(&demo_flute(), &demo_chart(), &inline).unwrap();
    let b = analyze_flute(&demo_flute(), &demo_chart(), &parallel).unwrap();
    assert_eq!(a, b);
}

#[test]
fn descriptors_are_reproducible() {
    let config = AnalysisConfig::default();
    let flute = demo_flute();
    let instrument = Instrument::from_flute(&flute, 1e-6).unwrap();
    let solver = AcousticSolver::new(config.physics);
    let fingering = demo_chart().fingering("D2").unwrap().clone();
    let first = analyze_note(&solver, &instrument, &fingering, &config).unwrap();
    let second = analyze_note(&solver, &instrument, &fingering, &config).unwrap();
    assert_eq!(first.moc.map(f64::to_bits), second.moc.map(f64::to_bits));
    assert_eq!(first.bi_espe, second.bi_espe);
}

#[test]
fn cork_end_carries_no_flow() {
    let config = AnalysisConfig::default();
    let analysis = analyze_flute(&demo_flute(), &demo_chart(), &config).unwrap();
    for note in &analysis.notes {
        for field in &note.fields {
            let flow = field.flow_envelope();
            let peak = flow.iter().cloned().fold(0.0, f64::max);
            assert_eq!(field.positions[0], 0.0);
            assert!(flow[0] <= 1e-9 * peak, "{}: {}", note.note, flow[0]);
        }
    }
}

#[test]
fn a_diameter_step_between_joints_is_rejected() {
    let mut flute = demo_flute();
    flute.right.segments[0].start_diameter += 0.0005;
    let err = analyze_flute(&flute, &demo_chart(), &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Geometry(GeometryError::Discontinuity { .. })), "{err}");
}

#[test]
fn a_gap_between_joints_is_rejected() {
    let mut flute = demo_flute();
    let segment = flute.foot.segments[0];
    flute.foot.segments[0] = BoreSegment::new(
        segment.position + 0.002,
        segment.length - 0.002,
        segment.start_diameter,
        segment.end_diameter,
    );
    assert!(Instrument::from_flute(&flute, 1e-6).is_err());
}

#[test]
fn a_chart_row_for_a_missing_hole_is_rejected() {
    let chart = FingeringChart::parse(&format!("{DEMO_CHART}hole6      x  x  x  x\n")).unwrap();
    let err = analyze_flute(&demo_flute(), &chart, &AnalysisConfig::default()).unwrap_err();
    match err {
        Error::Fingering(FingeringError::UnknownHole { note, label }) => {
            assert_eq!(note, "A");
            assert_eq!(label, "hole6");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn a_hole_at_the_foot_end_is_rejected() {
    let mut flute = demo_flute();
    flute.foot.holes.push(ToneHole::new("hole6", 0.400, 0.004, 0.003));
    let err = analyze_flute(&flute, &demo_chart(), &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Geometry(GeometryError::HoleOutsideBore { .. })), "{err}");
}

#[test]
fn a_hole_under_the_embouchure_is_rejected() {
    let mut flute = demo_flute();
    flute.headjoint.holes.push(ToneHole::new("hole6", 0.020, 0.004, 0.003));
    let err = Instrument::from_flute(&flute, 1e-6).unwrap_err();
    assert!(matches!(err, GeometryError::InvalidHole { ref label, .. } if label == "hole6"));
}

#[test]
fn batch_analysis_continues_past_a_broken_flute() {
    let mut broken = demo_flute();
    broken.name = "broken".to_string();
    broken.left.segments[0].end_diameter += 0.001;
    let results = analyze_batch(
        &[broken, demo_flute()],
        &demo_chart(),
        &AnalysisConfig::default(),
    );
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "broken");
    assert!(results[0].1.is_err());
    assert_eq!(results[1].1.as_ref().unwrap().notes.len(), 4);
}

#[test]
fn demo_config_loads_with_defaults_filled_in() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/demo_config.json");
    let config = AnalysisConfig::try_load(path).unwrap();
    assert_eq!(config.workers, 2);
    assert_eq!(config.optimizer, AnalysisConfig::default().optimizer);
}

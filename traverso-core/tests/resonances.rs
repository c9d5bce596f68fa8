use traverso_core::inharmonicity::Inharmonicity;
use traverso_core::spectrum::{first_resonance, resonances};
use traverso_core::transfer::Radiation;
use traverso_core::{AcousticSolver, BoreProfile, Fingering, FrequencyRange, Instrument, PhysicsConfig};

const LENGTH: f64 = 0.5;
const DIAMETER: f64 = 0.016;

fn physics(losses: bool, bell: Radiation) -> PhysicsConfig {
    PhysicsConfig {
        temperature: 20.0,
        losses,
        entrance: Radiation::Closed,
        holes: Radiation::Unflanged,
        bell,
    }
}

fn cylinder_resonances(physics: PhysicsConfig) -> (Vec<f64>, f64) {
    let solver = AcousticSolver::new(physics);
    let pipe = Instrument::pipe(BoreProfile::cylinder(LENGTH, DIAMETER).unwrap());
    let range = FrequencyRange::new(50.0, 2000.0, 1.0).unwrap();
    let peaks = resonances(&solver, &pipe, &Fingering::default(), &range).unwrap();
    (peaks, solver.air().speed_of_sound)
}

#[test]
fn closed_cylinder_has_odd_quarter_wave_resonances() {
    let (peaks, c) = cylinder_resonances(physics(false, Radiation::Closed));
    assert!(peaks.len() >= 3);
    for (n, &f) in peaks.iter().take(3).enumerate() {
        let expected = (2 * n + 1) as f64 * c / (4.0 * LENGTH);
        assert!((f - expected).abs() < 1e-3, "mode {n}: {f} vs {expected}");
    }
}

#[test]
fn open_cylinder_has_half_wave_resonances() {
    let (peaks, c) = cylinder_resonances(physics(false, Radiation::Open));
    assert!(peaks.len() >= 3);
    for (n, &f) in peaks.iter().take(3).enumerate() {
        let expected = (n + 1) as f64 * c / (2.0 * LENGTH);
        assert!((f - expected).abs() < 1e-3, "mode {n}: {f} vs {expected}");
    }
}

#[test]
fn unflanged_radiation_lowers_the_fundamental_by_its_end_correction() {
    let (peaks, c) = cylinder_resonances(physics(true, Radiation::Unflanged));
    let radius = 0.5 * DIAMETER;
    let expected = c / (2.0 * (LENGTH + 0.6133 * radius));
    let f1 = peaks[0];
    assert!((f1 - expected).abs() / expected < 0.015, "{f1} vs {expected}");
    assert!(f1 < c / (2.0 * LENGTH));
}

#[test]
fn lossless_open_cylinder_is_harmonic() {
    let (peaks, _) = cylinder_resonances(physics(false, Radiation::Open));
    let inharmonicity = Inharmonicity::from_resonances(&peaks[..4]);
    for partial in &inharmonicity.partials {
        assert!(
            partial.deviation_cents.abs() < 0.01,
            "partial {} off by {} cents",
            partial.order,
            partial.deviation_cents
        );
    }
}

#[test]
fn resonances_are_strictly_increasing() {
    let (peaks, _) = cylinder_resonances(physics(true, Radiation::Unflanged));
    assert!(peaks.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn first_resonance_matches_the_full_search() {
    let solver = AcousticSolver::new(physics(true, Radiation::Unflanged));
    let pipe = Instrument::pipe(BoreProfile::cone(LENGTH, 0.018, 0.012).unwrap());
    let range = FrequencyRange::new(100.0, 1500.0, 2.0).unwrap();
    let fingering = Fingering::default();
    let all = resonances(&solver, &pipe, &fingering, &range).unwrap();
    let first = first_resonance(&solver, &pipe, &fingering, &range).unwrap();
    assert_eq!(first, all.first().copied());
}

//! Randomized property checks with fixed seeds
//!
//! Random state sequences and random stochastic matrices are generated from a
//! seeded ChaCha stream so every run sees the same inputs.

use assert_approx_eq::assert_approx_eq;
use markov_finance::{
    analyze_graph, analyze_stationarity, estimate_transition_matrix, AnalysisConfig,
    ConnectivityMode, HittingTimeSolver, PredictorEngine, StationaryMethod, TransitionMatrix,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const CASES: usize = 40;

fn random_sequence(rng: &mut ChaCha8Rng, n_states: usize, len: usize) -> Vec<usize> {
    (0..len).map(|_| rng.gen_range(0..n_states)).collect()
}

fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("S{}", i)).collect()
}

/// Dense matrix with every entry positive, hence irreducible and aperiodic.
fn random_positive_matrix(rng: &mut ChaCha8Rng, n: usize) -> TransitionMatrix {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            let raw: Vec<f64> = (0..n).map(|_| rng.gen_range(0.05..1.0)).collect();
            let total: f64 = raw.iter().sum();
            raw.into_iter().map(|v| v / total).collect()
        })
        .collect();
    TransitionMatrix::from_rows(labels(n), &rows).unwrap()
}

#[test]
fn test_rows_are_stochastic_or_zero() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..CASES {
        let n = rng.gen_range(1..8);
        let len = rng.gen_range(1..60);
        let seq = random_sequence(&mut rng, n, len);
        let m = estimate_transition_matrix(&seq, labels(n)).unwrap();
        for i in 0..n {
            if m.has_outgoing(i) {
                assert_approx_eq!(m.row_sum(i), 1.0, 1e-9);
            } else {
                assert_eq!(m.row_sum(i), 0.0);
            }
        }
    }
}

#[test]
fn test_estimation_is_deterministic() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for _ in 0..CASES {
        let seq = random_sequence(&mut rng, 5, 80);
        let a = estimate_transition_matrix(&seq, labels(5)).unwrap();
        let b = estimate_transition_matrix(&seq, labels(5)).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_partition_covers_alphabet() {
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    for _ in 0..CASES {
        let n = rng.gen_range(1..10);
        let len = rng.gen_range(2..30);
        let seq = random_sequence(&mut rng, n, len);
        let m = estimate_transition_matrix(&seq, labels(n)).unwrap();
        for mode in [ConnectivityMode::Weak, ConnectivityMode::Strong] {
            let g = analyze_graph(&m, mode);
            let mut seen = vec![0usize; n];
            for class in &g.classes {
                for &s in &class.states {
                    seen[s] += 1;
                }
            }
            assert!(seen.iter().all(|&c| c == 1), "mode {:?}: {:?}", mode, seen);
        }
    }
}

#[test]
fn test_forecast_conserves_mass() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    for _ in 0..CASES {
        let n = rng.gen_range(2..8);
        let m = random_positive_matrix(&mut rng, n);
        let start = rng.gen_range(0..n);
        let f = PredictorEngine::new(&m).forecast_from_index(start, 10).unwrap();
        assert!(f.reliable);
        for step in &f.steps {
            assert_approx_eq!(step.total_mass(), 1.0, 1e-9);
        }
    }
}

#[test]
fn test_stationary_fixed_point_for_irreducible_chains() {
    let mut rng = ChaCha8Rng::seed_from_u64(19);
    let methods = [
        StationaryMethod::Eigenvector,
        StationaryMethod::PowerIteration,
        StationaryMethod::LinearSystem,
    ];
    for _ in 0..CASES {
        let n = rng.gen_range(2..8);
        let m = random_positive_matrix(&mut rng, n);
        for method in methods {
            let config = AnalysisConfig::default().with_stationary_method(method);
            let result = analyze_stationarity(&m, &config).unwrap();
            let pi = &result.distribution;
            for j in 0..n {
                let next: f64 = (0..n).map(|i| pi[i] * m.probability(i, j)).sum();
                assert!((next - pi[j]).abs() < 1e-8, "{:?}: {} vs {}", method, next, pi[j]);
            }
        }
    }
}

#[test]
fn test_hitting_time_zero_on_targets() {
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    for _ in 0..CASES {
        let n = rng.gen_range(2..8);
        let len = rng.gen_range(2..40);
        let seq = random_sequence(&mut rng, n, len);
        let m = estimate_transition_matrix(&seq, labels(n)).unwrap();
        let targets: Vec<usize> = (0..n).filter(|_| rng.gen_bool(0.3)).collect();
        let targets = if targets.is_empty() { vec![0] } else { targets };
        let h = HittingTimeSolver::new(&m).solve(&targets).unwrap();
        for &t in &targets {
            assert_eq!(h.times[t], 0.0);
        }
        assert!(h.times.iter().all(|&v| v >= 0.0));
    }
}

#[test]
fn test_positive_chain_hitting_times_are_direct() {
    let mut rng = ChaCha8Rng::seed_from_u64(29);
    for _ in 0..CASES {
        let n = rng.gen_range(2..6);
        let m = random_positive_matrix(&mut rng, n);
        let h = HittingTimeSolver::new(&m).solve(&[0]).unwrap();
        assert!(!h.is_approximate());
        assert!(h.unreachable_states.is_empty());
        // At least one step is needed from anywhere else
        assert!(h.times[1..].iter().all(|&v| v >= 1.0 - 1e-9));
    }
}

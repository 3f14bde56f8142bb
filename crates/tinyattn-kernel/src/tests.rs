//! Unit tests across the kernel modules.

use approx::assert_abs_diff_eq;
use scirs2_core::ndarray::Array3;

use crate::{
    evaluate_series, evaluate_series_derivative, CoefficientInit, ContractionMode,
    DifferentiableOp, DomainPolicy, ParallelConfig, Precision, TanConfig, TanOperator,
};

fn sample_features(b: usize, s: usize, d: usize) -> Array3<f64> {
    Array3::from_shape_fn((b, s, d), |(i, j, k)| {
        let t = (i * 31 + j * 7 + k * 3) as f64;
        (t * 0.618).sin() * 0.95
    })
}

fn operator(config: TanConfig) -> TanOperator<f64> {
    TanOperator::new(config).unwrap()
}

#[test]
fn test_forward_matches_clenshaw_per_token() {
    let config = TanConfig::new(5, 4, 3).with_init(CoefficientInit::Uniform {
        low: -1.0,
        high: 1.0,
        seed: 11,
    });
    let op = operator(config);
    let x = sample_features(2, 3, 4);
    let out = op.evaluate(x.view()).unwrap();

    let coeffs = op.coefficients();
    for ((b, s, o), &value) in out.indexed_iter() {
        let series: Vec<f64> = (0..=5).map(|k| coeffs[[0, k, o]]).collect();
        let expected: f64 = (0..4)
            .map(|d| evaluate_series(&series, x[[b, s, d]]))
            .sum::<f64>()
            / 4.0;
        assert_abs_diff_eq!(value, expected, epsilon = 1e-12);
    }
}

#[test]
fn test_per_dimension_feature_gradient_matches_series_derivative() {
    let config = TanConfig::new(4, 3, 1)
        .with_contraction(ContractionMode::PerDimension)
        .with_init(CoefficientInit::Scaled { seed: 5 });
    let mut op = operator(config);
    let x = sample_features(1, 2, 3);
    op.forward(x.view()).unwrap();
    let g = Array3::from_elem((1, 2, 1), 1.0);
    let grads = op.backward(g.view()).unwrap();

    let coeffs = op.coefficients();
    for ((b, s, d), &value) in grads.features.indexed_iter() {
        let series: Vec<f64> = (0..=4).map(|k| coeffs[[d, k, 0]]).collect();
        let expected = evaluate_series_derivative(&series, x[[b, s, d]]);
        assert_abs_diff_eq!(value, expected, epsilon = 1e-12);
    }
}

#[test]
fn test_degree_zero_returns_constant_row() {
    let config = TanConfig::new(0, 5, 3).with_init(CoefficientInit::Uniform {
        low: -2.0,
        high: 2.0,
        seed: 1,
    });
    let op = operator(config);
    let x = sample_features(2, 4, 5);
    let out = op.evaluate(x.view()).unwrap();
    let row0 = op.coefficients().to_owned();
    for ((_, _, o), &value) in out.indexed_iter() {
        assert_abs_diff_eq!(value, row0[[0, 0, o]], epsilon = 1e-12);
    }
}

#[test]
fn test_out_of_range_inputs_are_counted() {
    let mut op = operator(TanConfig::new(3, 2, 1));
    let x = Array3::from_shape_vec((1, 2, 2), vec![0.5, 1.5, -3.0, 1.0]).unwrap();
    op.forward(x.view()).unwrap();

    let snap = op.telemetry();
    assert_eq!(snap.forward_calls, 1);
    assert_eq!(snap.elements_seen, 4);
    assert_eq!(snap.out_of_range, 2);
    assert_eq!(snap.rewritten, 2);
}

#[test]
fn test_clamp_matches_boundary_evaluation() {
    let op = operator(
        TanConfig::new(4, 1, 1).with_init(CoefficientInit::Constant { value: 0.5 }),
    );
    let outside = Array3::from_elem((1, 1, 1), 2.5);
    let edge = Array3::from_elem((1, 1, 1), 1.0);
    assert_eq!(
        op.evaluate(outside.view()).unwrap(),
        op.evaluate(edge.view()).unwrap()
    );
}

#[test]
fn test_tanh_policy_chains_gradient() {
    let config = TanConfig::new(2, 1, 1)
        .with_domain_policy(DomainPolicy::Tanh)
        .with_init(CoefficientInit::Constant { value: 1.0 });
    let mut op = operator(config);
    let x = Array3::from_elem((1, 1, 1), 0.8);
    op.forward(x.view()).unwrap();
    let grads = op.backward(Array3::from_elem((1, 1, 1), 1.0).view()).unwrap();

    // f(u) = 1 + u + (2u^2 - 1), u = tanh(x)
    let u = 0.8f64.tanh();
    let expected = (1.0 + 4.0 * u) * (1.0 - u * u);
    assert_abs_diff_eq!(grads.features[[0, 0, 0]], expected, epsilon = 1e-12);
}

#[test]
fn test_repeated_forward_is_deterministic() {
    let config = TanConfig::new(6, 8, 4).with_parallel(ParallelConfig::eager());
    let mut op = operator(config);
    let x = sample_features(3, 5, 8);
    let first = op.forward(x.view()).unwrap();
    let second = op.forward(x.view()).unwrap();
    assert_eq!(first, second);
    assert_eq!(op.telemetry().stale_contexts, 1);
}

#[test]
fn test_f32_tracks_f64() {
    let config64 = TanConfig::new(4, 3, 2).with_init(CoefficientInit::Scaled { seed: 9 });
    let config32 = config64.clone().with_precision(Precision::F32);
    let op64 = operator(config64);
    let op32 = TanOperator::<f32>::new(config32).unwrap();

    let x64 = sample_features(2, 2, 3);
    let x32 = x64.mapv(|v| v as f32);
    let out64 = op64.evaluate(x64.view()).unwrap();
    let out32 = op32.evaluate(x32.view()).unwrap();
    for (a, b) in out64.iter().zip(out32.iter()) {
        assert_abs_diff_eq!(*a, *b as f64, epsilon = 1e-5);
    }
}

#[test]
fn test_explicit_contexts_are_independent() {
    let op = operator(TanConfig::new(3, 2, 2));
    let x1 = sample_features(1, 2, 2);
    let x2 = x1.mapv(|v| v * 0.5);
    let g = Array3::from_elem((1, 2, 2), 1.0);

    let (_, ctx1) = op.forward_with_context(x1.view()).unwrap();
    let (_, ctx2) = op.forward_with_context(x2.view()).unwrap();
    let grads2 = op.backward_with_context(ctx2, g.view()).unwrap();
    let grads1 = op.backward_with_context(ctx1, g.view()).unwrap();
    assert_ne!(grads1.features, grads2.features);
    assert_eq!(op.name(), "chebyshev_attention");
    assert_eq!(op.num_parameters(), 4 * 2);
}

#[test]
fn test_gradient_parameter_map_shape() {
    let mut op = operator(
        TanConfig::new(2, 3, 4).with_contraction(ContractionMode::PerDimension),
    );
    let x = sample_features(1, 1, 3);
    op.forward(x.view()).unwrap();
    let grads = op.backward(Array3::from_elem((1, 1, 4), 1.0).view()).unwrap();
    let map = grads.to_parameter_map();
    assert_eq!(map[crate::COEFFICIENTS_KEY].dim(), (9, 4));
    assert_eq!(
        map[crate::COEFFICIENTS_KEY][[4, 1]],
        grads.coefficients[[1, 1, 1]]
    );
}

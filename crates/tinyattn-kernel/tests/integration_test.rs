//! End-to-end tests of the operator through its public API.

use approx::assert_abs_diff_eq;
use scirs2_core::ndarray::{Array3, ArrayD, IxDyn};
use tinyattn_kernel::{
    check_operator_gradients, new_operator, CoefficientInit, ContractionMode, DomainPolicy,
    GradientCheckConfig, HostTensor, ParallelConfig, Precision, TanConfig, TanError,
    TanOperator,
};

fn features_f64(b: usize, s: usize, d: usize, scale: f64) -> Array3<f64> {
    Array3::from_shape_fn((b, s, d), |(i, j, k)| {
        let t = (i * 17 + j * 5 + k) as f64;
        (t * 1.3).cos() * scale
    })
}

#[test]
fn test_concrete_scenario() {
    let mut op = TanOperator::<f64>::new(
        TanConfig::new(2, 1, 1).with_init(CoefficientInit::Constant { value: 1.0 }),
    )
    .unwrap();
    let out = op.forward(Array3::from_elem((1, 1, 1), 0.5).view()).unwrap();
    assert_eq!(out.shape(), &[1, 1, 1]);
    assert_eq!(out[[0, 0, 0]], 1.0);
}

#[test]
fn test_shape_law_independent_of_degree() {
    let x = features_f64(3, 7, 5, 0.9);
    for degree in [0, 1, 2, 5, 16, 64] {
        let op = TanOperator::<f64>::with_dims(degree, 5, 4).unwrap();
        let out = op.evaluate(x.view()).unwrap();
        assert_eq!(out.shape(), &[3, 7, 4], "degree {}", degree);
    }
}

#[test]
fn test_degree_zero_is_bias_only() {
    let config = TanConfig::new(0, 3, 2).with_init(CoefficientInit::Uniform {
        low: -1.0,
        high: 1.0,
        seed: 42,
    });
    let op = TanOperator::<f64>::new(config).unwrap();
    let row0 = op.coefficients().to_owned();

    for scale in [0.0, 0.5, 1.0] {
        let out = op.evaluate(features_f64(2, 3, 3, scale).view()).unwrap();
        for ((_, _, o), &v) in out.indexed_iter() {
            assert_abs_diff_eq!(v, row0[[0, 0, o]], epsilon = 1e-12);
        }
    }
}

#[test]
fn test_double_backward_is_invalid_state() {
    let mut op = TanOperator::<f32>::with_dims(3, 2, 2).unwrap();
    let x = Array3::from_elem((1, 4, 2), 0.25f32);
    let g = Array3::from_elem((1, 4, 2), 1.0f32);
    op.forward(x.view()).unwrap();
    op.backward(g.view()).unwrap();
    let err = op.backward(g.view()).unwrap_err();
    assert!(matches!(err, TanError::InvalidState(_)));
}

#[test]
fn test_backward_pairs_with_latest_forward() {
    let mut op = TanOperator::<f64>::with_dims(3, 2, 1).unwrap();
    let stale = features_f64(1, 2, 2, 0.3);
    let fresh = features_f64(1, 2, 2, 0.8);
    let g = Array3::from_elem((1, 2, 1), 1.0);

    op.forward(stale.view()).unwrap();
    op.forward(fresh.view()).unwrap();
    let grads = op.backward(g.view()).unwrap();

    let mut reference = TanOperator::<f64>::with_dims(3, 2, 1).unwrap();
    reference.set_coefficients(op.coefficients().to_owned()).unwrap();
    reference.forward(fresh.view()).unwrap();
    let expected = reference.backward(g.view()).unwrap();
    assert_eq!(grads.features, expected.features);
    assert_eq!(grads.coefficients, expected.coefficients);
}

#[test]
fn test_parallel_matches_sequential() {
    let x = features_f64(4, 16, 32, 0.99);
    let g = features_f64(4, 16, 8, 1.0);
    let base = TanConfig::new(9, 32, 8).with_contraction(ContractionMode::PerDimension);

    let mut par = TanOperator::<f64>::new(base.clone().with_parallel(ParallelConfig::eager()))
        .unwrap();
    let mut seq =
        TanOperator::<f64>::new(base.with_parallel(ParallelConfig::sequential())).unwrap();

    assert_eq!(
        par.forward(x.view()).unwrap(),
        seq.forward(x.view()).unwrap()
    );
    let gp = par.backward(g.view()).unwrap();
    let gs = seq.backward(g.view()).unwrap();
    assert_eq!(gp.features, gs.features);
    assert_eq!(gp.coefficients, gs.coefficients);
}

#[test]
fn test_non_finite_input_rejected() {
    let mut op = TanOperator::<f64>::with_dims(2, 2, 1).unwrap();
    let mut x = Array3::from_elem((1, 2, 2), 0.1);
    x[[0, 1, 0]] = f64::NAN;
    let err = op.forward(x.view()).unwrap_err();
    assert!(matches!(err, TanError::NumericalError(_)));
    assert!(!op.has_pending_backward());
}

#[test]
fn test_empty_batch() {
    let mut op = TanOperator::<f64>::with_dims(3, 4, 2).unwrap();
    let out = op.forward(Array3::<f64>::zeros((0, 5, 4)).view()).unwrap();
    assert_eq!(out.shape(), &[0, 5, 2]);
    let grads = op.backward(Array3::<f64>::zeros((0, 5, 2)).view()).unwrap();
    assert_eq!(grads.features.shape(), &[0, 5, 4]);
    assert!(grads.coefficients.iter().all(|&v| v == 0.0));
}

#[test]
fn test_gradient_check_f64_modes_and_policies() {
    let x = features_f64(2, 3, 4, 0.9);
    let g = features_f64(2, 3, 3, 1.0);
    for mode in [ContractionMode::Pooled, ContractionMode::PerDimension] {
        for policy in [
            DomainPolicy::Clamp,
            DomainPolicy::Tanh,
            DomainPolicy::Passthrough,
        ] {
            let config = TanConfig::new(4, 4, 3)
                .with_contraction(mode)
                .with_domain_policy(policy)
                .with_init(CoefficientInit::Scaled { seed: 3 });
            let op = TanOperator::<f64>::new(config).unwrap();
            let results =
                check_operator_gradients(&op, x.view(), g.view(), &GradientCheckConfig::default())
                    .unwrap();
            for result in results {
                assert!(result.passed, "{:?} {:?}: {:?}", mode, policy, result);
            }
        }
    }
}

#[test]
fn test_gradient_check_f32() {
    let x = features_f64(1, 3, 3, 0.8).mapv(|v| v as f32);
    let g = features_f64(1, 3, 2, 1.0).mapv(|v| v as f32);
    let config = TanConfig::new(3, 3, 2)
        .with_precision(Precision::F32)
        .with_init(CoefficientInit::Scaled { seed: 8 });
    let op = TanOperator::<f32>::new(config).unwrap();
    let results = check_operator_gradients(
        &op,
        x.view(),
        g.view(),
        &GradientCheckConfig::for_precision(Precision::F32),
    )
    .unwrap();
    for result in results {
        assert!(result.passed, "{:?}", result);
    }
}

#[test]
fn test_clamped_inputs_get_zero_gradient() {
    let mut op = TanOperator::<f64>::with_dims(3, 2, 1).unwrap();
    let x = Array3::from_shape_vec((1, 1, 2), vec![1.7, 0.2]).unwrap();
    op.forward(x.view()).unwrap();
    let grads = op.backward(Array3::from_elem((1, 1, 1), 1.0).view()).unwrap();
    assert_eq!(grads.features[[0, 0, 0]], 0.0);
    assert_ne!(grads.features[[0, 0, 1]], 0.0);
}

#[test]
fn test_handle_roundtrip_f32() {
    let mut handle = new_operator(2, 3, 2, Precision::F32).unwrap();
    let x = HostTensor::F32(ArrayD::from_elem(IxDyn(&[2, 2, 3]), 0.1));
    let out = handle.forward(&x).unwrap();
    assert_eq!(out.precision(), Precision::F32);
    assert_eq!(out.shape(), &[2, 2, 2]);

    let wrong = HostTensor::F64(ArrayD::from_elem(IxDyn(&[2, 2, 2]), 1.0));
    assert!(matches!(
        handle.backward(&wrong).unwrap_err(),
        TanError::PrecisionMismatch { .. }
    ));
    assert!(handle.has_pending_backward());

    let g = HostTensor::F32(ArrayD::from_elem(IxDyn(&[2, 2, 2]), 1.0));
    let grads = handle.backward(&g).unwrap();
    assert_eq!(grads.coefficients.shape(), &[1, 3, 2]);
}

#[test]
fn test_config_json_builds_operator() {
    let json = r#"{
        "degree": 3,
        "input_dim": 4,
        "output_dim": 2,
        "precision": "F32",
        "contraction": "PerDimension",
        "domain": "Tanh",
        "init": { "Uniform": { "low": -0.1, "high": 0.1, "seed": 5 } }
    }"#;
    let config = TanConfig::from_json(json).unwrap();
    let op = TanOperator::<f32>::new(config).unwrap();
    assert_eq!(op.coefficients().shape(), &[4, 4, 2]);
    assert!(op.coefficients().iter().all(|v| v.abs() <= 0.1));
}

use rand::SeedableRng;
use rand::rngs::StdRng;

use sparse_mlp::{
    Activation, BackpropConfig, Dataset, Error, Network, NetworkBuilder, ObsConfig, PruneConfig,
    RpropConfig, SgdConfig,
};

fn xor() -> Dataset<f64> {
    Dataset::from_rows(
        &[vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
        &[vec![-0.9], vec![0.9], vec![0.9], vec![-0.9]],
    )
    .unwrap()
}

fn xor_net(hidden: usize, seed: u64) -> Network<f64> {
    NetworkBuilder::new(2)
        .unwrap()
        .add_layer(hidden, Activation::SymSigmoid, Some(1.0))
        .unwrap()
        .add_layer(1, Activation::SymSigmoid, Some(1.0))
        .unwrap()
        .weight_range(1.0)
        .unwrap()
        .build_with_seed(seed)
        .unwrap()
}

/// XOR net taught with Rprop to `tol`; tries a few seeds to step around plateaus.
fn trained_xor(hidden: usize, tol: f64) -> Network<f64> {
    let cfg = RpropConfig {
        tol_level: tol,
        max_epochs: 3000,
        ..Default::default()
    };
    for seed in 0..10 {
        let mut net = xor_net(hidden, seed);
        if net.teach_rprop(&xor(), &cfg).unwrap().mse < tol {
            return net;
        }
    }
    panic!("Rprop did not learn XOR from any seed");
}

fn mse(net: &Network<f64>, data: &Dataset<f64>) -> f64 {
    net.mse(data.input(), data.output()).unwrap()
}

#[test]
fn batch_gd_learns_xor() {
    let cfg = BackpropConfig {
        tol_level: 0.01,
        max_epochs: 5000,
        learn_rate: 0.5,
        ..Default::default()
    };
    let mut converged = 0;
    for seed in 0..5 {
        let mut net = xor_net(4, seed);
        let report = net.teach_bp(&xor(), &cfg).unwrap();
        assert!(report.epochs <= 5000);
        assert_eq!(report.mse, mse(&net, &xor()));
        if report.mse < 0.01 {
            converged += 1;
        }
    }
    assert!(converged > 0);
}

#[test]
fn teaching_with_weight_decay_stays_finite() {
    let mut net = xor_net(3, 7);
    let cfg = BackpropConfig {
        tol_level: 1e-9,
        max_epochs: 200,
        learn_rate: 0.3,
        l2reg: 1e-3,
        ..Default::default()
    };
    let report = net.teach_bp(&xor(), &cfg).unwrap();
    assert_eq!(report.epochs, 200);
    assert!(report.mse.is_finite());
    assert!(net.weights().as_slice().iter().all(|w| w.is_finite()));
}

#[test]
fn sgd_needs_minibatch_below_record_count() {
    let mut net = xor_net(2, 0);
    let mut rng = StdRng::seed_from_u64(0);
    let err = net
        .teach_sgd(&xor(), &SgdConfig::default(), &mut rng)
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let cfg = SgdConfig {
        minibatch_size: 3,
        max_epochs: 10,
        tol_level: 1e-9,
        ..Default::default()
    };
    let report = net.teach_sgd(&xor(), &cfg, &mut rng).unwrap();
    assert_eq!(report.epochs, 10);
}

#[test]
fn teaching_rejects_mismatched_data() {
    let mut net = xor_net(2, 0);
    let data = Dataset::from_rows(&[vec![1.0, 2.0, 3.0]], &[vec![1.0]]).unwrap();
    let err = net.teach_bp(&data, &BackpropConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Dimension(_)));
}

#[test]
fn magnitude_pruning_stays_within_tolerance() {
    let tol = 0.01;
    let mut net = trained_xor(6, tol);
    let start = net.active_weights();
    let data = xor();

    let report = net
        .prune_magnitude(&data, &PruneConfig { tol_level: tol, ..Default::default() })
        .unwrap();

    assert!(mse(&net, &data) <= tol);
    assert!(report.weights_removed > 0);
    // The rejected candidate is restored, so the bookkeeping adds up.
    assert_eq!(start - net.active_weights(), report.weights_removed);
    assert_eq!(net.remove_dead_neurons().unwrap(), (0, 0));
}

#[test]
fn obs_pruning_stays_within_tolerance() {
    let tol = 0.01;
    let mut net = trained_xor(4, tol);
    let start = net.active_weights();
    let data = xor();

    let report = net.prune_obs(&data, &ObsConfig { tol_level: tol, ..Default::default() }).unwrap();
    assert!(mse(&net, &data) <= tol);
    assert_eq!(start - net.active_weights(), report.weights_removed);
    let hidden = net.layers()[1];
    assert_eq!(report.neurons_removed, 4 - hidden);
}

#[test]
fn pruning_an_untrained_network_is_refused() {
    let mut net = xor_net(3, 1);
    let data = xor();
    let before = net.weights();
    let err = net
        .prune_magnitude(&data, &PruneConfig { tol_level: 1e-6, ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(net.weights(), before);
}

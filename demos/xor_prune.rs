//! Teach a 2-6-1 network XOR with Rprop, then prune it with OBS.
//!
//! Logs at debug level, so every accepted pruning step is printed.

use sparse_mlp::{Activation, Dataset, NetworkBuilder, ObsConfig, RpropConfig};

fn main() -> sparse_mlp::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let xs = vec![
        vec![-1.0, -1.0],
        vec![-1.0, 1.0],
        vec![1.0, -1.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![-0.9], vec![0.9], vec![0.9], vec![-0.9]];
    let train = Dataset::from_rows(&xs, &ys)?;

    let mut net = NetworkBuilder::<f64>::new(2)?
        .add_layer(6, Activation::SymSigmoid, Some(1.0))?
        .add_layer(1, Activation::SymSigmoid, Some(1.0))?
        .weight_range(1.0)?
        .name("xor")
        .build_with_seed(0)?;

    let tol = 0.01;
    let report = net.teach_rprop(
        &train,
        &RpropConfig {
            tol_level: tol,
            max_epochs: 5_000,
            report_freq: 100,
            ..Default::default()
        },
    )?;
    println!("taught: mse={} epochs={}", report.mse, report.epochs);
    if report.mse > tol {
        println!("network did not reach the tolerance; try another seed");
        return Ok(());
    }

    let pruned = net.prune_obs(
        &train,
        &ObsConfig {
            tol_level: tol,
            ..Default::default()
        },
    )?;
    println!(
        "pruned: {} weights and {} neurons removed; layers {:?}, {} of {} weights active",
        pruned.weights_removed,
        pruned.neurons_removed,
        net.layers(),
        net.active_weights(),
        net.total_weights()
    );

    let y = net.eval(train.input())?;
    for (r, x) in xs.iter().enumerate() {
        println!("x={x:?} y={:.3}", y.elem(r + 1, 1));
    }
    Ok(())
}

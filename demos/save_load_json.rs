#[cfg(not(feature = "serde"))]
fn main() {
    println!("enable the `serde` feature: cargo run --example save_load_json --features serde");
}

#[cfg(feature = "serde")]
fn main() -> sparse_mlp::Result<()> {
    use sparse_mlp::{Activation, Dataset, Network, NetworkBuilder, PruneConfig, RpropConfig};

    let xs = vec![vec![0.0], vec![0.25], vec![0.5], vec![0.75], vec![1.0]];
    let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![0.8 * x[0] - 0.3]).collect();
    let train = Dataset::from_rows(&xs, &ys)?.with_info("line", Vec::new())?;

    let mut net = NetworkBuilder::<f64>::new(1)?
        .add_layer(3, Activation::SymSigmoid, None)?
        .add_layer(1, Activation::Linear, None)?
        .build_with_seed(0)?;
    let report = net.teach_rprop(&train, &RpropConfig { tol_level: 1e-4, ..Default::default() })?;
    if report.mse <= 1e-4 {
        net.prune_magnitude(&train, &PruneConfig { tol_level: 1e-4, ..Default::default() })?;
    }

    let net_path = "target/tmp_network.json";
    let data_path = "target/tmp_dataset.json";
    net.save_json(net_path)?;
    train.save_json(data_path)?;

    let loaded = Network::<f64>::load_json(net_path)?;
    let data = Dataset::<f64>::load_json(data_path)?;
    println!(
        "saved and loaded {net_path} ({} of {} weights active), mse {}",
        loaded.active_weights(),
        loaded.total_weights(),
        loaded.mse(data.input(), data.output())?
    );
    Ok(())
}

//! Compose small networks: run two side by side with `merge`, then feed the pair
//! into a third network with `stack`.

use sparse_mlp::{Activation, Matrix, NetworkBuilder, merge, stack};

fn main() -> sparse_mlp::Result<()> {
    let left =
        NetworkBuilder::<f64>::from_sizes(&[2, 3, 1], Activation::SymSigmoid)?.build_with_seed(1)?;
    let right =
        NetworkBuilder::<f64>::from_sizes(&[2, 2, 1], Activation::SymSigmoid)?.build_with_seed(2)?;
    let head = NetworkBuilder::<f64>::from_sizes(&[2, 1], Activation::Linear)?.build_with_seed(3)?;

    let pair = merge(&left, &right, true)?;
    let mut full = stack(&pair, &head)?;
    full.set_name("pair+head");
    println!(
        "{}: layers {:?}, {} of {} weights active",
        full.name(),
        full.layers(),
        full.active_weights(),
        full.total_weights()
    );

    let x = Matrix::from_rows(&[vec![0.5, -0.5], vec![1.0, 0.25]])?;
    println!("outputs:\n{}", full.eval(&x)?);

    let (neurons, weights) = full.remove_dead_neurons()?;
    println!("dead neurons removed: {neurons} ({weights} weights)");
    Ok(())
}

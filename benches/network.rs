use criterion::{Criterion, black_box, criterion_group, criterion_main};

use rand::SeedableRng;
use rand::rngs::StdRng;

use sparse_mlp::{Activation, Matrix, NetworkBuilder};

fn eval_bench(c: &mut Criterion) {
    let net = NetworkBuilder::<f64>::from_sizes(&[64, 128, 128, 10], Activation::SymSigmoid)
        .unwrap()
        .build_with_seed(0)
        .unwrap();
    let x = Matrix::random(256, 64, &mut StdRng::seed_from_u64(1));

    c.bench_function("eval_256x_64_128_128_10", |b| {
        b.iter(|| black_box(net.eval(black_box(&x)).unwrap()))
    });
}

fn grad_bench(c: &mut Criterion) {
    let net = NetworkBuilder::<f64>::from_sizes(&[64, 128, 128, 10], Activation::SymSigmoid)
        .unwrap()
        .build_with_seed(0)
        .unwrap();
    let mut rng = StdRng::seed_from_u64(2);
    let x = Matrix::random(256, 64, &mut rng);
    let y = Matrix::random(256, 10, &mut rng);

    c.bench_function("grad_256x_64_128_128_10", |b| {
        b.iter(|| black_box(net.grad(black_box(&x), black_box(&y)).unwrap()))
    });
}

fn inverse_hessian_bench(c: &mut Criterion) {
    let net = NetworkBuilder::<f64>::from_sizes(&[8, 12, 2], Activation::SymSigmoid)
        .unwrap()
        .build_with_seed(0)
        .unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let x = Matrix::random(32, 8, &mut rng);
    let y = Matrix::random(32, 2, &mut rng);

    c.bench_function("inverse_hessian_32x_8_12_2", |b| {
        b.iter(|| black_box(net.inverse_hessian(black_box(&x), black_box(&y), 1e-5).unwrap()))
    });
}

criterion_group!(benches, eval_bench, grad_bench, inverse_hessian_bench);
criterion_main!(benches);

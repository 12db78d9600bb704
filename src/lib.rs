//! A sparse, prunable multilayer perceptron.
//!
//! `sparse-mlp` represents a feed-forward network whose connections and biases can
//! be switched on and off one by one. On top of that store it provides evaluation
//! and exact gradients, three teaching algorithms and two pruning algorithms.
//!
//! # Design goals
//!
//! - Explicit structure: every weight slot has a stable absolute index and a
//!   structural locator (layer, neuron, previous neuron); active weights also have
//!   a compact active-relative index used by the gradient vectors.
//! - Consistent bookkeeping: per-neuron connection counters and the active count
//!   are kept in sync by every mutation, so dead neurons can be found and removed
//!   at any time.
//! - Pluggable kernels: dense products go through a [`linalg::Backend`]; the
//!   `matrixmultiply` feature swaps in an optimized GEMM.
//!
//! # Indexing
//!
//! Indices at the public surface are 1-based: layers (layer 1 is the input layer),
//! neurons, records, matrix elements, absolute weight indices
//! (`1..=total_weights()`) and active-relative indices (`1..=active_weights()`).
//! In a [`WeightLocator`], previous neuron `0` denotes the bias.
//!
//! # Panics vs `Result`
//!
//! - The arithmetic operators on [`Matrix`] (`+`, `-`, `*`, `/`, unary `-`) panic
//!   on shape mismatch, like slice indexing. Their checked counterparts
//!   ([`Matrix::try_add`], [`Matrix::matmul`], ...) return [`Result`].
//! - Everything on [`Network`] validates its arguments and returns [`Result`].
//!
//! # Data layout
//!
//! - Scalars are `f32` or `f64` (see [`Scalar`]).
//! - [`Matrix`] is column-major. Inputs and targets are `N x inputs` and
//!   `N x outputs` matrices with one record per row.
//! - The weights of layer `l` are stored neuron by neuron, each neuron holding its
//!   bias followed by one slot per neuron of layer `l - 1`.
//!
//! # Quick start
//!
//! ```rust
//! use sparse_mlp::{Activation, Dataset, NetworkBuilder, PruneConfig, RpropConfig};
//!
//! # fn main() -> sparse_mlp::Result<()> {
//! let xs = vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]];
//! let ys = vec![vec![-0.9], vec![0.9], vec![0.9], vec![-0.9]];
//! let train = Dataset::from_rows(&xs, &ys)?;
//!
//! let mut net = NetworkBuilder::<f64>::new(2)?
//!     .add_layer(4, Activation::SymSigmoid, Some(1.0))?
//!     .add_layer(1, Activation::SymSigmoid, Some(1.0))?
//!     .weight_range(1.0)?
//!     .build_with_seed(0)?;
//!
//! let report = net.teach_rprop(&train, &RpropConfig { tol_level: 1e-3, ..Default::default() })?;
//! if report.mse <= 1e-3 {
//!     let cfg = PruneConfig { tol_level: 1e-3, ..Default::default() };
//!     let pruned = net.prune_magnitude(&train, &cfg)?;
//!     assert_eq!(net.active_weights() + pruned.weights_removed, 17);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Structural editing
//!
//! ```rust
//! use sparse_mlp::{Network, WeightLocator, merge, stack};
//!
//! # fn main() -> sparse_mlp::Result<()> {
//! let mut a = Network::<f64>::new(&[2, 3, 1])?;
//! a.set_active(WeightLocator::new(3, 1, 2), false)?;
//! let (neurons, weights) = a.remove_dead_neurons()?;
//! assert_eq!((neurons, weights), (1, 3));
//!
//! let b = Network::<f64>::new(&[1, 2])?;
//! let chained = stack(&a, &b)?;
//! assert_eq!(chained.layers(), &[2, 2, 1, 2]);
//!
//! let side_by_side = merge(&a, &Network::new(&[2, 1, 1])?, true)?;
//! assert_eq!(side_by_side.layers(), &[2, 3, 2]);
//! # Ok(())
//! # }
//! ```
//!
//! # MSRV
//!
//! This crate's minimum supported Rust version (MSRV) is specified in `Cargo.toml`.

pub mod activation;
pub mod builder;
pub mod data;
mod engine;
pub mod error;
pub mod linalg;
pub mod matrix;
pub mod network;
pub mod prune;
pub mod scalar;
mod structure;
pub mod teach;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use activation::Activation;
pub use builder::NetworkBuilder;
pub use data::Dataset;
pub use error::{Error, Result};
pub use matrix::Matrix;
pub use network::{LayerActivation, Network, WeightLocator};
pub use prune::{ObsConfig, PruneConfig, PruneReport, saliencies};
pub use scalar::Scalar;
pub use structure::{merge, stack};
pub use teach::{BackpropConfig, RpropConfig, SgdConfig, TeachReport};

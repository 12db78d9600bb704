//! Network builder.
//!
//! `NetworkBuilder` makes the structure explicit (layer sizes plus one
//! activation per non-input layer) and draws the initial weights uniformly from
//! `(-weight_range, weight_range)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::network::LayerActivation;
use crate::{Activation, Error, Network, Result, Scalar};

/// Default half-width of the initial weight interval.
pub const DEFAULT_WEIGHT_RANGE: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
struct LayerSpec<T> {
    size: usize,
    activation: LayerActivation<T>,
}

/// Builder for a fully connected [`Network`].
///
/// ```rust
/// use sparse_mlp::{Activation, NetworkBuilder};
///
/// # fn main() -> sparse_mlp::Result<()> {
/// let net = NetworkBuilder::<f64>::new(2)?
///     .add_layer(4, Activation::SymSigmoid, None)?
///     .add_layer(1, Activation::Linear, None)?
///     .build_with_seed(0)?;
/// assert_eq!(net.layers(), &[2, 4, 1]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NetworkBuilder<T> {
    input_dim: usize,
    layers: Vec<LayerSpec<T>>,
    weight_range: T,
    name: String,
}

impl<T: Scalar> NetworkBuilder<T> {
    /// Start building a network that accepts inputs of length `input_dim`.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::Config("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input_dim,
            layers: Vec::new(),
            weight_range: T::lit(DEFAULT_WEIGHT_RANGE),
            name: String::new(),
        })
    }

    /// Convenience constructor from a sizes list; every non-input layer uses
    /// `activation` with its default parameter.
    pub fn from_sizes(sizes: &[usize], activation: Activation) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::Config(
                "sizes must include input and output dims".to_owned(),
            ));
        }
        let mut b = Self::new(sizes[0])?;
        for &size in &sizes[1..] {
            b = b.add_layer(size, activation, None)?;
        }
        Ok(b)
    }

    /// Add a fully connected layer of `size` neurons.
    ///
    /// `param = None` selects the activation's default parameter.
    pub fn add_layer(
        mut self,
        size: usize,
        activation: Activation,
        param: Option<T>,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::Config("layer size must be > 0".to_owned()));
        }
        self.layers.push(LayerSpec {
            size,
            activation: LayerActivation::new(activation, param)?,
        });
        Ok(self)
    }

    /// Half-width of the interval initial weights are drawn from.
    pub fn weight_range(mut self, a: T) -> Result<Self> {
        if !(a.is_finite() && a > T::zero()) {
            return Err(Error::Config(format!(
                "weight range must be finite and > 0, got {a}"
            )));
        }
        self.weight_range = a;
        Ok(self)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<Network<T>> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided RNG.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Network<T>> {
        if self.layers.is_empty() {
            return Err(Error::Config(
                "network must have at least one non-input layer".to_owned(),
            ));
        }

        let mut sizes = Vec::with_capacity(self.layers.len() + 1);
        sizes.push(self.input_dim);
        sizes.extend(self.layers.iter().map(|l| l.size));

        let mut net = Network::new(&sizes)?;
        for (l, spec) in self.layers.iter().enumerate() {
            let act = spec.activation;
            net.set_activation(l + 2, act.kind, Some(act.param))?;
        }
        net.set_name(self.name);
        net.randomize_weights(rng, self.weight_range)?;
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_requested_structure() {
        let net = NetworkBuilder::<f32>::new(3)
            .unwrap()
            .add_layer(5, Activation::Relu, Some(0.5))
            .unwrap()
            .add_layer(2, Activation::Sigmoid, None)
            .unwrap()
            .name("demo")
            .build_with_seed(1)
            .unwrap();
        assert_eq!(net.layers(), &[3, 5, 2]);
        assert_eq!(net.name(), "demo");
        assert_eq!(net.activation(2).unwrap().kind, Activation::Relu);
        assert_eq!(net.activation(2).unwrap().param, 0.5);
        assert_eq!(net.activation(3).unwrap().param, 0.5);
        assert!(net.weights().as_slice().iter().all(|w| w.abs() < 0.2));
    }

    #[test]
    fn same_seed_same_weights() {
        let b = NetworkBuilder::<f64>::from_sizes(&[2, 3, 1], Activation::SymSigmoid).unwrap();
        let a = b.clone().build_with_seed(42).unwrap();
        let c = b.build_with_seed(42).unwrap();
        assert_eq!(a.weights(), c.weights());
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(NetworkBuilder::<f64>::new(0).is_err());
        assert!(NetworkBuilder::<f64>::new(2).unwrap().build_with_seed(0).is_err());
        assert!(
            NetworkBuilder::<f64>::new(2)
                .unwrap()
                .add_layer(0, Activation::Linear, None)
                .is_err()
        );
        assert!(
            NetworkBuilder::<f64>::new(2)
                .unwrap()
                .add_layer(1, Activation::Linear, Some(-1.0))
                .is_err()
        );
        assert!(NetworkBuilder::<f64>::new(2).unwrap().weight_range(0.0).is_err());
        assert!(NetworkBuilder::<f64>::from_sizes(&[2], Activation::Linear).is_err());
    }
}

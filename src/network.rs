//! Sparse network topology store.
//!
//! A `Network` keeps every neuron and weight slot in flat tables ("arena + index"):
//!
//! - `layers[l]`: neuron count of layer `l` (layer 0 is the input layer)
//! - `neuron_offsets[l]`: global index of the first neuron of layer `l`
//! - `weight_offsets[l]`: global index of the first weight slot of layer `l`
//!   (the input layer owns no slots)
//! - each neuron of layer `l >= 1` owns `layers[l - 1] + 1` consecutive slots: its
//!   bias, then one slot per neuron of the previous layer
//! - `values` / `active`: slot value and slot on/off flag
//! - `incoming` / `outgoing`: per neuron, the number of *active connections*
//!   (biases excluded) from the previous layer / to the next layer
//!
//! Inactive slots always hold 0, so evaluation can include them unconditionally.
//!
//! Public indices are 1-based: layers, neurons, absolute weight indices
//! (`1..=total_weights()`, inactive slots included) and active-relative weight
//! indices (`1..=active_weights()`, k-th active slot in absolute order).

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::{Activation, Error, Matrix, Result, Scalar};

/// Structural address of a weight slot (all indices 1-based).
///
/// `prev == 0` denotes the bias of `neuron`; otherwise `prev` is a neuron of
/// layer `layer - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightLocator {
    pub layer: usize,
    pub neuron: usize,
    pub prev: usize,
}

impl WeightLocator {
    pub fn new(layer: usize, neuron: usize, prev: usize) -> Self {
        Self {
            layer,
            neuron,
            prev,
        }
    }

    pub fn bias(layer: usize, neuron: usize) -> Self {
        Self::new(layer, neuron, 0)
    }

    #[inline]
    pub fn is_bias(&self) -> bool {
        self.prev == 0
    }
}

/// Activation function and parameter of one non-input layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerActivation<T> {
    pub kind: Activation,
    pub param: T,
}

impl<T: Scalar> LayerActivation<T> {
    pub fn new(kind: Activation, param: Option<T>) -> Result<Self> {
        Ok(Self {
            kind,
            param: kind.resolve_param(param)?,
        })
    }

    pub(crate) fn default_hidden() -> Self {
        Self {
            kind: Activation::SymSigmoid,
            param: Activation::SymSigmoid.default_param(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Network<T> {
    name: String,
    layers: Vec<usize>,
    neuron_offsets: Vec<usize>,
    incoming: Vec<usize>,
    outgoing: Vec<usize>,
    weight_offsets: Vec<usize>,
    values: Vec<T>,
    active: Vec<bool>,
    active_count: usize,
    /// One entry per non-input layer (`activations[l - 1]` belongs to layer `l`).
    activations: Vec<LayerActivation<T>>,
}

impl<T: Scalar> Network<T> {
    /// Fully connected skeleton: every slot active, every value 0.
    ///
    /// Non-input layers use `SymSigmoid` with its default parameter.
    pub fn new(layers: &[usize]) -> Result<Self> {
        let total = slot_count(layers)?;
        Self::from_parts(layers, vec![true; total], vec![T::zero(); total])
    }

    /// Network with explicit slot flags and values (the load path).
    ///
    /// Offsets and connection counters are derived from `layers` and `active`.
    /// Values of inactive slots are replaced by 0.
    pub fn from_parts(layers: &[usize], active: Vec<bool>, values: Vec<T>) -> Result<Self> {
        let activations = vec![LayerActivation::default_hidden(); layers.len().saturating_sub(1)];
        Self::assemble(String::new(), layers.to_vec(), active, values, activations)
    }

    pub(crate) fn assemble(
        name: String,
        layers: Vec<usize>,
        active: Vec<bool>,
        mut values: Vec<T>,
        activations: Vec<LayerActivation<T>>,
    ) -> Result<Self> {
        let total = slot_count(&layers)?;
        if active.len() != total {
            return Err(Error::Structural(format!(
                "{} weight flags given, topology has {total} weight slots",
                active.len()
            )));
        }
        if values.len() != total {
            return Err(Error::Structural(format!(
                "{} weight values given, topology has {total} weight slots",
                values.len()
            )));
        }
        if activations.len() != layers.len() - 1 {
            return Err(Error::Structural(format!(
                "{} activation entries given for {} non-input layers",
                activations.len(),
                layers.len() - 1
            )));
        }

        let mut neuron_offsets: Vec<usize> = Vec::with_capacity(layers.len() + 1);
        let mut weight_offsets: Vec<usize> = Vec::with_capacity(layers.len() + 1);
        neuron_offsets.push(0);
        weight_offsets.push(0);
        for (l, &n) in layers.iter().enumerate() {
            let slots = match l {
                0 => Some(0),
                _ => layers[l - 1].checked_add(1).and_then(|fan_in| fan_in.checked_mul(n)),
            };
            let (Some(neurons), Some(slots)) = (
                neuron_offsets[l].checked_add(n),
                slots.and_then(|s| s.checked_add(weight_offsets[l])),
            ) else {
                return Err(too_large(&layers));
            };
            neuron_offsets.push(neurons);
            weight_offsets.push(slots);
        }

        let neurons = neuron_offsets[layers.len()];
        let mut net = Self {
            name,
            layers,
            neuron_offsets,
            incoming: vec![0; neurons],
            outgoing: vec![0; neurons],
            weight_offsets,
            values: Vec::new(),
            active,
            active_count: 0,
            activations,
        };

        for (v, &on) in values.iter_mut().zip(&net.active) {
            if !on {
                *v = T::zero();
            }
        }
        net.values = values;
        net.recount();
        Ok(net)
    }

    /// Recompute connection counters and the active count from the flags.
    fn recount(&mut self) {
        self.incoming.fill(0);
        self.outgoing.fill(0);
        self.active_count = 0;
        for l in 1..self.layers.len() {
            let fan_in = self.layers[l - 1] + 1;
            for n in 0..self.layers[l] {
                let base = self.weight_offsets[l] + n * fan_in;
                for p in 0..fan_in {
                    if !self.active[base + p] {
                        continue;
                    }
                    self.active_count += 1;
                    if p > 0 {
                        self.incoming[self.neuron_offsets[l] + n] += 1;
                        self.outgoing[self.neuron_offsets[l - 1] + p - 1] += 1;
                    }
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Layer sizes, input layer first.
    #[inline]
    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Number of neurons in layer `l` (1-based).
    pub fn layer_size(&self, l: usize) -> Result<usize> {
        self.check_layer(l)?;
        Ok(self.layers[l - 1])
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0]
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1]
    }

    /// Total number of weight slots (connections and biases, inactive included).
    #[inline]
    pub fn total_weights(&self) -> usize {
        self.weight_offsets[self.layers.len()]
    }

    /// Number of active slots.
    #[inline]
    pub fn active_weights(&self) -> usize {
        self.active_count
    }

    /// Activation of layer `l` (1-based, `l >= 2`).
    pub fn activation(&self, l: usize) -> Result<LayerActivation<T>> {
        self.check_non_input_layer(l)?;
        Ok(self.activations[l - 2])
    }

    /// Set the activation of layer `l` (1-based, `l >= 2`).
    ///
    /// `param = None` selects the activation's default parameter; an explicit
    /// parameter must be finite and > 0.
    pub fn set_activation(&mut self, l: usize, kind: Activation, param: Option<T>) -> Result<()> {
        self.check_non_input_layer(l)?;
        self.activations[l - 2] = LayerActivation::new(kind, param)?;
        Ok(())
    }

    pub(crate) fn layer_activations(&self) -> &[LayerActivation<T>] {
        &self.activations
    }

    /// Active connections from the previous layer into neuron `n` of layer `l`.
    pub fn incoming(&self, l: usize, n: usize) -> Result<usize> {
        self.check_neuron(l, n)?;
        Ok(self.incoming[self.neuron_offsets[l - 1] + n - 1])
    }

    /// Active connections from neuron `n` of layer `l` into the next layer.
    pub fn outgoing(&self, l: usize, n: usize) -> Result<usize> {
        self.check_neuron(l, n)?;
        Ok(self.outgoing[self.neuron_offsets[l - 1] + n - 1])
    }

    /// Weight value at `loc`. Fails if the slot is inactive.
    pub fn weight(&self, loc: WeightLocator) -> Result<T> {
        let s = self.slot_of(loc)?;
        self.ensure_active(s)?;
        Ok(self.values[s])
    }

    /// Weight value at absolute index `i` (1-based). Fails if the slot is inactive.
    pub fn weight_at(&self, i: usize) -> Result<T> {
        let s = self.check_index(i)?;
        self.ensure_active(s)?;
        Ok(self.values[s])
    }

    /// Set the value at `loc`. Fails if the slot is inactive.
    pub fn set_weight(&mut self, loc: WeightLocator, w: T) -> Result<()> {
        let s = self.slot_of(loc)?;
        self.ensure_active(s)?;
        self.values[s] = w;
        Ok(())
    }

    /// Set the value at absolute index `i` (1-based). Fails if the slot is inactive.
    pub fn set_weight_at(&mut self, i: usize, w: T) -> Result<()> {
        let s = self.check_index(i)?;
        self.ensure_active(s)?;
        self.values[s] = w;
        Ok(())
    }

    pub fn is_active(&self, loc: WeightLocator) -> Result<bool> {
        Ok(self.active[self.slot_of(loc)?])
    }

    pub fn is_active_at(&self, i: usize) -> Result<bool> {
        Ok(self.active[self.check_index(i)?])
    }

    /// Switch the slot at `loc` on or off, keeping counters consistent.
    ///
    /// A slot switched off has its value reset to 0; a slot switched on starts at 0.
    pub fn set_active(&mut self, loc: WeightLocator, on: bool) -> Result<()> {
        let s = self.slot_of(loc)?;
        self.toggle_slot(s, on);
        Ok(())
    }

    /// Switch the slot with absolute index `i` (1-based) on or off.
    pub fn set_active_at(&mut self, i: usize, on: bool) -> Result<()> {
        let s = self.check_index(i)?;
        self.toggle_slot(s, on);
        Ok(())
    }

    pub(crate) fn toggle_slot(&mut self, s: usize, on: bool) {
        if self.active[s] == on {
            return;
        }
        let loc = self.locate_slot(s);
        self.active[s] = on;
        self.values[s] = T::zero();
        if on {
            self.active_count += 1;
        } else {
            self.active_count -= 1;
        }
        if !loc.is_bias() {
            let target = self.neuron_offsets[loc.layer - 1] + loc.neuron - 1;
            let source = self.neuron_offsets[loc.layer - 2] + loc.prev - 1;
            if on {
                self.incoming[target] += 1;
                self.outgoing[source] += 1;
            } else {
                self.incoming[target] -= 1;
                self.outgoing[source] -= 1;
            }
        }
    }

    /// Absolute index (1-based) of the `k`-th active weight (1-based).
    pub fn absolute_index(&self, k: usize) -> Result<usize> {
        if k < 1 || k > self.active_count {
            return Err(Error::Structural(format!(
                "invalid active weight index {k}; number of active weights is {}",
                self.active_count
            )));
        }
        self.active
            .iter()
            .enumerate()
            .filter(|&(_, &on)| on)
            .nth(k - 1)
            .map(|(s, _)| s + 1)
            .ok_or_else(|| Error::Structural("active weight count is out of sync".to_owned()))
    }

    /// Active-relative index (1-based) of the active weight with absolute index `i`.
    pub fn active_index(&self, i: usize) -> Result<usize> {
        let s = self.check_index(i)?;
        self.ensure_active(s)?;
        Ok(self.active[..s].iter().filter(|&&on| on).count() + 1)
    }

    /// Structural locator of the slot with absolute index `i` (1-based).
    pub fn locator(&self, i: usize) -> Result<WeightLocator> {
        let s = self.check_index(i)?;
        Ok(self.locate_slot(s))
    }

    /// Absolute index (1-based) of the slot at `loc`.
    pub fn index_of(&self, loc: WeightLocator) -> Result<usize> {
        Ok(self.slot_of(loc)? + 1)
    }

    /// Draw active weights uniformly from `(-a, a)`.
    pub fn randomize_weights<R: Rng + ?Sized>(&mut self, rng: &mut R, a: T) -> Result<()> {
        if !(a.is_finite() && a > T::zero()) {
            return Err(Error::Config(format!(
                "weight range must be finite and > 0, got {a}"
            )));
        }
        let unit = Uniform::new(-1.0_f64, 1.0);
        for (v, &on) in self.values.iter_mut().zip(&self.active) {
            if on {
                *v = a * T::lit(unit.sample(rng));
            }
        }
        Ok(())
    }

    /// Active weights as a column vector, in absolute order.
    pub fn weights(&self) -> Matrix<T> {
        Matrix::column(
            self.values
                .iter()
                .zip(&self.active)
                .filter(|&(_, &on)| on)
                .map(|(&v, _)| v)
                .collect(),
        )
    }

    /// Set all active weights from a column vector of length `active_weights()`.
    ///
    /// With `collapse_zeros`, every slot receiving exactly 0 is switched off.
    pub fn set_weights(&mut self, w: &Matrix<T>, collapse_zeros: bool) -> Result<()> {
        if w.cols() != 1 {
            return Err(Error::Dimension(format!(
                "weights should be provided as a column vector (input is {}x{})",
                w.rows(),
                w.cols()
            )));
        }
        if w.size() != self.active_count {
            return Err(Error::Dimension(format!(
                "no. of active weights ({}) and weights provided ({}) disagree",
                self.active_count,
                w.size()
            )));
        }

        let src = w.as_slice();
        let mut j = 0;
        for s in 0..self.values.len() {
            if !self.active[s] {
                continue;
            }
            let v = src[j];
            j += 1;
            if collapse_zeros && v == T::zero() {
                self.toggle_slot(s, false);
            } else {
                self.values[s] = v;
            }
        }
        Ok(())
    }

    // Raw table access for the engine and structural operations.

    #[inline]
    pub(crate) fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    pub(crate) fn active_flags(&self) -> &[bool] {
        &self.active
    }

    #[inline]
    pub(crate) fn neuron_offset(&self, l0: usize) -> usize {
        self.neuron_offsets[l0]
    }

    #[inline]
    pub(crate) fn weight_offset(&self, l0: usize) -> usize {
        self.weight_offsets[l0]
    }

    #[inline]
    pub(crate) fn total_neurons(&self) -> usize {
        self.neuron_offsets[self.layers.len()]
    }

    #[inline]
    pub(crate) fn incoming_raw(&self) -> &[usize] {
        &self.incoming
    }

    #[inline]
    pub(crate) fn outgoing_raw(&self) -> &[usize] {
        &self.outgoing
    }

    /// 0-based slot → 1-based locator. `s` must be in range.
    pub(crate) fn locate_slot(&self, s: usize) -> WeightLocator {
        // weight_offsets is non-decreasing; the last layer whose offset <= s owns s.
        let l0 = self.weight_offsets[1..self.layers.len()].partition_point(|&off| off <= s);
        let fan_in = self.layers[l0 - 1] + 1;
        let r = s - self.weight_offsets[l0];
        WeightLocator::new(l0 + 1, r / fan_in + 1, r % fan_in)
    }

    pub(crate) fn slot_of(&self, loc: WeightLocator) -> Result<usize> {
        self.check_locator(loc)?;
        let l0 = loc.layer - 1;
        Ok(self.weight_offsets[l0] + (loc.neuron - 1) * (self.layers[l0 - 1] + 1) + loc.prev)
    }

    fn check_layer(&self, l: usize) -> Result<()> {
        if l < 1 || l > self.layers.len() {
            return Err(Error::Structural(format!(
                "invalid layer index {l} (number of layers is {})",
                self.layers.len()
            )));
        }
        Ok(())
    }

    fn check_non_input_layer(&self, l: usize) -> Result<()> {
        self.check_layer(l)?;
        if l == 1 {
            return Err(Error::Structural(
                "layer 1 (input layer) has no weights or activation function".to_owned(),
            ));
        }
        Ok(())
    }

    fn check_neuron(&self, l: usize, n: usize) -> Result<()> {
        self.check_layer(l)?;
        if n < 1 || n > self.layers[l - 1] {
            return Err(Error::Structural(format!(
                "invalid neuron index {n} in layer {l} (there are {} neurons in this layer)",
                self.layers[l - 1]
            )));
        }
        Ok(())
    }

    fn check_locator(&self, loc: WeightLocator) -> Result<()> {
        self.check_non_input_layer(loc.layer)?;
        self.check_neuron(loc.layer, loc.neuron)?;
        if loc.prev > self.layers[loc.layer - 2] {
            return Err(Error::Structural(format!(
                "invalid neuron index {} in layer {} (there are {} neurons in this layer)",
                loc.prev,
                loc.layer - 1,
                self.layers[loc.layer - 2]
            )));
        }
        Ok(())
    }

    fn check_index(&self, i: usize) -> Result<usize> {
        if i < 1 || i > self.total_weights() {
            return Err(Error::Structural(format!(
                "invalid weight index {i} (total number of weights is {})",
                self.total_weights()
            )));
        }
        Ok(i - 1)
    }

    fn ensure_active(&self, s: usize) -> Result<()> {
        if self.active[s] {
            return Ok(());
        }
        let loc = self.locate_slot(s);
        Err(Error::Structural(if loc.is_bias() {
            format!("bias of neuron {} in layer {} is off", loc.neuron, loc.layer)
        } else {
            format!(
                "connection between neuron {} in layer {} and neuron {} in layer {} is off",
                loc.neuron,
                loc.layer,
                loc.prev,
                loc.layer - 1
            )
        }))
    }
}

/// Total slot count for `layers`, validating the layer list.
pub(crate) fn slot_count(layers: &[usize]) -> Result<usize> {
    if layers.len() < 2 {
        return Err(Error::Structural(format!(
            "network needs at least 2 layers, got {}",
            layers.len()
        )));
    }
    if let Some(pos) = layers.iter().position(|&n| n == 0) {
        return Err(Error::Structural(format!(
            "layer {} has no neurons; every layer needs at least one",
            pos + 1
        )));
    }
    let mut total: usize = 0;
    for w in layers.windows(2) {
        total = w[0]
            .checked_add(1)
            .and_then(|fan_in| fan_in.checked_mul(w[1]))
            .and_then(|slots| total.checked_add(slots))
            .ok_or_else(|| too_large(layers))?;
    }
    layers
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(n))
        .ok_or_else(|| too_large(layers))?;
    Ok(total)
}

fn too_large(layers: &[usize]) -> Error {
    Error::Structural(format!("layer sizes {layers:?} overflow the weight slot count"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn bias_count(net: &Network<f64>) -> usize {
        (1..=net.total_weights())
            .filter(|&i| net.is_active_at(i).unwrap() && net.locator(i).unwrap().is_bias())
            .count()
    }

    fn incoming_sum(net: &Network<f64>) -> usize {
        (2..=net.num_layers())
            .flat_map(|l| (1..=net.layers()[l - 1]).map(move |n| (l, n)))
            .map(|(l, n)| net.incoming(l, n).unwrap())
            .sum()
    }

    #[test]
    fn construct_builds_full_skeleton() {
        let net = Network::<f64>::new(&[3, 4, 2]).unwrap();
        assert_eq!(net.num_layers(), 3);
        assert_eq!(net.total_weights(), 4 * 4 + 2 * 5);
        assert_eq!(net.active_weights(), net.total_weights());
        assert!(net.weights().as_slice().iter().all(|&w| w == 0.0));
        assert_eq!(net.incoming(2, 1).unwrap(), 3);
        assert_eq!(net.outgoing(1, 3).unwrap(), 4);
        assert_eq!(net.outgoing(2, 4).unwrap(), 2);
        assert_eq!(net.incoming(3, 2).unwrap(), 4);
        assert_eq!(net.activation(2).unwrap().kind, Activation::SymSigmoid);
    }

    #[test]
    fn construct_rejects_bad_layers() {
        assert!(matches!(Network::<f64>::new(&[3]), Err(Error::Structural(_))));
        assert!(matches!(Network::<f64>::new(&[3, 0, 1]), Err(Error::Structural(_))));
        assert!(matches!(
            Network::<f64>::new(&[usize::MAX, 1]),
            Err(Error::Structural(_))
        ));
        assert!(matches!(
            Network::<f64>::new(&[2, usize::MAX / 2, 4]),
            Err(Error::Structural(_))
        ));
    }

    #[test]
    fn from_parts_validates_lengths_and_zeroes_inactive() {
        let total = slot_count(&[2, 1]).unwrap();
        assert_eq!(total, 3);
        let net = Network::from_parts(&[2, 1], vec![true, false, true], vec![0.5, 9.0, -1.0])
            .unwrap();
        assert_eq!(net.active_weights(), 2);
        assert_eq!(net.weights().as_slice(), &[0.5, -1.0]);
        assert_eq!(net.outgoing(1, 1).unwrap(), 0);
        assert_eq!(net.incoming(2, 1).unwrap(), 1);

        assert!(Network::from_parts(&[2, 1], vec![true; 2], vec![0.0_f64; 3]).is_err());
        assert!(Network::from_parts(&[2, 1], vec![true; 3], vec![0.0_f64; 4]).is_err());
    }

    #[test]
    fn counters_match_active_weights() {
        let mut net = Network::<f64>::new(&[3, 4, 2]).unwrap();
        for i in [1, 2, 7, 9, 21, 22] {
            net.set_active_at(i, false).unwrap();
        }
        let inactive = (1..=net.total_weights())
            .filter(|&i| !net.is_active_at(i).unwrap())
            .count();
        assert_eq!(net.active_weights() + inactive, net.total_weights());
        assert_eq!(incoming_sum(&net), net.active_weights() - bias_count(&net));
    }

    #[test]
    fn disable_then_enable_restores_counters() {
        let mut net = Network::<f64>::new(&[2, 3, 1]).unwrap();
        let loc = WeightLocator::new(2, 2, 1);
        let before_in = net.incoming(2, 2).unwrap();
        let before_out = net.outgoing(1, 1).unwrap();
        let before_active = net.active_weights();

        net.set_active(loc, false).unwrap();
        assert_eq!(net.incoming(2, 2).unwrap(), before_in - 1);
        assert_eq!(net.outgoing(1, 1).unwrap(), before_out - 1);
        assert_eq!(net.active_weights(), before_active - 1);
        // Switching off twice is a no-op.
        net.set_active(loc, false).unwrap();
        assert_eq!(net.active_weights(), before_active - 1);

        net.set_active(loc, true).unwrap();
        assert_eq!(net.incoming(2, 2).unwrap(), before_in);
        assert_eq!(net.outgoing(1, 1).unwrap(), before_out);
        assert_eq!(net.active_weights(), before_active);

        // Bias toggles change only the active count.
        net.set_active(WeightLocator::bias(3, 1), false).unwrap();
        assert_eq!(net.incoming(3, 1).unwrap(), 3);
        assert_eq!(net.active_weights(), before_active - 1);
    }

    #[test]
    fn locator_and_index_round_trip() {
        let mut net = Network::<f64>::new(&[3, 2, 2]).unwrap();
        for i in 1..=net.total_weights() {
            let loc = net.locator(i).unwrap();
            assert_eq!(net.index_of(loc).unwrap(), i);
        }
        assert_eq!(net.locator(1).unwrap(), WeightLocator::bias(2, 1));
        assert_eq!(net.locator(4).unwrap(), WeightLocator::new(2, 1, 3));
        assert_eq!(net.locator(5).unwrap(), WeightLocator::bias(2, 2));
        assert_eq!(net.locator(9).unwrap(), WeightLocator::bias(3, 1));

        net.set_active_at(2, false).unwrap();
        net.set_active_at(6, false).unwrap();
        let mut prev = 0;
        for k in 1..=net.active_weights() {
            let i = net.absolute_index(k).unwrap();
            assert!(i > prev);
            assert!(net.is_active_at(i).unwrap());
            assert_eq!(net.active_index(i).unwrap(), k);
            let loc = net.locator(i).unwrap();
            assert_eq!(net.index_of(loc).unwrap(), i);
            prev = i;
        }
        assert_eq!(net.absolute_index(2).unwrap(), 3);
        assert!(net.absolute_index(0).is_err());
        assert!(net.absolute_index(net.active_weights() + 1).is_err());
        assert!(net.locator(net.total_weights() + 1).is_err());
    }

    #[test]
    fn disabled_weights_cannot_be_read_or_written() {
        let mut net = Network::<f64>::new(&[2, 1]).unwrap();
        let loc = WeightLocator::new(2, 1, 2);
        net.set_weight(loc, 0.75).unwrap();
        assert_eq!(net.weight(loc).unwrap(), 0.75);
        net.set_active(loc, false).unwrap();
        assert!(matches!(net.weight(loc), Err(Error::Structural(_))));
        assert!(matches!(net.set_weight(loc, 1.0), Err(Error::Structural(_))));
        net.set_active(loc, true).unwrap();
        assert_eq!(net.weight(loc).unwrap(), 0.0);
    }

    #[test]
    fn bad_locators_are_structural_errors() {
        let net = Network::<f64>::new(&[2, 3, 1]).unwrap();
        for loc in [
            WeightLocator::new(1, 1, 0),
            WeightLocator::new(4, 1, 0),
            WeightLocator::new(2, 4, 0),
            WeightLocator::new(2, 1, 3),
            WeightLocator::new(3, 1, 4),
        ] {
            assert!(matches!(net.weight(loc), Err(Error::Structural(_))), "{loc:?}");
        }
        assert!(net.weight_at(0).is_err());
        assert!(net.layer_size(0).is_err());
    }

    #[test]
    fn set_weights_with_collapse_switches_zeros_off() {
        let mut net = Network::<f64>::new(&[2, 2, 1]).unwrap();
        let w = Matrix::column(vec![0.1, 0.0, 0.3, 0.4, 0.5, 0.0, 0.7, 0.8, 0.9]);
        net.set_weights(&w, false).unwrap();
        assert_eq!(net.active_weights(), 9);
        assert_eq!(net.weights(), w);

        net.set_weights(&w, true).unwrap();
        assert_eq!(net.active_weights(), 7);
        assert!(!net.is_active(WeightLocator::new(2, 1, 1)).unwrap());
        assert!(!net.is_active(WeightLocator::new(2, 2, 2)).unwrap());
        assert_eq!(net.incoming(2, 1).unwrap(), 1);
        assert_eq!(net.outgoing(1, 1).unwrap(), 1);
        assert_eq!(incoming_sum(&net), net.active_weights() - bias_count(&net));

        assert!(net.set_weights(&Matrix::column(vec![1.0; 3]), false).is_err());
        assert!(net.set_weights(&Matrix::zeros(7, 2), false).is_err());
    }

    #[test]
    fn activation_assignment_is_validated() {
        let mut net = Network::<f64>::new(&[2, 2, 1]).unwrap();
        net.set_activation(3, Activation::Linear, None).unwrap();
        assert_eq!(
            net.activation(3).unwrap(),
            LayerActivation {
                kind: Activation::Linear,
                param: 1.0
            }
        );
        net.set_activation(2, Activation::Sigmoid, Some(2.0)).unwrap();
        assert_eq!(net.activation(2).unwrap().param, 2.0);
        assert!(matches!(
            net.set_activation(2, Activation::Sigmoid, Some(-1.0)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            net.set_activation(1, Activation::Linear, None),
            Err(Error::Structural(_))
        ));
    }

    #[test]
    fn randomize_touches_only_active_weights() {
        let mut net = Network::<f64>::new(&[3, 3, 1]).unwrap();
        net.set_active_at(2, false).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        net.randomize_weights(&mut rng, 0.2).unwrap();
        assert!(net.weights().as_slice().iter().all(|w| w.abs() < 0.2));
        assert!(net.weights().as_slice().iter().any(|&w| w != 0.0));
        assert!(net.weight_at(2).is_err());
        assert!(net.randomize_weights(&mut rng, 0.0).is_err());
    }
}

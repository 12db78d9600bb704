//! Structural surgery on a [`Network`]: input remapping, dead-neuron cleanup and
//! composition of two networks.
//!
//! All operations rebuild the offset tables and counters from scratch, so the
//! store invariants hold on the result by construction.

use std::collections::BTreeMap;

use crate::{Error, Network, Result, Scalar};

impl<T: Scalar> Network<T> {
    /// Grow the input layer to `new_count` neurons and move old input `i` to
    /// position `map[i]` (both 1-based).
    ///
    /// Every old input must be mapped, targets must be distinct and within
    /// `1..=new_count`. Connections from newly created inputs start inactive.
    pub fn expand_reorder_inputs(
        &mut self,
        new_count: usize,
        map: &BTreeMap<usize, usize>,
    ) -> Result<()> {
        let old_count = self.input_dim();
        if new_count < old_count {
            return Err(Error::Structural(format!(
                "new number of inputs ({new_count}) is smaller than the current one ({old_count})"
            )));
        }
        if map.len() != old_count || map.keys().any(|&i| i < 1 || i > old_count) {
            return Err(Error::Structural(format!(
                "input map must assign every one of the {old_count} current inputs exactly once"
            )));
        }
        let mut source = vec![None; new_count];
        for (&old, &new) in map {
            if new < 1 || new > new_count {
                return Err(Error::Structural(format!(
                    "input {old} is mapped to {new}, outside 1..={new_count}"
                )));
            }
            if let Some(other) = source[new - 1].replace(old - 1) {
                return Err(Error::Structural(format!(
                    "inputs {} and {old} are both mapped to {new}",
                    other + 1
                )));
            }
        }

        let mut layers = self.layers().to_vec();
        layers[0] = new_count;
        let old_fan_in = old_count + 1;
        let head = self.layers()[1] * old_fan_in;

        let capacity = self.total_weights() - head + self.layers()[1] * (new_count + 1);
        let mut active = Vec::with_capacity(capacity);
        let mut values = Vec::with_capacity(active.capacity());
        for n in 0..self.layers()[1] {
            let base = n * old_fan_in;
            active.push(self.active_flags()[base]);
            values.push(self.values()[base]);
            for src in &source {
                match *src {
                    Some(p) => {
                        active.push(self.active_flags()[base + p + 1]);
                        values.push(self.values()[base + p + 1]);
                    }
                    None => {
                        active.push(false);
                        values.push(T::zero());
                    }
                }
            }
        }
        active.extend_from_slice(&self.active_flags()[head..]);
        values.extend_from_slice(&self.values()[head..]);

        *self = Network::assemble(
            self.name().to_owned(),
            layers,
            active,
            values,
            self.layer_activations().to_vec(),
        )?;
        Ok(())
    }

    /// Remove hidden neurons without incoming or without outgoing connections,
    /// repeating until none is left.
    ///
    /// Returns `(neurons_removed, weights_removed)`. The output of a removed
    /// neuron without incoming connections is a constant; it is folded into the
    /// biases of the next layer so the network function does not change. A
    /// hidden layer keeps its last neuron even when all of them are dead.
    pub fn remove_dead_neurons(&mut self) -> Result<(usize, usize)> {
        let weights_before = self.active_weights();
        let mut neurons_removed = 0;

        loop {
            let mut keep: Vec<Vec<bool>> = self.layers().iter().map(|&n| vec![true; n]).collect();
            let mut removed = 0;
            let mut folds = Vec::new();

            for l0 in 1..self.num_layers() - 1 {
                let first = self.neuron_offset(l0);
                let size = self.layers()[l0];
                let dead: Vec<bool> = (0..size)
                    .map(|n| {
                        self.incoming_raw()[first + n] == 0 || self.outgoing_raw()[first + n] == 0
                    })
                    .collect();
                let all_dead = dead.iter().all(|&d| d);
                for n in 0..size {
                    if !dead[n] || (all_dead && n == size - 1) {
                        continue;
                    }
                    keep[l0][n] = false;
                    removed += 1;
                    if self.incoming_raw()[first + n] == 0 && self.outgoing_raw()[first + n] > 0 {
                        folds.push((l0, n));
                    }
                }
            }

            if removed == 0 {
                break;
            }
            for (l0, n) in folds {
                self.fold_constant_neuron(l0, n)?;
            }
            *self = self.retain_neurons(&keep)?;
            neurons_removed += removed;
        }

        // Folding may switch biases on, so count the net change.
        let weights_removed = weights_before.saturating_sub(self.active_weights());
        tracing::debug!(neurons_removed, weights_removed, "removed dead neurons");
        Ok((neurons_removed, weights_removed))
    }

    /// Remove input neurons without outgoing connections.
    ///
    /// Returns the 1-based indices (in the numbering before the call) of the
    /// inputs that remain. At least one input always remains.
    pub fn remove_dead_input_neurons(&mut self) -> Result<Vec<usize>> {
        let size = self.input_dim();
        let mut keep: Vec<Vec<bool>> = self.layers().iter().map(|&n| vec![true; n]).collect();
        for n in 0..size {
            keep[0][n] = self.outgoing_raw()[n] > 0;
        }
        if keep[0].iter().all(|&k| !k) {
            keep[0][size - 1] = true;
        }
        let survivors: Vec<usize> = (0..size).filter(|&n| keep[0][n]).map(|n| n + 1).collect();
        if survivors.len() < size {
            let weights_before = self.active_weights();
            *self = self.retain_neurons(&keep)?;
            tracing::debug!(
                inputs_removed = size - survivors.len(),
                weights_removed = weights_before - self.active_weights(),
                "removed dead input neurons"
            );
        }
        Ok(survivors)
    }

    /// Add the constant output of neuron `n` (0-based, layer `l0`) to the biases
    /// of the neurons it feeds.
    fn fold_constant_neuron(&mut self, l0: usize, n: usize) -> Result<()> {
        let fan_in = self.layers()[l0 - 1] + 1;
        let bias_slot = self.weight_offset(l0) + n * fan_in;
        let act = self.layer_activations()[l0 - 1];
        let c = act.kind.forward(self.values()[bias_slot], act.param);

        let next_fan_in = self.layers()[l0] + 1;
        for m in 0..self.layers()[l0 + 1] {
            let base = self.weight_offset(l0 + 1) + m * next_fan_in;
            let link = base + n + 1;
            if !self.active_flags()[link] {
                continue;
            }
            let shift = self.values()[link] * c;
            if shift == T::zero() {
                continue;
            }
            self.toggle_slot(base, true);
            let b = self.values()[base];
            self.set_weight_at(base + 1, b + shift)?;
        }
        Ok(())
    }

    /// Copy of `self` that keeps only the neurons flagged in `keep` (one mask per
    /// layer).
    fn retain_neurons(&self, keep: &[Vec<bool>]) -> Result<Self> {
        let layers: Vec<usize> = keep.iter().map(|k| k.iter().filter(|&&x| x).count()).collect();
        let mut active = Vec::new();
        let mut values = Vec::new();

        for l0 in 1..self.num_layers() {
            let fan_in = self.layers()[l0 - 1] + 1;
            for n in (0..self.layers()[l0]).filter(|&n| keep[l0][n]) {
                let base = self.weight_offset(l0) + n * fan_in;
                active.push(self.active_flags()[base]);
                values.push(self.values()[base]);
                for p in (0..fan_in - 1).filter(|&p| keep[l0 - 1][p]) {
                    active.push(self.active_flags()[base + p + 1]);
                    values.push(self.values()[base + p + 1]);
                }
            }
        }

        Network::assemble(
            self.name().to_owned(),
            layers,
            active,
            values,
            self.layer_activations().to_vec(),
        )
    }
}

/// Place `a` and `b` side by side in one network.
///
/// Every layer of the result holds the neurons of `a` followed by those of
/// `b`; there are no connections between the two halves. With `same_inputs`
/// both networks read the same input vector, otherwise the input of `b` is
/// appended to the input of `a`. Both networks need the same number of layers
/// and identical activations per layer.
pub fn merge<T: Scalar>(a: &Network<T>, b: &Network<T>, same_inputs: bool) -> Result<Network<T>> {
    if a.num_layers() != b.num_layers() {
        return Err(Error::Structural(format!(
            "cannot merge networks with {} and {} layers",
            a.num_layers(),
            b.num_layers()
        )));
    }
    if same_inputs && a.input_dim() != b.input_dim() {
        return Err(Error::Structural(format!(
            "cannot merge networks sharing inputs with {} and {} inputs",
            a.input_dim(),
            b.input_dim()
        )));
    }
    if a.layer_activations() != b.layer_activations() {
        return Err(Error::Structural(
            "activation functions in networks disagree".to_owned(),
        ));
    }

    let mut layers: Vec<usize> = a.layers().iter().zip(b.layers()).map(|(x, y)| x + y).collect();
    if same_inputs {
        layers[0] = a.input_dim();
    }

    let mut active = Vec::new();
    let mut values = Vec::new();
    for l0 in 1..layers.len() {
        let prev = layers[l0 - 1];
        // (network, first previous-layer neuron it reads from)
        let halves = [
            (a, 0),
            (b, if l0 == 1 && same_inputs { 0 } else { a.layers()[l0 - 1] }),
        ];
        for (net, shift) in halves {
            let own_prev = net.layers()[l0 - 1];
            let fan_in = own_prev + 1;
            for n in 0..net.layers()[l0] {
                let base = net.weight_offset(l0) + n * fan_in;
                active.push(net.active_flags()[base]);
                values.push(net.values()[base]);
                for p in 0..prev {
                    if p >= shift && p - shift < own_prev {
                        active.push(net.active_flags()[base + p - shift + 1]);
                        values.push(net.values()[base + p - shift + 1]);
                    } else {
                        active.push(false);
                        values.push(T::zero());
                    }
                }
            }
        }
    }

    Network::assemble(
        String::new(),
        layers,
        active,
        values,
        a.layer_activations().to_vec(),
    )
}

/// Feed the outputs of `a` into `b`.
///
/// The output layer of `a` becomes a hidden layer of the result, keeping its
/// activation. Requires `a.output_dim() == b.input_dim()`.
pub fn stack<T: Scalar>(a: &Network<T>, b: &Network<T>) -> Result<Network<T>> {
    if a.output_dim() != b.input_dim() {
        return Err(Error::Structural(format!(
            "cannot stack a network with {} outputs onto a network with {} inputs",
            a.output_dim(),
            b.input_dim()
        )));
    }

    let layers: Vec<usize> = a.layers().iter().chain(&b.layers()[1..]).copied().collect();
    let active = [a.active_flags(), b.active_flags()].concat();
    let values = [a.values(), b.values()].concat();
    let activations = [a.layer_activations(), b.layer_activations()].concat();

    Network::assemble(String::new(), layers, active, values, activations)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Activation, WeightLocator};

    fn ramp(layers: &[usize]) -> Network<f64> {
        let mut net = Network::new(layers).unwrap();
        let n = net.total_weights();
        let w = crate::Matrix::column((1..=n).map(|i| i as f64 / 10.0).collect());
        net.set_weights(&w, false).unwrap();
        net
    }

    #[test]
    fn expand_reorder_moves_connections() {
        let mut net = ramp(&[2, 1]);
        let map = BTreeMap::from([(1, 3), (2, 1)]);
        net.expand_reorder_inputs(4, &map).unwrap();

        assert_eq!(net.layers(), &[4, 1]);
        assert_eq!(net.active_weights(), 3);
        assert_eq!(net.weight(WeightLocator::bias(2, 1)).unwrap(), 0.1);
        assert_eq!(net.weight(WeightLocator::new(2, 1, 3)).unwrap(), 0.2);
        assert_eq!(net.weight(WeightLocator::new(2, 1, 1)).unwrap(), 0.3);
        assert!(!net.is_active(WeightLocator::new(2, 1, 2)).unwrap());
        assert!(!net.is_active(WeightLocator::new(2, 1, 4)).unwrap());
        assert_eq!(net.outgoing(1, 2).unwrap(), 0);
    }

    #[test]
    fn expand_reorder_rejects_bad_maps() {
        let mut net = ramp(&[2, 1]);
        let partial = BTreeMap::from([(1, 1)]);
        assert!(net.expand_reorder_inputs(2, &partial).is_err());
        let clash = BTreeMap::from([(1, 2), (2, 2)]);
        assert!(net.expand_reorder_inputs(2, &clash).is_err());
        let out_of_range = BTreeMap::from([(1, 1), (2, 5)]);
        assert!(net.expand_reorder_inputs(3, &out_of_range).is_err());
        assert_eq!(net.layers(), &[2, 1]);
    }

    #[test]
    fn dead_neurons_are_removed_until_fixed_point() {
        let mut net = ramp(&[2, 3, 1]);
        // Neuron 2 of layer 2 loses its only output: dead.
        net.set_active(WeightLocator::new(3, 1, 2), false).unwrap();
        let active = net.active_weights();

        let (n, w) = net.remove_dead_neurons().unwrap();
        assert_eq!(n, 1);
        assert_eq!(w, 3);
        assert_eq!(net.layers(), &[2, 2, 1]);
        assert_eq!(net.active_weights(), active - 3);
        assert_eq!(net.remove_dead_neurons().unwrap(), (0, 0));
    }

    #[test]
    fn dead_neurons_with_constant_output_fold_into_bias() {
        let mut net = ramp(&[1, 2, 1]);
        net.set_active(WeightLocator::new(2, 1, 1), false).unwrap();
        let b = net.weight(WeightLocator::bias(2, 1)).unwrap();
        let w = net.weight(WeightLocator::new(3, 1, 1)).unwrap();
        let b_out = net.weight(WeightLocator::bias(3, 1)).unwrap();
        let c = Activation::SymSigmoid.forward(b, 0.5);

        let (n, _) = net.remove_dead_neurons().unwrap();
        assert_eq!(n, 1);
        assert_eq!(net.layers(), &[1, 1, 1]);
        let folded = net.weight(WeightLocator::bias(3, 1)).unwrap();
        assert!((folded - (b_out + w * c)).abs() < 1e-12);
    }

    #[test]
    fn hidden_layer_is_never_emptied() {
        let mut net = ramp(&[2, 2, 1]);
        net.set_active(WeightLocator::new(3, 1, 1), false).unwrap();
        net.set_active(WeightLocator::new(3, 1, 2), false).unwrap();
        let (n, _) = net.remove_dead_neurons().unwrap();
        assert_eq!(n, 1);
        assert_eq!(net.layers(), &[2, 1, 1]);
        assert_eq!(net.remove_dead_neurons().unwrap(), (0, 0));
    }

    #[test]
    fn dead_inputs_are_reported_in_original_numbering() {
        let mut net = ramp(&[3, 1]);
        net.set_active(WeightLocator::new(2, 1, 2), false).unwrap();
        let kept = net.remove_dead_input_neurons().unwrap();
        assert_eq!(kept, vec![1, 3]);
        assert_eq!(net.layers(), &[2, 1]);
        assert_eq!(net.weight(WeightLocator::new(2, 1, 2)).unwrap(), 0.4);
    }

    #[test]
    fn merge_is_block_diagonal() {
        let a = ramp(&[2, 2, 1]);
        let b = ramp(&[3, 1, 2]);
        let m = merge(&a, &b, false).unwrap();
        assert_eq!(m.layers(), &[5, 3, 3]);
        assert_eq!(m.active_weights(), a.active_weights() + b.active_weights());
        assert_eq!(
            m.weight(WeightLocator::new(2, 3, 3)).unwrap(),
            b.weight(WeightLocator::new(2, 1, 1)).unwrap()
        );
        assert!(!m.is_active(WeightLocator::new(2, 3, 1)).unwrap());
        assert!(!m.is_active(WeightLocator::new(3, 1, 3)).unwrap());

        let shared = merge(&a, &ramp(&[2, 1, 1]), true).unwrap();
        assert_eq!(shared.layers(), &[2, 3, 2]);
        assert_eq!(shared.incoming(2, 3).unwrap(), 2);
    }

    #[test]
    fn merge_rejects_incompatible_networks() {
        let a = ramp(&[2, 2, 1]);
        assert!(merge(&a, &ramp(&[2, 1]), false).is_err());
        assert!(merge(&a, &ramp(&[3, 2, 1]), true).is_err());
        let mut c = ramp(&[2, 2, 1]);
        c.set_activation(3, Activation::Linear, None).unwrap();
        assert!(merge(&a, &c, false).is_err());
    }

    #[test]
    fn stack_chains_layers_and_activations() {
        let mut a = ramp(&[2, 3]);
        a.set_activation(2, Activation::Relu, None).unwrap();
        let b = ramp(&[3, 2, 1]);
        let s = stack(&a, &b).unwrap();
        assert_eq!(s.layers(), &[2, 3, 2, 1]);
        assert_eq!(s.total_weights(), a.total_weights() + b.total_weights());
        assert_eq!(s.activation(2).unwrap().kind, Activation::Relu);
        assert_eq!(s.activation(4).unwrap().kind, Activation::SymSigmoid);
        assert!(stack(&b, &a).is_err());
    }
}

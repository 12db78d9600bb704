//! Forward and backward passes.
//!
//! The weight slots of layer `l` are stored neuron after neuron with the bias
//! first, which is exactly a column-major `(L[l-1] + 1) x L[l]` matrix. The
//! engine feeds those blocks straight to the GEMM backend:
//!
//! - forward: `Z = A_prev * W + 1 b^T`, `A = f(Z)`
//! - backward: `G = A_prev^T * Delta`, `Delta_prev = (Delta * W^T) .* f'(A_prev)`
//!
//! Inactive slots hold 0 and take part in every product unconditionally; their
//! gradient entries are dropped when the active vector is assembled.
//!
//! Inputs are `N x L0` matrices (one record per row), outputs `N x O`.

use crate::linalg::{Backend, DefaultBackend};
use crate::{Error, Matrix, Network, Result, Scalar};

impl<T: Scalar> Network<T> {
    /// Network outputs for every record of `input` (`N x O`).
    pub fn eval(&self, input: &Matrix<T>) -> Result<Matrix<T>> {
        self.check_input(input)?;
        let n = input.rows();
        let mut acts = self.forward(input.as_slice(), n);
        let out = acts.pop().unwrap_or_default();
        Matrix::from_col_major(n, self.output_dim(), out)
    }

    /// Mean squared error `sum(e^2) / (2 N O)`.
    pub fn mse(&self, input: &Matrix<T>, output: &Matrix<T>) -> Result<T> {
        self.check_pair(input, output)?;
        let y = self.eval(input)?;
        Ok(mse_of(y.as_slice(), output.as_slice()))
    }

    /// Gradient of the MSE over the active weights (column vector) and the MSE.
    pub fn grad(&self, input: &Matrix<T>, output: &Matrix<T>) -> Result<(Matrix<T>, T)> {
        self.check_pair(input, output)?;
        let n = input.rows();
        let acts = self.forward(input.as_slice(), n);
        let y = acts.last().map(Vec::as_slice).unwrap_or_default();

        let mse = mse_of(y, output.as_slice());
        let norm = T::lit((n * self.output_dim()) as f64);
        let delta: Vec<T> = y
            .iter()
            .zip(output.as_slice())
            .map(|(&yv, &tv)| (yv - tv) / norm)
            .collect();

        let (g, _) = self.backward(&acts, n, delta, false);
        Ok((self.gather_active(&g), mse))
    }

    /// Gradient of `sum(e^2) / (2 O)` over the active weights for record `i`
    /// (1-based) alone.
    pub fn gradi(&self, input: &Matrix<T>, output: &Matrix<T>, i: usize) -> Result<Matrix<T>> {
        self.check_pair(input, output)?;
        check_record(input, i)?;
        let x = input.row(i)?;
        let t = output.row(i)?;
        let acts = self.forward(x.as_slice(), 1);
        let y = acts.last().map(Vec::as_slice).unwrap_or_default();

        let norm = T::lit(self.output_dim() as f64);
        let delta: Vec<T> = y
            .iter()
            .zip(t.as_slice())
            .map(|(&yv, &tv)| (yv - tv) / norm)
            .collect();

        let (g, _) = self.backward(&acts, 1, delta, false);
        Ok(self.gather_active(&g))
    }

    /// Output derivatives for record `i` (1-based): an `active x O` matrix whose
    /// column `o` is the derivative of output `o` with respect to the active
    /// weights.
    pub fn gradij(&self, input: &Matrix<T>, i: usize) -> Result<Matrix<T>> {
        self.check_input(input)?;
        check_record(input, i)?;
        let x = input.row(i)?;
        let acts = self.forward(x.as_slice(), 1);

        let outputs = self.output_dim();
        let mut data = Vec::with_capacity(self.active_weights() * outputs);
        for o in 0..outputs {
            let mut unit = vec![T::zero(); outputs];
            unit[o] = T::one();
            let (g, _) = self.backward(&acts, 1, unit, false);
            data.extend(self.active_values(&g));
        }
        Matrix::from_col_major(self.active_weights(), outputs, data)
    }

    /// Input derivatives for record `i` (1-based): an `L0 x O` matrix whose column
    /// `o` is the derivative of output `o` with respect to the inputs.
    pub fn jacob(&self, input: &Matrix<T>, i: usize) -> Result<Matrix<T>> {
        self.check_input(input)?;
        check_record(input, i)?;
        let x = input.row(i)?;
        let acts = self.forward(x.as_slice(), 1);

        let outputs = self.output_dim();
        let mut data = Vec::with_capacity(self.input_dim() * outputs);
        for o in 0..outputs {
            let mut unit = vec![T::zero(); outputs];
            unit[o] = T::one();
            let (_, dx) = self.backward(&acts, 1, unit, true);
            data.extend(dx);
        }
        Matrix::from_col_major(self.input_dim(), outputs, data)
    }

    /// Activations of every layer for `n` column-major records; entry 0 is the
    /// input itself.
    fn forward(&self, input: &[T], n: usize) -> Vec<Vec<T>> {
        let layers = self.layers();
        let mut acts = Vec::with_capacity(layers.len());
        acts.push(input.to_vec());

        for l0 in 1..layers.len() {
            let prev = layers[l0 - 1];
            let size = layers[l0];
            let fan_in = prev + 1;
            let w = &self.values()[self.weight_offset(l0)..self.weight_offset(l0 + 1)];

            let mut z = Vec::with_capacity(n * size);
            for j in 0..size {
                z.extend(std::iter::repeat_n(w[j * fan_in], n));
            }
            DefaultBackend::gemm(
                n,
                size,
                prev,
                T::one(),
                &acts[l0 - 1],
                1,
                n,
                &w[1..],
                1,
                fan_in,
                T::one(),
                &mut z,
                1,
                n,
            );

            let act = self.layer_activations()[l0 - 1];
            for v in &mut z {
                *v = act.kind.forward(*v, act.param);
            }
            acts.push(z);
        }
        acts
    }

    /// Backpropagate `delta` (derivative of the loss with respect to the network
    /// outputs, `n x O`) and return the gradient over all slots, plus the
    /// derivative with respect to the inputs when `want_input` is set.
    fn backward(
        &self,
        acts: &[Vec<T>],
        n: usize,
        mut delta: Vec<T>,
        want_input: bool,
    ) -> (Vec<T>, Vec<T>) {
        let layers = self.layers();
        let mut grad = vec![T::zero(); self.total_weights()];
        let mut dx = Vec::new();

        for l0 in (1..layers.len()).rev() {
            let prev = layers[l0 - 1];
            let size = layers[l0];
            let fan_in = prev + 1;
            let off = self.weight_offset(l0);

            let act = self.layer_activations()[l0 - 1];
            for (d, &y) in delta.iter_mut().zip(&acts[l0]) {
                *d = *d * act.kind.grad_from_output(y, act.param);
            }

            let g = &mut grad[off..self.weight_offset(l0 + 1)];
            for j in 0..size {
                g[j * fan_in] = delta[j * n..(j + 1) * n]
                    .iter()
                    .fold(T::zero(), |acc, &d| acc + d);
            }
            DefaultBackend::gemm(
                prev,
                size,
                n,
                T::one(),
                &acts[l0 - 1],
                n,
                1,
                &delta,
                1,
                n,
                T::zero(),
                &mut g[1..],
                1,
                fan_in,
            );

            if l0 == 1 && !want_input {
                break;
            }
            let w = &self.values()[off..self.weight_offset(l0 + 1)];
            let mut back = vec![T::zero(); n * prev];
            DefaultBackend::gemm(
                n,
                prev,
                size,
                T::one(),
                &delta,
                1,
                n,
                &w[1..],
                fan_in,
                1,
                T::zero(),
                &mut back,
                1,
                n,
            );
            if l0 == 1 {
                dx = back;
                break;
            }
            delta = back;
        }
        (grad, dx)
    }

    fn active_values<'a>(&'a self, slots: &'a [T]) -> impl Iterator<Item = T> + 'a {
        slots
            .iter()
            .zip(self.active_flags())
            .filter(|&(_, &on)| on)
            .map(|(&v, _)| v)
    }

    fn gather_active(&self, slots: &[T]) -> Matrix<T> {
        Matrix::column(self.active_values(slots).collect())
    }

    fn check_input(&self, input: &Matrix<T>) -> Result<()> {
        if input.rows() == 0 {
            return Err(Error::Dimension("input matrix has no records".to_owned()));
        }
        if input.cols() != self.input_dim() {
            return Err(Error::Dimension(format!(
                "input has {} columns, network has {} inputs",
                input.cols(),
                self.input_dim()
            )));
        }
        Ok(())
    }

    pub(crate) fn check_pair(&self, input: &Matrix<T>, output: &Matrix<T>) -> Result<()> {
        self.check_input(input)?;
        if output.cols() != self.output_dim() {
            return Err(Error::Dimension(format!(
                "output has {} columns, network has {} outputs",
                output.cols(),
                self.output_dim()
            )));
        }
        if output.rows() != input.rows() {
            return Err(Error::Dimension(format!(
                "input has {} records, output has {}",
                input.rows(),
                output.rows()
            )));
        }
        Ok(())
    }
}

fn check_record<T: Scalar>(input: &Matrix<T>, i: usize) -> Result<()> {
    if i < 1 || i > input.rows() {
        return Err(Error::Dimension(format!(
            "invalid record index {i} (number of records is {})",
            input.rows()
        )));
    }
    Ok(())
}

fn mse_of<T: Scalar>(y: &[T], t: &[T]) -> T {
    let sum = y
        .iter()
        .zip(t)
        .fold(T::zero(), |acc, (&yv, &tv)| acc + (yv - tv) * (yv - tv));
    sum / T::lit(2.0 * y.len() as f64)
}

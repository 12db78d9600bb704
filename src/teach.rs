//! Teaching algorithms.
//!
//! Three full-gradient driven optimizers over the active weights of a
//! [`Network`]:
//! - batch gradient descent (`teach_bp`)
//! - resilient propagation (`teach_rprop`)
//! - mini-batch stochastic gradient descent with optional RMS scaling, step
//!   decay and momentum (`teach_sgd`)
//!
//! Every run stops as soon as the MSE drops below `tol_level` or after
//! `max_epochs` weight updates, and reports the final MSE together with the
//! number of updates applied. Progress is emitted through `tracing` at `info`
//! level every `report_freq` epochs (`0` disables reporting).
//!
//! Weight decay (`l2reg`) adds `l2reg * w` to the gradient before each update.

use rand::Rng;

use crate::{Dataset, Error, Matrix, Network, Result, Scalar};

/// Outcome of a teaching run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeachReport<T> {
    /// MSE on the full dataset after the last update.
    pub mse: T,
    /// Number of weight updates applied.
    pub epochs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackpropConfig<T> {
    pub tol_level: T,
    pub max_epochs: usize,
    pub learn_rate: T,
    pub report_freq: usize,
    pub l2reg: T,
}

impl<T: Scalar> Default for BackpropConfig<T> {
    fn default() -> Self {
        Self {
            tol_level: T::lit(1e-2),
            max_epochs: 1000,
            learn_rate: T::lit(0.7),
            report_freq: 0,
            l2reg: T::zero(),
        }
    }
}

impl<T: Scalar> BackpropConfig<T> {
    pub fn validate(&self) -> Result<()> {
        validate_common(self.tol_level, self.l2reg)?;
        validate_learn_rate(self.learn_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpropConfig<T> {
    pub tol_level: T,
    pub max_epochs: usize,
    pub report_freq: usize,
    pub l2reg: T,
    /// Step growth factor (> 1).
    pub u: T,
    /// Step shrink factor (in `(0, 1)`).
    pub d: T,
    /// Largest step.
    pub gmax: T,
    /// Smallest step.
    pub gmin: T,
}

impl<T: Scalar> Default for RpropConfig<T> {
    fn default() -> Self {
        Self {
            tol_level: T::lit(1e-2),
            max_epochs: 1000,
            report_freq: 0,
            l2reg: T::zero(),
            u: T::lit(1.2),
            d: T::lit(0.5),
            gmax: T::lit(50.0),
            gmin: T::lit(1e-6),
        }
    }
}

impl<T: Scalar> RpropConfig<T> {
    pub fn validate(&self) -> Result<()> {
        validate_common(self.tol_level, self.l2reg)?;
        if !(self.u.is_finite() && self.u > T::one()) {
            return Err(Error::Config(format!(
                "Rprop growth factor u must be finite and > 1, got {}",
                self.u
            )));
        }
        if !(self.d > T::zero() && self.d < T::one()) {
            return Err(Error::Config(format!(
                "Rprop shrink factor d must be in (0, 1), got {}",
                self.d
            )));
        }
        if !(self.gmin > T::zero() && self.gmin <= self.gmax && self.gmax.is_finite()) {
            return Err(Error::Config(format!(
                "Rprop step bounds must satisfy 0 < gmin <= gmax < inf, got gmin {} and gmax {}",
                self.gmin, self.gmax
            )));
        }
        Ok(())
    }

    /// Rprop settings used to retrain after a pruning step.
    pub(crate) fn retrain(tol_level: T, max_epochs: usize) -> Self {
        Self {
            tol_level,
            max_epochs,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdConfig<T> {
    pub tol_level: T,
    pub max_epochs: usize,
    pub learn_rate: T,
    pub report_freq: usize,
    pub l2reg: T,
    /// Records per minibatch (`1 <= minibatch_size < N`).
    pub minibatch_size: usize,
    /// Decay of the running mean of squared gradients; `0` disables RMS scaling.
    pub lambda: T,
    /// Step decay: epoch `i` divides the step by `1 + gamma (i - 1)`.
    pub gamma: T,
    /// Momentum; `0` disables it.
    pub momentum: T,
}

impl<T: Scalar> Default for SgdConfig<T> {
    fn default() -> Self {
        Self {
            tol_level: T::lit(1e-2),
            max_epochs: 1000,
            learn_rate: T::lit(0.7),
            report_freq: 0,
            l2reg: T::zero(),
            minibatch_size: 100,
            lambda: T::lit(0.1),
            gamma: T::zero(),
            momentum: T::lit(0.5),
        }
    }
}

impl<T: Scalar> SgdConfig<T> {
    pub fn validate(&self) -> Result<()> {
        validate_common(self.tol_level, self.l2reg)?;
        validate_learn_rate(self.learn_rate)?;
        if !(self.lambda >= T::zero() && self.lambda <= T::one()) {
            return Err(Error::Config(format!(
                "lambda must be in [0, 1], got {}",
                self.lambda
            )));
        }
        if !(self.gamma.is_finite() && self.gamma >= T::zero()) {
            return Err(Error::Config(format!(
                "gamma must be finite and >= 0, got {}",
                self.gamma
            )));
        }
        if !(self.momentum >= T::zero() && self.momentum < T::one()) {
            return Err(Error::Config(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        Ok(())
    }
}

fn validate_common<T: Scalar>(tol_level: T, l2reg: T) -> Result<()> {
    if !(tol_level.is_finite() && tol_level > T::zero()) {
        return Err(Error::Config(format!(
            "tolerance level should be positive, got {tol_level}"
        )));
    }
    if !(l2reg.is_finite() && l2reg >= T::zero()) {
        return Err(Error::Config(format!(
            "L2 regularization parameter should be nonnegative, got {l2reg}"
        )));
    }
    Ok(())
}

fn validate_learn_rate<T: Scalar>(learn_rate: T) -> Result<()> {
    if !(learn_rate.is_finite() && learn_rate > T::zero()) {
        return Err(Error::Config(format!(
            "learning rate should be positive, got {learn_rate}"
        )));
    }
    Ok(())
}

fn report_progress<T: Scalar>(method: &'static str, freq: usize, epoch: usize, mse: T, tol: T) {
    if freq != 0 && epoch % freq == 0 {
        tracing::info!(method, epoch, mse = %mse, desired = %tol, "teaching progress");
    }
}

/// `g + l2reg * w`, skipped when `l2reg == 0`.
fn regularize<T: Scalar>(g: Matrix<T>, w: &Matrix<T>, l2reg: T) -> Matrix<T> {
    if l2reg == T::zero() { g } else { &g + &(w * l2reg) }
}

impl<T: Scalar> Network<T> {
    /// Batch gradient descent: `w <- w - learn_rate * (g + l2reg * w)`.
    pub fn teach_bp(
        &mut self,
        data: &Dataset<T>,
        cfg: &BackpropConfig<T>,
    ) -> Result<TeachReport<T>> {
        cfg.validate()?;
        let (x, t) = (data.input(), data.output());

        let (mut g, mut mse) = self.grad(x, t)?;
        if mse < cfg.tol_level {
            return Ok(TeachReport { mse, epochs: 0 });
        }
        let mut w0 = self.weights();

        let mut epochs = 0;
        for i in 1..=cfg.max_epochs {
            g = regularize(g, &w0, cfg.l2reg);
            let w1 = &w0 - &(&g * cfg.learn_rate);
            self.set_weights(&w1, false)?;
            (g, mse) = self.grad(x, t)?;
            epochs = i;
            report_progress("backpropagation", cfg.report_freq, i, mse, cfg.tol_level);
            if mse < cfg.tol_level {
                break;
            }
            w0 = w1;
        }
        Ok(TeachReport { mse, epochs })
    }

    /// Resilient propagation.
    ///
    /// A first plain step `w <- w - 0.7 g` seeds the previous gradient. Each
    /// weight then keeps its own step size: it grows by `u` (up to `gmax`) while
    /// the gradient sign is stable and shrinks by `d` (down to `gmin`) when the
    /// sign flips, in which case the weight is left unchanged for that epoch.
    pub fn teach_rprop(
        &mut self,
        data: &Dataset<T>,
        cfg: &RpropConfig<T>,
    ) -> Result<TeachReport<T>> {
        cfg.validate()?;
        let (x, t) = (data.input(), data.output());

        let (g0, mse) = self.grad(x, t)?;
        if mse < cfg.tol_level || cfg.max_epochs == 0 {
            return Ok(TeachReport { mse, epochs: 0 });
        }
        let w0 = self.weights();
        let g0 = regularize(g0, &w0, cfg.l2reg);
        let mut w0 = &w0 - &(&g0 * T::lit(0.7));
        self.set_weights(&w0, false)?;

        let (mut g1, mut mse) = self.grad(x, t)?;
        report_progress("Rprop", cfg.report_freq, 1, mse, cfg.tol_level);
        if mse < cfg.tol_level || cfg.max_epochs <= 1 {
            return Ok(TeachReport { mse, epochs: 1 });
        }

        let n = w0.size();
        let step0 = if cfg.gmin > T::lit(0.1) {
            cfg.gmin
        } else if cfg.gmax > T::lit(0.1) {
            T::lit(0.1)
        } else {
            cfg.gmax
        };
        let mut gamma = vec![step0; n];
        let mut dw = vec![T::zero(); n];
        let mut g0 = g0;

        let mut epochs = 1;
        for i in 2..=cfg.max_epochs {
            for k in 0..n {
                let a = g0.as_slice()[k];
                let b = g1.as_slice()[k];
                let sign = a * b;
                if sign > T::zero() {
                    dw[k] = if b > T::zero() { -gamma[k] } else { gamma[k] };
                    gamma[k] = (cfg.u * gamma[k]).min(cfg.gmax);
                } else if sign < T::zero() {
                    dw[k] = T::zero();
                    gamma[k] = (cfg.d * gamma[k]).max(cfg.gmin);
                } else if b > T::zero() {
                    dw[k] = -gamma[k];
                } else if b < T::zero() {
                    dw[k] = gamma[k];
                } else {
                    dw[k] = T::zero();
                }
            }

            let w1 = Matrix::column(w0.as_slice().iter().zip(&dw).map(|(&w, &d)| w + d).collect());
            self.set_weights(&w1, false)?;
            let (g, m) = self.grad(x, t)?;
            g0 = g1;
            g1 = regularize(g, &w1, cfg.l2reg);
            mse = m;
            epochs = i;
            report_progress("Rprop", cfg.report_freq, i, mse, cfg.tol_level);
            if mse < cfg.tol_level {
                break;
            }
            w0 = w1;
        }
        Ok(TeachReport { mse, epochs })
    }

    /// Mini-batch stochastic gradient descent.
    ///
    /// Each epoch draws `minibatch_size` distinct records from `rng`. The step
    /// `-learn_rate * g` is divided by the root of a running mean of squared
    /// gradients when `lambda > 0`, by `1 + gamma (i - 1)` when `gamma > 0`, and
    /// combined with the previous step when `momentum > 0`. Convergence is first
    /// checked on the minibatch and then confirmed on the full dataset.
    pub fn teach_sgd<R: Rng + ?Sized>(
        &mut self,
        data: &Dataset<T>,
        cfg: &SgdConfig<T>,
        rng: &mut R,
    ) -> Result<TeachReport<T>> {
        cfg.validate()?;
        let records = data.len();
        let m = cfg.minibatch_size;
        if m < 1 || m >= records {
            return Err(Error::Config(format!(
                "minibatch size should be at least 1 and less than the number of records \
                 ({records}), got {m}"
            )));
        }
        self.check_pair(data.input(), data.output())?;
        let (x, t) = (data.input(), data.output());
        let w_count = self.active_weights();

        let mut ms = (cfg.lambda != T::zero()).then(|| vec![T::one(); w_count]);
        let mut mm = (cfg.momentum != T::zero()).then(|| vec![T::zero(); w_count]);

        let batch = draw_minibatch(data, m, rng)?;
        let (g, mut mse) = self.grad(batch.input(), batch.output())?;
        let mut w0 = self.weights();
        let mut g = regularize(g, &w0, cfg.l2reg);
        if mse < cfg.tol_level {
            mse = self.mse(x, t)?;
            if mse < cfg.tol_level {
                return Ok(TeachReport { mse, epochs: 0 });
            }
        }

        let mut full_checked = false;
        let mut epochs = 0;
        for i in 1..=cfg.max_epochs {
            let mut dw: Vec<T> = g.as_slice().iter().map(|&gk| -cfg.learn_rate * gk).collect();
            if let Some(ms) = ms.as_mut() {
                for ((d, s), &gk) in dw.iter_mut().zip(ms.iter_mut()).zip(g.as_slice()) {
                    *d = *d / s.sqrt();
                    *s = (T::one() - cfg.lambda) * *s + cfg.lambda * gk * gk;
                }
            }
            if cfg.gamma != T::zero() {
                let decay = T::one() + cfg.gamma * T::lit((i - 1) as f64);
                for d in &mut dw {
                    *d = *d / decay;
                }
            }
            if let Some(mm) = mm.as_mut() {
                for (d, prev) in dw.iter_mut().zip(mm.iter_mut()) {
                    *d = cfg.momentum * *prev + *d;
                    *prev = *d;
                }
            }

            let w1 = Matrix::column(w0.as_slice().iter().zip(&dw).map(|(&w, &d)| w + d).collect());
            self.set_weights(&w1, false)?;
            let batch = draw_minibatch(data, m, rng)?;
            let (gb, mb) = self.grad(batch.input(), batch.output())?;
            g = regularize(gb, &w1, cfg.l2reg);
            mse = mb;
            full_checked = false;
            epochs = i;
            report_progress("stochastic gradient descent", cfg.report_freq, i, mse, cfg.tol_level);
            if mse < cfg.tol_level {
                mse = self.mse(x, t)?;
                full_checked = true;
                if mse < cfg.tol_level {
                    break;
                }
            }
            w0 = w1;
        }
        if !full_checked {
            mse = self.mse(x, t)?;
        }
        Ok(TeachReport { mse, epochs })
    }
}

fn draw_minibatch<T: Scalar, R: Rng + ?Sized>(
    data: &Dataset<T>,
    m: usize,
    rng: &mut R,
) -> Result<Dataset<T>> {
    let idx: Vec<usize> = rand::seq::index::sample(rng, data.len(), m)
        .into_iter()
        .map(|i| i + 1)
        .collect();
    data.subset(&idx)
}

//! Pruning algorithms.
//!
//! Both pruners repeat the same step until removing one more weight would push
//! the MSE above `tol_level` even after retraining:
//!
//! 1. pick the active weight with the smallest saliency
//! 2. switch it off (OBS first corrects the remaining weights)
//! 3. if the MSE exceeds the tolerance, retrain with Rprop for at most
//!    `max_reteach_iter` epochs; if that fails, restore the previous weights and
//!    stop
//! 4. remove neurons left without incoming or outgoing connections
//!
//! The network must already meet the tolerance before pruning starts.

use crate::linalg::{Backend, DefaultBackend};
use crate::teach::RpropConfig;
use crate::{Dataset, Error, Matrix, Network, Result, Scalar};

/// Outcome of a pruning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneReport {
    /// Weights switched off, including those removed with dead neurons.
    pub weights_removed: usize,
    pub neurons_removed: usize,
}

/// Magnitude pruning settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneConfig<T> {
    pub tol_level: T,
    /// Rprop epochs allowed to recover after each removal.
    pub max_reteach_iter: usize,
}

impl<T: Scalar> Default for PruneConfig<T> {
    fn default() -> Self {
        Self {
            tol_level: T::lit(1e-2),
            max_reteach_iter: 50,
        }
    }
}

impl<T: Scalar> PruneConfig<T> {
    pub fn validate(&self) -> Result<()> {
        validate_tolerance(self.tol_level)
    }
}

/// Optimal Brain Surgeon settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObsConfig<T> {
    pub tol_level: T,
    pub max_reteach_iter: usize,
    /// Initial inverse Hessian is `I / alpha`.
    pub alpha: T,
}

impl<T: Scalar> Default for ObsConfig<T> {
    fn default() -> Self {
        Self {
            tol_level: T::lit(1e-2),
            max_reteach_iter: 10,
            alpha: T::lit(1e-5),
        }
    }
}

impl<T: Scalar> ObsConfig<T> {
    pub fn validate(&self) -> Result<()> {
        validate_tolerance(self.tol_level)?;
        if !(self.alpha.is_finite() && self.alpha > T::zero()) {
            return Err(Error::Config(format!(
                "OBS alpha must be finite and > 0, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

fn validate_tolerance<T: Scalar>(tol_level: T) -> Result<()> {
    if !(tol_level.is_finite() && tol_level > T::zero()) {
        return Err(Error::Config(format!(
            "tolerance level should be positive, got {tol_level}"
        )));
    }
    Ok(())
}

/// Candidate chosen by a pruning criterion.
struct Candidate<T> {
    /// Active-relative index (1-based).
    k: usize,
    /// Weights to install before switching `k` off.
    weights: Option<Matrix<T>>,
}

/// Optimal Brain Surgeon saliencies `w_k^2 / (2 H_kk)` for a weight vector and an
/// inverse Hessian.
pub fn saliencies<T: Scalar>(weights: &Matrix<T>, h: &Matrix<T>) -> Result<Matrix<T>> {
    let w = weights.size();
    if weights.cols() != 1 || h.rows() != w || h.cols() != w {
        return Err(Error::Dimension(format!(
            "saliencies need a column of n weights and an n x n inverse Hessian \
             (got {}x{} and {}x{})",
            weights.rows(),
            weights.cols(),
            h.rows(),
            h.cols()
        )));
    }
    let half = T::lit(0.5);
    Ok(Matrix::column(
        (0..w)
            .map(|k| half * weights.as_slice()[k].powi(2) / h.at(k, k))
            .collect(),
    ))
}

/// Index (1-based) of the smallest entry; ties keep the first.
fn argmin<T: Scalar>(values: &[T]) -> usize {
    let mut best = 0;
    for (k, &v) in values.iter().enumerate().skip(1) {
        if v < values[best] {
            best = k;
        }
    }
    best + 1
}

impl<T: Scalar> Network<T> {
    /// Inverse of the Gauss-Newton Hessian of the MSE over the active weights,
    /// regularized by `alpha I`.
    ///
    /// Starts from `I / alpha` and applies one Sherman-Morrison update
    /// `H <- H - (H X)(H X)^T / (N O + X^T H X)` per record and per output
    /// column `X` of `gradij`.
    pub fn inverse_hessian(
        &self,
        input: &Matrix<T>,
        output: &Matrix<T>,
        alpha: T,
    ) -> Result<Matrix<T>> {
        self.check_pair(input, output)?;
        if !(alpha.is_finite() && alpha > T::zero()) {
            return Err(Error::Config(format!("alpha must be finite and > 0, got {alpha}")));
        }
        let w = self.active_weights();
        let np = T::lit((input.rows() * output.cols()) as f64);
        let mut h = Matrix::eye(w).scale(T::one() / alpha);

        for i in 1..=input.rows() {
            let grads = self.gradij(input, i)?;
            for o in 1..=grads.cols() {
                let x = grads.col(o)?;
                let hx = h.matmul(&x)?;
                let denom = np + x.dot(&hx)?;
                let hx = hx.as_slice();
                DefaultBackend::ger(w, w, -T::one() / denom, hx, hx, h.make_unique(), w);
            }
        }
        Ok(h)
    }

    /// Magnitude pruning: repeatedly remove the active weight of smallest
    /// absolute value.
    pub fn prune_magnitude(
        &mut self,
        data: &Dataset<T>,
        cfg: &PruneConfig<T>,
    ) -> Result<PruneReport> {
        cfg.validate()?;
        self.prune_with(
            data,
            cfg.tol_level,
            cfg.max_reteach_iter,
            "magnitude",
            |net| net.magnitude_candidate(),
        )
    }

    /// Optimal Brain Surgeon pruning: remove the weight of smallest saliency and
    /// shift the remaining ones along the inverse Hessian to compensate.
    pub fn prune_obs(&mut self, data: &Dataset<T>, cfg: &ObsConfig<T>) -> Result<PruneReport> {
        cfg.validate()?;
        let alpha = cfg.alpha;
        self.prune_with(
            data,
            cfg.tol_level,
            cfg.max_reteach_iter,
            "OBS",
            |net| net.obs_candidate(data, alpha),
        )
    }

    fn magnitude_candidate(&self) -> Result<Candidate<T>> {
        let w = self.weights();
        let abs: Vec<T> = w.as_slice().iter().map(|v| v.abs()).collect();
        Ok(Candidate {
            k: argmin(&abs),
            weights: None,
        })
    }

    /// Smallest-saliency weight `k` plus the corrected weights
    /// `w - w_k H[:, k] / H_kk`.
    fn obs_candidate(&self, data: &Dataset<T>, alpha: T) -> Result<Candidate<T>> {
        let h = self.inverse_hessian(data.input(), data.output(), alpha)?;
        let w = self.weights();
        let k = argmin(saliencies(&w, &h)?.as_slice());

        let scale = w.elem_at(k) / h.elem(k, k);
        let corrected = Matrix::column(
            w.as_slice()
                .iter()
                .zip(h.col_slice(k - 1))
                .map(|(&wv, &hv)| wv - scale * hv)
                .collect(),
        );
        Ok(Candidate {
            k,
            weights: Some(corrected),
        })
    }

    fn prune_with<F>(
        &mut self,
        data: &Dataset<T>,
        tol_level: T,
        max_reteach_iter: usize,
        method: &'static str,
        mut select: F,
    ) -> Result<PruneReport>
    where
        F: FnMut(&Network<T>) -> Result<Candidate<T>>,
    {
        let mse = self.mse(data.input(), data.output())?;
        if mse > tol_level {
            return Err(Error::Config(format!(
                "network should be trained with MSE reduced to given tolerance level \
                 ({tol_level}) before pruning; MSE is {mse}"
            )));
        }

        let retrain = RpropConfig::retrain(tol_level, max_reteach_iter);
        let mut report = PruneReport::default();

        while self.active_weights() > 0 {
            let Some(step) = self.prune_step(data, tol_level, &retrain, method, &mut select)? else {
                tracing::info!(
                    method,
                    weights_removed = report.weights_removed,
                    "pruning stopped"
                );
                break;
            };
            report.weights_removed += step.weights_removed;
            report.neurons_removed += step.neurons_removed;
        }
        Ok(report)
    }

    /// One select/disable/verify round followed by dead-neuron cleanup.
    ///
    /// Returns `None` when the candidate could not be removed within tolerance;
    /// the network is then restored to its state before the call.
    fn prune_step<F>(
        &mut self,
        data: &Dataset<T>,
        tol_level: T,
        retrain: &RpropConfig<T>,
        method: &'static str,
        select: &mut F,
    ) -> Result<Option<PruneReport>>
    where
        F: FnMut(&Network<T>) -> Result<Candidate<T>>,
    {
        let (x, t) = (data.input(), data.output());
        let active = self.active_weights();
        let before = self.weights();
        let candidate = select(&*self)?;
        if let Some(w) = &candidate.weights {
            self.set_weights(w, false)?;
        }
        let wi = self.absolute_index(candidate.k)?;
        self.set_active_at(wi, false)?;

        let mut retrained = false;
        if self.mse(x, t)? > tol_level {
            let res = self.teach_rprop(data, retrain)?;
            if res.mse > tol_level {
                self.set_active_at(wi, true)?;
                self.set_weights(&before, false)?;
                return Ok(None);
            }
            retrained = true;
        }
        tracing::debug!(
            method,
            weight = wi,
            total = self.total_weights(),
            remaining = active - 1,
            retrained,
            "removed weight"
        );

        let (neurons_removed, weights_removed) = self.remove_dead_neurons()?;
        Ok(Some(PruneReport {
            weights_removed: weights_removed + 1,
            neurons_removed,
        }))
    }
}

//! Activation functions.
//!
//! Every non-input layer computes a pre-activation value `z = W a + b` and then applies
//! its activation element-wise: `y = f(z; s)`, where `s > 0` is a per-layer parameter
//! (slope/steepness).
//!
//! The engine caches the *post-activation* outputs `y` during the forward pass and
//! computes `f'(z)` from `y` during backprop, so no separate `z` buffer is needed.

use crate::{Error, Result, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Element-wise activation function.
///
/// The numeric ids are the ones used by the persisted network format.
pub enum Activation {
    /// `1` if `x > 0`, `0` otherwise. Its derivative is taken as 0.
    Threshold,
    /// `1` if `x > 0`, `-1` otherwise. Its derivative is taken as 0.
    SymThreshold,
    /// `s * x`.
    Linear,
    /// `1 / (1 + exp(-2 s x))`.
    Sigmoid,
    /// `tanh(s x)`.
    SymSigmoid,
    /// Elliott approximation of `Sigmoid`: `0.5 s x / (1 + |s x|) + 0.5`.
    SigmoidApprox,
    /// Elliott approximation of `SymSigmoid`: `s x / (1 + |s x|)`.
    SymSigmoidApprox,
    /// `s * max(x, 0)`.
    Relu,
}

impl Activation {
    pub const ALL: [Activation; 8] = [
        Activation::Threshold,
        Activation::SymThreshold,
        Activation::Linear,
        Activation::Sigmoid,
        Activation::SymSigmoid,
        Activation::SigmoidApprox,
        Activation::SymSigmoidApprox,
        Activation::Relu,
    ];

    /// Look up an activation by its numeric id.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1..=8 => Ok(Self::ALL[id as usize - 1]),
            _ => Err(Error::Config(format!("invalid activation function id {id}"))),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Activation::Threshold => 1,
            Activation::SymThreshold => 2,
            Activation::Linear => 3,
            Activation::Sigmoid => 4,
            Activation::SymSigmoid => 5,
            Activation::SigmoidApprox => 6,
            Activation::SymSigmoidApprox => 7,
            Activation::Relu => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Threshold => "threshold",
            Activation::SymThreshold => "sym_threshold",
            Activation::Linear => "linear",
            Activation::Sigmoid => "sigmoid",
            Activation::SymSigmoid => "sym_sigmoid",
            Activation::SigmoidApprox => "sigmoid_approx",
            Activation::SymSigmoidApprox => "sym_sigmoid_approx",
            Activation::Relu => "relu",
        }
    }

    /// Parameter used when none is given explicitly.
    pub fn default_param<T: Scalar>(self) -> T {
        match self {
            Activation::Threshold
            | Activation::SymThreshold
            | Activation::Linear
            | Activation::Relu => T::one(),
            Activation::Sigmoid
            | Activation::SymSigmoid
            | Activation::SigmoidApprox
            | Activation::SymSigmoidApprox => T::lit(0.5),
        }
    }

    /// Validate an explicit parameter (must be finite and > 0).
    pub fn validate_param<T: Scalar>(self, param: T) -> Result<()> {
        if !(param.is_finite() && param > T::zero()) {
            return Err(Error::Config(format!(
                "{} parameter must be finite and > 0, got {param}",
                self.name()
            )));
        }
        Ok(())
    }

    /// Resolve an optional parameter: `None` selects the default.
    pub fn resolve_param<T: Scalar>(self, param: Option<T>) -> Result<T> {
        match param {
            None => Ok(self.default_param()),
            Some(p) => {
                self.validate_param(p)?;
                Ok(p)
            }
        }
    }

    #[inline]
    pub(crate) fn forward<T: Scalar>(self, x: T, s: T) -> T {
        let one = T::one();
        let half = T::lit(0.5);
        match self {
            Activation::Threshold => {
                if x > T::zero() {
                    one
                } else {
                    T::zero()
                }
            }
            Activation::SymThreshold => {
                if x > T::zero() {
                    one
                } else {
                    -one
                }
            }
            Activation::Linear => s * x,
            Activation::Sigmoid => sigmoid(T::lit(2.0) * s * x),
            Activation::SymSigmoid => (s * x).tanh(),
            Activation::SigmoidApprox => {
                let sx = s * x;
                half * sx / (one + sx.abs()) + half
            }
            Activation::SymSigmoidApprox => {
                let sx = s * x;
                sx / (one + sx.abs())
            }
            Activation::Relu => s * x.max(T::zero()),
        }
    }

    /// Derivative with respect to the pre-activation, expressed through the cached
    /// output `y`.
    #[inline]
    pub(crate) fn grad_from_output<T: Scalar>(self, y: T, s: T) -> T {
        let one = T::one();
        match self {
            Activation::Threshold | Activation::SymThreshold => T::zero(),
            Activation::Linear => s,
            Activation::Sigmoid => T::lit(2.0) * s * y * (one - y),
            Activation::SymSigmoid => s * (one - y * y),
            Activation::SigmoidApprox => {
                // 1 + |sx| = 1 / (1 - |2y - 1|)
                let t = one - (T::lit(2.0) * y - one).abs();
                T::lit(0.5) * s * t * t
            }
            Activation::SymSigmoidApprox => {
                let t = one - y.abs();
                s * t * t
            }
            Activation::Relu => {
                if y > T::zero() {
                    s
                } else {
                    T::zero()
                }
            }
        }
    }
}

#[inline]
fn sigmoid<T: Scalar>(x: T) -> T {
    // Numerically stable sigmoid.
    if x >= T::zero() {
        let z = (-x).exp();
        T::one() / (T::one() + z)
    } else {
        let z = x.exp();
        z / (T::one() + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip_and_reject_unknown() {
        for act in Activation::ALL {
            assert_eq!(Activation::from_id(act.id()).unwrap(), act);
        }
        assert!(Activation::from_id(0).is_err());
        assert!(Activation::from_id(9).is_err());
    }

    #[test]
    fn params_must_be_finite_and_positive() {
        assert!(Activation::Sigmoid.resolve_param(Some(0.0_f64)).is_err());
        assert!(Activation::Sigmoid.resolve_param(Some(-1.0_f64)).is_err());
        assert!(Activation::Sigmoid.resolve_param(Some(f64::NAN)).is_err());
        assert_eq!(Activation::Sigmoid.resolve_param::<f64>(None).unwrap(), 0.5);
        assert_eq!(Activation::Linear.resolve_param::<f64>(None).unwrap(), 1.0);
        assert_eq!(Activation::Relu.resolve_param(Some(2.0_f64)).unwrap(), 2.0);
    }

    #[test]
    fn sigmoid_with_default_param_is_logistic() {
        let y0: f64 = Activation::Sigmoid.forward(0.0, 0.5);
        assert!((y0 - 0.5).abs() < 1e-12);
        let y: f64 = Activation::Sigmoid.forward(1.0, 0.5);
        assert!((y - 1.0 / (1.0 + (-1.0_f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn threshold_shapes() {
        assert_eq!(Activation::Threshold.forward(0.3_f64, 1.0), 1.0);
        assert_eq!(Activation::Threshold.forward(-0.3_f64, 1.0), 0.0);
        assert_eq!(Activation::SymThreshold.forward(-0.3_f64, 1.0), -1.0);
        assert_eq!(Activation::Threshold.grad_from_output(1.0_f64, 1.0), 0.0);
    }

    #[test]
    fn gradients_from_output_match_finite_differences() {
        let eps = 1e-6_f64;
        for act in [
            Activation::Linear,
            Activation::Sigmoid,
            Activation::SymSigmoid,
            Activation::SigmoidApprox,
            Activation::SymSigmoidApprox,
            Activation::Relu,
        ] {
            for &s in &[0.5_f64, 1.0, 1.7] {
                for &x in &[-1.3_f64, -0.2, 0.4, 2.1] {
                    let y = act.forward(x, s);
                    let analytic = act.grad_from_output(y, s);
                    let numeric = (act.forward(x + eps, s) - act.forward(x - eps, s)) / (2.0 * eps);
                    assert!(
                        (analytic - numeric).abs() < 1e-5,
                        "{} s={s} x={x}: analytic={analytic} numeric={numeric}",
                        act.name()
                    );
                }
            }
        }
    }
}

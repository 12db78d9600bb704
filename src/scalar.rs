//! Floating point element type.
//!
//! Networks, matrices and datasets are generic over `f32` and `f64`. The `Scalar`
//! trait bundles the `num-traits` bounds we rely on plus a hook used by the
//! accelerated GEMM backend.

use std::fmt;

use num_traits::{Float, FromPrimitive};

pub trait Scalar:
    Float + FromPrimitive + Default + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Convert an `f64` literal. Out-of-range values become NaN.
    #[inline]
    fn lit(v: f64) -> Self {
        Self::from_f64(v).unwrap_or_else(Self::nan)
    }

    /// Strided GEMM through `matrixmultiply`: `c = alpha * a * b + beta * c`.
    ///
    /// `a` is `m x k`, `b` is `k x n`, `c` is `m x n`; strides are in elements.
    #[cfg(feature = "matrixmultiply")]
    #[allow(clippy::too_many_arguments)]
    fn accelerated_gemm(
        m: usize,
        k: usize,
        n: usize,
        alpha: Self,
        a: &[Self],
        rsa: usize,
        csa: usize,
        b: &[Self],
        rsb: usize,
        csb: usize,
        beta: Self,
        c: &mut [Self],
        rsc: usize,
        csc: usize,
    );
}

#[cfg(not(feature = "matrixmultiply"))]
impl Scalar for f32 {}

#[cfg(not(feature = "matrixmultiply"))]
impl Scalar for f64 {}

#[cfg(feature = "matrixmultiply")]
macro_rules! impl_scalar_gemm {
    ($t:ty, $gemm:path) => {
        impl Scalar for $t {
            fn accelerated_gemm(
                m: usize,
                k: usize,
                n: usize,
                alpha: Self,
                a: &[Self],
                rsa: usize,
                csa: usize,
                b: &[Self],
                rsb: usize,
                csb: usize,
                beta: Self,
                c: &mut [Self],
                rsc: usize,
                csc: usize,
            ) {
                debug_assert!(m == 0 || k == 0 || a.len() > (m - 1) * rsa + (k - 1) * csa);
                debug_assert!(k == 0 || n == 0 || b.len() > (k - 1) * rsb + (n - 1) * csb);
                debug_assert!(m == 0 || n == 0 || c.len() > (m - 1) * rsc + (n - 1) * csc);

                // matrixmultiply supports arbitrary strides; bounds are asserted above.
                unsafe {
                    $gemm(
                        m,
                        k,
                        n,
                        alpha,
                        a.as_ptr(),
                        rsa as isize,
                        csa as isize,
                        b.as_ptr(),
                        rsb as isize,
                        csb as isize,
                        beta,
                        c.as_mut_ptr(),
                        rsc as isize,
                        csc as isize,
                    );
                }
            }
        }
    };
}

#[cfg(feature = "matrixmultiply")]
impl_scalar_gemm!(f32, matrixmultiply::sgemm);

#[cfg(feature = "matrixmultiply")]
impl_scalar_gemm!(f64, matrixmultiply::dgemm);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lit_converts_literals() {
        assert_eq!(<f32 as Scalar>::lit(0.5), 0.5_f32);
        assert_eq!(<f64 as Scalar>::lit(1e-6), 1e-6_f64);
    }
}

//! Linear-algebra backend used by [`Matrix`](crate::Matrix) and the OBS Hessian update.
//!
//! This module provides a single abstraction over the three kernels the engine needs:
//! - GEMM (`c = alpha * a * b + beta * c`, arbitrary strides)
//! - GER rank-1 update (`a += alpha * x * y^T`, column-major `a`)
//! - LU solve with partial pivoting
//!
//! `Portable` is a safe loop implementation. With the `matrixmultiply` feature,
//! `MatrixMultiply` routes GEMM through the `matrixmultiply` crate. The backend is
//! chosen at build time through [`DefaultBackend`].

use crate::{Error, Result, Scalar};

/// Kernel set consumed by the matrix type.
pub trait Backend {
    /// `c = alpha * a * b + beta * c` where `a` is `m x k`, `b` is `k x n`, `c` is `m x n`.
    ///
    /// Strides are in elements (row stride, column stride). Callers validate bounds.
    #[allow(clippy::too_many_arguments)]
    fn gemm<T: Scalar>(
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: &[T],
        rsa: usize,
        csa: usize,
        b: &[T],
        rsb: usize,
        csb: usize,
        beta: T,
        c: &mut [T],
        rsc: usize,
        csc: usize,
    );

    /// Rank-1 update `a += alpha * x * y^T` of a column-major `m x n` matrix with
    /// leading dimension `lda`.
    fn ger<T: Scalar>(m: usize, n: usize, alpha: T, x: &[T], y: &[T], a: &mut [T], lda: usize);

    /// Solve `A X = B` in place.
    ///
    /// `a` is a column-major `n x n` matrix (overwritten by its LU factors), `b` is a
    /// column-major `n x nrhs` matrix (overwritten by `X`).
    fn lu_solve<T: Scalar>(n: usize, a: &mut [T], b: &mut [T], nrhs: usize) -> Result<()>;
}

/// Safe triple-loop kernels, always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Portable;

impl Backend for Portable {
    #[inline]
    fn gemm<T: Scalar>(
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: &[T],
        rsa: usize,
        csa: usize,
        b: &[T],
        rsb: usize,
        csb: usize,
        beta: T,
        c: &mut [T],
        rsc: usize,
        csc: usize,
    ) {
        for j in 0..n {
            for i in 0..m {
                let mut acc = T::zero();
                let a0 = i * rsa;
                let b0 = j * csb;

                for p in 0..k {
                    let av = a[a0 + p * csa];
                    let bv = b[p * rsb + b0];
                    acc = av.mul_add(bv, acc);
                }

                let idx = i * rsc + j * csc;
                c[idx] = if beta == T::zero() {
                    alpha * acc
                } else {
                    alpha * acc + beta * c[idx]
                };
            }
        }
    }

    #[inline]
    fn ger<T: Scalar>(m: usize, n: usize, alpha: T, x: &[T], y: &[T], a: &mut [T], lda: usize) {
        debug_assert!(x.len() >= m);
        debug_assert!(y.len() >= n);
        for j in 0..n {
            let s = alpha * y[j];
            if s == T::zero() {
                continue;
            }
            let col = &mut a[j * lda..j * lda + m];
            for (aij, &xi) in col.iter_mut().zip(x) {
                *aij = xi.mul_add(s, *aij);
            }
        }
    }

    fn lu_solve<T: Scalar>(n: usize, a: &mut [T], b: &mut [T], nrhs: usize) -> Result<()> {
        debug_assert_eq!(a.len(), n * n);
        debug_assert_eq!(b.len(), n * nrhs);

        // Doolittle with partial (row) pivoting; row swaps are applied to `b` as we go.
        for col in 0..n {
            let mut piv = col;
            let mut piv_abs = a[col * n + col].abs();
            for r in col + 1..n {
                let v = a[col * n + r].abs();
                if v > piv_abs {
                    piv = r;
                    piv_abs = v;
                }
            }
            if piv_abs == T::zero() || !piv_abs.is_finite() {
                return Err(Error::Numeric(format!(
                    "matrix is singular (zero pivot in column {})",
                    col + 1
                )));
            }
            if piv != col {
                for c in 0..n {
                    a.swap(c * n + col, c * n + piv);
                }
                for c in 0..nrhs {
                    b.swap(c * n + col, c * n + piv);
                }
            }

            let d = a[col * n + col];
            for r in col + 1..n {
                let f = a[col * n + r] / d;
                a[col * n + r] = f;
                if f == T::zero() {
                    continue;
                }
                for c in col + 1..n {
                    a[c * n + r] = a[c * n + r] - f * a[c * n + col];
                }
                for c in 0..nrhs {
                    b[c * n + r] = b[c * n + r] - f * b[c * n + col];
                }
            }
        }

        // Back substitution.
        for c in 0..nrhs {
            let rhs = &mut b[c * n..(c + 1) * n];
            for r in (0..n).rev() {
                let mut acc = rhs[r];
                for p in r + 1..n {
                    acc = acc - a[p * n + r] * rhs[p];
                }
                rhs[r] = acc / a[r * n + r];
            }
        }

        Ok(())
    }
}

/// GEMM through the `matrixmultiply` crate; GER and LU fall back to [`Portable`].
#[cfg(feature = "matrixmultiply")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixMultiply;

#[cfg(feature = "matrixmultiply")]
impl Backend for MatrixMultiply {
    #[inline]
    fn gemm<T: Scalar>(
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: &[T],
        rsa: usize,
        csa: usize,
        b: &[T],
        rsb: usize,
        csb: usize,
        beta: T,
        c: &mut [T],
        rsc: usize,
        csc: usize,
    ) {
        if m == 0 || n == 0 {
            return;
        }
        T::accelerated_gemm(m, k, n, alpha, a, rsa, csa, b, rsb, csb, beta, c, rsc, csc);
    }

    #[inline]
    fn ger<T: Scalar>(m: usize, n: usize, alpha: T, x: &[T], y: &[T], a: &mut [T], lda: usize) {
        Portable::ger(m, n, alpha, x, y, a, lda);
    }

    fn lu_solve<T: Scalar>(n: usize, a: &mut [T], b: &mut [T], nrhs: usize) -> Result<()> {
        Portable::lu_solve(n, a, b, nrhs)
    }
}

#[cfg(not(feature = "matrixmultiply"))]
pub type DefaultBackend = Portable;

#[cfg(feature = "matrixmultiply")]
pub type DefaultBackend = MatrixMultiply;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemm_column_major_product() {
        // a = [1 3; 2 4] (column-major), b = [5 7; 6 8]
        let a = [1.0_f64, 2.0, 3.0, 4.0];
        let b = [5.0_f64, 6.0, 7.0, 8.0];
        let mut c = [0.0_f64; 4];
        DefaultBackend::gemm(2, 2, 2, 1.0, &a, 1, 2, &b, 1, 2, 0.0, &mut c, 1, 2);
        // [1*5+3*6, 2*5+4*6, 1*7+3*8, 2*7+4*8]
        assert_eq!(c, [23.0, 34.0, 31.0, 46.0]);
    }

    #[test]
    fn ger_adds_outer_product() {
        let mut a = [1.0_f64, 0.0, 0.0, 1.0];
        Portable::ger(2, 2, 2.0, &[1.0, 2.0], &[3.0, 4.0], &mut a, 2);
        assert_eq!(a, [7.0, 12.0, 8.0, 17.0]);
    }

    #[test]
    fn lu_solve_with_pivoting() {
        // [0 1; 2 3] x = [1; 8] -> x = [2.5; 1]
        let mut a = [0.0_f64, 2.0, 1.0, 3.0];
        let mut b = [1.0_f64, 8.0];
        Portable::lu_solve(2, &mut a, &mut b, 1).unwrap();
        assert!((b[0] - 2.5).abs() < 1e-12);
        assert!((b[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn lu_solve_rejects_singular() {
        let mut a = [1.0_f64, 2.0, 2.0, 4.0];
        let mut b = [1.0_f64, 1.0];
        let err = Portable::lu_solve(2, &mut a, &mut b, 1).unwrap_err();
        assert!(matches!(err, Error::Numeric(_)));
    }
}

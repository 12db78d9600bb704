//! Dense column-major matrix with explicit copy-on-write sharing.
//!
//! `Matrix<T>` carries data records (one record per row), weight vectors (one column)
//! and the OBS inverse-Hessian estimate.
//!
//! # Sharing
//!
//! The backing buffer is either exclusively owned or shared behind an `Arc`.
//! Nothing becomes shared implicitly: [`Matrix::share`] converts the buffer and
//! returns a cheap alias, and [`Matrix::make_unique`] is the single place where a
//! shared buffer is copied before mutation. All mutable accessors go through it.
//!
//! # Indexing
//!
//! Public element access is 1-based: `(i, j)` addresses row `i`, column `j`, and a
//! single index `k` addresses the `k`-th element in column-major order.
//!
//! The operator traits (`+`, `-`, `*`) panic on shape mismatch. Use the `try_*`
//! methods / [`Matrix::matmul`] to get a [`Result`] instead.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use rand::Rng;

use crate::linalg::{Backend, DefaultBackend};
use crate::{Error, Result, Scalar};

#[derive(Debug, Clone)]
enum Buffer<T> {
    Exclusive(Vec<T>),
    Shared(Arc<Vec<T>>),
}

#[derive(Debug, Clone)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Buffer<T>,
}

impl<T: Scalar> Matrix<T> {
    /// `rows x cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::zero())
    }

    /// `rows x cols` matrix with every entry set to `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: Buffer::Exclusive(vec![value; rows * cols]),
        }
    }

    /// `n x n` identity.
    pub fn eye(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        let d = m.make_unique();
        for i in 0..n {
            d[i * n + i] = T::one();
        }
        m
    }

    /// Build from a column-major buffer.
    pub fn from_col_major(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::Dimension(format!(
                "buffer length {} does not match {rows}x{cols}",
                data.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            data: Buffer::Exclusive(data),
        })
    }

    /// Build from rows (copies into column-major storage).
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let r = rows.len();
        let c = rows.first().map(|row| row.len()).unwrap_or(0);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != c {
                return Err(Error::Dimension(format!(
                    "row {} has {} columns, expected {c}",
                    i + 1,
                    row.len()
                )));
            }
        }
        let mut data = vec![T::zero(); r * c];
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                data[j * r + i] = v;
            }
        }
        Self::from_col_major(r, c, data)
    }

    /// Column vector.
    pub fn column(values: Vec<T>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: Buffer::Exclusive(values),
        }
    }

    /// Matrix of uniform draws from `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols).map(|_| T::lit(rng.r#gen::<f64>())).collect();
        Self {
            rows,
            cols,
            data: Buffer::Exclusive(data),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored elements (`rows * cols`).
    #[inline]
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Column-major view of the data.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match &self.data {
            Buffer::Exclusive(v) => v,
            Buffer::Shared(v) => v,
        }
    }

    /// Returns true if the buffer is shared with at least one other matrix.
    pub fn is_shared(&self) -> bool {
        match &self.data {
            Buffer::Exclusive(_) => false,
            Buffer::Shared(v) => Arc::strong_count(v) > 1,
        }
    }

    /// Turn the buffer into a shared one and return an alias of `self`.
    ///
    /// The alias costs a reference-count increment. Either side copies on its next
    /// call to [`Matrix::make_unique`].
    pub fn share(&mut self) -> Self {
        if let Buffer::Exclusive(v) = &mut self.data {
            let owned = std::mem::take(v);
            self.data = Buffer::Shared(Arc::new(owned));
        }
        self.clone()
    }

    /// Make the buffer exclusive (copying it if it is shared) and return it mutably.
    pub fn make_unique(&mut self) -> &mut [T] {
        if let Buffer::Shared(v) = &mut self.data {
            let owned = match Arc::try_unwrap(std::mem::take(v)) {
                Ok(v) => v,
                Err(shared) => shared.as_ref().clone(),
            };
            self.data = Buffer::Exclusive(owned);
        }
        match &mut self.data {
            Buffer::Exclusive(v) => v,
            Buffer::Shared(_) => unreachable!("buffer was made exclusive above"),
        }
    }

    /// Consume the matrix and return its column-major buffer.
    pub fn into_vec(mut self) -> Vec<T> {
        self.make_unique();
        match self.data {
            Buffer::Exclusive(v) => v,
            Buffer::Shared(v) => v.as_ref().clone(),
        }
    }

    // 0-based accessors used by the engine.

    #[inline]
    pub(crate) fn at(&self, r: usize, c: usize) -> T {
        self.as_slice()[c * self.rows + r]
    }

    #[inline]
    pub(crate) fn col_slice(&self, c: usize) -> &[T] {
        &self.as_slice()[c * self.rows..(c + 1) * self.rows]
    }

    /// Element `(i, j)` (1-based), checked.
    pub fn get(&self, i: usize, j: usize) -> Result<T> {
        self.check_ij(i, j)?;
        Ok(self.elem(i, j))
    }

    /// Element `k` (1-based, column-major), checked.
    pub fn get_at(&self, k: usize) -> Result<T> {
        self.check_k(k)?;
        Ok(self.elem_at(k))
    }

    /// Set element `(i, j)` (1-based), checked.
    pub fn set(&mut self, i: usize, j: usize, value: T) -> Result<()> {
        self.check_ij(i, j)?;
        *self.elem_mut(i, j) = value;
        Ok(())
    }

    /// Element `(i, j)` (1-based) without shape checks.
    ///
    /// Panics if the linear offset falls outside the buffer.
    #[inline]
    pub fn elem(&self, i: usize, j: usize) -> T {
        self.as_slice()[(j - 1) * self.rows + i - 1]
    }

    /// Element `k` (1-based, column-major) without shape checks.
    #[inline]
    pub fn elem_at(&self, k: usize) -> T {
        self.as_slice()[k - 1]
    }

    /// Mutable element `(i, j)` (1-based). Copies a shared buffer first.
    #[inline]
    pub fn elem_mut(&mut self, i: usize, j: usize) -> &mut T {
        let rows = self.rows;
        &mut self.make_unique()[(j - 1) * rows + i - 1]
    }

    /// Mutable element `k` (1-based). Copies a shared buffer first.
    #[inline]
    pub fn elem_at_mut(&mut self, k: usize) -> &mut T {
        &mut self.make_unique()[k - 1]
    }

    /// Row `i` (1-based) as a `1 x cols` matrix.
    pub fn row(&self, i: usize) -> Result<Self> {
        self.select_rows(&[i])
    }

    /// Rows `is` (1-based, any order, repeats allowed).
    pub fn select_rows(&self, is: &[usize]) -> Result<Self> {
        let nr = is.len();
        let mut out = vec![T::zero(); nr * self.cols];
        for (ri, &i) in is.iter().enumerate() {
            if i < 1 || i > self.rows {
                return Err(self.row_index_error(i));
            }
            for c in 0..self.cols {
                out[c * nr + ri] = self.at(i - 1, c);
            }
        }
        Self::from_col_major(nr, self.cols, out)
    }

    /// Column `j` (1-based) as a `rows x 1` matrix.
    pub fn col(&self, j: usize) -> Result<Self> {
        self.select_cols(&[j])
    }

    /// Columns `js` (1-based, any order, repeats allowed).
    pub fn select_cols(&self, js: &[usize]) -> Result<Self> {
        let mut out = Vec::with_capacity(self.rows * js.len());
        for &j in js {
            if j < 1 || j > self.cols {
                return Err(Error::Dimension(format!(
                    "invalid column index {j}; matrix size: {}x{}",
                    self.rows, self.cols
                )));
            }
            out.extend_from_slice(self.col_slice(j - 1));
        }
        Self::from_col_major(self.rows, js.len(), out)
    }

    /// Main diagonal as a column vector.
    pub fn diag(&self) -> Self {
        let n = self.rows.min(self.cols);
        Self::column((0..n).map(|i| self.at(i, i)).collect())
    }

    /// Same data, new shape (column-major order is preserved).
    pub fn reshape(&self, rows: usize, cols: usize) -> Result<Self> {
        if rows * cols != self.size() {
            return Err(Error::Dimension(format!(
                "cannot reshape {}x{} into {rows}x{cols}",
                self.rows, self.cols
            )));
        }
        Ok(Self {
            rows,
            cols,
            data: self.data.clone(),
        })
    }

    pub fn transpose(&self) -> Self {
        let mut out = vec![T::zero(); self.size()];
        for c in 0..self.cols {
            for r in 0..self.rows {
                out[r * self.cols + c] = self.at(r, c);
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            data: Buffer::Exclusive(out),
        }
    }

    /// Apply `f` element-wise.
    pub fn map<F: Fn(T) -> T>(&self, f: F) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: Buffer::Exclusive(self.as_slice().iter().map(|&v| f(v)).collect()),
        }
    }

    pub fn scale(&self, s: T) -> Self {
        self.map(|v| v * s)
    }

    /// Element-wise power.
    pub fn powf(&self, p: T) -> Self {
        self.map(|v| v.powf(p))
    }

    pub fn try_add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    pub fn try_sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "subtract", |a, b| a - b)
    }

    /// Element-wise product.
    pub fn hadamard(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "multiply element-wise", |a, b| a * b)
    }

    /// Element-wise quotient.
    pub fn hadamard_div(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "divide element-wise", |a, b| a / b)
    }

    /// Matrix product through the configured backend.
    pub fn matmul(&self, other: &Self) -> Result<Self> {
        if self.cols != other.rows {
            return Err(Error::Dimension(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let (m, k, n) = (self.rows, self.cols, other.cols);
        let mut out = vec![T::zero(); m * n];
        if m > 0 && n > 0 && k > 0 {
            DefaultBackend::gemm(
                m,
                n,
                k,
                T::one(),
                self.as_slice(),
                1,
                m,
                other.as_slice(),
                1,
                k,
                T::zero(),
                &mut out,
                1,
                m,
            );
        }
        Self::from_col_major(m, n, out)
    }

    /// Inner product of two vectors of equal size (shape is ignored).
    pub fn dot(&self, other: &Self) -> Result<T> {
        if self.size() != other.size() {
            return Err(Error::Dimension(format!(
                "dot product of {} and {} elements",
                self.size(),
                other.size()
            )));
        }
        Ok(self
            .as_slice()
            .iter()
            .zip(other.as_slice())
            .fold(T::zero(), |acc, (&a, &b)| a.mul_add(b, acc)))
    }

    /// Solve `self * X = b` (LU with partial pivoting).
    pub fn solve(&self, b: &Self) -> Result<Self> {
        if self.rows != self.cols {
            return Err(Error::Dimension(format!(
                "cannot solve with non-square {}x{} matrix",
                self.rows, self.cols
            )));
        }
        if b.rows != self.rows {
            return Err(Error::Dimension(format!(
                "right-hand side has {} rows, matrix has {}",
                b.rows, self.rows
            )));
        }
        let mut a = self.as_slice().to_vec();
        let mut x = b.as_slice().to_vec();
        DefaultBackend::lu_solve(self.rows, &mut a, &mut x, b.cols)?;
        Self::from_col_major(b.rows, b.cols, x)
    }

    /// Matrix inverse.
    pub fn inverse(&self) -> Result<Self> {
        self.solve(&Self::eye(self.rows))
    }

    fn zip_with<F: Fn(T, T) -> T>(&self, other: &Self, what: &str, f: F) -> Result<Self> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(Error::Dimension(format!(
                "cannot {what} {}x{} and {}x{} matrices",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let data = self
            .as_slice()
            .iter()
            .zip(other.as_slice())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            data: Buffer::Exclusive(data),
        })
    }

    fn check_ij(&self, i: usize, j: usize) -> Result<()> {
        if i < 1 || i > self.rows || j < 1 || j > self.cols {
            return Err(Error::Dimension(format!(
                "invalid double index ({i}, {j}); matrix size: {}x{}",
                self.rows, self.cols
            )));
        }
        Ok(())
    }

    fn check_k(&self, k: usize) -> Result<()> {
        if k < 1 || k > self.size() {
            return Err(Error::Dimension(format!(
                "invalid single index {k}; matrix size: {}",
                self.size()
            )));
        }
        Ok(())
    }

    fn row_index_error(&self, i: usize) -> Error {
        Error::Dimension(format!(
            "invalid row index {i}; matrix size: {}x{}",
            self.rows, self.cols
        ))
    }
}

impl<T: Scalar> PartialEq for Matrix<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.as_slice() == other.as_slice()
    }
}

impl<T: Scalar> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.rows {
            for c in 0..self.cols {
                if c > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.at(r, c))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn expect_ok<T>(res: Result<T>) -> T {
    match res {
        Ok(v) => v,
        Err(e) => panic!("{e}"),
    }
}

impl<T: Scalar> Add for &Matrix<T> {
    type Output = Matrix<T>;

    fn add(self, rhs: Self) -> Matrix<T> {
        expect_ok(self.try_add(rhs))
    }
}

impl<T: Scalar> Sub for &Matrix<T> {
    type Output = Matrix<T>;

    fn sub(self, rhs: Self) -> Matrix<T> {
        expect_ok(self.try_sub(rhs))
    }
}

impl<T: Scalar> Mul for &Matrix<T> {
    type Output = Matrix<T>;

    fn mul(self, rhs: Self) -> Matrix<T> {
        expect_ok(self.matmul(rhs))
    }
}

impl<T: Scalar> Mul<T> for &Matrix<T> {
    type Output = Matrix<T>;

    fn mul(self, rhs: T) -> Matrix<T> {
        self.scale(rhs)
    }
}

impl<T: Scalar> Div<T> for &Matrix<T> {
    type Output = Matrix<T>;

    fn div(self, rhs: T) -> Matrix<T> {
        self.map(|v| v / rhs)
    }
}

impl<T: Scalar> Neg for &Matrix<T> {
    type Output = Matrix<T>;

    fn neg(self) -> Matrix<T> {
        self.map(|v| -v)
    }
}

macro_rules! impl_scalar_lhs {
    ($t:ty) => {
        impl Mul<&Matrix<$t>> for $t {
            type Output = Matrix<$t>;

            fn mul(self, rhs: &Matrix<$t>) -> Matrix<$t> {
                rhs.scale(self)
            }
        }
    };
}

impl_scalar_lhs!(f32);
impl_scalar_lhs!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: &[&[f64]]) -> Matrix<f64> {
        Matrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn storage_is_column_major_and_one_based() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]);
        assert_eq!(a.rows(), 3);
        assert_eq!(a.cols(), 2);
        assert_eq!(a.size(), 6);
        assert_eq!(a.as_slice(), &[1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        assert_eq!(a.elem(3, 1), 5.0);
        assert_eq!(a.elem_at(4), 2.0);
        assert_eq!(a.get(2, 2).unwrap(), 4.0);
        assert!(a.get(0, 1).is_err());
        assert!(a.get(4, 1).is_err());
        assert!(a.get_at(7).is_err());
    }

    #[test]
    fn shared_buffer_is_copied_on_make_unique_only() {
        let mut a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert!(!a.is_shared());

        let mut b = a.share();
        assert!(a.is_shared());
        assert!(b.is_shared());
        assert_eq!(a.as_slice().as_ptr(), b.as_slice().as_ptr());

        *b.elem_mut(1, 1) = 10.0;
        assert!(!b.is_shared());
        assert_eq!(b.elem(1, 1), 10.0);
        assert_eq!(a.elem(1, 1), 1.0);
        assert!(!a.is_shared());
    }

    #[test]
    fn rows_cols_diag_and_reshape() {
        let a = m(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        assert_eq!(a.row(2).unwrap(), m(&[&[4.0, 5.0, 6.0]]));
        assert_eq!(a.col(3).unwrap(), Matrix::column(vec![3.0, 6.0]));
        assert_eq!(
            a.select_rows(&[2, 1, 2]).unwrap(),
            m(&[&[4.0, 5.0, 6.0], &[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]])
        );
        assert_eq!(a.select_cols(&[3, 1]).unwrap(), m(&[&[3.0, 1.0], &[6.0, 4.0]]));
        assert_eq!(a.diag(), Matrix::column(vec![1.0, 5.0]));
        assert!(a.row(3).is_err());

        let r = a.reshape(3, 2).unwrap();
        assert_eq!(r.as_slice(), a.as_slice());
        assert!(a.reshape(4, 2).is_err());
        assert_eq!(a.transpose(), m(&[&[1.0, 4.0], &[2.0, 5.0], &[3.0, 6.0]]));
    }

    #[test]
    fn arithmetic_and_products() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = m(&[&[5.0, 6.0], &[7.0, 8.0]]);
        assert_eq!(&a + &b, m(&[&[6.0, 8.0], &[10.0, 12.0]]));
        assert_eq!(&b - &a, m(&[&[4.0, 4.0], &[4.0, 4.0]]));
        assert_eq!(&a * &b, m(&[&[19.0, 22.0], &[43.0, 50.0]]));
        assert_eq!(2.0 * &a, m(&[&[2.0, 4.0], &[6.0, 8.0]]));
        assert_eq!(&a / 2.0, m(&[&[0.5, 1.0], &[1.5, 2.0]]));
        assert_eq!(-&a, m(&[&[-1.0, -2.0], &[-3.0, -4.0]]));
        assert_eq!(a.hadamard(&b).unwrap(), m(&[&[5.0, 12.0], &[21.0, 32.0]]));
        assert_eq!(a.powf(2.0), m(&[&[1.0, 4.0], &[9.0, 16.0]]));
        assert_eq!(a.dot(&b).unwrap(), 70.0);

        let c = Matrix::<f64>::zeros(3, 2);
        assert!(matches!(a.try_add(&c), Err(Error::Dimension(_))));
        assert!(matches!(c.matmul(&c), Err(Error::Dimension(_))));
    }

    #[test]
    #[should_panic]
    fn operator_panics_on_shape_mismatch() {
        let a = Matrix::<f64>::zeros(2, 2);
        let b = Matrix::<f64>::zeros(3, 2);
        let _ = &a + &b;
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let a = m(&[&[4.0, 7.0], &[2.0, 6.0]]);
        let inv = a.inverse().unwrap();
        let id = &a * &inv;
        for i in 1..=2 {
            for j in 1..=2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((id.elem(i, j) - expected).abs() < 1e-12);
            }
        }

        let singular = m(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(matches!(singular.inverse(), Err(Error::Numeric(_))));
        assert!(matches!(
            Matrix::<f64>::zeros(2, 3).inverse(),
            Err(Error::Dimension(_))
        ));
    }
}

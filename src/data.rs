//! Training data.
//!
//! A `Dataset` pairs an `N x inputs` matrix with an `N x outputs` matrix (one
//! record per row) and carries a free-form description plus an optional label
//! per record.

use crate::{Error, Matrix, Result, Scalar};

/// A supervised dataset: inputs (X) and targets (Y).
#[derive(Debug, Clone)]
pub struct Dataset<T> {
    input: Matrix<T>,
    output: Matrix<T>,
    info: String,
    record_info: Vec<String>,
}

impl<T: Scalar> Dataset<T> {
    /// Build a dataset from input and target matrices with the same number of rows.
    pub fn new(input: Matrix<T>, output: Matrix<T>) -> Result<Self> {
        if input.rows() == 0 {
            return Err(Error::Dimension(
                "dataset must contain at least one record".to_owned(),
            ));
        }
        if input.cols() == 0 || output.cols() == 0 {
            return Err(Error::Dimension(format!(
                "dataset needs at least one input and one output column (got {} and {})",
                input.cols(),
                output.cols()
            )));
        }
        if input.rows() != output.rows() {
            return Err(Error::Dimension(format!(
                "inputs/targets length mismatch: {} vs {}",
                input.rows(),
                output.rows()
            )));
        }
        let records = input.rows();
        Ok(Self {
            input,
            output,
            info: String::new(),
            record_info: vec![String::new(); records],
        })
    }

    /// Build a dataset from per-record rows.
    pub fn from_rows(inputs: &[Vec<T>], targets: &[Vec<T>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::Dimension(format!(
                "inputs/targets length mismatch: {} vs {}",
                inputs.len(),
                targets.len()
            )));
        }
        Self::new(Matrix::from_rows(inputs)?, Matrix::from_rows(targets)?)
    }

    /// Attach a dataset description and per-record labels.
    ///
    /// `record_info` must be empty (no labels) or hold one entry per record.
    pub fn with_info(mut self, info: impl Into<String>, record_info: Vec<String>) -> Result<Self> {
        if !record_info.is_empty() && record_info.len() != self.len() {
            return Err(Error::Dimension(format!(
                "{} record descriptions given for {} records",
                record_info.len(),
                self.len()
            )));
        }
        self.info = info.into();
        if !record_info.is_empty() {
            self.record_info = record_info;
        }
        Ok(self)
    }

    #[inline]
    pub fn input(&self) -> &Matrix<T> {
        &self.input
    }

    #[inline]
    pub fn output(&self) -> &Matrix<T> {
        &self.output
    }

    #[inline]
    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.input.rows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input.cols()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.output.cols()
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn set_info(&mut self, info: impl Into<String>) {
        self.info = info.into();
    }

    /// Label of record `i` (1-based).
    pub fn record_info(&self, i: usize) -> Result<&str> {
        self.check_record(i)?;
        Ok(&self.record_info[i - 1])
    }

    pub fn set_record_info(&mut self, i: usize, info: impl Into<String>) -> Result<()> {
        self.check_record(i)?;
        self.record_info[i - 1] = info.into();
        Ok(())
    }

    pub(crate) fn record_infos(&self) -> &[String] {
        &self.record_info
    }

    /// Records `is` (1-based) as a new dataset, labels included.
    pub fn subset(&self, is: &[usize]) -> Result<Self> {
        let input = self.input.select_rows(is)?;
        let output = self.output.select_rows(is)?;
        let mut sub = Self::new(input, output)?;
        sub.info = self.info.clone();
        sub.record_info = is.iter().map(|&i| self.record_info[i - 1].clone()).collect();
        Ok(sub)
    }

    fn check_record(&self, i: usize) -> Result<()> {
        if i < 1 || i > self.len() {
            return Err(Error::Dimension(format!(
                "invalid record index {i} (number of records is {})",
                self.len()
            )));
        }
        Ok(())
    }
}

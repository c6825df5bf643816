//! Small row-major matrix type used for activations and trace payloads.

use crate::error::{ModelError, Result};

/// A dense row-major `rows x cols` matrix of f32.
#[derive(Debug, Clone, PartialEq)]
pub struct Mat {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl Mat {
    /// Wrap an existing buffer, validating its length.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ModelError::shape(
                format!("{rows}x{cols} = {} elements", rows * cols),
                data.len(),
            ));
        }
        Ok(Mat { data, rows, cols })
    }

    /// A zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Mat {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Borrow row `r`. Panics if out of range, as slice indexing does.
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub(crate) fn row_mut(&mut self, r: usize) -> &mut [f32] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Element-wise sum with another matrix of the same shape.
    pub fn add(&self, other: &Mat) -> Mat {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a + b)
            .collect();
        Mat {
            data,
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Copy out the rows as owned vectors, the shape wire payloads use.
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_length() {
        assert!(Mat::new(2, 3, vec![0.0; 5]).is_err());
        assert!(Mat::new(2, 3, vec![0.0; 6]).is_ok());
    }

    #[test]
    fn row_access_is_row_major() {
        let m = Mat::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(m.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn add_is_elementwise() {
        let a = Mat::new(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
        let b = Mat::new(1, 3, vec![0.5, 0.5, 0.5]).unwrap();
        assert_eq!(a.add(&b).row(0), &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn to_rows_matches_layout() {
        let m = Mat::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }
}

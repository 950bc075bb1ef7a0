//! Sparse matrix and conjugate-gradient solver.
//!
//! A compressed-sparse-row matrix assembled from triplets plus a conjugate
//! gradient solver for the symmetric positive definite systems of the
//! stitcher and the constraint solver. Systems here have a few tens of
//! thousands of unknowns and good conditioning (diagonally dominant
//! Laplacians and weighted least-squares normal matrices), so CG with a
//! warm start converges quickly.

use nalgebra::DVector;

use crate::error::{LaminaError, Result};

/// Compressed sparse row matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Assemble from triplets `(row, col, value)`. Duplicate coordinates
    /// are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());

        let mut prev_row = usize::MAX;
        let mut prev_col = usize::MAX;
        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols);
            if row == prev_row && col == prev_col {
                *values.last_mut().unwrap() += val;
                continue;
            }
            if row != prev_row {
                // Start this row (and any skipped empty rows) here.
                let start = col_idx.len();
                let lo = prev_row.wrapping_add(1);
                for r in &mut row_ptr[lo..=row] {
                    *r = start;
                }
            }
            col_idx.push(col);
            values.push(val);
            prev_row = row;
            prev_col = col;
        }

        let nnz = col_idx.len();
        for r in &mut row_ptr[prev_row.wrapping_add(1)..=rows] {
            *r = nnz;
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Matrix-vector product `A * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "vector dimension mismatch");
        let mut y = DVector::zeros(self.rows);
        for i in 0..self.rows {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            y[i] = sum;
        }
        y
    }
}

/// Solve `A x = b` for symmetric positive definite `A` by conjugate
/// gradients.
///
/// `x0` warms the start (zeros if `None`); convergence is measured by the
/// residual norm relative to `‖b‖`.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "matrix must be square");

    let mut x = match x0 {
        Some(x0) => x0.clone(),
        None => DVector::zeros(n),
    };

    let b_norm = b.norm();
    if b_norm < 1e-300 {
        return Ok(DVector::zeros(n));
    }

    let mut r = b - a.mul_vec(&x);
    let mut r_norm_sq = r.norm_squared();
    if r_norm_sq.sqrt() / b_norm < tolerance {
        return Ok(x);
    }

    let mut p = r.clone();

    for _ in 0..max_iter {
        let ap = a.mul_vec(&p);
        let p_ap = p.dot(&ap);
        if p_ap.abs() < 1e-300 {
            break;
        }
        let alpha = r_norm_sq / p_ap;

        x += alpha * &p;
        r -= alpha * &ap;

        let new_r_norm_sq = r.norm_squared();
        if new_r_norm_sq.sqrt() / b_norm < tolerance {
            return Ok(x);
        }

        p = &r + (new_r_norm_sq / r_norm_sq) * &p;
        r_norm_sq = new_r_norm_sq;
    }

    Err(LaminaError::ConvergenceFailed {
        iterations: max_iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_triplets_sums_duplicates() {
        // [ 4  1 ]
        // [ 1  3 ]  with the (0,0) entry split in two.
        let a = CsrMatrix::from_triplets(
            2,
            2,
            vec![(0, 0, 2.5), (0, 0, 1.5), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)],
        );
        assert_eq!(a.nnz(), 4);

        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 0.0]));
        assert!((y[0] - 4.0).abs() < 1e-12);
        assert!((y[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_rows() {
        let a = CsrMatrix::from_triplets(3, 3, vec![(2, 2, 5.0)]);
        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 1.0, 1.0]));
        assert_eq!(y[0], 0.0);
        assert_eq!(y[1], 0.0);
        assert!((y[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_cg_solves_spd_system() {
        // Solution of [4 1; 1 3] x = [1, 2] is [1/11, 7/11].
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        let b = DVector::from_vec(vec![1.0, 2.0]);

        let x = conjugate_gradient(&a, &b, None, 100, 1e-12).unwrap();
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-9);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_cg_warm_start() {
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let exact = DVector::from_vec(vec![1.0 / 11.0, 7.0 / 11.0]);

        let x = conjugate_gradient(&a, &b, Some(&exact), 100, 1e-12).unwrap();
        assert!((&x - &exact).norm() < 1e-9);
    }

    #[test]
    fn test_cg_zero_rhs() {
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 1.0), (1, 1, 1.0)]);
        let b = DVector::zeros(2);
        let x = conjugate_gradient(&a, &b, None, 10, 1e-12).unwrap();
        assert_eq!(x.norm(), 0.0);
    }
}

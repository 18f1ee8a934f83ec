//! Dense row-major matrix helpers used by the revised simplex iteration.

/// Pivots smaller than this in magnitude are treated as zero during inversion.
const SINGULAR_EPSILON: f64 = 1e-12;

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `matrix * vector`
pub(crate) fn mul_vec(matrix: &[Vec<f64>], vector: &[f64]) -> Vec<f64> {
    matrix.iter().map(|row| dot(row, vector)).collect()
}

/// `vector^T * matrix`
pub(crate) fn vec_mul(vector: &[f64], matrix: &[Vec<f64>]) -> Vec<f64> {
    let n = matrix.first().map_or(0, Vec::len);
    let mut result = vec![0.0; n];
    for (v, row) in vector.iter().zip(matrix) {
        if *v == 0.0 {
            continue;
        }
        for (r, a) in result.iter_mut().zip(row) {
            *r += v * a;
        }
    }
    result
}

/// Inverts a square matrix with Gauss-Jordan elimination and partial
/// pivoting. Returns `None` when the matrix is singular.
pub(crate) fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut row = vec![0.0; n];
            row[i] = 1.0;
            row
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < SINGULAR_EPSILON {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..n {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }

        for i in 0..n {
            if i == col {
                continue;
            }
            let factor = a[i][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[i][j] -= factor * a[col][j];
                inv[i][j] -= factor * inv[col][j];
            }
        }
    }

    Some(inv)
}

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// Thomas algorithm for a batch of symmetric tridiagonal systems.
///
/// Solves `A * x = d` column by column, where every column `j` carries its
/// own system: diagonal `a[.., j]` and common sub/super-diagonal
/// `b[.., j]`. The factorization is LU without pivoting, which requires
/// `a` strictly diagonally dominant; the AOS construction guarantees that.
///
/// ```text
/// / a1 b1  0  0 \   / x1 \   / d1 \
/// | b1 a2 b2  0 |   | x2 |   | d2 |
/// |  0 b2 a3 b3 | * | x3 | = | d3 |
/// \  0  0 b3 a4 /   \ x4 /   \ d4 /
/// ```
///
/// # Arguments
/// * `a` - diagonals, `n x m`.
/// * `b` - off-diagonals, `(n-1) x m`.
/// * `d` - right-hand sides, `n x m`.
/// * `x` - solutions, `n x m`, overwritten.
pub fn thomas(
    a: ArrayView2<f32>,
    b: ArrayView2<f32>,
    d: ArrayView2<f32>,
    mut x: ArrayViewMut2<f32>,
) {
    let n = a.nrows();
    let m = a.ncols();
    debug_assert_eq!(b.nrows(), n - 1);
    debug_assert_eq!(d.dim(), (n, m));
    debug_assert_eq!(x.dim(), (n, m));

    // U diagonal, L off-diagonal and the intermediate solution of L*y = d.
    let mut u = Array2::<f32>::zeros((n, m));
    let mut l = Array2::<f32>::zeros((n - 1, m));
    let mut y = Array2::<f32>::zeros((n, m));

    for j in 0..m {
        u[(0, j)] = a[(0, j)];
        y[(0, j)] = d[(0, j)];
    }

    // Forward substitution.
    for k in 1..n {
        for j in 0..m {
            l[(k - 1, j)] = b[(k - 1, j)] / u[(k - 1, j)];
        }
        for j in 0..m {
            u[(k, j)] = a[(k, j)] - l[(k - 1, j)] * b[(k - 1, j)];
        }
        for j in 0..m {
            y[(k, j)] = d[(k, j)] - l[(k - 1, j)] * y[(k - 1, j)];
        }
    }

    // Backward substitution U*x = y.
    for j in 0..m {
        x[(n - 1, j)] = y[(n - 1, j)] / u[(n - 1, j)];
    }
    for i in (0..n - 1).rev() {
        for j in 0..m {
            x[(i, j)] = (y[(i, j)] - b[(i, j)] * x[(i + 1, j)]) / u[(i, j)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::thomas;
    use ndarray::{arr2, Array2};

    #[test]
    fn solves_a_diagonally_dominant_system() {
        // One 4-unknown system in the first column, a different one in the
        // second, both verified by multiplying back through A.
        let a = arr2(&[[4.0f32, 5.0], [4.0, 5.0], [4.0, 5.0], [4.0, 5.0]]);
        let b = arr2(&[[-1.0f32, -2.0], [-1.0, -2.0], [-1.0, -2.0]]);
        let d = arr2(&[[1.0f32, 2.0], [0.0, -1.0], [3.0, 0.5], [-2.0, 1.0]]);
        let mut x = Array2::<f32>::zeros((4, 2));
        thomas(a.view(), b.view(), d.view(), x.view_mut());

        for j in 0..2 {
            for i in 0..4 {
                let mut lhs = a[(i, j)] * x[(i, j)];
                if i > 0 {
                    lhs += b[(i - 1, j)] * x[(i - 1, j)];
                }
                if i < 3 {
                    lhs += b[(i, j)] * x[(i + 1, j)];
                }
                assert!(
                    (lhs - d[(i, j)]).abs() < 1e-5,
                    "residual too large at ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn identity_system_returns_the_input() {
        let a = Array2::<f32>::ones((5, 3));
        let b = Array2::<f32>::zeros((4, 3));
        let d = arr2(&[
            [1.0f32, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
            [10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0],
        ]);
        let mut x = Array2::<f32>::zeros((5, 3));
        thomas(a.view(), b.view(), d.view(), x.view_mut());
        for (got, want) in x.iter().zip(d.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}

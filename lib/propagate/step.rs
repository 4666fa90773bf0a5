//! Single-step propagators.
//!
//! `H_k` is Hermitian, so `exp(-i H_k dt)` is taken from its eigendecomposition
//! `H_k = V diag(λ) V†` as `V diag(exp(-i λ dt)) V†`.

use ndarray as nd;
use ndarray_linalg::{ EighInto, UPLO };
use num_complex::Complex64 as C64;
use crate::{
    error::{ Error, Result },
    operators::dagger,
};

/// `exp(-i H dt)` for Hermitian `H`.
///
/// Only the lower triangle of `H` is read.
pub fn propagator(H: &nd::Array2<C64>, dt: f64) -> Result<nd::Array2<C64>> {
    let n = H.nrows();
    if n != H.ncols() {
        return Err(Error::mismatch("step propagator (columns)", n, H.ncols()));
    }
    if n == 0 { return Ok(nd::Array2::zeros((0, 0))); }
    let (E, V) = H.to_owned().eigh_into(UPLO::Lower)?;
    let phases: nd::Array2<C64>
        = E.mapv(|e| (-C64::i() * e * dt).exp())
        .insert_axis(nd::Axis(0));
    // scale column j of V by exp(-i λ_j dt)
    Ok((&V * &phases).dot(&dagger(&V)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use crate::operators::{ is_hermitian, unitarity_deviation };

    fn c(x: f64) -> C64 { C64::from(x) }

    fn assert_close(A: &nd::Array2<C64>, B: &nd::Array2<C64>, tol: f64) {
        assert_eq!(A.shape(), B.shape());
        for ((i, j), a) in A.indexed_iter() {
            let diff = (*a - B[[i, j]]).norm();
            assert!(diff < tol, "({i}, {j}): {a} vs {} (diff {diff:e})", B[[i, j]]);
        }
    }

    #[test]
    fn zero_gives_identity() {
        let Z: nd::Array2<C64> = nd::Array2::zeros((4, 4));
        assert_close(&propagator(&Z, 0.7).unwrap(), &nd::Array2::eye(4), 1e-14);
    }

    #[test]
    fn diagonal() {
        let H = nd::Array2::from_diag(&nd::array![c(1.0), c(-2.0), c(0.5)]);
        let dt = 0.3;
        let U = propagator(&H, dt).unwrap();
        let expected = nd::Array2::from_diag(&nd::array![
            C64::new(0.0, -dt).exp(),
            C64::new(0.0, 2.0 * dt).exp(),
            C64::new(0.0, -0.5 * dt).exp(),
        ]);
        assert_close(&U, &expected, 1e-13);
    }

    #[test]
    fn pauli_x_rotation() {
        let theta = PI / 3.0;
        let H = nd::array![[c(0.0), c(0.5)], [c(0.5), c(0.0)]];
        let U = propagator(&H, theta).unwrap();
        let (co, si) = ((theta / 2.0).cos(), (theta / 2.0).sin());
        let expected = nd::array![
            [c(co), C64::new(0.0, -si)],
            [C64::new(0.0, -si), c(co)],
        ];
        assert_close(&U, &expected, 1e-13);
    }

    #[test]
    fn complex_hermitian_stays_unitary() {
        let H = nd::array![
            [c(40.0), C64::new(3.0, -1.0), c(0.0)],
            [C64::new(3.0, 1.0), c(-25.0), C64::new(0.0, 2.0)],
            [c(0.0), C64::new(0.0, -2.0), c(7.5)],
        ];
        assert!(is_hermitian(&H, 0.0));
        let U = propagator(&H, 1.0).unwrap();
        assert!(unitarity_deviation(&U) < 1e-12);
        // exp(-i H dt) exp(+i H dt) = 1
        let back = propagator(&H, -1.0).unwrap();
        assert_close(&U.dot(&back), &nd::Array2::eye(3), 1e-12);
    }

    #[test]
    fn rejects_non_square() {
        let H: nd::Array2<C64> = nd::Array2::zeros((2, 3));
        assert!(matches!(propagator(&H, 0.1), Err(Error::DimensionMismatch { .. })));
    }
}

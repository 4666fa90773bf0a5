//! Standard operators for a single truncated bosonic mode.
//!
//! All matrices are expressed in the Fock basis `|0>, |1>, ..., |n - 1>` of a
//! mode truncated to `n` levels.

use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use serde::{ Deserialize, Serialize };
use crate::error::{ Error, Result };

fn check_levels(n: usize) -> Result<()> {
    (n >= 2).then_some(()).ok_or(Error::InvalidDimension(n))
}

fn diag<F>(n: usize, f: F) -> Result<nd::Array2<C64>>
where F: Fn(usize) -> f64
{
    check_levels(n)?;
    let d: nd::Array1<C64> = (0..n).map(|k| C64::from(f(k))).collect();
    Ok(nd::Array2::from_diag(&d))
}

/// Identity on `n` levels.
pub fn identity(n: usize) -> Result<nd::Array2<C64>> {
    check_levels(n)?;
    Ok(nd::Array2::eye(n))
}

/// Number operator `a† a`: `diag(0, 1, ..., n - 1)`.
pub fn number(n: usize) -> Result<nd::Array2<C64>> {
    diag(n, |k| k as f64)
}

/// Anharmonic self-interaction `a† a† a a`: `diag(k (k - 1))`.
pub fn duffing(n: usize) -> Result<nd::Array2<C64>> {
    diag(n, |k| (k * k.saturating_sub(1)) as f64)
}

/// Annihilation operator `a`, with `a |k> = √k |k - 1>`.
pub fn destroy(n: usize) -> Result<nd::Array2<C64>> {
    check_levels(n)?;
    let mut a: nd::Array2<C64> = nd::Array2::zeros((n, n));
    (1..n).for_each(|k| { a[[k - 1, k]] = C64::from((k as f64).sqrt()); });
    Ok(a)
}

/// Creation operator `a†`.
pub fn create(n: usize) -> Result<nd::Array2<C64>> {
    Ok(destroy(n)?.reversed_axes())
}

/// In-phase drive `(a† + a) / 2`.
pub fn drive_x(n: usize) -> Result<nd::Array2<C64>> {
    let a = destroy(n)?;
    Ok((&a.t() + &a) * C64::from(0.5))
}

/// Quadrature drive `i (a† - a) / 2`.
pub fn drive_y(n: usize) -> Result<nd::Array2<C64>> {
    let a = destroy(n)?;
    Ok((&a.t() - &a) * C64::new(0.0, 0.5))
}

/// Conjugate transpose.
pub fn dagger(a: &nd::Array2<C64>) -> nd::Array2<C64> {
    a.t().mapv(|x| x.conj())
}

/// Return `true` if `a` is square and equal to its conjugate transpose to
/// within `tol` (element-wise).
pub fn is_hermitian(a: &nd::Array2<C64>, tol: f64) -> bool {
    a.is_square()
        && a.iter().zip(a.t().iter())
            .all(|(aij, aji)| (*aij - aji.conj()).norm() <= tol)
}

/// Largest element-wise deviation of `U† U` from the identity: the max-norm
/// `max_ij |(U† U - 1)_ij|`, not an operator or Frobenius norm.
pub fn unitarity_deviation(U: &nd::Array2<C64>) -> f64 {
    dagger(U).dot(U).indexed_iter()
        .map(|((i, j), x)| {
            let target = if i == j { C64::one() } else { C64::zero() };
            (*x - target).norm()
        })
        .fold(0.0, f64::max)
}

/// Named members of the operator library, as used in configuration files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Identity,
    Number,
    Duffing,
    DriveX,
    DriveY,
    Create,
    Destroy,
}

impl OperatorKind {
    /// Build the operator on `n` levels.
    pub fn build(self, n: usize) -> Result<nd::Array2<C64>> {
        match self {
            Self::Identity => identity(n),
            Self::Number => number(n),
            Self::Duffing => duffing(n),
            Self::DriveX => drive_x(n),
            Self::DriveY => drive_y(n),
            Self::Create => create(n),
            Self::Destroy => destroy(n),
        }
    }
}

//! Restriction of full propagators to a low-lying subspace and gate
//! infidelity against a target unitary.

use ndarray::{ self as nd, Axis };
use num_complex::Complex64 as C64;
use crate::{
    error::{ Error, Result },
    hilbert::Register,
};

/// Round-off allowance below zero before an infidelity is treated as a sign
/// of a non-unitary input.
const NEGATIVE_SLACK: f64 = 1e-9;

/// Restrict `U` to the basis states of a register with per-subsystem
/// truncation `levels` in which every subsystem sits below `target_levels`.
///
/// The relative order of the retained states is unchanged.
pub fn project_levels(U: &nd::Array2<C64>, levels: &[usize], target_levels: usize)
    -> Result<nd::Array2<C64>>
{
    let register = Register::new(levels.iter().copied())?;
    if target_levels == 0 {
        return Err(Error::InvalidConfig("projection onto zero levels".into()));
    }
    let dim = register.dim();
    if U.nrows() != dim {
        return Err(Error::mismatch("projected operator rows", dim, U.nrows()));
    }
    if U.ncols() != dim {
        return Err(Error::mismatch("projected operator columns", dim, U.ncols()));
    }
    let idx = register.subspace_indices(target_levels);
    Ok(U.select(Axis(0), &idx).select(Axis(1), &idx))
}

/// [`project_levels`] for `qudits` subsystems of `levels` levels each.
pub fn project(
    U: &nd::Array2<C64>,
    qudits: usize,
    levels: usize,
    target_levels: usize,
) -> Result<nd::Array2<C64>>
{
    project_levels(U, &vec![levels; qudits], target_levels)
}

/// `1 - |Tr(goal† U)| / d` for two `d × d` matrices.
pub fn infidelity(goal: &nd::Array2<C64>, U: &nd::Array2<C64>) -> Result<f64> {
    let d = goal.nrows();
    if goal.ncols() != d {
        return Err(Error::mismatch("goal columns", d, goal.ncols()));
    }
    if U.nrows() != d || U.ncols() != d {
        let found = if U.nrows() != d { U.nrows() } else { U.ncols() };
        return Err(Error::mismatch("projected unitary", d, found));
    }
    if d == 0 {
        return Err(Error::InvalidConfig("empty goal unitary".into()));
    }
    // Tr(A† B) = Σ_ij conj(A_ij) B_ij
    let overlap: C64
        = goal.iter().zip(U.iter())
        .map(|(g, u)| g.conj() * u)
        .sum();
    let infid = 1.0 - overlap.norm() / d as f64;
    if !infid.is_finite() || infid < -NEGATIVE_SLACK {
        return Err(Error::unstable("gate infidelity", infid));
    }
    Ok(infid.max(0.0))
}

/// Infidelity of a simulated propagator against a goal acting on the
/// computational (two-level-per-qudit) subspace.
///
/// `subspace_dim` is the dimension of `goal`, `2^q` for `q` qudits, and each
/// qudit of the simulation is truncated to `levels` levels.
pub fn unitary_infidelity(
    goal: &nd::Array2<C64>,
    sim: &nd::Array2<C64>,
    subspace_dim: usize,
    levels: usize,
) -> Result<f64>
{
    if goal.nrows() != subspace_dim {
        return Err(Error::mismatch("goal unitary", subspace_dim, goal.nrows()));
    }
    if !subspace_dim.is_power_of_two() || subspace_dim < 2 {
        return Err(Error::InvalidConfig(
            format!("subspace dimension {subspace_dim} is not a power of two")));
    }
    let qudits = subspace_dim.trailing_zeros() as usize;
    let full
        = u32::try_from(qudits).ok()
        .and_then(|q| levels.checked_pow(q))
        .unwrap_or(usize::MAX);
    if sim.nrows() != full {
        return Err(Error::mismatch("simulated unitary", full, sim.nrows()));
    }
    let projected = project(sim, qudits, levels, 2)?;
    infidelity(goal, &projected)
}

/// [`unitary_infidelity`] for a register with mixed truncation levels.
pub fn unitary_infidelity_levels(
    goal: &nd::Array2<C64>,
    sim: &nd::Array2<C64>,
    levels: &[usize],
) -> Result<f64>
{
    let projected = project_levels(sim, levels, 2)?;
    infidelity(goal, &projected)
}

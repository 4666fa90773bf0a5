//! Qudit registers and the tensor-product structure of their Hilbert space.
//!
//! Subsystem 0 is always the leftmost Kronecker factor, so in the global basis
//! the level of the last subsystem varies fastest. Every global operator built
//! here and every projection in [`crate::fidelity`] follows this ordering.

use std::ops::Deref;
use itertools::Itertools;
use ndarray::{ self as nd, linalg::kron };
use num_complex::Complex64 as C64;
use crate::error::{ Error, Result };

/// An ordered sequence of subsystems, each truncated to some number of levels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Register {
    levels: Vec<usize>,
}

impl Deref for Register {
    type Target = [usize];

    fn deref(&self) -> &Self::Target { &self.levels }
}

impl Register {
    /// Create a new register from per-subsystem truncation levels.
    ///
    /// Fails if the register is empty or any level is below 2.
    pub fn new<I>(levels: I) -> Result<Self>
    where I: IntoIterator<Item = usize>
    {
        let levels: Vec<usize> = levels.into_iter().collect();
        if levels.is_empty() {
            return Err(Error::InvalidConfig("register has no subsystems".into()));
        }
        if let Some((k, n)) = levels.iter().find_position(|n| **n < 2) {
            return Err(Error::InvalidConfig(
                format!("subsystem {k} has {n} levels; need at least 2")));
        }
        Ok(Self { levels })
    }

    /// Create a register of `count` subsystems all truncated to `levels`.
    pub fn uniform(count: usize, levels: usize) -> Result<Self> {
        Self::new(std::iter::repeat(levels).take(count))
    }

    /// Number of subsystems.
    pub fn num_subsystems(&self) -> usize { self.levels.len() }

    /// Truncation level of subsystem `k`, if it exists.
    pub fn levels_of(&self, k: usize) -> Option<usize> {
        self.levels.get(k).copied()
    }

    /// Dimension of the full Hilbert space.
    pub fn dim(&self) -> usize { self.levels.iter().product() }

    /// Iterate over the level tuples of every global basis state in order.
    pub fn basis_iter(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        self.levels.iter()
            .map(|n| 0..*n)
            .multi_cartesian_product()
    }

    /// Global indices of the basis states whose every subsystem occupies a
    /// level below `target`, in increasing order.
    pub fn subspace_indices(&self, target: usize) -> Vec<usize> {
        self.basis_iter()
            .enumerate()
            .filter_map(|(k, state)| {
                state.iter().all(|l| *l < target).then_some(k)
            })
            .collect()
    }

    /// Embed a set of local operators into the full space, with identities on
    /// all subsystems not listed.
    ///
    /// Operator shapes are assumed already checked against the register.
    pub fn embed(&self, sites: &[(usize, &nd::Array2<C64>)]) -> nd::Array2<C64> {
        self.levels.iter().enumerate()
            .fold(nd::Array2::eye(1), |acc: nd::Array2<C64>, (k, n)| {
                match sites.iter().find(|(j, _)| *j == k) {
                    Some((_, op)) => kron(&acc, *op),
                    None => kron(&acc, &nd::Array2::<C64>::eye(*n)),
                }
            })
    }

    /// Embed a single local operator acting on subsystem `k`.
    pub fn embed_one(&self, k: usize, op: &nd::Array2<C64>) -> nd::Array2<C64> {
        let before: usize = self.levels.iter().take(k).product();
        let after: usize = self.levels.iter().skip(k + 1).product();
        kron(&kron(&nd::Array2::eye(before), op), &nd::Array2::eye(after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{ number, destroy };

    #[test]
    fn rejects_bad_registers() {
        assert!(matches!(Register::new(Vec::new()), Err(Error::InvalidConfig(_))));
        assert!(matches!(Register::new([3, 1]), Err(Error::InvalidConfig(_))));
        assert_eq!(Register::new([3, 2, 4]).unwrap().dim(), 24);
    }

    #[test]
    fn last_subsystem_varies_fastest() {
        let reg = Register::new([2, 3]).unwrap();
        let states: Vec<Vec<usize>> = reg.basis_iter().collect();
        assert_eq!(states.len(), 6);
        assert_eq!(states[0], vec![0, 0]);
        assert_eq!(states[1], vec![0, 1]);
        assert_eq!(states[3], vec![1, 0]);
        assert_eq!(reg.subspace_indices(2), vec![0, 1, 3, 4]);
    }

    #[test]
    fn embedding_matches_basis_order() {
        let reg = Register::uniform(2, 3).unwrap();
        let n1 = reg.embed_one(1, &number(3).unwrap());
        for (k, state) in reg.basis_iter().enumerate() {
            assert_eq!(n1[[k, k]], C64::from(state[1] as f64));
        }
        let via_sites = reg.embed(&[(1, &number(3).unwrap())]);
        assert_eq!(n1, via_sites);
    }

    #[test]
    fn joint_embedding() {
        let reg = Register::uniform(2, 2).unwrap();
        let a = destroy(2).unwrap();
        let ad = a.t().to_owned();
        // a0† a1 takes |01> (index 1) to |10> (index 2)
        let hop = reg.embed(&[(0, &ad), (1, &a)]);
        assert_eq!(hop[[2, 1]], C64::from(1.0));
        assert_eq!(hop.iter().filter(|x| x.norm() > 0.0).count(), 1);
    }
}

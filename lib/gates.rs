//! Target unitaries on the computational subspace.
//!
//! Multi-qubit gates follow the same ordering as [`crate::hilbert`]: qubit 0
//! is the leftmost factor, so `cnot()` is controlled on qubit 0.

use std::f64::consts::FRAC_1_SQRT_2;
use ndarray::{ self as nd, linalg::kron };
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };

const ZERO: C64 = C64 { re: 0.0, im: 0.0 };
const ONE: C64 = C64 { re: 1.0, im: 0.0 };
const I: C64 = C64 { re: 0.0, im: 1.0 };

fn from_diag(d: &[C64]) -> nd::Array2<C64> {
    nd::Array2::from_diag(&nd::Array1::from(d.to_vec()))
}

/// Identity on `qubits` qubits.
pub fn identity(qubits: usize) -> nd::Array2<C64> {
    nd::Array2::eye(1 << qubits)
}

pub fn x() -> nd::Array2<C64> {
    nd::array![[ZERO, ONE], [ONE, ZERO]]
}

pub fn y() -> nd::Array2<C64> {
    nd::array![[ZERO, -I], [I, ZERO]]
}

pub fn z() -> nd::Array2<C64> { from_diag(&[ONE, -ONE]) }

/// Hadamard.
pub fn h() -> nd::Array2<C64> {
    let s = C64::from(FRAC_1_SQRT_2);
    nd::array![[s, s], [s, -s]]
}

/// Controlled-Z.
pub fn cz() -> nd::Array2<C64> { from_diag(&[ONE, ONE, ONE, -ONE]) }

/// Controlled-X with qubit 0 as control.
pub fn cnot() -> nd::Array2<C64> {
    nd::array![
        [ONE,  ZERO, ZERO, ZERO],
        [ZERO, ONE,  ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE ],
        [ZERO, ZERO, ONE,  ZERO],
    ]
}

/// `|01> -> i|10>`, `|10> -> i|01>`.
pub fn iswap() -> nd::Array2<C64> {
    nd::array![
        [ONE,  ZERO, ZERO, ZERO],
        [ZERO, ZERO, I,    ZERO],
        [ZERO, I,    ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE ],
    ]
}

/// Kronecker product of a sequence of gates, first gate leftmost.
pub fn tensor<'a, G>(gates: G) -> nd::Array2<C64>
where G: IntoIterator<Item = &'a nd::Array2<C64>>
{
    gates.into_iter()
        .fold(nd::Array2::eye(1), |acc: nd::Array2<C64>, g| kron(&acc, g))
}

/// Named gates, as used in configuration files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    I,
    X,
    Y,
    Z,
    H,
    Cz,
    Cnot,
    Iswap,
}

impl Gate {
    pub fn matrix(self) -> nd::Array2<C64> {
        match self {
            Self::I => identity(1),
            Self::X => x(),
            Self::Y => y(),
            Self::Z => z(),
            Self::H => h(),
            Self::Cz => cz(),
            Self::Cnot => cnot(),
            Self::Iswap => iswap(),
        }
    }

    /// Number of qubits the gate acts on.
    pub fn qubits(self) -> usize {
        match self {
            Self::Cz | Self::Cnot | Self::Iswap => 2,
            _ => 1,
        }
    }
}

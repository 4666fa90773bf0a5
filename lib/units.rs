//! Unit convention for Hamiltonian amplitudes.
//!
//! Times are in nanoseconds and ħ = 1, so every amplitude entering a
//! propagator `exp(-i H dt)` must be an angular frequency in rad/ns. Static
//! amplitudes are carried as [`AngFreq`] so that a linear frequency cannot be
//! passed where an angular one is expected.

use std::f64::consts::TAU;
use serde::{ Deserialize, Serialize };

/// An angular frequency in rad/ns.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
#[derive(Serialize, Deserialize)]
#[serde(from = "FreqValue", into = "FreqValue")]
pub struct AngFreq(f64);

impl AngFreq {
    /// Zero frequency.
    pub const ZERO: Self = Self(0.0);

    /// Construct from a linear frequency in GHz (cycles/ns), i.e. `2π f`.
    pub fn from_ghz(f: f64) -> Self { Self(TAU * f) }

    /// Construct from a linear frequency in MHz.
    pub fn from_mhz(f: f64) -> Self { Self(TAU * f * 1e-3) }

    /// Construct directly from an angular frequency in rad/ns.
    pub fn rad_per_ns(w: f64) -> Self { Self(w) }

    /// The angular frequency in rad/ns.
    pub fn value(self) -> f64 { self.0 }

    /// The equivalent linear frequency in GHz.
    pub fn ghz(self) -> f64 { self.0 / TAU }
}

impl std::ops::Neg for AngFreq {
    type Output = Self;

    fn neg(self) -> Self { Self(-self.0) }
}

impl std::fmt::Display for AngFreq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rad/ns", self.0)
    }
}

/// Serialized form of an [`AngFreq`]; the unit is always spelled out.
///
/// In TOML this reads as `amplitude = { ghz = -0.15 }` or
/// `amplitude = { rad_per_ns = 0.02 }`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreqValue {
    Ghz(f64),
    Mhz(f64),
    RadPerNs(f64),
}

impl From<FreqValue> for AngFreq {
    fn from(v: FreqValue) -> Self {
        match v {
            FreqValue::Ghz(f) => Self::from_ghz(f),
            FreqValue::Mhz(f) => Self::from_mhz(f),
            FreqValue::RadPerNs(w) => Self::rad_per_ns(w),
        }
    }
}

impl From<AngFreq> for FreqValue {
    fn from(w: AngFreq) -> Self { Self::RadPerNs(w.0) }
}

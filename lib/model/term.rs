//! The three kinds of additive Hamiltonian term.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    hilbert::Register,
    operators::{ create, dagger, destroy },
    error::Result,
    units::AngFreq,
    waveform::Waveform,
};

/// Time-independent term `amplitude * (O_1 ⊗ O_2 ⊗ ...)` over one or more
/// subsystems.
#[derive(Clone, Debug, PartialEq)]
pub struct Drift {
    pub(crate) sites: Vec<(usize, nd::Array2<C64>)>,
    pub(crate) amplitude: AngFreq,
}

impl Drift {
    /// The (subsystem, local operator) pairs of the term.
    pub fn sites(&self) -> &[(usize, nd::Array2<C64>)] { &self.sites }

    /// Amplitude of the term.
    pub fn amplitude(&self) -> AngFreq { self.amplitude }

    fn global(&self, register: &Register) -> nd::Array2<C64> {
        let sites: Vec<(usize, &nd::Array2<C64>)>
            = self.sites.iter().map(|(k, op)| (*k, op)).collect();
        register.embed(&sites) * C64::from(self.amplitude.value())
    }
}

/// Time-independent exchange `g (a_i† a_j + a_i a_j†)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coupling {
    pub(crate) pair: (usize, usize),
    pub(crate) strength: AngFreq,
}

impl Coupling {
    /// The two coupled subsystems.
    pub fn pair(&self) -> (usize, usize) { self.pair }

    /// Coupling strength `g`.
    pub fn strength(&self) -> AngFreq { self.strength }

    fn global(&self, register: &Register) -> Result<nd::Array2<C64>> {
        let (i, j) = self.pair;
        let ad_i = create(register[i])?;
        let a_j = destroy(register[j])?;
        let hop = register.embed(&[(i, &ad_i), (j, &a_j)]);
        let exchange = &hop + &dagger(&hop);
        Ok(exchange * C64::from(self.strength.value()))
    }
}

/// Samples bound to a control channel, placed on the model's step grid.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlSamples {
    pub(crate) start: usize,
    pub(crate) values: nd::Array1<f64>,
}

impl ControlSamples {
    /// Index of the first step covered by the samples.
    pub fn start(&self) -> usize { self.start }

    /// The raw samples.
    pub fn values(&self) -> &nd::Array1<f64> { &self.values }

    /// One past the last covered step.
    pub fn end(&self) -> usize { self.start.saturating_add(self.values.len()) }

    /// Sample at global step `k`, zero outside the covered range.
    pub fn at(&self, k: usize) -> f64 {
        k.checked_sub(self.start)
            .and_then(|j| self.values.get(j).copied())
            .unwrap_or(0.0)
    }

    /// Sum with another set of samples over the union of their ranges.
    pub(crate) fn superpose(&self, other: &Self) -> Self {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        let values
            = (start..end)
            .map(|k| self.at(k) + other.at(k))
            .collect();
        Self { start, values }
    }
}

/// Time-dependent term `operator * samples[k]` on a single subsystem.
#[derive(Clone, Debug, PartialEq)]
pub struct Control {
    pub(crate) subsystem: usize,
    pub(crate) operator: nd::Array2<C64>,
    pub(crate) samples: Option<ControlSamples>,
    pub(crate) waveforms: Vec<Waveform>,
}

impl Control {
    /// Subsystem the channel drives.
    pub fn subsystem(&self) -> usize { self.subsystem }

    /// Local operator of the channel.
    pub fn operator(&self) -> &nd::Array2<C64> { &self.operator }

    /// Bound samples, if any.
    pub fn samples(&self) -> Option<&ControlSamples> { self.samples.as_ref() }

    /// Waveforms whose samples make up the channel, in the order they were
    /// added. Empty when raw samples were attached directly.
    pub fn waveforms(&self) -> &[Waveform] { &self.waveforms }

    /// `true` if no samples have been bound yet.
    pub fn is_unbound(&self) -> bool { self.samples.is_none() }

    /// Amplitude at global step `k`.
    pub fn amplitude_at(&self, k: usize) -> f64 {
        self.samples.as_ref().map(|s| s.at(k)).unwrap_or(0.0)
    }

    /// One past the last step with bound samples (zero when unbound).
    pub fn end_step(&self) -> usize {
        self.samples.as_ref().map(|s| s.end()).unwrap_or(0)
    }
}

/// A named additive contribution to the total Hamiltonian.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Drift(Drift),
    Coupling(Coupling),
    Control(Control),
}

impl Term {
    /// Subsystems the term acts on.
    pub fn subsystems(&self) -> Vec<usize> {
        match self {
            Self::Drift(d) => d.sites.iter().map(|(k, _)| *k).collect(),
            Self::Coupling(c) => vec![c.pair.0, c.pair.1],
            Self::Control(c) => vec![c.subsystem],
        }
    }

    /// `true` for drift and coupling terms.
    pub fn is_static(&self) -> bool { !matches!(self, Self::Control(_)) }

    /// Return the control channel, if this is one.
    pub fn as_control(&self) -> Option<&Control> {
        match self {
            Self::Control(c) => Some(c),
            _ => None,
        }
    }

    /// Global operator of the term.
    ///
    /// Static terms include their amplitude; control terms are returned
    /// without their time-dependent amplitude.
    pub fn global_operator(&self, register: &Register)
        -> Result<nd::Array2<C64>>
    {
        match self {
            Self::Drift(d) => Ok(d.global(register)),
            Self::Coupling(c) => c.global(register),
            Self::Control(c) => Ok(register.embed_one(c.subsystem, &c.operator)),
        }
    }
}

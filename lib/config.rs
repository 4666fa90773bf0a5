//! TOML description of a simulation run.
//!
//! ```toml
//! levels = [3, 3]
//! dt = 0.5
//! duration = 250.0
//! goal = ["iswap"]
//!
//! [[terms]]
//! kind = "drift"
//! name = "anh0"
//! sites = [{ subsystem = 0, op = "duffing" }]
//! amplitude = { ghz = -0.15 }
//!
//! [[terms]]
//! kind = "coupling"
//! name = "g"
//! pair = [0, 1]
//! strength = { mhz = -1.0 }
//!
//! [[terms]]
//! kind = "control"
//! name = "x0"
//! subsystem = 0
//! op = "drive_x"
//! waves = [
//!     { family = "gaussian", t0 = 0.0, duration = 40.0, params = { a = 0.1, tau = 20.0, sigma = 5.0 } },
//! ]
//! ```

use std::path::Path;
use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use tracing::debug;
use crate::{
    error::{ Error, Result },
    gates::{ tensor, Gate },
    hilbert::Register,
    model::HamiltonianModel,
    operators::OperatorKind,
    propagate::{ SimOptions, Simulator },
    units::AngFreq,
    waveform::{ WaveParams, WaveformRegistry },
};

/// One factor of a drift term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub subsystem: usize,
    pub op: OperatorKind,
}

/// A waveform bound to a control channel over `[t0, t0 + duration)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveConfig {
    pub family: String,
    #[serde(default)]
    pub t0: f64,
    pub duration: f64,
    #[serde(default)]
    pub params: WaveParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TermConfig {
    Drift {
        name: String,
        sites: Vec<SiteConfig>,
        amplitude: AngFreq,
    },
    Coupling {
        name: String,
        pair: (usize, usize),
        strength: AngFreq,
    },
    Control {
        name: String,
        subsystem: usize,
        op: OperatorKind,
        /// Waveforms summed onto the channel; left unbound if empty.
        #[serde(default)]
        waves: Vec<WaveConfig>,
    },
}

/// Top-level run description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Truncation level of each subsystem.
    pub levels: Vec<usize>,
    /// Sample period (ns).
    pub dt: f64,
    /// Minimum simulated duration (ns).
    #[serde(default)]
    pub duration: Option<f64>,
    /// Goal gate as a Kronecker product of named gates, first factor acting
    /// on the lowest-numbered qubits.
    #[serde(default)]
    pub goal: Vec<Gate>,
    #[serde(default)]
    pub options: SimOptions,
    #[serde(default)]
    pub terms: Vec<TermConfig>,
}

impl SimConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a config file.
    pub fn load<P>(path: P) -> Result<Self>
    where P: AsRef<Path>
    {
        let text = std::fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "read config");
        Self::from_toml(&text)
    }

    /// Assemble the described model, looking up waveform families in
    /// `registry`.
    pub fn build_model(&self, registry: &WaveformRegistry)
        -> Result<HamiltonianModel>
    {
        let register = Register::new(self.levels.iter().copied())?;
        let mut model = HamiltonianModel::new(register, self.dt)?;
        if let Some(t) = self.duration {
            model.set_duration(t)?;
        }
        for term in self.terms.iter() {
            match term {
                TermConfig::Drift { name, sites, amplitude } => {
                    let sites
                        = sites.iter()
                        .map(|s| Ok((s.subsystem, build_op(name, &model, s.subsystem, s.op)?)))
                        .collect::<Result<Vec<_>>>()?;
                    model.add_drift_multi(name, sites, *amplitude)?;
                },
                TermConfig::Coupling { name, pair, strength } => {
                    model.add_coupling(name, *pair, *strength)?;
                },
                TermConfig::Control { name, subsystem, op, waves } => {
                    let op = build_op(name, &model, *subsystem, *op)?;
                    model.add_control(name, *subsystem, op)?;
                    for wave in waves.iter() {
                        let w = registry.waveform(&wave.family, wave.params)?;
                        model.add_waveform(name, &w, wave.t0, wave.duration)?;
                    }
                },
            }
        }
        Ok(model)
    }

    /// The goal unitary, if one was given.
    pub fn goal_matrix(&self) -> Option<nd::Array2<C64>> {
        (!self.goal.is_empty())
            .then(|| {
                let mats: Vec<nd::Array2<C64>>
                    = self.goal.iter().map(|g| g.matrix()).collect();
                tensor(mats.iter())
            })
    }

    pub fn simulator(&self) -> Result<Simulator> {
        Simulator::new(self.options)
    }
}

fn build_op(name: &str, model: &HamiltonianModel, subsystem: usize, op: OperatorKind)
    -> Result<nd::Array2<C64>>
{
    let n = model.register().levels_of(subsystem)
        .ok_or_else(|| {
            Error::subsystem(name, subsystem, "not in register")
        })?;
    op.build(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        levels = [3, 2]
        dt = 0.5
        duration = 30.0
        goal = ["x", "i"]

        [options]
        record_trajectory = true

        [[terms]]
        kind = "drift"
        name = "anh0"
        sites = [{ subsystem = 0, op = "duffing" }]
        amplitude = { mhz = -150.0 }

        [[terms]]
        kind = "coupling"
        name = "g"
        pair = [0, 1]
        strength = { rad_per_ns = 0.01 }

        [[terms]]
        kind = "control"
        name = "x0"
        subsystem = 0
        op = "drive_x"
        waves = [
            { family = "gaussian", t0 = 0.0, duration = 20.0, params = { a = 0.1, tau = 10.0, sigma = 3.0 } },
            { family = "square", t0 = 10.0, duration = 5.0, params = { a = 0.05 } },
        ]

        [[terms]]
        kind = "control"
        name = "y1"
        subsystem = 1
        op = "drive_y"
    "#;

    #[test]
    fn parses_and_builds() {
        let cfg = SimConfig::from_toml(CONFIG).unwrap();
        assert_eq!(cfg.levels, vec![3, 2]);
        assert!(cfg.options.record_trajectory);
        assert_eq!(cfg.options.unitarity_tol, 1e-8);
        let model = cfg.build_model(&WaveformRegistry::default()).unwrap();
        let names: Vec<&str> = model.terms().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["anh0", "g", "x0", "y1"]);
        assert_eq!(model.unbound_controls(), vec!["y1"]);
        assert_eq!(model.total_step_count(), 60);
        let x0 = model.term("x0").unwrap().as_control().unwrap();
        assert_eq!(x0.waveforms().len(), 2);
        assert!((x0.amplitude_at(20) - 0.15).abs() < 1e-12);
        assert_eq!(cfg.goal_matrix().unwrap().nrows(), 4);
    }

    #[test]
    fn reports_bad_terms() {
        let bad_family = CONFIG.replace("\"square\"", "\"triangle\"");
        let cfg = SimConfig::from_toml(&bad_family).unwrap();
        assert!(matches!(
            cfg.build_model(&WaveformRegistry::default()),
            Err(Error::UnknownTerm(_)),
        ));

        let bad_site = CONFIG.replace("subsystem = 1", "subsystem = 4");
        let cfg = SimConfig::from_toml(&bad_site).unwrap();
        assert!(matches!(
            cfg.build_model(&WaveformRegistry::default()),
            Err(Error::InvalidSubsystem { subsystem: 4, .. }),
        ));

        let bad_kind = CONFIG.replace("\"coupling\"", "\"exchange\"");
        assert!(matches!(SimConfig::from_toml(&bad_kind), Err(Error::Toml(_))));
    }
}

#![allow(dead_code, non_snake_case, non_upper_case_globals)]

//! Piecewise-constant simulation of driven, coupled qudits and gate
//! infidelity on their computational subspace.

pub mod error;
pub mod units;
pub mod operators;
pub mod hilbert;
pub mod waveform;
pub mod model;
pub mod propagate;
pub mod fidelity;
pub mod gates;
pub mod optimizer;
pub mod config;
pub mod export;

pub use error::{ Error, Result };
pub use units::AngFreq;
pub use hilbert::Register;
pub use waveform::{ WaveParams, Waveform, WaveformRegistry };
pub use model::{ HamiltonianModel, Term, TimeGrid };
pub use propagate::{ Override, SimOptions, SimulationResult, Simulator };

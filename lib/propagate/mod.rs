//! Piecewise-constant integration of the Schrödinger equation.
//!
//! Over step `k` the Hamiltonian is held at
//! `H_k = Σ drift + Σ coupling + Σ control · sample_k`, so the step propagator
//! is `U_k = exp(-i H_k dt)` and the full evolution is the time-ordered
//! product `U = U_{N-1} ⋯ U_1 U_0`.

use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::prelude::*;
use serde::{ Deserialize, Serialize };
use tracing::{ debug, info, trace };
use crate::{
    error::{ Error, Result },
    model::{ HamiltonianModel, TimeGrid },
    operators::unitarity_deviation,
    waveform::Waveform,
};

pub mod step;
pub use step::propagator;

/// Simulator settings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Keep the partial product after every step.
    pub record_trajectory: bool,
    /// Largest allowed deviation of `U† U` from the identity, for every step
    /// propagator and for the final product. The deviation is the largest
    /// single-entry modulus of `U† U - 1` (see
    /// [`unitarity_deviation`][crate::operators::unitarity_deviation]), not a
    /// matrix norm.
    pub unitarity_tol: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self { record_trajectory: false, unitarity_tol: 1e-8 }
    }
}

impl SimOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.unitarity_tol.is_finite() || self.unitarity_tol <= 0.0 {
            return Err(Error::InvalidConfig(
                format!("unitarity tolerance must be positive; got {}", self.unitarity_tol)));
        }
        Ok(())
    }
}

/// A rebinding of one control channel, applied to a private copy of the model
/// before a batch entry is simulated.
#[derive(Clone, Debug)]
pub enum Override {
    /// Replace the channel's samples with a waveform over
    /// `[t0, t0 + duration)`.
    Waveform {
        name: String,
        waveform: Waveform,
        t0: f64,
        duration: f64,
    },
    /// Replace the channel's samples with raw values starting at `t0`, on the
    /// model's own sample period.
    Samples {
        name: String,
        samples: nd::Array1<f64>,
        t0: f64,
    },
    /// Unbind the channel.
    Clear { name: String },
}

impl Override {
    pub fn waveform(name: &str, waveform: Waveform, t0: f64, duration: f64)
        -> Self
    {
        Self::Waveform { name: name.to_string(), waveform, t0, duration }
    }

    pub fn samples(name: &str, samples: nd::Array1<f64>, t0: f64) -> Self {
        Self::Samples { name: name.to_string(), samples, t0 }
    }

    /// Name of the control channel being rebound.
    pub fn name(&self) -> &str {
        match self {
            Self::Waveform { name, .. } => name,
            Self::Samples { name, .. } => name,
            Self::Clear { name } => name,
        }
    }

    /// Apply the rebinding to `model`.
    pub fn apply(&self, model: &mut HamiltonianModel) -> Result<()> {
        match self {
            Self::Waveform { name, waveform, t0, duration }
                => model.set_waveform(name, waveform, *t0, *duration),
            Self::Samples { name, samples, t0 } => {
                let dt = model.dt();
                model.attach_samples(name, samples.clone(), *t0, dt)
            },
            Self::Clear { name } => model.clear_waveform(name),
        }
    }
}

/// Output of a simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
    unitary: nd::Array2<C64>,
    trajectory: Option<Vec<nd::Array2<C64>>>,
    grid: TimeGrid,
}

impl SimulationResult {
    /// Full propagator over the whole grid.
    pub fn unitary(&self) -> &nd::Array2<C64> { &self.unitary }

    pub fn into_unitary(self) -> nd::Array2<C64> { self.unitary }

    /// Partial products `U_k ⋯ U_0`, one per step, if they were recorded.
    pub fn trajectory(&self) -> Option<&[nd::Array2<C64>]> {
        self.trajectory.as_deref()
    }

    pub fn grid(&self) -> TimeGrid { self.grid }

    /// Apply the final propagator to an initial state.
    pub fn evolve_state(&self, psi0: &nd::Array1<C64>)
        -> Result<nd::Array1<C64>>
    {
        let n = self.unitary.nrows();
        if psi0.len() != n {
            return Err(Error::mismatch("initial state", n, psi0.len()));
        }
        Ok(self.unitary.dot(psi0))
    }

    /// Probabilities of every global basis state after evolving `psi0`.
    pub fn populations(&self, psi0: &nd::Array1<C64>)
        -> Result<nd::Array1<f64>>
    {
        Ok(self.evolve_state(psi0)?.mapv(|a| a.norm_sqr()))
    }
}

/// Global operators shared by every simulation of one model: the static part
/// of the Hamiltonian and the embedded control operators.
#[derive(Clone, Debug)]
struct Generators {
    static_part: nd::Array2<C64>,
    controls: Vec<nd::Array2<C64>>,
}

impl Generators {
    fn build(model: &HamiltonianModel) -> Result<Self> {
        Ok(Self {
            static_part: model.static_hamiltonian()?,
            controls: model.control_operators()?,
        })
    }
}

/// Piecewise-constant propagator.
#[derive(Copy, Clone, Debug, Default)]
pub struct Simulator {
    options: SimOptions,
}

impl Simulator {
    pub fn new(options: SimOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SimOptions { &self.options }

    /// Simulate the model over its full time grid.
    pub fn simulate(&self, model: &HamiltonianModel) -> Result<SimulationResult> {
        let generators = Generators::build(model)?;
        self.run(model, &generators)
    }

    /// Simulate one copy of the model per override set.
    ///
    /// The static Hamiltonian and control operators are built once and shared
    /// by all entries; each entry rebinds its controls on a private copy of
    /// the model. Results are returned in the order of `overrides`, and a
    /// failing entry does not affect the others.
    pub fn simulate_batch(
        &self,
        model: &HamiltonianModel,
        overrides: &[Vec<Override>],
    ) -> Result<Vec<Result<SimulationResult>>>
    {
        let generators = Generators::build(model)?;
        info!(entries = overrides.len(), dim = model.dimension(), "starting batch");
        let results: Vec<Result<SimulationResult>>
            = overrides.par_iter()
            .map(|set| {
                let mut local = model.clone();
                set.iter().try_for_each(|o| o.apply(&mut local))?;
                self.run(&local, &generators)
            })
            .collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(entries = overrides.len(), failed, "finished batch");
        Ok(results)
    }

    fn check_unitary(&self, U: &nd::Array2<C64>, context: String)
        -> Result<()>
    {
        let deviation = unitarity_deviation(U);
        if deviation.is_nan() || deviation > self.options.unitarity_tol {
            Err(Error::unstable(context, deviation))
        } else {
            Ok(())
        }
    }

    fn run(&self, model: &HamiltonianModel, generators: &Generators)
        -> Result<SimulationResult>
    {
        let grid = model.time_grid();
        let dt = grid.dt();
        let dim = model.dimension();
        debug!(
            steps = grid.steps(),
            dim,
            controls = generators.controls.len(),
            "simulating"
        );

        // steps with every control at zero all share this propagator
        let mut static_step: Option<nd::Array2<C64>> = None;
        let mut U: nd::Array2<C64> = nd::Array2::eye(dim);
        let mut trajectory
            = self.options.record_trajectory
            .then(|| Vec::with_capacity(grid.steps()));
        for k in 0..grid.steps() {
            let amplitudes: Vec<f64>
                = model.controls().map(|(_, c)| c.amplitude_at(k)).collect();
            let U_k
                = if amplitudes.iter().all(|a| *a == 0.0) {
                    match &static_step {
                        Some(U_static) => U_static.clone(),
                        None => {
                            let U_static = propagator(&generators.static_part, dt)?;
                            self.check_unitary(&U_static, format!("step {k} propagator"))?;
                            static_step = Some(U_static.clone());
                            U_static
                        },
                    }
                } else {
                    let H_k
                        = amplitudes.iter().zip(generators.controls.iter())
                        .filter(|(a, _)| **a != 0.0)
                        .fold(
                            generators.static_part.clone(),
                            |acc, (a, op)| acc + op * C64::from(*a),
                        );
                    let U_k = propagator(&H_k, dt)?;
                    self.check_unitary(&U_k, format!("step {k} propagator"))?;
                    U_k
                };
            U = U_k.dot(&U);
            trace!(step = k, "advanced");
            if let Some(traj) = trajectory.as_mut() { traj.push(U.clone()); }
        }
        self.check_unitary(&U, "final propagator".to_string())?;
        debug!(steps = grid.steps(), duration = grid.duration(), "simulation done");
        Ok(SimulationResult { unitary: U, trajectory, grid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use crate::{
        operators::{ drive_x, duffing },
        units::AngFreq,
    };

    fn assert_close(A: &nd::Array2<C64>, B: &nd::Array2<C64>, tol: f64) {
        assert_eq!(A.shape(), B.shape());
        for ((i, j), a) in A.indexed_iter() {
            let diff = (*a - B[[i, j]]).norm();
            assert!(diff < tol, "({i}, {j}): {a} vs {} (diff {diff:e})", B[[i, j]]);
        }
    }

    #[test]
    fn rejects_bad_tolerance() {
        let opts = SimOptions { unitarity_tol: -1.0, ..SimOptions::default() };
        assert!(matches!(Simulator::new(opts), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn empty_grid_gives_identity() {
        let model = HamiltonianModel::from_levels([3, 2], 0.1).unwrap();
        let res = Simulator::default().simulate(&model).unwrap();
        assert_eq!(res.grid().steps(), 0);
        assert_eq!(res.unitary(), &nd::Array2::<C64>::eye(6));
    }

    #[test]
    fn duffing_phases() {
        let alpha = -0.2;
        let t = 10.0;
        let mut model = HamiltonianModel::from_levels([4], 0.25).unwrap();
        model.add_drift("anh", 0, duffing(4).unwrap(), AngFreq::rad_per_ns(alpha)).unwrap();
        model.set_duration(t).unwrap();
        let res = Simulator::default().simulate(&model).unwrap();
        let U = res.unitary();
        for k in 0usize..4 {
            let expected = C64::new(0.0, -alpha * (k * k.saturating_sub(1)) as f64 * t).exp();
            assert!((U[[k, k]] - expected).norm() < 1e-10, "level {k}");
        }
    }

    #[test]
    fn pi_pulse_flips_qubit() {
        let T = 20.0;
        let mut model = HamiltonianModel::from_levels([2], 0.1).unwrap();
        model.add_control("x", 0, drive_x(2).unwrap()).unwrap();
        model.set_waveform("x", &Waveform::square(PI / T), 0.0, T).unwrap();
        let opts = SimOptions { record_trajectory: true, ..SimOptions::default() };
        let res = Simulator::new(opts).unwrap().simulate(&model).unwrap();

        let traj = res.trajectory().unwrap();
        assert_eq!(traj.len(), 200);
        assert_eq!(traj.last().unwrap(), res.unitary());

        let psi0 = nd::array![C64::from(1.0), C64::from(0.0)];
        let pops = res.populations(&psi0).unwrap();
        assert!(pops[0] < 1e-12);
        assert!((pops[1] - 1.0).abs() < 1e-12);
        assert!(matches!(
            res.evolve_state(&nd::array![C64::from(1.0)]),
            Err(Error::DimensionMismatch { .. }),
        ));
    }

    #[test]
    fn batch_preserves_order() {
        let T = 10.0;
        let mut model = HamiltonianModel::from_levels([3], 0.5).unwrap();
        model.add_drift("anh", 0, duffing(3).unwrap(), AngFreq::from_mhz(-200.0)).unwrap();
        model.add_control("x", 0, drive_x(3).unwrap()).unwrap();
        let amps = [0.0, 0.05, 0.1, 0.2, 0.4];
        let sets: Vec<Vec<Override>>
            = amps.iter()
            .map(|a| vec![Override::waveform("x", Waveform::square(*a), 0.0, T)])
            .chain(std::iter::once(vec![Override::Clear { name: "nope".into() }]))
            .collect();
        let sim = Simulator::default();
        let results = sim.simulate_batch(&model, &sets).unwrap();
        assert_eq!(results.len(), amps.len() + 1);
        for (a, res) in amps.iter().zip(results.iter()) {
            let mut single = model.clone();
            single.set_waveform("x", &Waveform::square(*a), 0.0, T).unwrap();
            let expected = sim.simulate(&single).unwrap();
            assert_close(res.as_ref().unwrap().unitary(), expected.unitary(), 1e-14);
        }
        assert!(matches!(results.last().unwrap(), Err(Error::UnknownTerm(_))));
        // the shared model is untouched
        assert_eq!(model.unbound_controls(), vec!["x"]);
    }

    #[test]
    fn tight_tolerance_reports_failing_step() {
        let T = 5.0;
        let mut model = HamiltonianModel::from_levels([4], 0.5).unwrap();
        model.add_drift("anh", 0, duffing(4).unwrap(), AngFreq::from_mhz(-250.0)).unwrap();
        model.add_control("x", 0, drive_x(4).unwrap()).unwrap();
        model.set_waveform("x", &Waveform::gaussian(0.3, T / 2.0, 1.0), 0.0, T).unwrap();
        let opts = SimOptions { unitarity_tol: 1e-30, ..SimOptions::default() };
        match Simulator::new(opts).unwrap().simulate(&model) {
            Err(Error::NumericalInstability { context, deviation }) => {
                assert!(context.starts_with("step "), "{context}");
                assert!(context.ends_with(" propagator"), "{context}");
                assert!(deviation > 1e-30);
            },
            other => panic!("expected NumericalInstability, got {other:?}"),
        }
        // the same model passes at the default tolerance
        assert!(Simulator::default().simulate(&model).is_ok());
    }

    #[test]
    fn empty_samples_override_is_rejected() {
        let mut model = HamiltonianModel::from_levels([2], 0.5).unwrap();
        model.add_control("x", 0, drive_x(2).unwrap()).unwrap();
        let sets = vec![vec![Override::samples("x", nd::Array1::zeros(0), 0.0)]];
        let results = Simulator::default().simulate_batch(&model, &sets).unwrap();
        assert!(matches!(&results[0], Err(Error::InvalidConfig(msg)) if msg.contains("'x'")));
    }
}

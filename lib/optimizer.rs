//! Interface to pulse-parameter search.
//!
//! The search itself is done by an implementor of [`PulseOptimizer`]; this
//! module only provides the request/outcome types, the stopping rule, and an
//! [`Objective`] that simulates and scores candidate models.

use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use tracing::info;
use crate::{
    error::{ Error, Result },
    fidelity::unitary_infidelity_levels,
    model::HamiltonianModel,
    propagate::{ Override, SimulationResult, Simulator },
};

/// Search bounds and stopping criteria handed to an optimizer.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    /// `(low, high)` bounds applied to the amplitude of every unbound control.
    pub bounds: (f64, f64),
    /// Gate duration (ns).
    pub duration: f64,
    pub max_iterations: usize,
    /// Stop as soon as a candidate scores at or below this.
    pub target_infidelity: f64,
}

impl OptimizeRequest {
    pub fn validate(&self) -> Result<()> {
        let (low, high) = self.bounds;
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(Error::InvalidConfig(
                format!("amplitude bounds ({low}, {high}) are not an interval")));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(Error::InvalidConfig("duration must be > 0".into()));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.target_infidelity) {
            return Err(Error::InvalidConfig("target_infidelity must be in [0, 1]".into()));
        }
        Ok(())
    }

    /// Validate against a model, returning the names of the controls to be
    /// optimized.
    pub fn check<'m>(&self, model: &'m HamiltonianModel) -> Result<Vec<&'m str>> {
        self.validate()?;
        let unbound = model.unbound_controls();
        if unbound.is_empty() {
            return Err(Error::InvalidConfig("model has no unbound controls".into()));
        }
        Ok(unbound)
    }

    /// `true` once `infidelity` reaches the target or `iteration` (counted
    /// from 0) has used up the iteration budget.
    pub fn should_stop(&self, iteration: usize, infidelity: f64) -> bool {
        infidelity <= self.target_infidelity
            || iteration + 1 >= self.max_iterations
    }

    /// Clamp an amplitude into the bounds.
    pub fn clamp(&self, amplitude: f64) -> f64 {
        amplitude.clamp(self.bounds.0, self.bounds.1)
    }
}

/// Best model found by an optimizer.
#[derive(Clone, Debug)]
pub struct OptimizeOutcome {
    /// The input model with every previously unbound control bound.
    pub model: HamiltonianModel,
    pub infidelity: f64,
    pub iterations: usize,
}

/// Simulates a candidate model and scores it against a goal on the
/// computational subspace.
#[derive(Clone, Debug)]
pub struct Objective {
    goal: nd::Array2<C64>,
    simulator: Simulator,
}

impl Objective {
    pub fn new(goal: nd::Array2<C64>, simulator: Simulator) -> Self {
        Self { goal, simulator }
    }

    pub fn goal(&self) -> &nd::Array2<C64> { &self.goal }

    pub fn simulator(&self) -> &Simulator { &self.simulator }

    fn check_register(&self, model: &HamiltonianModel) -> Result<()> {
        let d = 1_usize.checked_shl(model.register().num_subsystems() as u32)
            .unwrap_or(0);
        if self.goal.nrows() != d {
            return Err(Error::mismatch("goal unitary", d, self.goal.nrows()));
        }
        Ok(())
    }

    /// Simulate `model` and return its infidelity against the goal.
    pub fn evaluate(&self, model: &HamiltonianModel) -> Result<f64> {
        self.score(model, &self.simulator.simulate(model)?)
    }

    /// Score a finished simulation of `model`.
    pub fn score(&self, model: &HamiltonianModel, result: &SimulationResult)
        -> Result<f64>
    {
        self.check_register(model)?;
        unitary_infidelity_levels(&self.goal, result.unitary(), model.register())
    }

    /// Score one candidate per override set, in order.
    pub fn evaluate_batch(
        &self,
        model: &HamiltonianModel,
        candidates: &[Vec<Override>],
    ) -> Result<Vec<Result<f64>>>
    {
        self.check_register(model)?;
        let results = self.simulator.simulate_batch(model, candidates)?;
        Ok(
            results.into_iter()
                .map(|r| {
                    r.and_then(|res| {
                        unitary_infidelity_levels(
                            &self.goal, res.unitary(), model.register())
                    })
                })
                .collect()
        )
    }
}

/// A parameter search over the unbound controls of a model.
pub trait PulseOptimizer {
    fn optimize(
        &self,
        model: &HamiltonianModel,
        objective: &Objective,
        request: &OptimizeRequest,
    ) -> Result<OptimizeOutcome>;
}

/// Check the request, run `optimizer`, and check that everything came back
/// bound.
pub fn run_optimizer<O>(
    optimizer: &O,
    model: &HamiltonianModel,
    objective: &Objective,
    request: &OptimizeRequest,
) -> Result<OptimizeOutcome>
where O: PulseOptimizer + ?Sized
{
    let targets = request.check(model)?;
    info!(controls = ?targets, max_iterations = request.max_iterations, "starting optimizer");
    let outcome = optimizer.optimize(model, objective, request)?;
    if let Some(name) = outcome.model.unbound_controls().first() {
        return Err(Error::InvalidConfig(
            format!("optimizer left control '{name}' unbound")));
    }
    info!(
        infidelity = outcome.infidelity,
        iterations = outcome.iterations,
        "optimizer finished"
    );
    Ok(outcome)
}

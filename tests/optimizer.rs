//! A toy grid search driven through the optimizer interface.

use std::f64::consts::PI;
use qudit_sim::{
    gates,
    operators::{ drive_x, duffing },
    optimizer::{
        run_optimizer, Objective, OptimizeOutcome, OptimizeRequest, PulseOptimizer,
    },
    AngFreq, Error, HamiltonianModel, Override, Result, Simulator, Waveform,
};

/// Tries evenly spaced square-pulse amplitudes across the bounds on every
/// unbound control, keeping the best.
struct GridSearch;

impl PulseOptimizer for GridSearch {
    fn optimize(
        &self,
        model: &HamiltonianModel,
        objective: &Objective,
        request: &OptimizeRequest,
    ) -> Result<OptimizeOutcome>
    {
        let targets: Vec<String>
            = request.check(model)?.into_iter().map(String::from).collect();
        let (low, high) = request.bounds;
        let n = request.max_iterations;
        let mut best: Option<(f64, HamiltonianModel)> = None;
        let mut iterations = 0;
        for k in 0..n {
            let a = if n == 1 { low } else { low + (high - low) * k as f64 / (n - 1) as f64 };
            let mut candidate = model.clone();
            for name in targets.iter() {
                candidate.set_waveform(
                    name, &Waveform::square(request.clamp(a)), 0.0, request.duration)?;
            }
            let infid = objective.evaluate(&candidate)?;
            iterations = k + 1;
            if best.as_ref().map(|(b, _)| infid < *b).unwrap_or(true) {
                best = Some((infid, candidate));
            }
            if request.should_stop(k, infid) { break; }
        }
        let (infidelity, model)
            = best.ok_or_else(|| Error::InvalidConfig("no candidates".into()))?;
        Ok(OptimizeOutcome { model, infidelity, iterations })
    }
}

/// Leaves the model untouched.
struct DoNothing;

impl PulseOptimizer for DoNothing {
    fn optimize(&self, model: &HamiltonianModel, objective: &Objective, _: &OptimizeRequest)
        -> Result<OptimizeOutcome>
    {
        Ok(OptimizeOutcome {
            model: model.clone(),
            infidelity: objective.evaluate(model)?,
            iterations: 0,
        })
    }
}

const T: f64 = 20.0;

fn qubit_model() -> HamiltonianModel {
    let mut model = HamiltonianModel::from_levels([2], 0.1).unwrap();
    model.add_control("x", 0, drive_x(2).unwrap()).unwrap();
    model
}

fn request() -> OptimizeRequest {
    OptimizeRequest {
        bounds: (0.0, 2.0 * PI / T),
        duration: T,
        max_iterations: 21,
        target_infidelity: 1e-9,
    }
}

#[test]
fn grid_search_finds_pi_pulse() {
    let objective = Objective::new(gates::x(), Simulator::default());
    let outcome = run_optimizer(&GridSearch, &qubit_model(), &objective, &request()).unwrap();
    // the midpoint of the grid is exactly π / T
    assert_eq!(outcome.iterations, 11);
    assert!(outcome.infidelity < 1e-9, "{:e}", outcome.infidelity);
    let x = outcome.model.term("x").unwrap().as_control().unwrap();
    assert!((x.amplitude_at(0) - PI / T).abs() < 1e-12);
    assert_eq!(outcome.model.total_step_count(), 200);
}

#[test]
fn iteration_budget_is_respected() {
    let objective = Objective::new(gates::x(), Simulator::default());
    let req = OptimizeRequest { max_iterations: 4, ..request() };
    let outcome = run_optimizer(&GridSearch, &qubit_model(), &objective, &req).unwrap();
    assert_eq!(outcome.iterations, 4);
    assert!(outcome.infidelity > 1e-3);
}

#[test]
fn rejects_bound_models_and_unbound_results() {
    let objective = Objective::new(gates::x(), Simulator::default());
    let mut bound = qubit_model();
    bound.set_waveform("x", &Waveform::square(0.1), 0.0, T).unwrap();
    assert!(matches!(
        run_optimizer(&GridSearch, &bound, &objective, &request()),
        Err(Error::InvalidConfig(_)),
    ));
    assert!(matches!(
        run_optimizer(&DoNothing, &qubit_model(), &objective, &request()),
        Err(Error::InvalidConfig(_)),
    ));
}

#[test]
fn batch_scores_follow_input_order() {
    let mut model = HamiltonianModel::from_levels([3], 0.1).unwrap();
    model.add_drift("anh", 0, duffing(3).unwrap(), AngFreq::from_ghz(-0.15)).unwrap();
    model.add_control("x", 0, drive_x(3).unwrap()).unwrap();
    let objective = Objective::new(gates::x(), Simulator::default());
    let amps = [0.0, 0.5, 1.0, 0.25];
    let candidates: Vec<Vec<Override>>
        = amps.iter()
        .map(|f| vec![Override::waveform("x", Waveform::square(f * PI / T), 0.0, T)])
        .collect();
    let scores = objective.evaluate_batch(&model, &candidates).unwrap();
    assert_eq!(scores.len(), amps.len());
    for (f, score) in amps.iter().zip(scores.iter()) {
        let mut single = model.clone();
        single.set_waveform("x", &Waveform::square(f * PI / T), 0.0, T).unwrap();
        let expected = objective.evaluate(&single).unwrap();
        assert_eq!(*score.as_ref().unwrap(), expected);
    }
    // no drive at all scores as badly as possible against X
    assert!((scores[0].as_ref().unwrap() - 1.0).abs() < 1e-12);

    let wrong_goal = Objective::new(gates::cz(), Simulator::default());
    assert!(matches!(
        wrong_goal.evaluate(&model),
        Err(Error::DimensionMismatch { .. }),
    ));
}

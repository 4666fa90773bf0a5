//! Property-based tests for operator structure, unitarity of simulated
//! propagators, and the infidelity measure.

#![allow(non_snake_case)]

use proptest::prelude::*;
use ndarray as nd;
use num_complex::Complex64 as C64;
use qudit_sim::{
    fidelity::unitary_infidelity,
    operators::{ drive_x, drive_y, duffing, number, unitarity_deviation },
    AngFreq, HamiltonianModel, Simulator,
};

fn driven_pair(
    levels: usize,
    dt: f64,
    anharm: f64,
    g: f64,
    xs: Vec<f64>,
    ys: Vec<f64>,
) -> HamiltonianModel {
    let mut model = HamiltonianModel::from_levels([levels, levels], dt).unwrap();
    model.add_drift("anh0", 0, duffing(levels).unwrap(), AngFreq::rad_per_ns(anharm)).unwrap();
    model.add_drift("det1", 1, number(levels).unwrap(), AngFreq::rad_per_ns(-anharm / 3.0)).unwrap();
    model.add_coupling("g", (0, 1), AngFreq::rad_per_ns(g)).unwrap();
    model.add_control("x0", 0, drive_x(levels).unwrap()).unwrap();
    model.add_control("y1", 1, drive_y(levels).unwrap()).unwrap();
    model.attach_samples("x0", nd::Array1::from(xs), 0.0, dt).unwrap();
    model.attach_samples("y1", nd::Array1::from(ys), dt, dt).unwrap();
    model
}

proptest! {
    /// Property: the number operator is diag(0, ..., n - 1)
    #[test]
    fn number_is_diagonal_ladder(n in 2usize..12) {
        let N = number(n).unwrap();
        for ((i, j), x) in N.indexed_iter() {
            let expected = if i == j { i as f64 } else { 0.0 };
            prop_assert_eq!(*x, C64::from(expected));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: every simulated propagator is unitary
    #[test]
    fn simulation_is_unitary(
        levels in 2usize..4,
        dt in 0.05f64..1.0,
        anharm in -2.0f64..2.0,
        g in -0.2f64..0.2,
        xs in prop::collection::vec(-1.0f64..1.0, 1..20),
        ys in prop::collection::vec(-1.0f64..1.0, 1..20)
    ) {
        let model = driven_pair(levels, dt, anharm, g, xs, ys);
        let res = Simulator::default().simulate(&model).unwrap();
        let deviation = unitarity_deviation(res.unitary());
        prop_assert!(deviation < 1e-6, "deviation {:e}", deviation);
    }

    /// Property: any unitary scores zero infidelity against itself
    #[test]
    fn self_infidelity_is_zero(
        dt in 0.1f64..1.0,
        anharm in -1.0f64..1.0,
        g in -0.5f64..0.5,
        xs in prop::collection::vec(-2.0f64..2.0, 1..12),
        ys in prop::collection::vec(-2.0f64..2.0, 1..12)
    ) {
        let model = driven_pair(2, dt, anharm, g, xs, ys);
        let U = Simulator::default().simulate(&model).unwrap().into_unitary();
        let infid = unitary_infidelity(&U, &U, 4, 2).unwrap();
        prop_assert!(infid.abs() < 1e-12, "infidelity {:e}", infid);
    }
}

#![allow(non_snake_case)]

use std::path::PathBuf;
use anyhow::{ Context, Result };
use clap::Parser;
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::info;
use tracing_subscriber::EnvFilter;
use qudit_sim::{
    config::SimConfig,
    export::export_npz,
    fidelity::{ infidelity, project_levels },
    WaveformRegistry,
};

#[derive(Parser, Debug)]
#[command(name = "qudit-sim")]
#[command(about = "Simulate a driven qudit register and score it against a goal gate")]
struct Args {
    /// TOML run description
    config: PathBuf,

    /// Write time grid, control traces and propagators to this .npz file
    #[arg(short, long)]
    npz: Option<PathBuf>,

    /// Record the partial product after every step
    #[arg(short, long)]
    trajectory: bool,

    /// Print the full propagator as well as the projected one
    #[arg(long)]
    full: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn print_matrix(label: &str, U: &nd::Array2<C64>) {
    println!("{label}:");
    for row in U.rows() {
        let line: Vec<String>
            = row.iter()
            .map(|z| format!("{:+.4}{:+.4}i", z.re, z.im))
            .collect();
        println!("  [{}]", line.join(", "));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default = if args.verbose { "debug" } else { "info" };
    let filter
        = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = SimConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.options.record_trajectory |= args.trajectory;
    let model = config.build_model(&WaveformRegistry::default())
        .context("building model")?;
    let unbound = model.unbound_controls();
    if !unbound.is_empty() {
        info!(controls = ?unbound, "simulating with unbound controls at zero amplitude");
    }

    let sim = config.simulator()?;
    let result = sim.simulate(&model).context("simulating")?;
    let projected = project_levels(result.unitary(), model.register(), 2)?;

    println!(
        "{} steps of {} ns ({} ns)",
        result.grid().steps(), result.grid().dt(), result.grid().duration(),
    );
    if args.full {
        print_matrix("full propagator", result.unitary());
    }
    print_matrix("projected propagator", &projected);
    if let Some(goal) = config.goal_matrix() {
        let infid = infidelity(&goal, &projected)
            .context("scoring against goal")?;
        println!("infidelity: {infid:.3e}");
    }

    if let Some(path) = args.npz.as_ref() {
        export_npz(path, &result, &model.control_traces(), Some(&projected))
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

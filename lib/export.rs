//! `.npz` output for external plotting.
//!
//! Complex matrices are stored as separate `_re` and `_im` arrays.

use std::{ fs, path::{ Path, PathBuf } };
use ndarray as nd;
use ndarray_npy::NpzWriter;
use num_complex::Complex64 as C64;
use tracing::info;
use crate::{
    error::Result,
    model::ControlTrace,
    propagate::SimulationResult,
};

/// Create a directory and all its parents if they don't exist.
pub fn mkdir<P>(dir: P) -> Result<PathBuf>
where P: AsRef<Path>
{
    let dir = dir.as_ref();
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}

fn add_complex<W, D>(
    npz: &mut NpzWriter<W>,
    name: &str,
    data: &nd::Array<C64, D>,
) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
    D: nd::Dimension,
{
    npz.add_array(format!("{name}_re"), &data.mapv(|z| z.re))?;
    npz.add_array(format!("{name}_im"), &data.mapv(|z| z.im))?;
    Ok(())
}

/// Write a simulation to `path`.
///
/// Arrays written:
/// - `time`: start time of each step
/// - `unitary_re`, `unitary_im`: final propagator
/// - `projected_re`, `projected_im`: projected propagator, if given
/// - `trajectory_re`, `trajectory_im`: partial products with shape
///   `(steps, dim, dim)`, if recorded
/// - `control_<name>`: each control's samples on the full grid
pub fn export_npz<P>(
    path: P,
    result: &SimulationResult,
    traces: &[ControlTrace],
    projected: Option<&nd::Array2<C64>>,
) -> Result<()>
where P: AsRef<Path>
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        mkdir(parent)?;
    }
    let mut npz = NpzWriter::new(fs::File::create(path)?);
    npz.add_array("time", &result.grid().times())?;
    add_complex(&mut npz, "unitary", result.unitary())?;
    if let Some(proj) = projected {
        add_complex(&mut npz, "projected", proj)?;
    }
    if let Some(traj) = result.trajectory() {
        let dim = result.unitary().nrows();
        let stacked: nd::Array3<C64>
            = nd::Array3::from_shape_fn(
                (traj.len(), dim, dim), |(k, i, j)| traj[k][[i, j]]);
        add_complex(&mut npz, "trajectory", &stacked)?;
    }
    for trace in traces.iter() {
        npz.add_array(format!("control_{}", trace.name), &trace.samples)?;
    }
    npz.finish()?;
    info!(path = %path.display(), controls = traces.len(), "wrote npz");
    Ok(())
}

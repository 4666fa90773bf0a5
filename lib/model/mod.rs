//! Time-dependent Hamiltonians assembled from named drift, coupling, and
//! control terms over a qudit [`Register`].
//!
//! Controls are sampled onto a fixed grid of spacing `dt` starting at `t = 0`;
//! step `k` covers `[k dt, (k + 1) dt)` and uses the sample bound at index
//! `k`. Channels that end before the longest one are zero-padded.

use indexmap::IndexMap;
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::{ debug, warn };
use crate::{
    error::{ Error, Result },
    hilbert::Register,
    operators::is_hermitian,
    units::AngFreq,
    waveform::{ step_count, Waveform },
};

pub mod term;
pub use term::{ Control, ControlSamples, Coupling, Drift, Term };

/// Element-wise tolerance for the Hermiticity check on local operators.
const HERMITIAN_TOL: f64 = 1e-12;

/// Tolerance on `t0 / dt` before a start time is reported as off-grid.
const GRID_TOL: f64 = 1e-9;

/// Longest time grid a model will accept, in steps.
pub const MAX_STEPS: usize = 1 << 26;

/// A uniform grid of `steps` intervals of width `dt`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeGrid {
    dt: f64,
    steps: usize,
}

impl TimeGrid {
    pub fn new(dt: f64, steps: usize) -> Self { Self { dt, steps } }

    pub fn dt(&self) -> f64 { self.dt }

    pub fn steps(&self) -> usize { self.steps }

    /// Total covered time, `steps * dt`.
    pub fn duration(&self) -> f64 { self.steps as f64 * self.dt }

    /// Start time of each step.
    pub fn times(&self) -> nd::Array1<f64> {
        (0..self.steps).map(|k| k as f64 * self.dt).collect()
    }
}

/// Sampled amplitude of one control channel over the full simulation grid.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlTrace {
    pub name: String,
    pub subsystem: usize,
    pub samples: nd::Array1<f64>,
    pub grid: TimeGrid,
}

/// An ordered collection of named Hamiltonian terms over a fixed register and
/// time step.
#[derive(Clone, Debug, PartialEq)]
pub struct HamiltonianModel {
    register: Register,
    dt: f64,
    duration: Option<f64>,
    terms: IndexMap<String, Term>,
}

impl HamiltonianModel {
    /// Create an empty model.
    ///
    /// Fails if `dt` is not a positive, finite number.
    pub fn new(register: Register, dt: f64) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::InvalidConfig(
                format!("time step must be positive and finite; got {dt}")));
        }
        debug!(levels = ?&*register, dt, "created model");
        Ok(Self { register, dt, duration: None, terms: IndexMap::new() })
    }

    /// Create an empty model directly from per-subsystem truncation levels.
    pub fn from_levels<I>(levels: I, dt: f64) -> Result<Self>
    where I: IntoIterator<Item = usize>
    {
        Self::new(Register::new(levels)?, dt)
    }

    pub fn register(&self) -> &Register { &self.register }

    /// Sample period.
    pub fn dt(&self) -> f64 { self.dt }

    /// Dimension of the full Hilbert space.
    pub fn dimension(&self) -> usize { self.register.dim() }

    /// Minimum simulated duration, if one was set.
    pub fn duration(&self) -> Option<f64> { self.duration }

    /// Number of terms.
    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    /// Look up a term by name.
    pub fn term(&self, name: &str) -> Option<&Term> { self.terms.get(name) }

    /// Iterate over all terms in insertion order.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &Term)> + '_ {
        self.terms.iter().map(|(name, term)| (name.as_str(), term))
    }

    /// Iterate over the control channels in insertion order.
    pub fn controls(&self) -> impl Iterator<Item = (&str, &Control)> + '_ {
        self.terms()
            .filter_map(|(name, term)| term.as_control().map(|c| (name, c)))
    }

    /* Building ***************************************************************/

    fn check_name(&self, name: &str) -> Result<()> {
        if self.terms.contains_key(name) {
            Err(Error::DuplicateName(name.to_string()))
        } else {
            Ok(())
        }
    }

    fn check_subsystem(&self, name: &str, k: usize) -> Result<usize> {
        self.register.levels_of(k)
            .ok_or_else(|| {
                let count = self.register.num_subsystems();
                Error::subsystem(
                    name, k, format!("register has {count} subsystems"))
            })
    }

    fn check_site(&self, name: &str, k: usize, op: &nd::Array2<C64>)
        -> Result<()>
    {
        let n = self.check_subsystem(name, k)?;
        if op.nrows() != n {
            return Err(Error::mismatch(
                format!("term '{name}' operator rows"), n, op.nrows()));
        }
        if op.ncols() != n {
            return Err(Error::mismatch(
                format!("term '{name}' operator columns"), n, op.ncols()));
        }
        if !is_hermitian(op, HERMITIAN_TOL) {
            return Err(Error::NonHermitian(name.to_string()));
        }
        Ok(())
    }

    fn check_amplitude(name: &str, amplitude: AngFreq) -> Result<()> {
        amplitude.value().is_finite()
            .then_some(())
            .ok_or_else(|| Error::InvalidConfig(
                format!("term '{name}': amplitude {amplitude} is not finite")))
    }

    /// Add a time-independent term `amplitude * op` on one subsystem.
    pub fn add_drift(
        &mut self,
        name: &str,
        subsystem: usize,
        op: nd::Array2<C64>,
        amplitude: AngFreq,
    ) -> Result<()>
    {
        self.add_drift_multi(name, vec![(subsystem, op)], amplitude)
    }

    /// Add a time-independent term `amplitude * (O_1 ⊗ O_2 ⊗ ...)` acting
    /// jointly on several subsystems.
    pub fn add_drift_multi(
        &mut self,
        name: &str,
        sites: Vec<(usize, nd::Array2<C64>)>,
        amplitude: AngFreq,
    ) -> Result<()>
    {
        self.check_name(name)?;
        if sites.is_empty() {
            return Err(Error::InvalidConfig(
                format!("drift term '{name}' has no sites")));
        }
        for (j, (k, op)) in sites.iter().enumerate() {
            self.check_site(name, *k, op)?;
            if sites[..j].iter().any(|(other, _)| other == k) {
                return Err(Error::subsystem(name, *k, "listed twice"));
            }
        }
        Self::check_amplitude(name, amplitude)?;
        debug!(
            term = name,
            subsystems = ?sites.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            amplitude = amplitude.value(),
            "added drift"
        );
        self.terms.insert(name.to_string(), Term::Drift(Drift { sites, amplitude }));
        Ok(())
    }

    /// Add a symmetric exchange `g (a_i† a_j + a_i a_j†)` between two distinct
    /// subsystems.
    pub fn add_coupling(
        &mut self,
        name: &str,
        pair: (usize, usize),
        strength: AngFreq,
    ) -> Result<()>
    {
        self.check_name(name)?;
        let (i, j) = pair;
        self.check_subsystem(name, i)?;
        self.check_subsystem(name, j)?;
        if i == j {
            return Err(Error::subsystem(name, j, "cannot couple a subsystem to itself"));
        }
        Self::check_amplitude(name, strength)?;
        debug!(term = name, i, j, strength = strength.value(), "added coupling");
        self.terms.insert(name.to_string(), Term::Coupling(Coupling { pair, strength }));
        Ok(())
    }

    /// Add an unbound control channel `op * s(t)` on one subsystem.
    ///
    /// The channel contributes nothing until samples are bound to it.
    pub fn add_control(
        &mut self,
        name: &str,
        subsystem: usize,
        op: nd::Array2<C64>,
    ) -> Result<()>
    {
        self.check_name(name)?;
        self.check_site(name, subsystem, &op)?;
        debug!(term = name, subsystem, "added control");
        let control = Control {
            subsystem,
            operator: op,
            samples: None,
            waveforms: Vec::new(),
        };
        self.terms.insert(name.to_string(), Term::Control(control));
        Ok(())
    }

    /* Binding ****************************************************************/

    fn control_mut(&mut self, name: &str) -> Result<&mut Control> {
        match self.terms.get_mut(name) {
            Some(Term::Control(c)) => Ok(c),
            _ => Err(Error::UnknownTerm(name.to_string())),
        }
    }

    /// Grid index of the step starting at `t0`.
    fn start_step(&self, name: &str, t0: f64) -> Result<usize> {
        if !t0.is_finite() || t0 < 0.0 {
            return Err(Error::InvalidConfig(
                format!("control '{name}': start time must be finite and non-negative; got {t0}")));
        }
        let r = t0 / self.dt;
        let k = r.round();
        if k > MAX_STEPS as f64 {
            return Err(Error::InvalidConfig(
                format!("control '{name}': start time {t0} is beyond the last allowed step {MAX_STEPS}")));
        }
        if (r - k).abs() > GRID_TOL * k.max(1.0) {
            warn!(term = name, t0, dt = self.dt, "start time is off-grid; rounding to step {k}");
        }
        Ok(k as usize)
    }

    /// Check that `len` samples starting at step `start` end on the grid.
    fn check_span(name: &str, start: usize, len: usize) -> Result<()> {
        match start.checked_add(len) {
            Some(end) if end <= MAX_STEPS => Ok(()),
            _ => Err(Error::InvalidConfig(
                format!("control '{name}': {len} samples from step {start} run past step {MAX_STEPS}"))),
        }
    }

    fn sample_waveform(
        &self,
        name: &str,
        waveform: &Waveform,
        t0: f64,
        duration: f64,
    ) -> Result<ControlSamples>
    {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::InvalidConfig(
                format!("control '{name}': duration must be positive and finite; got {duration}")));
        }
        let start = self.start_step(name, t0)?;
        Self::check_span(name, start, step_count(duration, self.dt))?;
        let t_start = start as f64 * self.dt;
        let values = waveform.sample(t_start, duration, self.dt);
        if let Some(bad) = values.iter().find(|x| !x.is_finite()) {
            return Err(Error::InvalidConfig(
                format!("control '{name}': waveform '{}' produced {bad}", waveform.name())));
        }
        Ok(ControlSamples { start, values })
    }

    /// Bind a waveform to a control channel over `[t0, t0 + duration)`,
    /// replacing anything bound before.
    ///
    /// The first sample goes to step `k0 = round(t0 / dt)` and the waveform is
    /// evaluated at `k0 dt + k dt`, so an off-grid `t0` shifts the whole pulse
    /// onto the grid (with a warning) rather than sampling at `t0 + k dt`.
    pub fn set_waveform(
        &mut self,
        name: &str,
        waveform: &Waveform,
        t0: f64,
        duration: f64,
    ) -> Result<()>
    {
        // check the name first so that a bad name is reported as such
        self.control_mut(name)?;
        let samples = self.sample_waveform(name, waveform, t0, duration)?;
        debug!(
            term = name,
            waveform = waveform.name(),
            start = samples.start,
            steps = samples.values.len(),
            "bound waveform"
        );
        let control = self.control_mut(name)?;
        control.samples = Some(samples);
        control.waveforms = vec![waveform.clone()];
        Ok(())
    }

    /// Add a further waveform onto a control channel, summing it with any
    /// samples already bound. Placement on the grid is as for
    /// [`set_waveform`][Self::set_waveform].
    pub fn add_waveform(
        &mut self,
        name: &str,
        waveform: &Waveform,
        t0: f64,
        duration: f64,
    ) -> Result<()>
    {
        self.control_mut(name)?;
        let new = self.sample_waveform(name, waveform, t0, duration)?;
        debug!(
            term = name,
            waveform = waveform.name(),
            start = new.start,
            steps = new.values.len(),
            "superposed waveform"
        );
        let control = self.control_mut(name)?;
        control.samples
            = Some(match control.samples.take() {
                Some(old) => old.superpose(&new),
                None => new,
            });
        control.waveforms.push(waveform.clone());
        Ok(())
    }

    /// Bind raw samples to a control channel, starting at `t0`.
    ///
    /// `dt` must match the model's sample period.
    pub fn attach_samples(
        &mut self,
        name: &str,
        samples: nd::Array1<f64>,
        t0: f64,
        dt: f64,
    ) -> Result<()>
    {
        self.control_mut(name)?;
        if (dt - self.dt).abs() > GRID_TOL * self.dt {
            return Err(Error::InvalidConfig(
                format!("control '{name}': sample period {dt} differs from model period {}", self.dt)));
        }
        if let Some(bad) = samples.iter().find(|x| !x.is_finite()) {
            return Err(Error::InvalidConfig(
                format!("control '{name}': sample value {bad} is not finite")));
        }
        if samples.is_empty() {
            return Err(Error::InvalidConfig(
                format!("control '{name}': no samples to attach")));
        }
        let start = self.start_step(name, t0)?;
        Self::check_span(name, start, samples.len())?;
        debug!(term = name, start, steps = samples.len(), "attached samples");
        let control = self.control_mut(name)?;
        control.samples = Some(ControlSamples { start, values: samples });
        control.waveforms.clear();
        Ok(())
    }

    /// Unbind a control channel.
    pub fn clear_waveform(&mut self, name: &str) -> Result<()> {
        let control = self.control_mut(name)?;
        control.samples = None;
        control.waveforms.clear();
        Ok(())
    }

    /// Set a minimum simulated duration, so that models with no (or short)
    /// controls still evolve for this long.
    pub fn set_duration(&mut self, duration: f64) -> Result<()> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::InvalidConfig(
                format!("duration must be finite and non-negative; got {duration}")));
        }
        if duration / self.dt > MAX_STEPS as f64 {
            return Err(Error::InvalidConfig(
                format!("duration {duration} exceeds {MAX_STEPS} steps")));
        }
        self.duration = Some(duration);
        Ok(())
    }

    /* Queries ****************************************************************/

    /// Number of time steps to simulate: the end of the latest control channel
    /// or the minimum duration, whichever is longer.
    pub fn total_step_count(&self) -> usize {
        let from_duration
            = self.duration.map(|t| step_count(t, self.dt)).unwrap_or(0);
        self.controls()
            .map(|(_, c)| c.end_step())
            .fold(from_duration, usize::max)
    }

    /// The simulation grid.
    pub fn time_grid(&self) -> TimeGrid {
        TimeGrid::new(self.dt, self.total_step_count())
    }

    /// Names of control channels with nothing bound to them.
    pub fn unbound_controls(&self) -> Vec<&str> {
        self.controls()
            .filter_map(|(name, c)| c.is_unbound().then_some(name))
            .collect()
    }

    /// Every control channel's samples, zero-padded to the full grid.
    pub fn control_traces(&self) -> Vec<ControlTrace> {
        let grid = self.time_grid();
        self.controls()
            .map(|(name, c)| {
                let samples
                    = (0..grid.steps()).map(|k| c.amplitude_at(k)).collect();
                ControlTrace {
                    name: name.to_string(),
                    subsystem: c.subsystem(),
                    samples,
                    grid,
                }
            })
            .collect()
    }

    /// Sum of all drift and coupling terms as a global operator.
    pub fn static_hamiltonian(&self) -> Result<nd::Array2<C64>> {
        let n = self.dimension();
        self.terms.values()
            .filter(|term| term.is_static())
            .try_fold(nd::Array2::<C64>::zeros((n, n)), |acc, term| {
                Ok(acc + term.global_operator(&self.register)?)
            })
    }

    /// Global operators of the control channels, in the same order as
    /// [`Self::controls`].
    pub fn control_operators(&self) -> Result<Vec<nd::Array2<C64>>> {
        self.terms.values()
            .filter(|term| !term.is_static())
            .map(|term| term.global_operator(&self.register))
            .collect()
    }

    /// Total Hamiltonian during step `k`.
    pub fn hamiltonian_at(&self, k: usize) -> Result<nd::Array2<C64>> {
        let H0 = self.static_hamiltonian()?;
        let ops = self.control_operators()?;
        Ok(
            self.controls().zip(ops.iter())
                .fold(H0, |acc, ((_, c), op)| {
                    acc + op * C64::from(c.amplitude_at(k))
                })
        )
    }
}

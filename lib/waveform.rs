//! Parametric control waveforms, their sampling onto a fixed time grid, and
//! numerical integration.
//!
//! All times are in nanoseconds and all amplitudes in rad/ns (see
//! [`crate::units`]).

use std::sync::Arc;
use indexmap::IndexMap;
use ndarray as nd;
use rustc_hash::FxHashMap as HashMap;
use serde::{ Deserialize, Serialize };
use crate::error::{ Error, Result };

/// Relative slack used when converting a duration to a whole number of steps,
/// so that e.g. `250.0 / 0.5` rounds to 500 steps rather than 501 after
/// floating-point error.
const STEP_SLACK: f64 = 1e-9;

/// Number of samples of width `dt` needed to cover `duration`.
///
/// This is `ceil(duration / dt)`, except that ratios within a relative `1e-9`
/// of an integer are taken to be that integer.
pub fn step_count(duration: f64, dt: f64) -> usize {
    let r = duration / dt;
    if !r.is_finite() || r <= 0.0 { return 0; }
    let nearest = r.round();
    if (r - nearest).abs() <= STEP_SLACK * nearest.max(1.0) {
        nearest as usize
    } else {
        r.ceil() as usize
    }
}

/// Options read by the waveform families.
///
/// Each family only reads the options it needs; everything else keeps its
/// default.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Amplitude (rad/ns).
    pub a: f64,
    /// Center time (ns).
    pub tau: f64,
    /// Gaussian width (ns).
    pub sigma: f64,
    /// Constant offset added to the waveform (rad/ns).
    pub offset: f64,
    /// Carrier angular frequency (rad/ns).
    pub freq: f64,
    /// Carrier phase (rad).
    pub phase: f64,
    /// Start of a flat-top pulse (ns).
    pub t0: f64,
    /// Length of the flat section of a flat-top pulse (ns).
    pub width: f64,
    /// Length of each ramp of a flat-top pulse (ns).
    pub ramp: f64,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            a: 0.0,
            tau: 0.0,
            sigma: 1.0,
            offset: 0.0,
            freq: 0.0,
            phase: 0.0,
            t0: 0.0,
            width: 0.0,
            ramp: 0.0,
        }
    }
}

impl WaveParams {
    /// Gaussian-type parameters.
    pub fn gaussian(a: f64, tau: f64, sigma: f64) -> Self {
        Self { a, tau, sigma, ..Self::default() }
    }
}

/* Families *******************************************************************/

/// `a exp(-(t - τ)² / 2σ²) + offset`.
pub fn gaussian(t: f64, p: &WaveParams) -> f64 {
    p.a * (-(t - p.tau).powi(2) / (2.0 * p.sigma.powi(2))).exp() + p.offset
}

/// Derivative-weighted Gaussian used for leakage suppression:
/// `-(t - τ) / σ² · a exp(-(t - τ)² / 2σ²)`.
pub fn drag(t: f64, p: &WaveParams) -> f64 {
    let g = p.a * (-(t - p.tau).powi(2) / (2.0 * p.sigma.powi(2))).exp();
    -(t - p.tau) / p.sigma.powi(2) * g
}

/// Constant `a + offset`.
pub fn square(_t: f64, p: &WaveParams) -> f64 { p.a + p.offset }

/// Rectangle of height `a` starting at `t0` with cosine ramps of length
/// `ramp` on either side of a flat section of length `width`.
pub fn flattop(t: f64, p: &WaveParams) -> f64 {
    let s = t - p.t0;
    let end = 2.0 * p.ramp + p.width;
    let shape
        = if !(0.0..=end).contains(&s) {
            0.0
        } else if s < p.ramp {
            0.5 * (1.0 - (std::f64::consts::PI * s / p.ramp).cos())
        } else if s <= p.ramp + p.width {
            1.0
        } else {
            let r = end - s;
            0.5 * (1.0 - (std::f64::consts::PI * r / p.ramp).cos())
        };
    p.a * shape + p.offset
}

/// `a sin(freq t + phase) + offset`.
pub fn sine(t: f64, p: &WaveParams) -> f64 {
    p.a * (p.freq * t + p.phase).sin() + p.offset
}

/* Registry *******************************************************************/

/// Shared waveform function `f(t, params)`.
pub type WaveFn = Arc<dyn Fn(f64, &WaveParams) -> f64 + Send + Sync>;

/// Name-keyed collection of waveform families.
///
/// [`Default`] gives the built-in families `gaussian`, `drag`, `square`,
/// `flattop`, and `sin`.
#[derive(Clone)]
pub struct WaveformRegistry {
    funcs: IndexMap<String, WaveFn>,
}

impl std::fmt::Debug for WaveformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.funcs.keys()).finish()
    }
}

impl Default for WaveformRegistry {
    fn default() -> Self {
        let builtins: [(&str, WaveFn); 5] = [
            ("gaussian", Arc::new(gaussian)),
            ("drag", Arc::new(drag)),
            ("square", Arc::new(square)),
            ("flattop", Arc::new(flattop)),
            ("sin", Arc::new(sine)),
        ];
        let funcs
            = builtins.into_iter()
            .map(|(name, f)| (name.to_string(), f))
            .collect();
        Self { funcs }
    }
}

impl WaveformRegistry {
    /// Create a registry holding only the built-in families.
    pub fn new() -> Self { Self::default() }

    /// Register a new family. Existing names are never overwritten.
    pub fn register<F>(&mut self, name: &str, f: F) -> Result<()>
    where F: Fn(f64, &WaveParams) -> f64 + Send + Sync + 'static
    {
        if self.funcs.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        self.funcs.insert(name.to_string(), Arc::new(f));
        Ok(())
    }

    /// Look up a family by name.
    pub fn get(&self, name: &str) -> Result<WaveFn> {
        self.funcs.get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTerm(name.to_string()))
    }

    /// Bind a registered family to a set of parameters.
    pub fn waveform(&self, name: &str, params: WaveParams) -> Result<Waveform> {
        let func = self.get(name)?;
        Ok(Waveform { name: name.to_string(), func, params })
    }

    /// Names of all registered families, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.funcs.keys().map(|s| s.as_str())
    }
}

/* Bound waveforms ************************************************************/

/// A waveform family together with its parameters, i.e. a scalar function of
/// time.
#[derive(Clone)]
pub struct Waveform {
    name: String,
    func: WaveFn,
    params: WaveParams,
}

impl std::fmt::Debug for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Waveform {{ name: {:?}, params: {:?} }}", self.name, self.params)
    }
}

/// Waveforms compare by family name and parameters.
impl PartialEq for Waveform {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl Waveform {
    /// Bind an arbitrary function to a set of parameters.
    pub fn new<F>(name: &str, f: F, params: WaveParams) -> Self
    where F: Fn(f64, &WaveParams) -> f64 + Send + Sync + 'static
    {
        Self { name: name.to_string(), func: Arc::new(f), params }
    }

    /// Built-in Gaussian.
    pub fn gaussian(a: f64, tau: f64, sigma: f64) -> Self {
        Self::new("gaussian", gaussian, WaveParams::gaussian(a, tau, sigma))
    }

    /// Built-in derivative-weighted Gaussian.
    pub fn drag(a: f64, tau: f64, sigma: f64) -> Self {
        Self::new("drag", drag, WaveParams::gaussian(a, tau, sigma))
    }

    /// Built-in constant.
    pub fn square(a: f64) -> Self {
        Self::new("square", square, WaveParams { a, ..WaveParams::default() })
    }

    /// Family name.
    pub fn name(&self) -> &str { &self.name }

    /// Bound parameters.
    pub fn params(&self) -> &WaveParams { &self.params }

    /// Replace the bound parameters.
    pub fn with_params(mut self, params: WaveParams) -> Self {
        self.params = params;
        self
    }

    /// Evaluate at time `t`.
    pub fn eval(&self, t: f64) -> f64 { (self.func)(t, &self.params) }

    /// Sample over `[t0, t0 + duration)` at spacing `dt`.
    ///
    /// Produces [`step_count`]`(duration, dt)` values at `t0 + k dt`.
    pub fn sample(&self, t0: f64, duration: f64, dt: f64) -> nd::Array1<f64> {
        (0..step_count(duration, dt))
            .map(|k| self.eval(t0 + k as f64 * dt))
            .collect()
    }

    /// Definite integral over `[a, b]`.
    pub fn integrate(&self, a: f64, b: f64) -> Result<f64> {
        romberg(|t| self.eval(t), a, b, None, None)
    }
}

/* Integration ****************************************************************/

/// Apply the trapezoidal rule to a 1D array sampled at even intervals.
fn trapz(y: &nd::Array1<f64>, dx: f64) -> f64 {
    let n = y.len();
    match n {
        0 => 0.0,
        1 => 0.0,
        _ => {
            dx * (0.5 * y[0] + y.slice(nd::s![1..n - 1]).sum() + 0.5 * y[n - 1])
        },
    }
}

/// Romberg integration of `integrand` over `[a, b]`.
///
/// Refines until successive diagonal extrapolations differ by less than
/// `epsilon` (default `1e-9`) or `n_max` halvings (default 24) are exhausted,
/// in which case the integral is reported as unstable.
pub fn romberg<F>(
    integrand: F,
    a: f64,
    b: f64,
    n_max: Option<usize>,
    epsilon: Option<f64>,
) -> Result<f64>
where F: Fn(f64) -> f64
{
    if a == b { return Ok(0.0); }
    let mut terms: HashMap<(usize, usize), f64> = HashMap::default();
    let n_max = n_max.unwrap_or(24);
    let epsilon = epsilon.unwrap_or(1e-9);
    let mut last_diff = f64::INFINITY;
    for n in 0..=n_max {
        let time = nd::Array1::linspace(a, b, 2_usize.pow(n as u32) + 1);
        let dt = (b - a) / 2_f64.powi(n as i32);
        let y = time.mapv(&integrand);
        terms.insert((n, 0), trapz(&y, dt));
        for m in 1..=n {
            let four_m = 4.0_f64.powi(m as i32);
            let extrap
                = (four_m * terms[&(n, m - 1)] - terms[&(n - 1, m - 1)])
                / (four_m - 1.0);
            terms.insert((n, m), extrap);
        }
        if n > 0 {
            last_diff = terms[&(n, n)] - terms[&(n, n - 1)];
            // require a few refinements so that a coarse grid can't match a
            // peaked integrand by accident
            if n >= 4 && last_diff.abs() < epsilon {
                return Ok(terms[&(n, n)]);
            }
        }
    }
    Err(Error::unstable("romberg integration", last_diff.abs()))
}

//! Fixed-step integration of first-order systems.
//!
//! Deterministic systems are advanced with the classical fourth-order
//! Runge-Kutta scheme. Stochastic systems use first-order Euler-Maruyama with
//! additive noise `sqrt(2 D dt) * xi`, one standard normal draw per component
//! and step. Neither scheme inspects the values it produces: blow-up shows up
//! as non-finite entries, which [`Trajectory::check_finite`] classifies.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

/// Right-hand side of `dx/dt = f(x, t)`.
///
/// Implementations write the derivative of `state` at time `t` into `out`,
/// which always has the same length as `state`.
pub trait VectorField {
    fn evaluate(&self, state: &[f64], t: f64, out: &mut [f64]);

    /// State length the field expects, when it is fixed. Integrators reject
    /// initial states of any other length.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

impl<F> VectorField for F
where
    F: Fn(&[f64], f64, &mut [f64]),
{
    fn evaluate(&self, state: &[f64], t: f64, out: &mut [f64]) {
        self(state, t, out)
    }
}

/// Stepping discipline used by [`integrate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scheme {
    /// Classical fourth-order Runge-Kutta.
    Rk4,
    /// Euler-Maruyama with diffusion coefficient `diffusion` (D).
    EulerMaruyama { diffusion: f64 },
}

/// Largest number of points a [`TimeGrid`] may hold.
pub const MAX_GRID_POINTS: usize = 1 << 30;

/// Uniform time grid `start, start + dt, ...` strictly below `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    start: f64,
    stop: f64,
    dt: f64,
    len: usize,
}

impl TimeGrid {
    pub fn new(start: f64, stop: f64, dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SyncError::invalid(format!(
                "time step must be positive and finite, got {dt}"
            )));
        }
        if !(start.is_finite() && stop.is_finite()) {
            return Err(SyncError::invalid("time bounds must be finite"));
        }
        if stop <= start {
            return Err(SyncError::invalid(format!(
                "empty time grid: stop {stop} is not after start {start}"
            )));
        }

        let span = (stop - start) / dt;
        // Absorb rounding so that e.g. 5.0 / 0.01 does not gain a point at t = stop.
        let points = (span - 1e-9 * span.max(1.0)).ceil().max(1.0);
        if !points.is_finite() || points > MAX_GRID_POINTS as f64 {
            return Err(SyncError::invalid(format!(
                "time grid of {points} points exceeds the limit of {MAX_GRID_POINTS}"
            )));
        }
        let len = points as usize;

        Ok(Self {
            start,
            stop,
            dt,
            len,
        })
    }

    /// Grid starting at zero with `duration / dt` points.
    pub fn from_duration(duration: f64, dt: f64) -> Result<Self> {
        Self::new(0.0, duration, dt)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of grid points, including the initial one.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn time_at(&self, index: usize) -> f64 {
        self.start + index as f64 * self.dt
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.len).map(|index| self.time_at(index)).collect()
    }
}

/// Time points paired with one state vector each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<Vec<f64>>,
}

impl Trajectory {
    /// Builds a trajectory from raw samples, checking that every time point has
    /// a state and that all states share one dimension.
    pub fn new(times: Vec<f64>, states: Vec<Vec<f64>>) -> Result<Self> {
        if times.is_empty() {
            return Err(SyncError::invalid("trajectory needs at least one sample"));
        }
        if times.len() != states.len() {
            return Err(SyncError::invalid(format!(
                "{} time points but {} states",
                times.len(),
                states.len()
            )));
        }
        let dimension = states[0].len();
        if dimension == 0 || states.iter().any(|state| state.len() != dimension) {
            return Err(SyncError::invalid(
                "trajectory states must share a non-zero dimension",
            ));
        }

        Ok(Self { times, states })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[Vec<f64>] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Length of each state vector.
    pub fn dimension(&self) -> usize {
        self.states.first().map(Vec::len).unwrap_or(0)
    }

    pub fn last_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }

    /// Time series of a single state component.
    pub fn component(&self, index: usize) -> Result<Vec<f64>> {
        if index >= self.dimension() {
            return Err(SyncError::invalid(format!(
                "component {index} out of range for dimension {}",
                self.dimension()
            )));
        }
        Ok(self.states.iter().map(|state| state[index]).collect())
    }

    /// Reports the first step that holds a NaN or infinite value.
    pub fn check_finite(&self) -> Result<()> {
        match self
            .states
            .iter()
            .position(|state| state.iter().any(|value| !value.is_finite()))
        {
            Some(step) => Err(SyncError::NumericOverflow {
                step,
                time: self.times[step],
            }),
            None => Ok(()),
        }
    }
}

/// Integrates `field` from `initial` over `grid` with the requested scheme.
///
/// The generator is only consumed by stochastic schemes.
pub fn integrate<F, R>(
    field: &F,
    initial: &[f64],
    grid: &TimeGrid,
    scheme: Scheme,
    rng: &mut R,
) -> Result<Trajectory>
where
    F: VectorField + ?Sized,
    R: Rng + ?Sized,
{
    match scheme {
        Scheme::Rk4 => integrate_ode(field, initial, grid),
        Scheme::EulerMaruyama { diffusion } => {
            integrate_sde(field, initial, grid, diffusion, rng)
        }
    }
}

/// Deterministic RK4 integration.
pub fn integrate_ode<F>(field: &F, initial: &[f64], grid: &TimeGrid) -> Result<Trajectory>
where
    F: VectorField + ?Sized,
{
    check_initial(field, initial)?;

    let n = initial.len();
    let dt = grid.dt();
    let mut states = Vec::with_capacity(grid.len());
    let mut current = initial.to_vec();
    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut probe = vec![0.0; n];

    states.push(current.clone());
    for step in 1..grid.len() {
        let t = grid.time_at(step - 1);

        field.evaluate(&current, t, &mut k1);
        for i in 0..n {
            probe[i] = current[i] + 0.5 * dt * k1[i];
        }
        field.evaluate(&probe, t + 0.5 * dt, &mut k2);
        for i in 0..n {
            probe[i] = current[i] + 0.5 * dt * k2[i];
        }
        field.evaluate(&probe, t + 0.5 * dt, &mut k3);
        for i in 0..n {
            probe[i] = current[i] + dt * k3[i];
        }
        field.evaluate(&probe, t + dt, &mut k4);

        for i in 0..n {
            current[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        states.push(current.clone());
    }

    Ok(Trajectory {
        times: grid.times(),
        states,
    })
}

/// Euler-Maruyama integration of `dx = f(x, t) dt + sqrt(2 D dt) dxi`.
pub fn integrate_sde<F, R>(
    drift: &F,
    initial: &[f64],
    grid: &TimeGrid,
    diffusion: f64,
    rng: &mut R,
) -> Result<Trajectory>
where
    F: VectorField + ?Sized,
    R: Rng + ?Sized,
{
    check_initial(drift, initial)?;
    if !(diffusion.is_finite() && diffusion >= 0.0) {
        return Err(SyncError::invalid(format!(
            "diffusion coefficient must be non-negative, got {diffusion}"
        )));
    }

    let n = initial.len();
    let dt = grid.dt();
    let noise_scale = (2.0 * diffusion * dt).sqrt();
    let mut states = Vec::with_capacity(grid.len());
    let mut current = initial.to_vec();
    let mut derivative = vec![0.0; n];

    states.push(current.clone());
    for step in 1..grid.len() {
        drift.evaluate(&current, grid.time_at(step - 1), &mut derivative);
        for i in 0..n {
            let xi: f64 = rng.sample(StandardNormal);
            current[i] += derivative[i] * dt + noise_scale * xi;
        }
        states.push(current.clone());
    }

    Ok(Trajectory {
        times: grid.times(),
        states,
    })
}

fn check_initial<F: VectorField + ?Sized>(field: &F, initial: &[f64]) -> Result<()> {
    if initial.is_empty() {
        return Err(SyncError::invalid("initial state must not be empty"));
    }
    match field.dimension() {
        Some(expected) if expected != initial.len() => Err(SyncError::invalid(format!(
            "initial state of length {} for a field of dimension {expected}",
            initial.len()
        ))),
        _ => Ok(()),
    }
}

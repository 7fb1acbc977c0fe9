//! Self-sustained oscillators with nonlinear damping and diffusive coupling.
//!
//! State vectors are interleaved `[x_0, v_0, x_1, v_1, ...]`:
//!
//! ```text
//! dx_i/dt = v_i
//! dv_i/dt = μ (1 − x_i²) v_i − ω_i² x_i + Σ_{j≠i} K[i][j] (x_j − x_i)
//! ```
//!
//! The feedback law adds `g · (Σ_j a_j x_j) · x_i` to every `dv_i/dt`, where
//! `a_j` are the system amplitudes and `g` the feedback strength.

use crate::{
    integrate::{integrate_ode, TimeGrid, Trajectory, VectorField},
    system::CouplingMatrix,
    OscillatorSystem, Result, SyncError,
};

/// Derivative of an interleaved position/velocity state.
pub fn coupled_nonlinear_derivative(
    state: &[f64],
    frequencies: &[f64],
    coupling: &CouplingMatrix,
    mu: f64,
) -> Result<Vec<f64>> {
    check_state(state, frequencies.len(), coupling)?;

    let mut out = vec![0.0; state.len()];
    write_base(state, frequencies, coupling, mu, &mut out);
    Ok(out)
}

/// Derivative of the coupled law plus the global feedback term.
pub fn feedback_derivative(
    state: &[f64],
    system: &OscillatorSystem,
    mu: f64,
    feedback_strength: f64,
) -> Result<Vec<f64>> {
    check_state(state, system.len(), system.coupling())?;

    let mut out = vec![0.0; state.len()];
    write_base(state, system.frequencies(), system.coupling(), mu, &mut out);
    add_feedback(state, system.amplitudes(), feedback_strength, &mut out);
    Ok(out)
}

fn check_state(state: &[f64], oscillators: usize, coupling: &CouplingMatrix) -> Result<()> {
    if oscillators == 0 {
        return Err(SyncError::invalid("a system needs at least one oscillator"));
    }
    if state.len() != 2 * oscillators || coupling.size() != oscillators {
        return Err(SyncError::invalid(format!(
            "state of length {} for {oscillators} oscillators and a {size}x{size} coupling matrix",
            state.len(),
            size = coupling.size()
        )));
    }
    Ok(())
}

fn write_base(
    state: &[f64],
    frequencies: &[f64],
    coupling: &CouplingMatrix,
    mu: f64,
    out: &mut [f64],
) {
    for (i, &omega) in frequencies.iter().enumerate() {
        let x = state[2 * i];
        let v = state[2 * i + 1];
        let row = coupling.row(i);

        let mut diffusion = 0.0;
        for (j, &k) in row.iter().enumerate() {
            if i != j {
                diffusion += k * (state[2 * j] - x);
            }
        }

        out[2 * i] = v;
        out[2 * i + 1] = mu * (1.0 - x * x) * v - omega * omega * x + diffusion;
    }
}

fn add_feedback(state: &[f64], amplitudes: &[f64], strength: f64, out: &mut [f64]) {
    let combined: f64 = amplitudes
        .iter()
        .enumerate()
        .map(|(i, a)| a * state[2 * i])
        .sum();

    for i in 0..amplitudes.len() {
        out[2 * i + 1] += strength * combined * state[2 * i];
    }
}

/// Coupled nonlinear law bound to a system, with optional feedback.
#[derive(Debug, Clone, Copy)]
pub struct NonlinearModel<'a> {
    system: &'a OscillatorSystem,
    mu: f64,
    feedback_strength: Option<f64>,
}

impl<'a> NonlinearModel<'a> {
    pub fn new(system: &'a OscillatorSystem, mu: f64) -> Self {
        Self {
            system,
            mu,
            feedback_strength: None,
        }
    }

    pub fn with_feedback(mut self, strength: f64) -> Self {
        self.feedback_strength = Some(strength);
        self
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }
}

impl VectorField for NonlinearModel<'_> {
    fn evaluate(&self, state: &[f64], _t: f64, out: &mut [f64]) {
        write_base(
            state,
            self.system.frequencies(),
            self.system.coupling(),
            self.mu,
            out,
        );
        if let Some(strength) = self.feedback_strength {
            add_feedback(state, self.system.amplitudes(), strength, out);
        }
    }

    fn dimension(&self) -> Option<usize> {
        Some(2 * self.system.len())
    }
}

/// Integrates `model` from an interleaved initial state.
///
/// Large `mu` or strong coupling can drive the state to infinity; the values
/// are returned as computed and can be classified with
/// [`Trajectory::check_finite`].
pub fn simulate_nonlinear(
    model: &NonlinearModel<'_>,
    initial: &[f64],
    grid: &TimeGrid,
) -> Result<Trajectory> {
    check_state(initial, model.system.len(), model.system.coupling())?;

    tracing::debug!(
        oscillators = model.system.len(),
        mu = model.mu,
        feedback = ?model.feedback_strength,
        steps = grid.len(),
        "integrating coupled nonlinear oscillators"
    );
    integrate_ode(model, initial, grid)
}

//! Noise-driven hopping in a periodically tilted double well.
//!
//! ```text
//! V(x) = −a x²/2 + b x⁴/4
//! dx   = (−V'(x) + A sin(2π f t)) dt + sqrt(2 D dt) dξ
//! ```

use std::f64::consts::TAU;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{
    integrate::{integrate_sde, TimeGrid},
    spectrum::SpectrumAnalyzer,
    Result, SyncError,
};

/// Bins closer than this to the drive (in cycles per sample) are left out of
/// the noise estimate of [`snr_db`].
pub const NOISE_EXCLUSION: f64 = 0.01;

/// Symmetric quartic double well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BistablePotential {
    pub a: f64,
    pub b: f64,
}

impl Default for BistablePotential {
    fn default() -> Self {
        Self { a: 1.0, b: 1.0 }
    }
}

impl BistablePotential {
    pub fn value(&self, x: f64) -> f64 {
        -self.a * x * x / 2.0 + self.b * x.powi(4) / 4.0
    }

    pub fn derivative(&self, x: f64) -> f64 {
        -self.a * x + self.b * x.powi(3)
    }
}

/// Drive, noise and potential of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticResonance {
    pub signal_freq: f64,
    pub signal_amplitude: f64,
    /// Diffusion coefficient D.
    pub noise_level: f64,
    pub potential: BistablePotential,
}

impl StochasticResonance {
    pub fn new(signal_freq: f64, noise_level: f64, signal_amplitude: f64) -> Self {
        Self {
            signal_freq,
            signal_amplitude,
            noise_level,
            potential: BistablePotential::default(),
        }
    }

    pub fn with_potential(mut self, potential: BistablePotential) -> Self {
        self.potential = potential;
        self
    }

    /// Weak periodic forcing at time `t`.
    pub fn signal(&self, t: f64) -> f64 {
        self.signal_amplitude * (TAU * self.signal_freq * t).sin()
    }

    fn validate(&self) -> Result<()> {
        if !(self.signal_freq.is_finite() && self.signal_freq >= 0.0) {
            return Err(SyncError::invalid(format!(
                "signal frequency must be non-negative, got {}",
                self.signal_freq
            )));
        }
        if !(self.noise_level.is_finite() && self.noise_level >= 0.0) {
            return Err(SyncError::invalid(format!(
                "noise level must be non-negative, got {}",
                self.noise_level
            )));
        }
        if !self.signal_amplitude.is_finite() {
            return Err(SyncError::invalid("signal amplitude must be finite"));
        }
        Ok(())
    }
}

/// Time, position and forcing at every step of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticTrajectory {
    pub times: Vec<f64>,
    pub positions: Vec<f64>,
    pub signal: Vec<f64>,
    pub dt: f64,
}

impl StochasticTrajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Lifecycle of a [`ResonanceSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Configured,
    Integrating,
    Complete,
}

/// One-shot simulation over a fixed duration.
#[derive(Debug, Clone)]
pub struct ResonanceSimulator {
    params: StochasticResonance,
    grid: TimeGrid,
    status: SimulationStatus,
    trajectory: Option<StochasticTrajectory>,
}

impl ResonanceSimulator {
    pub fn new(params: StochasticResonance, duration: f64, dt: f64) -> Result<Self> {
        params.validate()?;
        let grid = TimeGrid::from_duration(duration, dt)?;
        Ok(Self {
            params,
            grid,
            status: SimulationStatus::Configured,
            trajectory: None,
        })
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn params(&self) -> &StochasticResonance {
        &self.params
    }

    pub fn trajectory(&self) -> Option<&StochasticTrajectory> {
        self.trajectory.as_ref()
    }

    pub fn into_trajectory(self) -> Option<StochasticTrajectory> {
        self.trajectory
    }

    /// Draws the initial position from a standard normal and integrates.
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<&StochasticTrajectory> {
        if self.status != SimulationStatus::Configured {
            return Err(SyncError::invalid(format!(
                "simulation cannot run from state {:?}",
                self.status
            )));
        }

        self.status = SimulationStatus::Integrating;
        let params = self.params;
        let initial: f64 = rng.sample(StandardNormal);
        let drift = move |state: &[f64], t: f64, out: &mut [f64]| {
            out[0] = -params.potential.derivative(state[0]) + params.signal(t);
        };

        tracing::debug!(
            signal_freq = params.signal_freq,
            noise_level = params.noise_level,
            steps = self.grid.len(),
            "integrating stochastic resonance"
        );
        let outcome = integrate_sde(&drift, &[initial], &self.grid, params.noise_level, rng);
        let integrated = match outcome {
            Ok(trajectory) => trajectory,
            Err(err) => {
                self.status = SimulationStatus::Configured;
                return Err(err);
            }
        };

        let times = integrated.times().to_vec();
        let signal = times.iter().map(|t| params.signal(*t)).collect();
        let positions = integrated.states().iter().map(|state| state[0]).collect();
        self.status = SimulationStatus::Complete;

        Ok(self.trajectory.insert(StochasticTrajectory {
            times,
            positions,
            signal,
            dt: self.grid.dt(),
        }))
    }
}

/// Runs one seeded simulation with the default potential.
pub fn simulate_stochastic_resonance(
    signal_freq: f64,
    noise_level: f64,
    duration: f64,
    dt: f64,
    signal_amplitude: f64,
    seed: u64,
) -> Result<StochasticTrajectory> {
    let params = StochasticResonance::new(signal_freq, noise_level, signal_amplitude);
    let mut simulator = ResonanceSimulator::new(params, duration, dt)?;
    let mut rng = StdRng::seed_from_u64(seed);
    simulator.run(&mut rng)?;
    simulator
        .into_trajectory()
        .ok_or_else(|| SyncError::invalid("simulation finished without a trajectory"))
}

/// Signal-to-noise ratio of a run at the drive frequency, in decibels.
pub fn snr_db(trajectory: &StochasticTrajectory, signal_freq: f64) -> Result<f64> {
    snr_db_samples(&trajectory.positions, trajectory.dt, signal_freq)
}

/// Signal-to-noise ratio of a uniformly sampled series at `signal_freq`.
///
/// Signal power is the one-sided spectral power in the bin nearest the drive;
/// noise power is the mean over all bins more than [`NOISE_EXCLUSION`]
/// (cycles per sample) away from it. The series mean is removed first. Zero
/// noise power is a [`SyncError::DivisionDegenerate`]; zero signal power with
/// non-zero noise yields `-inf`.
pub fn snr_db_samples(samples: &[f64], dt: f64, signal_freq: f64) -> Result<f64> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(SyncError::invalid(format!("sample spacing must be positive, got {dt}")));
    }
    let target = signal_freq * dt;
    if !(target.is_finite() && (0.0..=0.5).contains(&target)) {
        return Err(SyncError::invalid(format!(
            "signal frequency {signal_freq} lies outside [0, Nyquist]"
        )));
    }

    let spectrum = SpectrumAnalyzer::new().power_spectrum(samples)?;
    let signal_power = spectrum.power[spectrum.nearest_bin(target)];

    let (noise_sum, noise_bins) = spectrum
        .power
        .iter()
        .enumerate()
        .filter(|(bin, _)| (spectrum.normalized_frequency(*bin) - target).abs() > NOISE_EXCLUSION)
        .fold((0.0, 0usize), |(sum, count), (_, power)| (sum + power, count + 1));

    if noise_bins == 0 {
        return Err(SyncError::degenerate(
            "no spectral bins lie outside the signal exclusion band",
        ));
    }
    let noise_power = noise_sum / noise_bins as f64;
    if noise_power <= 0.0 {
        tracing::warn!(signal_power, "noise power vanished, SNR undefined");
        return Err(SyncError::degenerate("noise power is zero"));
    }

    Ok(10.0 * (signal_power / noise_power).log10())
}

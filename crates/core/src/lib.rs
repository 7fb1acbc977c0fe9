//! Core library of the oscillator synchronization engine.
//!
//! The crate integrates coupled oscillator systems, reduces the resulting
//! trajectories to synchronization measures, maps Arnold tongues by sweeping
//! coupling and frequency parameters, and simulates stochastic resonance in a
//! driven double well. Everything is a synchronous batch computation: callers
//! pass explicit parameters (and a seeded generator where randomness is
//! involved) and receive plain values back.

pub mod config;
pub mod error;
pub mod integrate;
pub mod kuramoto;
pub mod nonlinear;
pub mod resonance;
pub mod spectrum;
pub mod sweep;
pub mod sync;
pub mod system;

pub use config::{
    CouplingPresets, EngineConfig, IntegrationConfig, ResonanceConfig, RhythmPresets, SweepConfig,
};
pub use error::{Result, SyncError};
pub use integrate::{integrate, Scheme, TimeGrid, Trajectory, VectorField};
pub use kuramoto::{kuramoto_derivative, simulate_kuramoto, KuramotoModel};
pub use nonlinear::{
    coupled_nonlinear_derivative, feedback_derivative, simulate_nonlinear, NonlinearModel,
};
pub use resonance::{
    simulate_stochastic_resonance, snr_db, BistablePotential, ResonanceSimulator,
    SimulationStatus, StochasticResonance, StochasticTrajectory,
};
pub use sweep::{
    arnold_tongue_scan, coupling_ratio_scan, ArnoldTongueMap, Axis, AxisRange, FrequencyRatio,
};
pub use sync::{order_parameter, phase_lock_index, ratio_lock_score, RATIO_LOCK_WINDOW};
pub use system::{CouplingMatrix, OscillatorSystem};

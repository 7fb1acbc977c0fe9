use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the engine.
///
/// Every section falls back to its defaults, so partial JSON documents are
/// accepted by [`EngineConfig::from_json_str`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub integration: IntegrationConfig,
    pub sweep: SweepConfig,
    pub resonance: ResonanceConfig,
    pub rhythms: RhythmPresets,
    pub coupling: CouplingPresets,
}

impl EngineConfig {
    /// Parses a JSON configuration document.
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

/// Time grid used by single Kuramoto or nonlinear runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub dt: f64,
    pub duration: f64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            duration: 100.0,
        }
    }
}

/// Settings shared by every cell of an Arnold-tongue scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Number of linearly spaced points per axis.
    pub resolution: usize,
    pub duration: f64,
    pub dt: f64,
    /// Trailing window of the ratio-lock score. Fixed in samples, it does not
    /// follow `duration / dt`.
    pub window: usize,
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            resolution: 50,
            duration: 100.0,
            dt: 0.1,
            window: crate::sync::RATIO_LOCK_WINDOW,
            seed: 0,
        }
    }
}

/// Parameters of the driven double-well simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    pub signal_freq: f64,
    pub noise_level: f64,
    pub signal_amplitude: f64,
    pub duration: f64,
    pub dt: f64,
    pub a: f64,
    pub b: f64,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            signal_freq: 0.01,
            noise_level: 0.1,
            signal_amplitude: 0.1,
            duration: 1000.0,
            dt: 0.01,
            a: 1.0,
            b: 1.0,
        }
    }
}

/// Periods (in hours) and amplitudes of the thermal, tidal and solar rhythms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RhythmPresets {
    pub thermal_period: f64,
    pub tidal_period: f64,
    pub solar_period: f64,
    pub thermal_amplitude: f64,
    pub tidal_amplitude: f64,
    pub solar_amplitude: f64,
}

impl Default for RhythmPresets {
    fn default() -> Self {
        Self {
            thermal_period: 0.5,
            tidal_period: 12.4,
            solar_period: 24.0,
            thermal_amplitude: 1.0,
            tidal_amplitude: 1.0,
            solar_amplitude: 1.0,
        }
    }
}

/// Pairwise coupling strengths between the three rhythms plus the strength of
/// the global feedback term.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingPresets {
    pub thermal_tidal: f64,
    pub tidal_solar: f64,
    pub solar_thermal: f64,
    pub feedback_strength: f64,
}

impl Default for CouplingPresets {
    fn default() -> Self {
        Self {
            thermal_tidal: 0.3,
            tidal_solar: 0.5,
            solar_thermal: 0.2,
            feedback_strength: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "sweep": { "resolution": 3 } }"#).unwrap();

        assert_eq!(config.sweep.resolution, 3);
        assert_eq!(config.sweep.window, 1000);
        assert!((config.rhythms.tidal_period - 12.4).abs() < 1e-12);
        assert!((config.coupling.tidal_solar - 0.5).abs() < 1e-12);
    }

    #[test]
    fn malformed_documents_are_rejected() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::SyncError::Config(_)));
    }
}

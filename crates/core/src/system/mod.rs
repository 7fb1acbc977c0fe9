use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::{CouplingPresets, Result, RhythmPresets, SyncError};

/// Square coupling matrix; `get(i, j)` is the influence of oscillator `j` on
/// oscillator `i`. The diagonal is carried but never read by the derivative
/// laws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingMatrix {
    size: usize,
    values: Vec<f64>,
}

impl CouplingMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size],
        }
    }

    /// `strength` everywhere off the diagonal, zero on it.
    pub fn uniform(size: usize, strength: f64) -> Self {
        let mut matrix = Self::zeros(size);
        for i in 0..size {
            for j in 0..size {
                if i != j {
                    matrix.set(i, j, strength);
                }
            }
        }
        matrix
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return Err(SyncError::invalid("coupling matrix must be square"));
        }
        Ok(Self {
            size,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.size + j] = value;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.size..(i + 1) * self.size]
    }

    /// Largest entry, diagonal included.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Copy with every entry multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            size: self.size,
            values: self.values.iter().map(|value| value * factor).collect(),
        }
    }
}

/// Frequencies, amplitudes and couplings of `N` oscillators.
///
/// The system is plain data handed by reference to the derivative laws in
/// [`crate::kuramoto`] and [`crate::nonlinear`]. Sweeps never mutate a shared
/// system; they derive per-cell copies with [`OscillatorSystem::rescaled_to`]
/// or [`OscillatorSystem::with_frequency`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscillatorSystem {
    frequencies: Vec<f64>,
    amplitudes: Vec<f64>,
    coupling: CouplingMatrix,
}

impl OscillatorSystem {
    pub fn new(
        frequencies: Vec<f64>,
        amplitudes: Vec<f64>,
        coupling: CouplingMatrix,
    ) -> Result<Self> {
        let n = frequencies.len();
        if n == 0 {
            return Err(SyncError::invalid("a system needs at least one oscillator"));
        }
        if amplitudes.len() != n {
            return Err(SyncError::invalid(format!(
                "{n} frequencies but {} amplitudes",
                amplitudes.len()
            )));
        }
        if coupling.size() != n {
            return Err(SyncError::invalid(format!(
                "{n} oscillators but a {size}x{size} coupling matrix",
                size = coupling.size()
            )));
        }

        Ok(Self {
            frequencies,
            amplitudes,
            coupling,
        })
    }

    /// System with weak all-to-all coupling `strength` off the diagonal.
    pub fn with_uniform_coupling(
        frequencies: Vec<f64>,
        amplitudes: Vec<f64>,
        strength: f64,
    ) -> Result<Self> {
        let coupling = CouplingMatrix::uniform(frequencies.len(), strength);
        Self::new(frequencies, amplitudes, coupling)
    }

    /// Thermal, tidal and solar rhythms with the asymmetric preset couplings.
    pub fn from_presets(rhythms: &RhythmPresets, coupling: &CouplingPresets) -> Result<Self> {
        let periods = [
            rhythms.thermal_period,
            rhythms.tidal_period,
            rhythms.solar_period,
        ];
        if periods.iter().any(|period| !(*period > 0.0)) {
            return Err(SyncError::invalid("rhythm periods must be positive"));
        }

        let matrix = CouplingMatrix::from_rows(vec![
            vec![0.0, coupling.thermal_tidal, coupling.solar_thermal],
            vec![coupling.thermal_tidal, 0.0, coupling.tidal_solar],
            vec![coupling.solar_thermal, coupling.tidal_solar, 0.0],
        ])?;

        Self::new(
            periods.iter().map(|period| TAU / period).collect(),
            vec![
                rhythms.thermal_amplitude,
                rhythms.tidal_amplitude,
                rhythms.solar_amplitude,
            ],
            matrix,
        )
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn coupling(&self) -> &CouplingMatrix {
        &self.coupling
    }

    /// Fresh copy whose coupling matrix is this one rescaled so that its
    /// largest entry equals `target_max`.
    ///
    /// Always derived from `self`, so rescaling a base system repeatedly never
    /// compounds.
    pub fn rescaled_to(&self, target_max: f64) -> Result<Self> {
        let current = self.coupling.max();
        if !(current.is_finite() && current > 0.0) {
            return Err(SyncError::invalid(format!(
                "cannot rescale a coupling matrix whose maximum is {current}"
            )));
        }

        Ok(Self {
            frequencies: self.frequencies.clone(),
            amplitudes: self.amplitudes.clone(),
            coupling: self.coupling.scaled(target_max / current),
        })
    }

    /// Fresh copy with the natural frequency of oscillator `index` replaced.
    pub fn with_frequency(&self, index: usize, frequency: f64) -> Result<Self> {
        if index >= self.len() {
            return Err(SyncError::invalid(format!(
                "oscillator {index} out of range for {} oscillators",
                self.len()
            )));
        }
        let mut system = self.clone();
        system.frequencies[index] = frequency;
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_build_three_rhythm_system() {
        let system =
            OscillatorSystem::from_presets(&RhythmPresets::default(), &CouplingPresets::default())
                .unwrap();

        assert_eq!(system.len(), 3);
        assert!((system.frequencies()[0] - TAU / 0.5).abs() < 1e-12);
        assert!((system.frequencies()[2] - TAU / 24.0).abs() < 1e-12);
        assert_eq!(system.coupling().row(1), &[0.3, 0.0, 0.5]);
        assert_eq!(system.coupling().get(2, 0), 0.2);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = OscillatorSystem::new(vec![1.0, 2.0], vec![1.0], CouplingMatrix::zeros(2));
        assert!(matches!(err, Err(SyncError::InvalidInput(_))));

        let err = OscillatorSystem::new(vec![1.0, 2.0], vec![1.0, 1.0], CouplingMatrix::zeros(3));
        assert!(matches!(err, Err(SyncError::InvalidInput(_))));

        let err = OscillatorSystem::new(Vec::new(), Vec::new(), CouplingMatrix::zeros(0));
        assert!(matches!(err, Err(SyncError::InvalidInput(_))));
    }

    #[test]
    fn rescaling_always_starts_from_the_base() {
        let base =
            OscillatorSystem::with_uniform_coupling(vec![1.0, 1.1], vec![1.0, 1.0], 0.1).unwrap();

        for target in [0.0, 0.5, 1.0, 0.25] {
            let cell = base.rescaled_to(target).unwrap();
            assert!((cell.coupling().max() - target).abs() < 1e-12, "target {target}");
        }
        assert_eq!(base.coupling().max(), 0.1);
    }

    #[test]
    fn zero_matrix_cannot_be_rescaled() {
        let base = OscillatorSystem::new(vec![1.0], vec![1.0], CouplingMatrix::zeros(1)).unwrap();
        assert!(matches!(
            base.rescaled_to(1.0),
            Err(SyncError::InvalidInput(_))
        ));
    }
}

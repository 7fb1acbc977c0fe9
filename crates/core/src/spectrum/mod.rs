use std::{fmt, sync::Arc};

use realfft::{num_complex::Complex64, RealFftPlanner, RealToComplex};

use crate::{Result, SyncError};

/// One-sided power spectrum of a uniformly sampled real series.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    /// `|X_k|²` for `k = 0..=n/2`.
    pub power: Vec<f64>,
    /// Number of samples that produced the spectrum.
    pub sample_count: usize,
}

impl PowerSpectrum {
    /// Frequency of bin `k` in cycles per sample.
    pub fn normalized_frequency(&self, bin: usize) -> f64 {
        bin as f64 / self.sample_count as f64
    }

    /// Bin whose normalized frequency is closest to `frequency`.
    pub fn nearest_bin(&self, frequency: f64) -> usize {
        let bin = (frequency * self.sample_count as f64).round();
        (bin.max(0.0) as usize).min(self.power.len().saturating_sub(1))
    }
}

/// Real-to-complex FFT front end that keeps its plan and buffers between
/// calls of the same length.
pub struct SpectrumAnalyzer {
    planner: RealFftPlanner<f64>,
    fft: Option<FftResources>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    /// Power spectrum of `samples` after removing their mean.
    pub fn power_spectrum(&mut self, samples: &[f64]) -> Result<PowerSpectrum> {
        if samples.len() < 2 {
            return Err(SyncError::invalid(
                "a spectrum needs at least two samples",
            ));
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let fft = self.prepare_fft(samples.len());
        for (slot, value) in fft.input.iter_mut().zip(samples) {
            *slot = value - mean;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        Ok(PowerSpectrum {
            power: fft.spectrum.iter().map(Complex64::norm_sqr).collect(),
            sample_count: samples.len(),
        })
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let planner = &mut self.planner;
        let fft = self
            .fft
            .get_or_insert_with(|| FftResources::new(&mut *planner, size));
        if fft.size != size {
            *fft = FftResources::new(planner, size);
        }
        fft
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f64>>,
    scratch: Vec<Complex64>,
    spectrum: Vec<Complex64>,
    input: Vec<f64>,
}

impl FftResources {
    fn new(planner: &mut RealFftPlanner<f64>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        Self {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("cached_size", &self.fft.as_ref().map(|fft| fft.size))
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

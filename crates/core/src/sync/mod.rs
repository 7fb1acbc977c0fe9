//! Reductions of trajectories to synchronization measures.

use std::f64::consts::TAU;

use rustfft::{num_complex::Complex64, num_traits::Zero, FftPlanner};

use crate::{Result, SyncError, Trajectory};

/// Trailing window, in samples, of [`ratio_lock_score`].
pub const RATIO_LOCK_WINDOW: usize = 1000;

/// Kuramoto order parameter of every state in a phase trajectory.
pub fn order_parameter(phases: &Trajectory) -> Result<Vec<f64>> {
    phases
        .states()
        .iter()
        .map(|state| order_parameter_at(state))
        .collect()
}

/// `|mean(exp(iθ))|` of a single phase vector, in `[0, 1]`.
pub fn order_parameter_at(phases: &[f64]) -> Result<f64> {
    if phases.is_empty() {
        return Err(SyncError::invalid("order parameter of zero phases"));
    }
    Ok(mean_resultant(phases.iter().copied()).min(1.0))
}

fn mean_resultant(angles: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = angles.len() as f64;
    let (sin, cos) = angles.fold((0.0, 0.0), |(s, c), theta| (s + theta.sin(), c + theta.cos()));
    (sin / n).hypot(cos / n)
}

/// Analytic signal `x + i·H[x]` computed through the FFT.
///
/// Positive frequencies are doubled and negative ones removed; DC and (for
/// even lengths) Nyquist are kept as they are.
pub fn analytic_signal(samples: &[f64]) -> Vec<Complex64> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex64> = samples.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    forward.process(&mut buffer);

    let positive_end = if n % 2 == 0 { n / 2 } else { (n + 1) / 2 };
    for (k, bin) in buffer.iter_mut().enumerate() {
        if k == 0 || (n % 2 == 0 && k == n / 2) {
            continue;
        }
        if k < positive_end {
            *bin *= 2.0;
        } else {
            *bin = Complex64::zero();
        }
    }

    inverse.process(&mut buffer);

    // rustfft leaves the inverse unscaled
    let scale = 1.0 / n as f64;
    for value in buffer.iter_mut() {
        *value *= scale;
    }
    buffer
}

/// Instantaneous phase of a real series, in `(-π, π]`.
pub fn instantaneous_phase(samples: &[f64]) -> Vec<f64> {
    analytic_signal(samples).iter().map(|z| z.arg()).collect()
}

/// Phase-locking index of two real series: the mean resultant length of the
/// difference of their instantaneous phases.
pub fn phase_lock_index(series_a: &[f64], series_b: &[f64]) -> Result<f64> {
    if series_a.is_empty() {
        return Err(SyncError::invalid("phase locking needs non-empty series"));
    }
    if series_a.len() != series_b.len() {
        return Err(SyncError::invalid(format!(
            "series lengths differ: {} vs {}",
            series_a.len(),
            series_b.len()
        )));
    }

    let phase_a = instantaneous_phase(series_a);
    let phase_b = instantaneous_phase(series_b);
    let differences = phase_a.iter().zip(&phase_b).map(|(a, b)| a - b);

    Ok(mean_resultant(differences).min(1.0))
}

/// Score of `p:q` phase locking between two unwrapped phase series.
///
/// The difference `p·θ_a − q·θ_b` is wrapped into `[0, 2π)` and the score is
/// `1 / (1 + var)` over its last `window` samples, so it lies in `(0, 1]`.
/// Shorter series use every sample they have, which gives a noisier estimate
/// that still includes any initial transient.
pub fn ratio_lock_score(
    phase_a: &[f64],
    phase_b: &[f64],
    p: u32,
    q: u32,
    window: usize,
) -> Result<f64> {
    if phase_a.is_empty() || phase_a.len() != phase_b.len() {
        return Err(SyncError::invalid(format!(
            "ratio locking needs two equally long, non-empty series ({} vs {})",
            phase_a.len(),
            phase_b.len()
        )));
    }
    if window == 0 {
        return Err(SyncError::invalid("ratio-lock window must be positive"));
    }
    if p == 0 && q == 0 {
        return Err(SyncError::invalid("ratio 0:0 is meaningless"));
    }

    let start = phase_a.len().saturating_sub(window);
    if start == 0 && phase_a.len() < window {
        tracing::debug!(
            samples = phase_a.len(),
            window,
            "series shorter than the ratio-lock window, scoring every sample"
        );
    }

    let wrapped: Vec<f64> = phase_a[start..]
        .iter()
        .zip(&phase_b[start..])
        .map(|(a, b)| (f64::from(p) * a - f64::from(q) * b).rem_euclid(TAU))
        .collect();

    Ok(1.0 / (1.0 + variance(&wrapped)))
}

fn variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    fn tone(cycles: f64, n: usize, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|k| (TAU * cycles * k as f64 / n as f64 + phase).sin())
            .collect()
    }

    #[test]
    fn order_parameter_spans_unit_interval() {
        let trajectory = Trajectory::new(
            vec![0.0, 1.0, 2.0],
            vec![
                vec![0.7, 0.7, 0.7, 0.7],
                vec![0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2],
                vec![0.1, 0.4, 2.5, -1.0],
            ],
        )
        .unwrap();

        let r = order_parameter(&trajectory).unwrap();

        assert_eq!(r.len(), 3);
        assert!((r[0] - 1.0).abs() < 1e-12);
        assert!(r[1].abs() < 1e-12);
        assert!((0.0..=1.0).contains(&r[2]));
    }

    #[test]
    fn identical_phases_give_full_coherence_at_every_step() {
        let states: Vec<Vec<f64>> = (0..50).map(|k| vec![0.3 * k as f64; 5]).collect();
        let times: Vec<f64> = (0..50).map(f64::from).collect();
        let trajectory = Trajectory::new(times, states).unwrap();

        for r in order_parameter(&trajectory).unwrap() {
            assert!((r - 1.0).abs() < 1e-12);
            assert!(r <= 1.0);
        }
    }

    #[test]
    fn analytic_signal_of_sine_is_unit_phasor() {
        let samples = tone(10.0, 1000, 0.0);
        let analytic = analytic_signal(&samples);

        for (z, x) in analytic.iter().zip(&samples) {
            assert!((z.re - x).abs() < 1e-9);
            assert!((z.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn constant_phase_shift_is_fully_locked() {
        let a = tone(10.0, 1000, 0.0);
        let b = tone(10.0, 1000, 1.3);

        let index = phase_lock_index(&a, &b).unwrap();

        assert!((index - 1.0).abs() < 1e-9, "index = {index}");
    }

    #[test]
    fn unrelated_frequencies_are_not_locked() {
        let a = tone(10.0, 1000, 0.0);
        let b = tone(37.0, 1000, 0.4);

        let index = phase_lock_index(&a, &b).unwrap();

        assert!(index < 1e-6, "index = {index}");
    }

    #[test]
    fn phase_lock_rejects_mismatched_series() {
        assert!(matches!(
            phase_lock_index(&[1.0, 2.0], &[1.0]),
            Err(SyncError::InvalidInput(_))
        ));
        assert!(matches!(
            phase_lock_index(&[], &[]),
            Err(SyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn constant_difference_scores_one() {
        let a: Vec<f64> = (0..1500).map(|k| 0.37 * k as f64).collect();
        let b: Vec<f64> = a.iter().map(|theta| theta - 1.0).collect();

        let score = ratio_lock_score(&a, &b, 1, 1, RATIO_LOCK_WINDOW).unwrap();

        assert!((score - 1.0).abs() < 1e-12, "score = {score}");
    }

    #[test]
    fn score_falls_as_jitter_grows() {
        let a: Vec<f64> = (0..2000).map(|k| 0.05 * k as f64).collect();
        let jittered = |amount: f64| -> Vec<f64> {
            a.iter()
                .enumerate()
                .map(|(k, theta)| 2.0 * theta - PI + if k % 2 == 0 { amount } else { -amount })
                .collect()
        };

        let mut previous = f64::INFINITY;
        for amount in [0.0, 0.1, 0.3, 0.6, 1.0] {
            let score = ratio_lock_score(&a, &jittered(amount), 2, 1, RATIO_LOCK_WINDOW).unwrap();
            assert!(score > 0.0 && score <= 1.0);
            assert!(score < previous, "amount {amount}: {score} >= {previous}");
            previous = score;
        }
    }

    #[test]
    fn short_series_use_every_sample() {
        let a = [0.0, 0.0, 0.0, 0.0];
        let b = [-1.0, -1.0, -3.0, -3.0];

        let score = ratio_lock_score(&a, &b, 1, 1, RATIO_LOCK_WINDOW).unwrap();

        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn window_limits_the_tail() {
        let a = [0.0; 6];
        let b = [-2.0, -0.5, -1.0, -1.0, -1.0, -1.0];

        let score = ratio_lock_score(&a, &b, 1, 1, 4).unwrap();

        assert!((score - 1.0).abs() < 1e-12);
    }
}

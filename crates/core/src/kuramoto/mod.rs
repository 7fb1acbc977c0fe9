//! Phase-coupled oscillators:
//!
//! ```text
//! dθ_i/dt = ω_i + Σ_{j≠i} K[i][j] · sin(θ_j − θ_i)
//! ```
//!
//! The coupling sum is not normalised by `N`.

use std::f64::consts::TAU;

use rand::Rng;

use crate::{
    integrate::{integrate_ode, TimeGrid, Trajectory, VectorField},
    system::CouplingMatrix,
    OscillatorSystem, Result, SyncError,
};

/// Phase derivatives for `phases` under the given frequencies and couplings.
pub fn kuramoto_derivative(
    phases: &[f64],
    frequencies: &[f64],
    coupling: &CouplingMatrix,
) -> Result<Vec<f64>> {
    let n = phases.len();
    if n == 0 {
        return Err(SyncError::invalid("phase vector must not be empty"));
    }
    if frequencies.len() != n || coupling.size() != n {
        return Err(SyncError::invalid(format!(
            "{n} phases, {} frequencies and a {size}x{size} coupling matrix",
            frequencies.len(),
            size = coupling.size()
        )));
    }

    let mut out = vec![0.0; n];
    write_derivative(phases, frequencies, coupling, &mut out);
    Ok(out)
}

fn write_derivative(
    phases: &[f64],
    frequencies: &[f64],
    coupling: &CouplingMatrix,
    out: &mut [f64],
) {
    for (i, (d, &theta_i)) in out.iter_mut().zip(phases).enumerate() {
        let row = coupling.row(i);
        let mut pull = 0.0;
        for (j, &theta_j) in phases.iter().enumerate() {
            if i != j {
                pull += row[j] * (theta_j - theta_i).sin();
            }
        }
        *d = frequencies[i] + pull;
    }
}

/// Kuramoto law bound to a system, ready for the integrator.
#[derive(Debug, Clone, Copy)]
pub struct KuramotoModel<'a> {
    system: &'a OscillatorSystem,
}

impl<'a> KuramotoModel<'a> {
    pub fn new(system: &'a OscillatorSystem) -> Self {
        Self { system }
    }
}

impl VectorField for KuramotoModel<'_> {
    fn evaluate(&self, state: &[f64], _t: f64, out: &mut [f64]) {
        write_derivative(
            state,
            self.system.frequencies(),
            self.system.coupling(),
            out,
        );
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.system.len())
    }
}

/// Phases drawn uniformly from `[0, 2π)`.
pub fn random_phases<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<f64> {
    (0..count).map(|_| TAU * rng.gen::<f64>()).collect()
}

/// Integrates the phase model over `grid`.
///
/// Without `initial_phases` a uniform random start is drawn from `rng`.
pub fn simulate_kuramoto<R: Rng + ?Sized>(
    system: &OscillatorSystem,
    grid: &TimeGrid,
    initial_phases: Option<&[f64]>,
    rng: &mut R,
) -> Result<Trajectory> {
    let initial = match initial_phases {
        Some(phases) if phases.len() != system.len() => {
            return Err(SyncError::invalid(format!(
                "{} initial phases for {} oscillators",
                phases.len(),
                system.len()
            )))
        }
        Some(phases) => phases.to_vec(),
        None => random_phases(system.len(), rng),
    };

    tracing::debug!(
        oscillators = system.len(),
        steps = grid.len(),
        dt = grid.dt(),
        "integrating kuramoto model"
    );
    integrate_ode(&KuramotoModel::new(system), &initial, grid)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        integrate::{integrate, Scheme},
        sync::{order_parameter, ratio_lock_score},
    };

    #[test]
    fn zero_coupling_yields_natural_frequencies() {
        let frequencies = [0.5, -1.25, 3.0, 12.566];
        let phases = [0.1, 2.0, -7.5, 100.0];
        let coupling = CouplingMatrix::zeros(4);

        let derivative = kuramoto_derivative(&phases, &frequencies, &coupling).unwrap();

        assert_eq!(derivative, frequencies.to_vec());
    }

    #[test]
    fn diagonal_entries_are_ignored() {
        let mut coupling = CouplingMatrix::uniform(2, 0.5);
        let plain = kuramoto_derivative(&[0.3, 1.1], &[1.0, 2.0], &coupling).unwrap();
        coupling.set(0, 0, 40.0);
        coupling.set(1, 1, -40.0);
        let with_diagonal = kuramoto_derivative(&[0.3, 1.1], &[1.0, 2.0], &coupling).unwrap();

        assert_eq!(plain, with_diagonal);
    }

    #[test]
    fn pairwise_pull_matches_formula() {
        let coupling = CouplingMatrix::from_rows(vec![vec![0.0, 0.4], vec![0.7, 0.0]]).unwrap();
        let derivative = kuramoto_derivative(&[0.0, 1.0], &[2.0, 3.0], &coupling).unwrap();

        assert!((derivative[0] - (2.0 + 0.4 * 1.0_f64.sin())).abs() < 1e-15);
        assert!((derivative[1] - (3.0 + 0.7 * (-1.0_f64).sin())).abs() < 1e-15);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let coupling = CouplingMatrix::zeros(3);
        assert!(matches!(
            kuramoto_derivative(&[0.0, 1.0], &[1.0, 1.0], &coupling),
            Err(SyncError::InvalidInput(_))
        ));
        assert!(matches!(
            kuramoto_derivative(&[], &[], &CouplingMatrix::zeros(0)),
            Err(SyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn identical_oscillators_synchronise() {
        let system =
            OscillatorSystem::with_uniform_coupling(vec![1.0, 1.0, 1.0], vec![1.0; 3], 1.0)
                .unwrap();
        let grid = TimeGrid::from_duration(20.0, 0.01).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let trajectory =
            simulate_kuramoto(&system, &grid, Some(&[0.0, 1.0, 2.0]), &mut rng).unwrap();
        let r = order_parameter(&trajectory).unwrap();

        assert!(r[0] < 0.9);
        assert!(r[r.len() - 1] > 0.999);
    }

    #[test]
    fn detuned_pair_locks_inside_the_tongue() {
        let coupling = CouplingMatrix::uniform(2, 1.0);
        let system = OscillatorSystem::new(vec![1.2, 1.0], vec![1.0, 1.0], coupling).unwrap();
        let grid = TimeGrid::from_duration(200.0, 0.1).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let trajectory = simulate_kuramoto(&system, &grid, Some(&[0.0, 0.0]), &mut rng).unwrap();
        let score = ratio_lock_score(
            &trajectory.component(0).unwrap(),
            &trajectory.component(1).unwrap(),
            1,
            1,
            1000,
        )
        .unwrap();

        assert!(score > 0.99, "score = {score}");
    }

    #[test]
    fn random_start_is_seeded() {
        let system =
            OscillatorSystem::with_uniform_coupling(vec![1.0, 2.0], vec![1.0; 2], 0.1).unwrap();
        let grid = TimeGrid::from_duration(1.0, 0.1).unwrap();

        let run = || {
            let mut rng = StdRng::seed_from_u64(9);
            simulate_kuramoto(&system, &grid, None, &mut rng).unwrap()
        };
        let first = run();

        assert_eq!(first, run());
        assert!(first.states()[0].iter().all(|phase| (0.0..TAU).contains(phase)));
    }

    #[test]
    fn integrating_with_a_wrong_state_length_fails_fast() {
        let system =
            OscillatorSystem::with_uniform_coupling(vec![1.0, 2.0], vec![1.0; 2], 0.5).unwrap();
        let model = KuramotoModel::new(&system);
        let grid = TimeGrid::from_duration(1.0, 0.1).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        for initial in [&[0.0, 1.0, 2.0][..], &[0.0][..]] {
            assert!(matches!(
                integrate(&model, initial, &grid, Scheme::Rk4, &mut rng),
                Err(SyncError::InvalidInput(_))
            ));
            assert!(matches!(
                integrate(
                    &model,
                    initial,
                    &grid,
                    Scheme::EulerMaruyama { diffusion: 0.1 },
                    &mut rng
                ),
                Err(SyncError::InvalidInput(_))
            ));
        }
    }
}

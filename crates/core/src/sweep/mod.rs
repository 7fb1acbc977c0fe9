//! Arnold-tongue scans.
//!
//! Every cell of a scan derives its own system from an immutable base,
//! integrates the phase model with its own seeded generator and reduces the
//! run to one score. Cells share nothing, so they are evaluated in parallel and
//! the map is assembled only once every cell has finished.

use std::{f64::consts::TAU, fmt};

use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    integrate::{TimeGrid, Trajectory},
    kuramoto::simulate_kuramoto,
    sync::{phase_lock_index, ratio_lock_score},
    OscillatorSystem, Result, SweepConfig, SyncError,
};

/// Integer frequency ratio `p:q` tested by [`coupling_ratio_scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRatio {
    pub p: u32,
    pub q: u32,
}

impl FrequencyRatio {
    pub fn new(p: u32, q: u32) -> Self {
        Self { p, q }
    }
}

impl fmt::Display for FrequencyRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.p, self.q)
    }
}

/// Closed interval sampled at `resolution` evenly spaced points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: f64,
    pub stop: f64,
}

impl AxisRange {
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }

    pub fn linspace(&self, resolution: usize) -> Result<Vec<f64>> {
        if resolution == 0 {
            return Err(SyncError::invalid("sweep resolution must be positive"));
        }
        if !(self.start.is_finite() && self.stop.is_finite()) {
            return Err(SyncError::invalid("sweep bounds must be finite"));
        }
        if resolution == 1 {
            return Ok(vec![self.start]);
        }

        let step = (self.stop - self.start) / (resolution - 1) as f64;
        Ok((0..resolution)
            .map(|i| self.start + i as f64 * step)
            .collect())
    }
}

/// Labels of one map dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Axis {
    Values { name: String, values: Vec<f64> },
    Ratios(Vec<FrequencyRatio>),
}

impl Axis {
    pub fn len(&self) -> usize {
        match self {
            Axis::Values { values, .. } => values.len(),
            Axis::Ratios(ratios) => ratios.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row-major grid of synchronization scores.
///
/// A NaN cell marks a run whose trajectory left the finite range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArnoldTongueMap {
    rows: Axis,
    columns: Axis,
    values: Vec<f64>,
}

impl ArnoldTongueMap {
    pub(crate) fn new(rows: Axis, columns: Axis, values: Vec<f64>) -> Result<Self> {
        if values.len() != rows.len() * columns.len() {
            return Err(SyncError::invalid(format!(
                "{} scores for a {}x{} map",
                values.len(),
                rows.len(),
                columns.len()
            )));
        }
        Ok(Self {
            rows,
            columns,
            values,
        })
    }

    pub fn rows(&self) -> &Axis {
        &self.rows
    }

    pub fn columns(&self) -> &Axis {
        &self.columns
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.rows.len() || column >= self.columns.len() {
            return None;
        }
        self.values.get(row * self.columns.len() + column).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        let width = self.columns.len();
        self.values.get(row * width..(row + 1) * width)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Cells whose run produced non-finite values.
    pub fn failed_cells(&self) -> Vec<(usize, usize)> {
        let width = self.columns.len();
        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_nan())
            .map(|(index, _)| (index / width, index % width))
            .collect()
    }
}

/// Scans ratio locking of oscillators 0 and 1 against coupling strength.
///
/// Rows follow `ratios`; columns are `settings.resolution` strengths spread
/// over `coupling`. Each cell rescales a fresh copy of `base` so that its
/// largest coupling equals the column strength.
pub fn coupling_ratio_scan(
    base: &OscillatorSystem,
    ratios: &[FrequencyRatio],
    coupling: AxisRange,
    settings: &SweepConfig,
) -> Result<ArnoldTongueMap> {
    check_base(base)?;
    if ratios.is_empty() {
        return Err(SyncError::invalid("at least one frequency ratio is required"));
    }
    if ratios.iter().any(|ratio| ratio.p == 0 && ratio.q == 0) {
        return Err(SyncError::invalid("ratio 0:0 is meaningless"));
    }
    if settings.window == 0 {
        return Err(SyncError::invalid("ratio-lock window must be positive"));
    }
    // Surfaces a zero base matrix before any cell runs.
    base.rescaled_to(1.0)?;

    let strengths = coupling.linspace(settings.resolution)?;
    let grid = TimeGrid::from_duration(settings.duration, settings.dt)?;
    let width = strengths.len();

    tracing::debug!(
        rows = ratios.len(),
        columns = width,
        steps = grid.len(),
        "starting coupling/ratio scan"
    );

    let values = (0..ratios.len() * width)
        .into_par_iter()
        .map(|index| {
            let ratio = ratios[index / width];
            let system = base.rescaled_to(strengths[index % width])?;
            let trajectory = run_cell(&system, &grid, settings.seed, index)?;
            if !cell_is_finite(&trajectory, index, width) {
                return Ok(f64::NAN);
            }
            ratio_lock_score(
                &trajectory.component(0)?,
                &trajectory.component(1)?,
                ratio.p,
                ratio.q,
                settings.window,
            )
        })
        .collect::<Result<Vec<f64>>>()?;

    ArnoldTongueMap::new(
        Axis::Ratios(ratios.to_vec()),
        Axis::Values {
            name: "coupling".to_string(),
            values: strengths,
        },
        values,
    )
}

/// Scans phase locking of oscillators 0 and 1 against their periods.
///
/// Rows set the period of oscillator 0, columns the period of oscillator 1;
/// each axis has `settings.resolution` points. The score is the
/// phase-locking index between `sin θ_0` and `sin θ_1`.
pub fn arnold_tongue_scan(
    base: &OscillatorSystem,
    period_a: AxisRange,
    period_b: AxisRange,
    settings: &SweepConfig,
) -> Result<ArnoldTongueMap> {
    check_base(base)?;
    let rows = period_a.linspace(settings.resolution)?;
    let columns = period_b.linspace(settings.resolution)?;
    if rows.iter().chain(&columns).any(|period| !(*period > 0.0)) {
        return Err(SyncError::invalid("swept periods must be positive"));
    }
    let grid = TimeGrid::from_duration(settings.duration, settings.dt)?;
    let width = columns.len();

    tracing::debug!(
        rows = rows.len(),
        columns = width,
        steps = grid.len(),
        "starting period scan"
    );

    let values = (0..rows.len() * width)
        .into_par_iter()
        .map(|index| {
            let system = base
                .with_frequency(0, TAU / rows[index / width])?
                .with_frequency(1, TAU / columns[index % width])?;
            let trajectory = run_cell(&system, &grid, settings.seed, index)?;
            if !cell_is_finite(&trajectory, index, width) {
                return Ok(f64::NAN);
            }
            let signal_a: Vec<f64> =
                trajectory.component(0)?.iter().map(|theta| theta.sin()).collect();
            let signal_b: Vec<f64> =
                trajectory.component(1)?.iter().map(|theta| theta.sin()).collect();
            phase_lock_index(&signal_a, &signal_b)
        })
        .collect::<Result<Vec<f64>>>()?;

    ArnoldTongueMap::new(
        Axis::Values {
            name: "period_a".to_string(),
            values: rows,
        },
        Axis::Values {
            name: "period_b".to_string(),
            values: columns,
        },
        values,
    )
}

fn check_base(base: &OscillatorSystem) -> Result<()> {
    if base.len() < 2 {
        return Err(SyncError::invalid(
            "an Arnold-tongue scan needs at least two oscillators",
        ));
    }
    Ok(())
}

fn run_cell(
    system: &OscillatorSystem,
    grid: &TimeGrid,
    seed: u64,
    index: usize,
) -> Result<Trajectory> {
    let mut rng = cell_rng(seed, index);
    simulate_kuramoto(system, grid, None, &mut rng)
}

/// Generator of one cell, independent of which worker runs it.
fn cell_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn cell_is_finite(trajectory: &Trajectory, index: usize, width: usize) -> bool {
    match trajectory.check_finite() {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(row = index / width, column = index % width, %err, "sweep cell failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{system::CouplingMatrix, CouplingPresets, RhythmPresets};

    fn settings(resolution: usize, duration: f64, dt: f64) -> SweepConfig {
        SweepConfig {
            resolution,
            duration,
            dt,
            window: 1000,
            seed: 42,
        }
    }

    fn detuned_pair() -> OscillatorSystem {
        OscillatorSystem::new(vec![1.2, 1.0], vec![1.0, 1.0], CouplingMatrix::uniform(2, 0.3))
            .unwrap()
    }

    #[test]
    fn linspace_includes_both_ends() {
        let axis = AxisRange::new(0.25, 2.0).linspace(8).unwrap();
        assert_eq!(axis.len(), 8);
        assert_eq!(axis[0], 0.25);
        assert!((axis[7] - 2.0).abs() < 1e-12);
        assert_eq!(AxisRange::new(3.0, 9.0).linspace(1).unwrap(), vec![3.0]);
        assert!(AxisRange::new(0.0, 1.0).linspace(0).is_err());
    }

    #[test]
    fn period_scan_fills_a_three_by_three_map() {
        let base =
            OscillatorSystem::from_presets(&RhythmPresets::default(), &CouplingPresets::default())
                .unwrap();
        let settings = settings(3, 20.0, 0.01);

        let map = arnold_tongue_scan(
            &base,
            AxisRange::new(0.25, 2.0),
            AxisRange::new(10.0, 15.0),
            &settings,
        )
        .unwrap();

        assert_eq!(map.shape(), (3, 3));
        assert!(map.values().iter().all(|v| *v > 0.0 && *v <= 1.0));
        assert!(map.failed_cells().is_empty());

        let again = arnold_tongue_scan(
            &base,
            AxisRange::new(0.25, 2.0),
            AxisRange::new(10.0, 15.0),
            &settings,
        )
        .unwrap();
        assert_eq!(map, again);
    }

    #[test]
    fn coupling_scan_locks_only_with_coupling() {
        let ratios = [FrequencyRatio::new(1, 1), FrequencyRatio::new(2, 1)];

        let map = coupling_ratio_scan(
            &detuned_pair(),
            &ratios,
            AxisRange::new(0.0, 1.0),
            &settings(2, 200.0, 0.1),
        )
        .unwrap();

        assert_eq!(map.shape(), (2, 2));
        let uncoupled = map.get(0, 0).unwrap();
        let coupled = map.get(0, 1).unwrap();
        assert!(coupled > 0.9, "coupled = {coupled}");
        assert!(uncoupled < 0.6, "uncoupled = {uncoupled}");
        assert!(map.values().iter().all(|v| *v > 0.0 && *v <= 1.0));
        assert_eq!(map.row(1).map(<[f64]>::len), Some(2));
    }

    #[test]
    fn scans_validate_their_inputs() {
        let single =
            OscillatorSystem::with_uniform_coupling(vec![1.0], vec![1.0], 0.1).unwrap();
        assert!(matches!(
            arnold_tongue_scan(
                &single,
                AxisRange::new(1.0, 2.0),
                AxisRange::new(1.0, 2.0),
                &settings(2, 1.0, 0.1)
            ),
            Err(SyncError::InvalidInput(_))
        ));

        let uncoupled =
            OscillatorSystem::new(vec![1.0, 1.0], vec![1.0; 2], CouplingMatrix::zeros(2)).unwrap();
        assert!(matches!(
            coupling_ratio_scan(
                &uncoupled,
                &[FrequencyRatio::new(1, 1)],
                AxisRange::new(0.0, 1.0),
                &settings(2, 1.0, 0.1)
            ),
            Err(SyncError::InvalidInput(_))
        ));

        assert!(matches!(
            arnold_tongue_scan(
                &detuned_pair(),
                AxisRange::new(-1.0, 2.0),
                AxisRange::new(1.0, 2.0),
                &settings(2, 1.0, 0.1)
            ),
            Err(SyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn failed_cells_are_reported_by_position() {
        let map = ArnoldTongueMap::new(
            Axis::Ratios(vec![FrequencyRatio::new(1, 1), FrequencyRatio::new(1, 2)]),
            Axis::Values {
                name: "coupling".to_string(),
                values: vec![0.0, 0.5, 1.0],
            },
            vec![0.2, 0.3, 0.4, 0.5, f64::NAN, 0.7],
        )
        .unwrap();

        assert_eq!(map.failed_cells(), vec![(1, 1)]);
        assert_eq!(map.get(1, 2), Some(0.7));
        assert_eq!(map.get(2, 0), None);
        assert_eq!(FrequencyRatio::new(3, 2).to_string(), "3:2");
    }
}

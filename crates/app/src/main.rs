use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oscillator_sync_core::{
    arnold_tongue_scan, coupling_ratio_scan, order_parameter, simulate_kuramoto,
    simulate_stochastic_resonance, snr_db, AxisRange, EngineConfig, FrequencyRatio,
    OscillatorSystem, SyncError, TimeGrid,
};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> oscillator_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Kuramoto { seed } => run_kuramoto(&config, seed),
        Commands::Tongues {
            ratios,
            min_coupling,
            max_coupling,
        } => run_tongues(&config, &ratios, min_coupling, max_coupling),
        Commands::Periods {
            period_a,
            period_b,
        } => run_periods(&config, &period_a, &period_b),
        Commands::Resonance { seed } => run_resonance(&config, seed),
    }
}

fn load_config(path: Option<&PathBuf>) -> oscillator_sync_core::Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading engine configuration");
            EngineConfig::from_json_str(&std::fs::read_to_string(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn preset_system(config: &EngineConfig) -> oscillator_sync_core::Result<OscillatorSystem> {
    OscillatorSystem::from_presets(&config.rhythms, &config.coupling)
}

fn run_kuramoto(config: &EngineConfig, seed: u64) -> oscillator_sync_core::Result<()> {
    tracing::info!(seed, "simulating phase coupling");

    let system = preset_system(config)?;
    let grid = TimeGrid::from_duration(config.integration.duration, config.integration.dt)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let trajectory = simulate_kuramoto(&system, &grid, None, &mut rng)?;
    let r = order_parameter(&trajectory)?;

    let final_r = r.last().copied().unwrap_or_default();
    let mean_r = r.iter().sum::<f64>() / r.len() as f64;
    tracing::info!(final_r, "final synchronization level");

    emit(&json!({
        "steps": trajectory.len(),
        "final_order_parameter": final_r,
        "mean_order_parameter": mean_r,
        "final_phases": trajectory.last_state(),
    }))
}

fn run_tongues(
    config: &EngineConfig,
    ratios: &[String],
    min_coupling: f64,
    max_coupling: f64,
) -> oscillator_sync_core::Result<()> {
    let ratios = ratios
        .iter()
        .map(|label| parse_ratio(label))
        .collect::<oscillator_sync_core::Result<Vec<_>>>()?;
    tracing::info!(
        ratios = ratios.len(),
        resolution = config.sweep.resolution,
        "scanning coupling strength against frequency ratios"
    );

    let map = coupling_ratio_scan(
        &preset_system(config)?,
        &ratios,
        AxisRange::new(min_coupling, max_coupling),
        &config.sweep,
    )?;
    emit(&map)
}

fn run_periods(
    config: &EngineConfig,
    period_a: &[f64],
    period_b: &[f64],
) -> oscillator_sync_core::Result<()> {
    let range = |bounds: &[f64]| match bounds {
        [start, stop] => Ok(AxisRange::new(*start, *stop)),
        _ => Err(SyncError::invalid("period ranges take exactly two values")),
    };
    tracing::info!(
        resolution = config.sweep.resolution,
        "scanning oscillator periods"
    );

    let map = arnold_tongue_scan(
        &preset_system(config)?,
        range(period_a)?,
        range(period_b)?,
        &config.sweep,
    )?;
    emit(&map)
}

fn run_resonance(config: &EngineConfig, seed: u64) -> oscillator_sync_core::Result<()> {
    let settings = &config.resonance;
    tracing::info!(
        signal_freq = settings.signal_freq,
        noise_level = settings.noise_level,
        "simulating stochastic resonance"
    );

    let trajectory = simulate_stochastic_resonance(
        settings.signal_freq,
        settings.noise_level,
        settings.duration,
        settings.dt,
        settings.signal_amplitude,
        seed,
    )?;
    let snr = snr_db(&trajectory, settings.signal_freq)?;

    emit(&json!({
        "steps": trajectory.len(),
        "snr_db": snr,
    }))
}

fn parse_ratio(label: &str) -> oscillator_sync_core::Result<FrequencyRatio> {
    let invalid = || SyncError::invalid(format!("expected a ratio like 2:1, got {label:?}"));
    let (p, q) = label.split_once(':').ok_or_else(invalid)?;
    let p = p.trim().parse().map_err(|_| invalid())?;
    let q = q.trim().parse().map_err(|_| invalid())?;
    Ok(FrequencyRatio::new(p, q))
}

fn emit<T: serde::Serialize + ?Sized>(value: &T) -> oscillator_sync_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Coupled oscillator synchronization engine", long_about = None)]
struct Cli {
    /// Optional JSON file overriding the default engine configuration.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Integrate the thermal/tidal/solar phase model and report synchronization.
    Kuramoto {
        /// Seed for the random initial phases.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Map ratio locking against coupling strength.
    Tongues {
        /// Frequency ratios to test, e.g. `1:1 2:1 3:2`.
        #[arg(
            long,
            num_args = 1..,
            default_values_t = ["1:1".to_string(), "2:1".to_string(), "3:2".to_string()]
        )]
        ratios: Vec<String>,
        #[arg(long, default_value_t = 0.0)]
        min_coupling: f64,
        #[arg(long, default_value_t = 1.0)]
        max_coupling: f64,
    },
    /// Map phase locking against the periods of the first two oscillators.
    Periods {
        /// Start and stop of the first period axis.
        #[arg(long, num_args = 2, default_values_t = [0.25, 2.0])]
        period_a: Vec<f64>,
        /// Start and stop of the second period axis.
        #[arg(long, num_args = 2, default_values_t = [10.0, 15.0])]
        period_b: Vec<f64>,
    },
    /// Simulate the driven double well and report its SNR.
    Resonance {
        /// Seed for the initial position and noise.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

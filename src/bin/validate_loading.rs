use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rolling_stats::Stats;
use serde::Serialize;

use metrocorr::config::{SolverConfig, Topology, TransducerKind};
use metrocorr::loading;
use metrocorr::simulation::{
    SyntheticTransducer, compare, harmonic_frequencies, random_harmonics, summarize,
};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "validate_loading")]
#[command(
    about = "Compare the loading solver against mesh solves of random synthetic transducers",
    long_about = None
)]
struct Args {
    /// Random transducers per case
    #[arg(short = 'n', long, default_value = "20")]
    trials: usize,

    /// RNG seed
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Fundamental frequency in Hz
    #[arg(long, default_value = "50")]
    fundamental: f64,

    /// Harmonics per spectrum
    #[arg(long, default_value = "400")]
    harmonics: usize,

    /// Solver bin limit for the reduced-grid cases
    #[arg(long, default_value = "40")]
    reduced_bins: usize,

    /// Relative tolerance floor for counting a bin as outside
    #[arg(long, default_value = "1e-6")]
    rel_tolerance: f64,

    /// Output format: text, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Serialize)]
struct StatsSummary {
    count: usize,
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
}

impl StatsSummary {
    fn from_stats(stats: &Stats<f64>) -> Option<Self> {
        if stats.count == 0 {
            return None;
        }
        Some(Self {
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min,
            max: stats.max,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct CaseResult {
    kind: String,
    topology: String,
    path: &'static str,
    amp_rel_error: Option<StatsSummary>,
    phase_error: Option<StatsSummary>,
    bins_outside: usize,
    bins_total: usize,
}

fn run_case(
    args: &Args,
    rng: &mut ChaCha8Rng,
    kind: TransducerKind,
    topology: Topology,
    reduced: bool,
) -> anyhow::Result<CaseResult> {
    let freq = harmonic_frequencies(args.fundamental, args.harmonics);
    let config = SolverConfig {
        max_accurate_bins: if reduced { args.reduced_bins } else { freq.len() },
        ..SolverConfig::default()
    };

    let mut amp_stats: Stats<f64> = Stats::new();
    let mut phase_stats: Stats<f64> = Stats::new();
    let mut outside = 0;
    let mut total = 0;
    for trial in 0..args.trials {
        let transducer = SyntheticTransducer::random(kind, topology, rng)?;
        let tables = transducer.table_set(&freq)?;
        let x = random_harmonics(100.0, freq.len(), rng);
        let (high, low) = transducer.measure(&freq, &x, 1e-6, 1e-6)?;
        let solved = loading::solve(&tables, kind, &config, &high, low.as_ref())?;

        let deviations = compare(&solved, &x);
        let stats = summarize(&deviations, args.rel_tolerance, 2.0);
        log::debug!(
            "{:?} {:?} trial {}: max amp error {:.3e}, max phase error {:.3e}",
            kind,
            topology,
            trial,
            stats.max_amp_rel_error,
            stats.max_phase_error
        );
        for d in &deviations {
            amp_stats.update((d.amp_error / d.amp).abs());
            phase_stats.update(d.phase_error.abs());
        }
        outside += stats.outside;
        total += deviations.len();
    }

    Ok(CaseResult {
        kind: format!("{:?}", kind),
        topology: format!("{:?}", topology),
        path: if reduced { "reduced" } else { "exact" },
        amp_rel_error: StatsSummary::from_stats(&amp_stats),
        phase_error: StatsSummary::from_stats(&phase_stats),
        bins_outside: outside,
        bins_total: total,
    })
}

fn print_text(results: &[CaseResult]) {
    println!(
        "{:<6} {:<13} {:<8} {:>12} {:>12} {:>12} {:>12} {:>10}",
        "kind", "topology", "path", "amp mean", "amp max", "phase mean", "phase max", "outside"
    );
    for r in results {
        let (amp_mean, amp_max) = r.amp_rel_error.as_ref().map_or((0.0, 0.0), |s| (s.mean, s.max));
        let (ph_mean, ph_max) = r.phase_error.as_ref().map_or((0.0, 0.0), |s| (s.mean, s.max));
        println!(
            "{:<6} {:<13} {:<8} {:>12.3e} {:>12.3e} {:>12.3e} {:>12.3e} {:>5}/{:<5}",
            r.kind,
            r.topology,
            r.path,
            amp_mean,
            amp_max,
            ph_mean,
            ph_max,
            r.bins_outside,
            r.bins_total
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut results = Vec::new();
    for kind in [TransducerKind::Rvd, TransducerKind::Shunt] {
        for topology in [Topology::SingleEnded, Topology::Differential] {
            for reduced in [false, true] {
                results.push(run_case(&args, &mut rng, kind, topology, reduced)?);
            }
        }
    }

    match args.format {
        OutputFormat::Text => print_text(&results),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }
    Ok(())
}

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};

use metrocorr::config::{ChannelConfig, InterpMode};
use metrocorr::loading::{self, PhasorSpectrum};
use metrocorr::output::{BinOutput, OutputFormat, create_formatter};
use metrocorr::power::PowerQuantities;
use metrocorr::table::TableSet;

#[derive(Parser, Debug)]
#[command(name = "metrocorr")]
#[command(about = "Correct digitized spectra for transducer loading", long_about = None)]
struct Args {
    /// Channel file (TOML) of the voltage or only channel
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Measured spectrum (CSV: f,amp,phase,u_amp,u_phase)
    #[arg(short = 's', long)]
    spectrum: PathBuf,

    /// Low-side spectrum; selects the differential topology
    #[arg(long)]
    low_spectrum: Option<PathBuf>,

    /// Channel file of the current channel
    #[arg(long, requires = "current_spectrum")]
    current_config: Option<PathBuf>,

    /// Measured spectrum of the current channel
    #[arg(long, requires = "current_config")]
    current_spectrum: Option<PathBuf>,

    /// Low-side spectrum of the current channel
    #[arg(long, requires = "current_spectrum")]
    current_low_spectrum: Option<PathBuf>,

    /// Override the interpolation mode of every channel
    #[arg(short = 'i', long, value_enum)]
    interp: Option<InterpMode>,

    /// Override the bin count above which the reduced grid is used
    #[arg(long)]
    max_bins: Option<usize>,

    /// Output format: text, csv, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Load a channel and correct its spectrum
fn correct_channel(
    args: &Args,
    config_path: &Path,
    spectrum_path: &Path,
    low_path: Option<&Path>,
) -> anyhow::Result<PhasorSpectrum> {
    let mut channel = ChannelConfig::from_file(config_path)
        .with_context(|| format!("reading channel file {}", config_path.display()))?;
    if let Some(mode) = args.interp {
        channel.solver.interp_mode = mode;
    }
    if let Some(max_bins) = args.max_bins {
        channel.solver.max_accurate_bins = max_bins;
    }

    let tables = TableSet::load_from_paths(&channel.tables, channel.solver.interp_mode)
        .with_context(|| format!("loading tables of {}", config_path.display()))?;
    let input = PhasorSpectrum::from_csv_path(spectrum_path)
        .with_context(|| format!("reading spectrum {}", spectrum_path.display()))?;
    let low = low_path
        .map(|p| {
            PhasorSpectrum::from_csv_path(p)
                .with_context(|| format!("reading spectrum {}", p.display()))
        })
        .transpose()?;

    let corrected = loading::solve(&tables, channel.kind, &channel.solver, &input, low.as_ref())
        .with_context(|| format!("correcting {}", spectrum_path.display()))?;
    Ok(corrected)
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

    let formatter = create_formatter(args.format, args.verbose > 0);
    if let Some(header) = formatter.header() {
        println!("{}", header);
    }

    let voltage = correct_channel(
        &args,
        &args.config,
        &args.spectrum,
        args.low_spectrum.as_deref(),
    )?;
    for bin in BinOutput::from_spectrum("u", &voltage) {
        println!("{}", formatter.format(&bin));
    }

    if let (Some(config), Some(spectrum)) = (&args.current_config, &args.current_spectrum) {
        let current =
            correct_channel(&args, config, spectrum, args.current_low_spectrum.as_deref())?;
        for bin in BinOutput::from_spectrum("i", &current) {
            println!("{}", formatter.format(&bin));
        }
        let power = PowerQuantities::from_spectra(&voltage, &current)
            .context("aggregating power quantities")?;
        println!("{}", formatter.format_power(&power));
    }

    Ok(())
}

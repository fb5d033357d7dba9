//! Configuration for the correction pipeline.
//!
//! ## Channel files
//!
//! The `metrocorr` binary reads one TOML file per virtual channel:
//!
//! ```toml
//! kind = "rvd"
//!
//! [solver]
//! max_accurate_bins = 5000
//! interp_mode = "pchip"
//!
//! [tables]
//! tr_gain = "divider/gain.csv"
//! tr_phi = "divider/phase.csv"
//! tr_Zlo = "divider/zlo.csv"
//! Zcb = "cable/z.csv"
//! Ycb = "cable/y.csv"
//! adc_Yin = "digitizer/yin.csv"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::DEFAULT_MAX_ACCURATE_BINS;
use crate::error::{CorrError, Result};

/// Interpolation kernel used along table axes
///
/// # Parsing formats
/// - `nearest`
/// - `linear`
/// - `pchip` - monotone piecewise cubic (Fritsch-Carlson)
/// - `spline` - natural cubic spline
///
/// # Example
/// ```
/// use metrocorr::config::InterpMode;
///
/// let mode: InterpMode = "PCHIP".parse().unwrap();
/// assert_eq!(mode, InterpMode::Pchip);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpMode {
    Nearest,
    #[default]
    Linear,
    Pchip,
    Spline,
}

impl fmt::Display for InterpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpMode::Nearest => "nearest",
            InterpMode::Linear => "linear",
            InterpMode::Pchip => "pchip",
            InterpMode::Spline => "spline",
        };
        f.write_str(name)
    }
}

impl FromStr for InterpMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            "pchip" | "cubic" => Ok(Self::Pchip),
            "spline" => Ok(Self::Spline),
            other => Err(format!("invalid interpolation mode: {}", other)),
        }
    }
}

/// Transducer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransducerKind {
    /// Resistive voltage divider: input quantity is a voltage
    Rvd,
    /// Current shunt: input quantity is a current
    Shunt,
}

/// How the transducer output is connected to the digitizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Low side of the transducer is tied to digitizer ground
    SingleEnded,
    /// High and low sides are each digitized against ground
    Differential,
}

/// Loading solver configuration
///
/// # Example
/// ```
/// use metrocorr::config::SolverConfig;
///
/// let mut config = SolverConfig::default();
/// config.max_accurate_bins = 200;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Bin count above which the reduced-grid approximation is used
    pub max_accurate_bins: usize,
    /// Interpolation mode for table lookups and transfer re-interpolation
    pub interp_mode: InterpMode,
    /// Clip merged table axes to the range common to all tables
    pub reduce_axes: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_accurate_bins: DEFAULT_MAX_ACCURATE_BINS,
            interp_mode: InterpMode::Linear,
            reduce_axes: true,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_accurate_bins < 2 {
            return Err(CorrError::Config(format!(
                "max_accurate_bins must be at least 2, got {}",
                self.max_accurate_bins
            )));
        }
        Ok(())
    }
}

/// One virtual channel as described by a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub kind: TransducerKind,
    #[serde(default)]
    pub solver: SolverConfig,
    /// Canonical table name to CSV path; relative paths resolve against the
    /// directory of the channel file
    #[serde(default)]
    pub tables: BTreeMap<String, PathBuf>,
}

impl ChannelConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ChannelConfig =
            toml::from_str(content).map_err(|e| CorrError::Config(e.to_string()))?;
        config.solver.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(dir) = path.parent() {
            for table_path in config.tables.values_mut() {
                if table_path.is_relative() {
                    *table_path = dir.join(&*table_path);
                }
            }
        }
        Ok(config)
    }
}

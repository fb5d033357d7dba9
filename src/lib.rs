pub mod config;
pub mod constants;
pub mod error;
pub mod impedance;
pub mod loading;
pub mod output;
pub mod power;
pub mod table;
pub mod uncertainty;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use config::{ChannelConfig, InterpMode, SolverConfig, Topology, TransducerKind};
pub use error::{CorrError, Result};
pub use loading::{PhasorSpectrum, solve};
pub use power::PowerQuantities;
pub use table::{CorrectionTable, TableSet};
pub use uncertainty::{Bundle, UncertainValue};

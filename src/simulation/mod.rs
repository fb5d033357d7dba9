//! Synthetic transducers with known components, for validating the loading
//! solver against the brute-force mesh.

mod measure;
mod signal;
mod transducer;

pub use measure::{BinDeviation, ErrorStats, compare, phase_error, summarize};
pub use signal::{harmonic_frequencies, random_harmonics};
pub use transducer::{
    DEFAULT_COMPONENT_UNCERTAINTY, ParallelCd, ParallelCg, SeriesRl, SyntheticTransducer,
};

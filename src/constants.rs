//! Numeric constants for interpolation and solver stability
//!
//! These constants define thresholds and epsilon values used throughout
//! the correction pipeline to keep boundary evaluations and divisions finite.

/// Relative distance (fraction of the axis span) within which a query snaps
/// to a stored axis sample instead of being interpolated.
pub const AXIS_SNAP_EPSILON: f64 = 1e-12;

/// Relative offset (fraction of the axis span) used to probe either side of a
/// query point whose direct interpolation produced NaN.
pub const NAN_NUDGE_EPSILON: f64 = 1e-9;

/// Smallest amplitude used as a divisor when forming transfer ratios.
/// Bins below this are physically negligible; they are solved directly and
/// never anchor an interpolated transfer.
pub const AMPLITUDE_FLOOR: f64 = f64::EPSILON;

/// Default number of frequency bins solved exactly before the solver switches
/// to the reduced-grid approximation.
pub const DEFAULT_MAX_ACCURATE_BINS: usize = 5000;

/// Name of the secondary (signal level) axis of the transducer transfer tables.
pub const RMS_AXIS: &str = "rms";

/// Name of the primary (frequency) axis of every loading table.
pub const FREQ_AXIS: &str = "f";

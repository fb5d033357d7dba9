//! Transducer loading correction.
//!
//! Recovers the quantity at the transducer input (voltage for a divider,
//! current for a shunt) from the voltage(s) seen by the digitizer, removing
//! the loading by the transducer output terminals, the connecting cable and
//! the digitizer input. Every bin carries its own uncertainty budget through
//! the bundle propagator.
//!
//! Spectra with more bins than [`SolverConfig::max_accurate_bins`] are solved
//! on a reduced grid and the resulting transfer interpolated to all bins.

mod differential;
mod io;
pub mod mesh;
mod network;
mod params;
mod reduced;
mod single_ended;

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::config::{InterpMode, SolverConfig, Topology, TransducerKind};
use crate::error::{CorrError, Result};
use crate::table::{AxisKind, ExpandedTables, TableSet, expand};
use crate::uncertainty::{Bundle, UncertainValue};

pub use network::{Abcd, Unloaded, unload};
pub use params::{Slot, required_tables, slot_layout};

use params::Components;

/// Spectrum of phasors with amplitude and phase uncertainties
///
/// All vectors are index-aligned with `freq`; phases are radians.
#[derive(Debug, Clone, PartialEq)]
pub struct PhasorSpectrum {
    pub freq: Vec<f64>,
    pub amp: Vec<f64>,
    pub phase: Vec<f64>,
    pub u_amp: Vec<f64>,
    pub u_phase: Vec<f64>,
}

impl PhasorSpectrum {
    pub fn new(
        freq: Vec<f64>,
        amp: Vec<f64>,
        phase: Vec<f64>,
        u_amp: Vec<f64>,
        u_phase: Vec<f64>,
    ) -> Result<Self> {
        let spectrum = Self {
            freq,
            amp,
            phase,
            u_amp,
            u_phase,
        };
        spectrum.check_lengths()?;
        Ok(spectrum)
    }

    /// Spectrum without uncertainty
    pub fn exact(freq: Vec<f64>, amp: Vec<f64>, phase: Vec<f64>) -> Result<Self> {
        let n = freq.len();
        Self::new(freq, amp, phase, vec![0.0; n], vec![0.0; n])
    }

    /// Spectrum from complex phasors and relative amplitude / absolute phase
    /// uncertainties
    pub fn from_phasors(
        freq: Vec<f64>,
        phasors: &[Complex64],
        u_amp_rel: f64,
        u_phase: f64,
    ) -> Result<Self> {
        let amp: Vec<f64> = phasors.iter().map(|p| p.norm()).collect();
        let u_amp = amp.iter().map(|a| a * u_amp_rel).collect();
        let n = phasors.len();
        Self::new(
            freq,
            amp,
            phasors.iter().map(|p| p.arg()).collect(),
            u_amp,
            vec![u_phase; n],
        )
    }

    pub fn len(&self) -> usize {
        self.freq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }

    pub fn phasor(&self, i: usize) -> Complex64 {
        Complex64::from_polar(self.amp[i], self.phase[i])
    }

    pub fn amp_value(&self, i: usize) -> UncertainValue {
        UncertainValue::real(self.amp[i], self.u_amp[i])
    }

    pub fn phase_value(&self, i: usize) -> UncertainValue {
        UncertainValue::real(self.phase[i], self.u_phase[i])
    }

    /// RMS value of the signal the spectrum describes
    pub fn rms(&self) -> f64 {
        rms_of(&self.freq, self.amp.iter().copied())
    }

    fn check_lengths(&self) -> Result<()> {
        let n = self.freq.len();
        if [&self.amp, &self.phase, &self.u_amp, &self.u_phase]
            .iter()
            .any(|v| v.len() != n)
        {
            return Err(CorrError::Config(format!(
                "spectrum vectors differ in length (f {}, amp {}, phase {}, u_amp {}, u_phase {})",
                n,
                self.amp.len(),
                self.phase.len(),
                self.u_amp.len(),
                self.u_phase.len()
            )));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.check_lengths()?;
        if self.is_empty() {
            return Err(CorrError::Config("spectrum has no bins".into()));
        }
        if self.freq.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(CorrError::Config(
                "frequencies must be finite and non-negative".into(),
            ));
        }
        if self.freq.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CorrError::Config(
                "frequencies must be strictly increasing".into(),
            ));
        }
        Ok(())
    }
}

/// `sqrt(Σ a²/2)` with the DC bin counted at full weight
fn rms_of(freq: &[f64], amp: impl Iterator<Item = f64>) -> f64 {
    freq.iter()
        .zip(amp)
        .map(|(&f, a)| if f == 0.0 { a * a } else { a * a / 2.0 })
        .sum::<f64>()
        .sqrt()
}

/// Map a phase into `[-π, π)`
pub(crate) fn wrap_phase(phase: f64) -> f64 {
    (phase + PI).rem_euclid(2.0 * PI) - PI
}

/// Amplitude and phase of a solved bin
#[derive(Debug, Clone, Copy)]
pub(crate) struct BinSolution {
    pub amp: f64,
    pub phase: f64,
    pub u_amp: f64,
    pub u_phase: f64,
}

impl BinSolution {
    pub fn from_bundle(x: &Bundle) -> Self {
        let amp = x.norm().collapse();
        let phase = x.arg().collapse();
        Self {
            amp: amp.value.re,
            phase: phase.value.re,
            u_amp: amp.uncertainty.re,
            u_phase: phase.uncertainty.re,
        }
    }
}

/// Everything fixed for one solve call
pub(crate) struct SolveContext<'a> {
    pub kind: TransducerKind,
    pub topology: Topology,
    pub tables: &'a ExpandedTables,
    pub mode: InterpMode,
    /// Signal level at which level-dependent tables are evaluated
    pub rms: Option<f64>,
}

impl SolveContext<'_> {
    pub fn components(&self, freq: &[f64]) -> Result<Components> {
        Components::evaluate(self.tables, self.topology, freq, self.rms, self.mode)
    }
}

/// Solve bin `i` of the measurement with the components of entry `j`
pub(crate) fn solve_bin(
    kind: TransducerKind,
    components: &Components,
    j: usize,
    input: &PhasorSpectrum,
    low: Option<&PhasorSpectrum>,
    i: usize,
) -> Result<Bundle> {
    let topology = components.topology;
    let circuit = components.seed(j)?;
    let v_hi = params::seed_signal(topology, false, input.amp_value(i), input.phase_value(i))?;
    match (low, &circuit.low) {
        (None, None) => Ok(single_ended::solve_bin(kind, &circuit, &v_hi)),
        (Some(low), Some(low_side)) => {
            let v_lo = params::seed_signal(topology, true, low.amp_value(i), low.phase_value(i))?;
            Ok(differential::solve_bin(kind, &circuit, low_side, &v_hi, &v_lo))
        }
        _ => Err(CorrError::Consistency(
            "low-side spectrum and low-side components must come together".into(),
        )),
    }
}

/// Correct a measured spectrum for transducer loading
///
/// `input` is the digitizer voltage (the high side in differential mode);
/// supplying `low` selects the differential topology. Absent tables in
/// `tables` are replaced by ideal components. Returns the input quantity of
/// the transducer on the same frequency vector.
pub fn solve(
    tables: &TableSet,
    kind: TransducerKind,
    config: &SolverConfig,
    input: &PhasorSpectrum,
    low: Option<&PhasorSpectrum>,
) -> Result<PhasorSpectrum> {
    config.validate()?;
    input.validate()?;
    let topology = match low {
        None => Topology::SingleEnded,
        Some(low) => {
            low.validate()?;
            if low.freq != input.freq {
                return Err(CorrError::Config(
                    "high- and low-side spectra must share one frequency vector".into(),
                ));
            }
            Topology::Differential
        }
    };

    let used = required_tables(topology)
        .iter()
        .map(|name| tables.get_or_default(name))
        .collect::<Result<Vec<_>>>()?;
    let expanded = expand(&used, config.reduce_axes, config.interp_mode)?;
    expanded.check_primary(&input.freq)?;

    // without reduce_axes the merged axis is a union; only the common range
    // is inside every level-dependent table
    let rms_range = expanded
        .secondary
        .as_ref()
        .and_then(|_| expanded.common_range(AxisKind::Secondary));
    let nominal_rms = match rms_range {
        Some(range) => Some(nominal_rms(&expanded, config.interp_mode, input, low, range)?),
        None => None,
    };

    let ctx = SolveContext {
        kind,
        topology,
        tables: &expanded,
        mode: config.interp_mode,
        rms: nominal_rms,
    };

    let n = input.len();
    let mut output = if n <= config.max_accurate_bins {
        log::info!("Solving {} bins exactly ({:?})", n, topology);
        solve_exact(&ctx, input, low)?
    } else {
        log::info!(
            "Solving {} bins on a reduced grid of {} ({:?})",
            n,
            config.max_accurate_bins,
            topology
        );
        match low {
            None => reduced::single_ended(&ctx, input, config.max_accurate_bins)?,
            Some(low) => reduced::differential(&ctx, input, low, config.max_accurate_bins)?,
        }
    };

    if let (Some(nominal), Some(range)) = (nominal_rms, rms_range) {
        apply_level_correction(&ctx, &mut output, nominal, range)?;
    }
    Ok(output)
}

fn solve_exact(
    ctx: &SolveContext<'_>,
    input: &PhasorSpectrum,
    low: Option<&PhasorSpectrum>,
) -> Result<PhasorSpectrum> {
    let components = ctx.components(&input.freq)?;
    let solutions = (0..input.len())
        .map(|i| {
            solve_bin(ctx.kind, &components, i, input, low, i).map(|x| BinSolution::from_bundle(&x))
        })
        .collect::<Result<Vec<_>>>()?;
    spectrum_from_solutions(input.freq.clone(), &solutions)
}

pub(crate) fn spectrum_from_solutions(
    freq: Vec<f64>,
    solutions: &[BinSolution],
) -> Result<PhasorSpectrum> {
    PhasorSpectrum::new(
        freq,
        solutions.iter().map(|s| s.amp).collect(),
        solutions.iter().map(|s| s.phase).collect(),
        solutions.iter().map(|s| s.u_amp).collect(),
        solutions.iter().map(|s| s.u_phase).collect(),
    )
}

fn clamp_rms(rms: f64, (lo, hi): (f64, f64), what: &str) -> f64 {
    if rms < lo || rms > hi {
        log::warn!(
            "{} RMS {:.6e} outside the tabulated range {:.6e}..{:.6e}, clamping",
            what,
            rms,
            lo,
            hi
        );
    }
    rms.clamp(lo, hi)
}

/// Signal level assumed while solving: the measured spectrum scaled by the
/// transducer gain at the lowest tabulated level
fn nominal_rms(
    tables: &ExpandedTables,
    mode: InterpMode,
    input: &PhasorSpectrum,
    low: Option<&PhasorSpectrum>,
    range: (f64, f64),
) -> Result<f64> {
    let transfer = params::transfer_at(tables, &input.freq, Some(range.0), mode)?;
    let measured = (0..input.len()).map(|i| match low {
        Some(low) => (input.phasor(i) - low.phasor(i)).norm(),
        None => input.amp[i],
    });
    let rms = rms_of(
        &input.freq,
        measured.zip(&transfer).map(|(a, t)| a * t.value.norm()),
    );
    Ok(clamp_rms(rms, range, "Estimated"))
}

/// Re-evaluate the transducer transfer at the level of the corrected signal
/// and scale the result by `tr(actual)/tr(nominal)`
///
/// The solve already carries the table uncertainty at the nominal level;
/// whatever the tables add at the actual level is combined by RSS.
fn apply_level_correction(
    ctx: &SolveContext<'_>,
    output: &mut PhasorSpectrum,
    nominal: f64,
    range: (f64, f64),
) -> Result<()> {
    let actual = clamp_rms(output.rms(), range, "Corrected");
    let tr_nominal = params::transfer_at(ctx.tables, &output.freq, Some(nominal), ctx.mode)?;
    let tr_actual = params::transfer_at(ctx.tables, &output.freq, Some(actual), ctx.mode)?;
    log::debug!("Level correction from RMS {:.6e} to {:.6e}", nominal, actual);

    for (i, (a, n)) in tr_actual.iter().zip(&tr_nominal).enumerate() {
        let ratio = a.value / n.value;
        if !ratio.is_finite() {
            log::warn!(
                "Bin {} ({} Hz): transfer ratio between RMS {:.6e} and {:.6e} is not finite, \
                 level correction skipped",
                i,
                output.freq[i],
                nominal,
                actual
            );
            continue;
        }
        let excess = |at_actual: f64, at_nominal: f64| {
            (at_actual * at_actual - at_nominal * at_nominal).max(0.0).sqrt()
        };
        output.amp[i] *= ratio.norm();
        output.u_amp[i] = (output.u_amp[i] * ratio.norm())
            .hypot(output.amp[i] * excess(a.u_gain_rel, n.u_gain_rel));
        output.phase[i] = wrap_phase(output.phase[i] + ratio.arg());
        output.u_phase[i] = output.u_phase[i].hypot(excess(a.u_phi, n.u_phi));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Axis, CorrectionTable, Grid, Quantity};

    fn spectrum(freq: &[f64], amp: f64) -> PhasorSpectrum {
        let n = freq.len();
        let u_amp = vec![amp * 1e-5; n];
        PhasorSpectrum::new(freq.to_vec(), vec![amp; n], vec![0.0; n], u_amp, vec![1e-5; n])
            .unwrap()
    }

    fn solve_default(tables: &TableSet, input: &PhasorSpectrum) -> Result<PhasorSpectrum> {
        solve(tables, TransducerKind::Rvd, &SolverConfig::default(), input, None)
    }

    /// Table over f = 0..1000 Hz and the given RMS levels
    fn level_table(name: &str, quantity: Quantity, rms: Vec<f64>) -> CorrectionTable {
        CorrectionTable::new(
            name,
            Some(Axis::new("f", vec![0.0, 1000.0]).unwrap()),
            Some(Axis::new("rms", rms).unwrap()),
            vec![quantity],
        )
        .unwrap()
    }

    #[test]
    fn test_ideal_components_pass_signal_through() {
        let input = spectrum(&[50.0, 100.0, 150.0], 2.0);
        let out = solve_default(&TableSet::new(), &input).unwrap();
        for i in 0..3 {
            assert!((out.amp[i] - 2.0).abs() < 1e-12);
            assert!(out.phase[i].abs() < 1e-12);
            assert!((out.u_amp[i] - 2e-5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_bad_frequency_vector() {
        let mut input = spectrum(&[50.0, 100.0, 150.0], 1.0);
        input.freq[2] = 100.0;
        let config = SolverConfig::default();
        let err =
            solve(&TableSet::new(), TransducerKind::Shunt, &config, &input, None).unwrap_err();
        assert!(matches!(err, CorrError::Config(_)));
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let two = || vec![0.0, 0.0];
        assert!(matches!(
            PhasorSpectrum::new(vec![1.0, 2.0], vec![1.0], two(), two(), two()),
            Err(CorrError::Config(_))
        ));
    }

    #[test]
    fn test_frequency_outside_tables_is_range_error() {
        let mut tables = TableSet::new();
        let gain = CorrectionTable::new(
            "g",
            Some(Axis::new("f", vec![0.0, 1000.0]).unwrap()),
            None,
            vec![Quantity::exact("gain", Grid::new(2, 1, vec![10.0, 10.0]).unwrap())],
        )
        .unwrap();
        tables.insert("tr_gain", gain);
        let input = spectrum(&[500.0, 2000.0], 1.0);
        match solve_default(&tables, &input).unwrap_err() {
            CorrError::Range { table, .. } => assert_eq!(table, "tr_gain"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_level_dependent_gain() {
        // gain of 10 at 1 V rms rising to 11 at 100 V rms; no loading
        let mut tables = TableSet::new();
        let gain = Grid::new(2, 2, vec![10.0, 11.0, 10.0, 11.0]).unwrap();
        let gain = level_table("g", Quantity::exact("gain", gain), vec![1.0, 100.0]);
        tables.insert("tr_gain", gain);

        // 1 V peak at the digitizer: nominal level 10/sqrt(2) V rms
        let input = spectrum(&[50.0], 1.0);
        let out = solve_default(&tables, &input).unwrap();

        let nominal = 10.0 / 2f64.sqrt();
        let g_nominal = 10.0 + (nominal - 1.0) / 99.0;
        let first_pass = g_nominal;
        let actual = first_pass / 2f64.sqrt();
        let g_actual = 10.0 + (actual - 1.0) / 99.0;
        let expected = g_nominal * g_actual / g_nominal;
        assert!((out.amp[0] - expected).abs() < 1e-9, "{} vs {}", out.amp[0], expected);
    }

    #[test]
    fn test_level_range_is_common_to_all_level_tables() {
        // tr_gain covers 1..10 V rms, tr_phi 1..100 V rms
        let mut tables = TableSet::new();
        let gain = Quantity::exact("gain", Grid::filled(2, 2, 10.0));
        tables.insert("tr_gain", level_table("g", gain, vec![1.0, 10.0]));
        let phi = Quantity::exact("phi", Grid::filled(2, 2, 0.0));
        tables.insert("tr_phi", level_table("p", phi, vec![1.0, 100.0]));

        let input = spectrum(&[50.0], 7.0);
        for reduce_axes in [true, false] {
            let config = SolverConfig {
                reduce_axes,
                ..SolverConfig::default()
            };
            let out = solve(&tables, TransducerKind::Rvd, &config, &input, None).unwrap();
            assert!(
                (out.amp[0] - 70.0).abs() < 1e-9,
                "reduce_axes {}: {}",
                reduce_axes,
                out.amp[0]
            );
        }
    }

    #[test]
    fn test_level_correction_takes_table_uncertainty_at_actual_level() {
        // gain 10 -> 20 and its uncertainty 0 -> 0.2 over 1..100 V rms
        let g = |l: f64| 10.0 + 10.0 * (l - 1.0) / 99.0;
        let u = |l: f64| 0.2 * (l - 1.0) / 99.0;
        let mut tables = TableSet::new();
        let gain = Quantity::new(
            "gain",
            Grid::new(2, 2, vec![g(1.0), g(100.0), g(1.0), g(100.0)]).unwrap(),
            Grid::new(2, 2, vec![u(1.0), u(100.0), u(1.0), u(100.0)]).unwrap(),
        );
        tables.insert("tr_gain", level_table("g", gain, vec![1.0, 100.0]));

        let input = PhasorSpectrum::exact(vec![50.0], vec![7.0], vec![0.0]).unwrap();
        let out = solve_default(&tables, &input).unwrap();

        let nominal = 7.0 * g(1.0) / 2f64.sqrt();
        let actual = 7.0 * g(nominal) / 2f64.sqrt();
        assert!((actual - nominal).abs() > 1.0);
        assert!((out.amp[0] - 7.0 * g(actual)).abs() < 1e-9);
        let expected_u = 7.0 * u(actual);
        assert!(
            (out.u_amp[0] - expected_u).abs() < 1e-9 * expected_u,
            "{} vs {}",
            out.u_amp[0],
            expected_u
        );
    }

    #[test]
    fn test_wrap_phase() {
        assert!((wrap_phase(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_phase(-0.25) + 0.25).abs() < 1e-15);
    }
}

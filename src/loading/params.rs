//! Per-bin circuit component values and their uncertainty slots.

use num_complex::Complex64;

use crate::config::{InterpMode, Topology};
use crate::error::{CorrError, Result};
use crate::impedance::{y_parallel_cd, y_parallel_cg, z_mutual, z_parallel_cr, z_series_rl};
use crate::table::{CorrectionTable, Extrapolation, ExpandedTables};
use crate::uncertainty::{Bundle, UncertainValue};

/// Independent uncertainty contributors of one bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Amp,
    Phase,
    LowAmp,
    LowPhase,
    Gain,
    Phi,
    Zlo,
    Zca,
    Yca,
    Zcal,
    Zcam,
    Zcb,
    Ycb,
    Yin,
    LoYin,
}

const SINGLE_ENDED_SLOTS: [Slot; 10] = [
    Slot::Amp,
    Slot::Phase,
    Slot::Gain,
    Slot::Phi,
    Slot::Zlo,
    Slot::Zca,
    Slot::Yca,
    Slot::Zcb,
    Slot::Ycb,
    Slot::Yin,
];

const DIFFERENTIAL_SLOTS: [Slot; 15] = [
    Slot::Amp,
    Slot::Phase,
    Slot::LowAmp,
    Slot::LowPhase,
    Slot::Gain,
    Slot::Phi,
    Slot::Zlo,
    Slot::Zca,
    Slot::Yca,
    Slot::Zcal,
    Slot::Zcam,
    Slot::Zcb,
    Slot::Ycb,
    Slot::Yin,
    Slot::LoYin,
];

/// Bundle slot order for a topology
pub fn slot_layout(topology: Topology) -> &'static [Slot] {
    match topology {
        Topology::SingleEnded => &SINGLE_ENDED_SLOTS,
        Topology::Differential => &DIFFERENTIAL_SLOTS,
    }
}

fn slot_index(topology: Topology, slot: Slot) -> Result<usize> {
    slot_layout(topology)
        .iter()
        .position(|&s| s == slot)
        .ok_or_else(|| {
            CorrError::Consistency(format!("{:?} has no slot in {:?} mode", slot, topology))
        })
}

/// Tables the solver reads for a topology
pub fn required_tables(topology: Topology) -> &'static [&'static str] {
    match topology {
        Topology::SingleEnded => &[
            "tr_gain", "tr_phi", "tr_Zlo", "tr_Zca", "tr_Yca", "Zcb", "Ycb", "adc_Yin",
        ],
        Topology::Differential => &[
            "tr_gain",
            "tr_phi",
            "tr_Zlo",
            "tr_Zca",
            "tr_Yca",
            "tr_Zcal",
            "tr_Zcam",
            "Zcb",
            "Ycb",
            "adc_Yin",
            "lo_adc_Yin",
        ],
    }
}

/// Low-side terminal and digitizer components (differential only)
#[derive(Debug, Clone)]
pub struct LowSideComponents {
    pub zcal: Vec<UncertainValue>,
    pub zcam: Vec<UncertainValue>,
    pub lo_yin: Vec<UncertainValue>,
}

/// Component impedances, admittances and transducer transfer per bin
#[derive(Debug, Clone)]
pub struct Components {
    pub topology: Topology,
    pub gain: Vec<UncertainValue>,
    pub phi: Vec<UncertainValue>,
    pub zlo: Vec<UncertainValue>,
    pub zca: Vec<UncertainValue>,
    pub yca: Vec<UncertainValue>,
    pub zcb: Vec<UncertainValue>,
    pub ycb: Vec<UncertainValue>,
    pub yin: Vec<UncertainValue>,
    pub low: Option<LowSideComponents>,
}

/// One bin's components seeded into bundles of a common width
#[derive(Debug, Clone)]
pub struct SeededCircuit {
    pub tr: Bundle,
    pub zlo: Bundle,
    pub zca: Bundle,
    pub yca: Bundle,
    pub zcb: Bundle,
    pub ycb: Bundle,
    pub yin: Bundle,
    pub low: Option<SeededLowSide>,
}

#[derive(Debug, Clone)]
pub struct SeededLowSide {
    pub zcal: Bundle,
    pub zcam: Bundle,
    pub lo_yin: Bundle,
}

impl Components {
    /// Evaluate every table at `freq` (and at `rms` for level-dependent
    /// tables) and convert the component parameters to impedances
    pub fn evaluate(
        tables: &ExpandedTables,
        topology: Topology,
        freq: &[f64],
        rms: Option<f64>,
        mode: InterpMode,
    ) -> Result<Self> {
        let lookup = |name: &str| lookup(tables, name, freq, rms, mode);

        let tr_gain = lookup("tr_gain")?;
        let tr_phi = lookup("tr_phi")?;
        let low = match topology {
            Topology::SingleEnded => None,
            Topology::Differential => Some(LowSideComponents {
                zcal: pair(&lookup("tr_Zcal")?, freq, ["Ls", "Rs"], |f, l, r| {
                    z_series_rl(f, r, l)
                })?,
                zcam: single(&lookup("tr_Zcam")?, freq, "M", z_mutual)?,
                lo_yin: pair(&lookup("lo_adc_Yin")?, freq, ["Cp", "Gp"], y_parallel_cg)?,
            }),
        };

        Ok(Self {
            topology,
            gain: column(&tr_gain, "gain", freq.len())?,
            phi: column(&tr_phi, "phi", freq.len())?,
            zlo: pair(&lookup("tr_Zlo")?, freq, ["Cp", "Rp"], z_parallel_cr)?,
            zca: pair(&lookup("tr_Zca")?, freq, ["Ls", "Rs"], |f, l, r| z_series_rl(f, r, l))?,
            yca: pair(&lookup("tr_Yca")?, freq, ["Cp", "D"], y_parallel_cd)?,
            zcb: pair(&lookup("Zcb")?, freq, ["Ls", "Rs"], |f, l, r| z_series_rl(f, r, l))?,
            ycb: pair(&lookup("Ycb")?, freq, ["Cp", "D"], y_parallel_cd)?,
            yin: pair(&lookup("adc_Yin")?, freq, ["Cp", "Gp"], y_parallel_cg)?,
            low,
        })
    }

    pub fn len(&self) -> usize {
        self.gain.len()
    }

    /// Seed the components of bin `i` into their topology slots
    pub fn seed(&self, i: usize) -> Result<SeededCircuit> {
        let topology = self.topology;
        let inputs = slot_layout(topology).len();
        let seed = |slot: Slot, value: &UncertainValue| -> Result<Bundle> {
            Bundle::seed_value(value, slot_index(topology, slot)?, inputs)
        };

        let gain = seed(Slot::Gain, &self.gain[i])?;
        let phi = seed(Slot::Phi, &self.phi[i])?;
        let low = match &self.low {
            Some(low) => Some(SeededLowSide {
                zcal: seed(Slot::Zcal, &low.zcal[i])?,
                zcam: seed(Slot::Zcam, &low.zcam[i])?,
                lo_yin: seed(Slot::LoYin, &low.lo_yin[i])?,
            }),
            None => None,
        };
        Ok(SeededCircuit {
            tr: Bundle::from_polar(&gain, &phi),
            zlo: seed(Slot::Zlo, &self.zlo[i])?,
            zca: seed(Slot::Zca, &self.zca[i])?,
            yca: seed(Slot::Yca, &self.yca[i])?,
            zcb: seed(Slot::Zcb, &self.zcb[i])?,
            ycb: seed(Slot::Ycb, &self.ycb[i])?,
            yin: seed(Slot::Yin, &self.yin[i])?,
            low,
        })
    }
}

/// Measured phasor `amp·e^{jφ}` seeded into the amplitude and phase slots
pub fn seed_signal(
    topology: Topology,
    low_side: bool,
    amp: UncertainValue,
    phase: UncertainValue,
) -> Result<Bundle> {
    let inputs = slot_layout(topology).len();
    let (amp_slot, phase_slot) = if low_side {
        (Slot::LowAmp, Slot::LowPhase)
    } else {
        (Slot::Amp, Slot::Phase)
    };
    let a = Bundle::seed_value(&amp, slot_index(topology, amp_slot)?, inputs)?;
    let p = Bundle::seed_value(&phase, slot_index(topology, phase_slot)?, inputs)?;
    Ok(Bundle::from_polar(&a, &p))
}

/// Transducer transfer at one bin with the standard uncertainties of its
/// tables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferPoint {
    pub value: Complex64,
    /// Relative uncertainty of the gain
    pub u_gain_rel: f64,
    pub u_phi: f64,
}

/// Transducer transfer at `freq` and signal level `rms`
pub fn transfer_at(
    tables: &ExpandedTables,
    freq: &[f64],
    rms: Option<f64>,
    mode: InterpMode,
) -> Result<Vec<TransferPoint>> {
    let gain = column(&lookup(tables, "tr_gain", freq, rms, mode)?, "gain", freq.len())?;
    let phi = column(&lookup(tables, "tr_phi", freq, rms, mode)?, "phi", freq.len())?;
    Ok(gain
        .iter()
        .zip(&phi)
        .map(|(g, p)| TransferPoint {
            value: Complex64::from_polar(g.value.re, p.value.re),
            u_gain_rel: if g.value.re == 0.0 {
                0.0
            } else {
                (g.uncertainty.re / g.value.re).abs()
            },
            u_phi: p.uncertainty.re,
        })
        .collect())
}

fn lookup(
    tables: &ExpandedTables,
    name: &str,
    freq: &[f64],
    rms: Option<f64>,
    mode: InterpMode,
) -> Result<CorrectionTable> {
    let table = tables
        .get(name)
        .ok_or_else(|| CorrError::Consistency(format!("table '{}' was not expanded", name)))?;
    let rms = rms.map(|r| [r]);
    table.interp(Some(freq), rms.as_ref().map(|r| &r[..]), mode, Extrapolation::Error)
}

fn column(table: &CorrectionTable, quantity: &str, n: usize) -> Result<Vec<UncertainValue>> {
    let q = table.require(quantity)?;
    Ok((0..n)
        .map(|i| UncertainValue::real(q.values.at(i, 0), q.uncertainty.at(i, 0)))
        .collect())
}

fn single<F>(
    table: &CorrectionTable,
    freq: &[f64],
    quantity: &str,
    convert: F,
) -> Result<Vec<UncertainValue>>
where
    F: Fn(f64, UncertainValue) -> UncertainValue,
{
    let a = column(table, quantity, freq.len())?;
    Ok(freq.iter().zip(a).map(|(&f, a)| convert(f, a)).collect())
}

fn pair<F>(
    table: &CorrectionTable,
    freq: &[f64],
    quantities: [&str; 2],
    convert: F,
) -> Result<Vec<UncertainValue>>
where
    F: Fn(f64, UncertainValue, UncertainValue) -> UncertainValue,
{
    let a = column(table, quantities[0], freq.len())?;
    let b = column(table, quantities[1], freq.len())?;
    Ok(freq
        .iter()
        .zip(a.into_iter().zip(b))
        .map(|(&f, (a, b))| convert(f, a, b))
        .collect())
}

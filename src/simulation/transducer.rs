use num_complex::Complex64;
use rand::RngExt;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::config::{Topology, TransducerKind};
use crate::constants::FREQ_AXIS;
use crate::error::{CorrError, Result};
use crate::impedance::{y_parallel_cd, y_parallel_cg, z_mutual, z_parallel_cr, z_series_rl};
use crate::loading::PhasorSpectrum;
use crate::loading::mesh::{
    DifferentialCircuit, SingleEndedCircuit, differential_outputs, open_terminal_voltage,
    single_ended_output,
};
use crate::table::{Axis, CorrectionTable, Grid, Quantity, TableSet};
use crate::uncertainty::UncertainValue;

/// Relative uncertainty attached to every synthetic component
pub const DEFAULT_COMPONENT_UNCERTAINTY: f64 = 1e-4;

/// Spread of the log-normal scatter applied to nominal component values
const SCATTER: f64 = 0.3;

fn exact(value: f64) -> UncertainValue {
    UncertainValue::real(value, 0.0)
}

/// Series resistance and inductance
#[derive(Debug, Clone, Copy)]
pub struct SeriesRl {
    pub r: f64,
    pub l: f64,
}

impl SeriesRl {
    pub fn impedance(&self, f: f64) -> Complex64 {
        z_series_rl(f, exact(self.r), exact(self.l)).value
    }
}

/// Parallel capacitance with loss tangent
#[derive(Debug, Clone, Copy)]
pub struct ParallelCd {
    pub c: f64,
    pub d: f64,
}

impl ParallelCd {
    pub fn admittance(&self, f: f64) -> Complex64 {
        y_parallel_cd(f, exact(self.c), exact(self.d)).value
    }
}

/// Parallel capacitance and conductance
#[derive(Debug, Clone, Copy)]
pub struct ParallelCg {
    pub c: f64,
    pub g: f64,
}

impl ParallelCg {
    pub fn admittance(&self, f: f64) -> Complex64 {
        y_parallel_cg(f, exact(self.c), exact(self.g)).value
    }
}

/// Transducer, cable and digitizer with known frequency-independent
/// component values
///
/// The measured transfer tables are derived from the same circuit, so the
/// solver and the brute-force mesh see one consistent model.
#[derive(Debug, Clone)]
pub struct SyntheticTransducer {
    pub kind: TransducerKind,
    pub topology: Topology,
    /// Intrinsic ratio `k`: the Thevenin voltage is `X / k`
    pub ratio: f64,
    pub zlo_r: f64,
    pub zlo_c: f64,
    pub zca: SeriesRl,
    pub yca: ParallelCd,
    pub zcal: SeriesRl,
    pub zcam: f64,
    pub zcb: SeriesRl,
    pub ycb: ParallelCd,
    pub yin: ParallelCg,
    pub lo_yin: ParallelCg,
    pub rel_uncertainty: f64,
}

impl SyntheticTransducer {
    /// Random component values scattered around typical laboratory values
    pub fn random(kind: TransducerKind, topology: Topology, rng: &mut ChaCha8Rng) -> Result<Self> {
        let coupling = 0.2 + 0.5 * rng.random::<f64>();
        let normal = Normal::new(0.0, SCATTER).map_err(|e| CorrError::Config(e.to_string()))?;
        let mut scatter = |nominal: f64| nominal * normal.sample(rng).exp();

        let (ratio, zlo_r, zlo_c) = match kind {
            TransducerKind::Rvd => (scatter(100.0), scatter(1e3), scatter(100e-12)),
            TransducerKind::Shunt => {
                let r = scatter(0.1);
                (1.0 / r, r, scatter(1e-9))
            }
        };
        let zca = SeriesRl {
            r: scatter(0.05),
            l: scatter(200e-9),
        };
        let zcal = SeriesRl {
            r: scatter(0.05),
            l: scatter(200e-9),
        };

        Ok(Self {
            kind,
            topology,
            ratio,
            zlo_r,
            zlo_c,
            zca,
            yca: ParallelCd {
                c: scatter(50e-12),
                d: scatter(1e-3),
            },
            zcal,
            zcam: coupling * (zca.l * zcal.l).sqrt(),
            zcb: SeriesRl {
                r: scatter(0.1),
                l: scatter(500e-9),
            },
            ycb: ParallelCd {
                c: scatter(100e-12),
                d: scatter(1e-3),
            },
            yin: ParallelCg {
                c: scatter(30e-12),
                g: scatter(1e-6),
            },
            lo_yin: ParallelCg {
                c: scatter(30e-12),
                g: scatter(1e-6),
            },
            rel_uncertainty: DEFAULT_COMPONENT_UNCERTAINTY,
        })
    }

    pub fn zlo(&self, f: f64) -> Complex64 {
        z_parallel_cr(f, exact(self.zlo_c), exact(self.zlo_r)).value
    }

    /// Thevenin output impedance of the transducer
    pub fn output_impedance(&self, f: f64) -> Complex64 {
        match self.kind {
            TransducerKind::Rvd => self.zlo(f) * (self.ratio - 1.0) / self.ratio,
            TransducerKind::Shunt => self.zlo(f),
        }
    }

    /// Series impedance of the terminal section seen by the source loop
    pub fn terminal_series(&self, f: f64) -> Complex64 {
        match self.topology {
            Topology::SingleEnded => self.zca.impedance(f),
            Topology::Differential => {
                self.zca.impedance(f) + self.zcal.impedance(f)
                    - 2.0 * z_mutual(f, exact(self.zcam)).value
            }
        }
    }

    /// Calibrated transfer: input quantity over open-terminal voltage
    pub fn transfer(&self, f: f64) -> Result<Complex64> {
        let v_open = open_terminal_voltage(
            Complex64::new(1.0 / self.ratio, 0.0),
            self.output_impedance(f),
            self.terminal_series(f),
            self.yca.admittance(f),
        )?;
        Ok(v_open.inv())
    }

    /// Correction tables of the transducer, with the transfer tabulated on
    /// `freq`
    pub fn table_set(&self, freq: &[f64]) -> Result<TableSet> {
        let transfer = freq
            .iter()
            .map(|&f| self.transfer(f))
            .collect::<Result<Vec<_>>>()?;
        let n = freq.len();
        let gain: Vec<f64> = transfer.iter().map(|t| t.norm()).collect();
        let u_gain = gain.iter().map(|g| g * self.rel_uncertainty).collect();
        let phi = transfer.iter().map(|t| t.arg()).collect();

        let mut set = TableSet::new();
        set.insert(
            "tr_gain",
            CorrectionTable::new(
                "tr_gain",
                Some(Axis::new(FREQ_AXIS, freq.to_vec())?),
                None,
                vec![Quantity::new("gain", Grid::new(n, 1, gain)?, Grid::new(n, 1, u_gain)?)],
            )?,
        );
        set.insert(
            "tr_phi",
            CorrectionTable::new(
                "tr_phi",
                Some(Axis::new(FREQ_AXIS, freq.to_vec())?),
                None,
                vec![Quantity::new(
                    "phi",
                    Grid::new(n, 1, phi)?,
                    Grid::filled(n, 1, self.rel_uncertainty),
                )],
            )?,
        );

        let u = |v: f64| (v, v * self.rel_uncertainty);
        let mut scalar = |name: &str, quantities: &[(&str, (f64, f64))]| -> Result<()> {
            let triples: Vec<(&str, f64, f64)> =
                quantities.iter().map(|&(q, (v, uv))| (q, v, uv)).collect();
            set.insert(name, CorrectionTable::scalar(name, &triples)?);
            Ok(())
        };
        scalar("tr_Zlo", &[("Rp", u(self.zlo_r)), ("Cp", u(self.zlo_c))])?;
        scalar("tr_Zca", &[("Rs", u(self.zca.r)), ("Ls", u(self.zca.l))])?;
        scalar("tr_Yca", &[("Cp", u(self.yca.c)), ("D", u(self.yca.d))])?;
        scalar("Zcb", &[("Rs", u(self.zcb.r)), ("Ls", u(self.zcb.l))])?;
        scalar("Ycb", &[("Cp", u(self.ycb.c)), ("D", u(self.ycb.d))])?;
        scalar("adc_Yin", &[("Cp", u(self.yin.c)), ("Gp", u(self.yin.g))])?;
        if self.topology == Topology::Differential {
            scalar("tr_Zcal", &[("Rs", u(self.zcal.r)), ("Ls", u(self.zcal.l))])?;
            scalar("tr_Zcam", &[("M", u(self.zcam))])?;
            scalar("lo_adc_Yin", &[("Cp", u(self.lo_yin.c)), ("Gp", u(self.lo_yin.g))])?;
        }
        Ok(set)
    }

    /// Digitizer voltages produced by input phasors `x`, solved on the full
    /// mesh
    ///
    /// Returns the high-side spectrum and, in differential mode, the
    /// low-side spectrum. Amplitudes carry `u_amp_rel` relative and phases
    /// `u_phase` absolute uncertainty.
    pub fn measure(
        &self,
        freq: &[f64],
        x: &[Complex64],
        u_amp_rel: f64,
        u_phase: f64,
    ) -> Result<(PhasorSpectrum, Option<PhasorSpectrum>)> {
        if freq.len() != x.len() {
            return Err(CorrError::Config(format!(
                "{} frequencies for {} phasors",
                freq.len(),
                x.len()
            )));
        }
        let mut high = Vec::with_capacity(x.len());
        let mut low = Vec::with_capacity(x.len());
        for (&f, &x) in freq.iter().zip(x) {
            let v_th = x / self.ratio;
            match self.topology {
                Topology::SingleEnded => {
                    let circuit = SingleEndedCircuit {
                        zo: self.output_impedance(f),
                        zca: self.zca.impedance(f),
                        yca: self.yca.admittance(f),
                        zcb: self.zcb.impedance(f),
                        ycb: self.ycb.admittance(f),
                        yin: self.yin.admittance(f),
                    };
                    high.push(single_ended_output(v_th, &circuit)?);
                }
                Topology::Differential => {
                    let circuit = DifferentialCircuit {
                        zo: self.output_impedance(f),
                        zca: self.zca.impedance(f),
                        yca: self.yca.admittance(f),
                        zcal: self.zcal.impedance(f),
                        zcam: z_mutual(f, exact(self.zcam)).value,
                        zcb: self.zcb.impedance(f),
                        ycb: self.ycb.admittance(f),
                        yin: self.yin.admittance(f),
                        lo_yin: self.lo_yin.admittance(f),
                    };
                    let (hi, lo) = differential_outputs(v_th, &circuit)?;
                    high.push(hi);
                    low.push(lo);
                }
            }
        }

        let high = PhasorSpectrum::from_phasors(freq.to_vec(), &high, u_amp_rel, u_phase)?;
        let low = match self.topology {
            Topology::SingleEnded => None,
            Topology::Differential => Some(PhasorSpectrum::from_phasors(
                freq.to_vec(),
                &low,
                u_amp_rel,
                u_phase,
            )?),
        };
        Ok((high, low))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_transfer_near_ratio_at_low_frequency() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let t = SyntheticTransducer::random(TransducerKind::Rvd, Topology::SingleEnded, &mut rng)
            .unwrap();
        let tr = t.transfer(50.0).unwrap();
        assert!((tr.norm() - t.ratio).abs() / t.ratio < 1e-3);
    }

    #[test]
    fn test_table_set_has_every_required_table() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let t = SyntheticTransducer::random(TransducerKind::Shunt, Topology::Differential, &mut rng)
            .unwrap();
        let set = t.table_set(&[50.0, 100.0, 150.0]).unwrap();
        for name in crate::loading::required_tables(Topology::Differential) {
            assert!(set.contains(name), "missing {}", name);
        }
    }
}

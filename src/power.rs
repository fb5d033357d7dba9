//! RMS power quantities from corrected voltage and current spectra.

use num_complex::Complex64;

use crate::error::{CorrError, Result};
use crate::loading::PhasorSpectrum;
use crate::uncertainty::{Bundle, UncertainValue};

/// Inputs seeded per bin: voltage amplitude and phase, current amplitude and
/// phase
const INPUTS_PER_BIN: usize = 4;

/// RMS voltage, current and power with standard uncertainties
///
/// All values are real; the uncertainty of each sits in `uncertainty.re`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerQuantities {
    pub u: UncertainValue,
    pub i: UncertainValue,
    pub p: UncertainValue,
    pub s: UncertainValue,
    pub q: UncertainValue,
    pub pf: UncertainValue,
}

impl PowerQuantities {
    /// Aggregate a voltage and a current spectrum sharing one frequency
    /// vector
    ///
    /// Every bin's amplitudes and phases are independent inputs, so the
    /// correlation between `P`, `S` and `Q` through shared harmonics is kept.
    pub fn from_spectra(u: &PhasorSpectrum, i: &PhasorSpectrum) -> Result<Self> {
        if u.freq != i.freq {
            return Err(CorrError::Config(
                "voltage and current spectra must share one frequency vector".into(),
            ));
        }
        if u.is_empty() {
            return Err(CorrError::Config("spectrum has no bins".into()));
        }

        let mut u_sq = Vec::with_capacity(u.len());
        let mut i_sq = Vec::with_capacity(u.len());
        let mut active = Vec::with_capacity(u.len());
        for k in 0..u.len() {
            let w = if u.freq[k] == 0.0 { 1.0 } else { 0.5 };
            let ua = Bundle::seed_value(&u.amp_value(k), 0, INPUTS_PER_BIN)?;
            let up = Bundle::seed_value(&u.phase_value(k), 1, INPUTS_PER_BIN)?;
            let ia = Bundle::seed_value(&i.amp_value(k), 2, INPUTS_PER_BIN)?;
            let ip = Bundle::seed_value(&i.phase_value(k), 3, INPUTS_PER_BIN)?;

            let uk = Bundle::from_polar(&ua, &up);
            let ik = Bundle::from_polar(&ia, &ip);
            u_sq.push(&ua * &ua * w);
            i_sq.push(&ia * &ia * w);
            active.push((uk * ik.conj()).re() * w);
        }

        let u_rms = Bundle::sum_disjoint(&u_sq).sqrt();
        let i_rms = Bundle::sum_disjoint(&i_sq).sqrt();
        let p = Bundle::sum_disjoint(&active);
        let s = &u_rms * &i_rms;
        // rounding can leave S² − P² a hair below zero for pure active power
        let q = (&s * &s - &p * &p).map(|c| Complex64::new(c.re.max(0.0).sqrt(), 0.0));
        let pf = if s.value().re > 0.0 {
            (&p / &s).collapse()
        } else {
            UncertainValue::zero()
        };

        Ok(Self {
            u: u_rms.collapse(),
            i: i_rms.collapse(),
            p: p.collapse(),
            s: s.collapse(),
            q: q.collapse(),
            pf,
        })
    }
}

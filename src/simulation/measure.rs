use num_complex::Complex64;

use crate::loading::PhasorSpectrum;

/// Phase difference mapped into `(-π, π]`
pub fn phase_error(measured: f64, expected: f64) -> f64 {
    use std::f64::consts::PI;
    let mut e = (measured - expected) % (2.0 * PI);
    if e > PI {
        e -= 2.0 * PI;
    } else if e <= -PI {
        e += 2.0 * PI;
    }
    e
}

/// Deviation of one corrected bin from the known input
#[derive(Debug, Clone, Copy)]
pub struct BinDeviation {
    pub amp: f64,
    pub amp_error: f64,
    pub phase_error: f64,
    pub u_amp: f64,
    pub u_phase: f64,
}

impl BinDeviation {
    /// Whether the deviation is covered by `max(rel·amp, k·u)` in amplitude
    /// and `max(rel, k·u)` in phase
    pub fn within(&self, rel: f64, k: f64) -> bool {
        self.amp_error.abs() <= (rel * self.amp).max(k * self.u_amp)
            && self.phase_error.abs() <= rel.max(k * self.u_phase)
    }
}

/// Per-bin deviations of a corrected spectrum from the true input phasors
pub fn compare(solved: &PhasorSpectrum, truth: &[Complex64]) -> Vec<BinDeviation> {
    truth
        .iter()
        .enumerate()
        .map(|(i, x)| BinDeviation {
            amp: x.norm(),
            amp_error: solved.amp[i] - x.norm(),
            phase_error: phase_error(solved.phase[i], x.arg()),
            u_amp: solved.u_amp[i],
            u_phase: solved.u_phase[i],
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub max_amp_rel_error: f64,
    pub max_phase_error: f64,
    /// Bins whose deviation is not covered by the tolerance
    pub outside: usize,
}

pub fn summarize(deviations: &[BinDeviation], rel: f64, k: f64) -> ErrorStats {
    deviations.iter().fold(ErrorStats::default(), |acc, d| ErrorStats {
        max_amp_rel_error: acc.max_amp_rel_error.max((d.amp_error / d.amp).abs()),
        max_phase_error: acc.max_phase_error.max(d.phase_error.abs()),
        outside: acc.outside + usize::from(!d.within(rel, k)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_phase_error_wraps() {
        assert!((phase_error(PI - 0.1, -PI + 0.1) + 0.2).abs() < 1e-12);
        assert!((phase_error(0.3, 0.1) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_within() {
        let d = BinDeviation {
            amp: 1.0,
            amp_error: 1e-5,
            phase_error: 0.0,
            u_amp: 1e-5,
            u_phase: 0.0,
        };
        assert!(d.within(1e-6, 2.0));
        assert!(!d.within(1e-6, 0.5));
    }
}

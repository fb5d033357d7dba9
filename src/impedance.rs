//! Component-parameter to impedance/admittance conversions.
//!
//! Every conversion propagates the parameter uncertainties to the complex
//! result through a [`Bundle`], so the result uncertainty is reported
//! separately for the real and imaginary parts.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::uncertainty::{Bundle, UncertainValue};

fn omega(f: f64) -> f64 {
    2.0 * PI * f
}

fn j() -> Complex64 {
    Complex64::new(0.0, 1.0)
}

/// Series R-L: `Z = R + jωL`
pub fn z_series_rl(f: f64, r: UncertainValue, l: UncertainValue) -> UncertainValue {
    let [r, l]: [Bundle; 2] = seeds([r, l]);
    (&r + &l * (j() * omega(f))).collapse()
}

/// Mutual coupling from a mutual inductance: `Z = jωM`
pub fn z_mutual(f: f64, m: UncertainValue) -> UncertainValue {
    z_series_rl(f, UncertainValue::zero(), m)
}

/// Parallel C with dissipation factor D: `Y = ωC·D + jωC`
pub fn y_parallel_cd(f: f64, c: UncertainValue, d: UncertainValue) -> UncertainValue {
    let [c, d]: [Bundle; 2] = seeds([c, d]);
    let wc = &c * omega(f);
    (&wc * &d + &wc * j()).collapse()
}

/// Parallel C with conductance G: `Y = G + jωC`
pub fn y_parallel_cg(f: f64, c: UncertainValue, g: UncertainValue) -> UncertainValue {
    let [c, g]: [Bundle; 2] = seeds([c, g]);
    (&g + &c * (j() * omega(f))).collapse()
}

/// Parallel C-R: `Z = 1/(1/R + jωC)`
///
/// `R = 0` is a short (`Z = 0`); an infinite or NaN `R` is an open
/// resistor, leaving only the capacitor.
pub fn z_parallel_cr(f: f64, c: UncertainValue, r: UncertainValue) -> UncertainValue {
    if r.value.re == 0.0 {
        return UncertainValue::zero();
    }
    let g = if r.value.re.is_finite() {
        let [r_only]: [Bundle; 1] = seeds([r]);
        r_only.recip().collapse()
    } else {
        UncertainValue::zero()
    };
    let y = y_parallel_cg(f, c, g);
    z_inv(y)
}

/// Complex inversion `1/Z` (impedance to admittance and back)
pub fn z_inv(z: UncertainValue) -> UncertainValue {
    let [z]: [Bundle; 1] = seeds([z]);
    z.recip().collapse()
}

fn seeds<const N: usize>(values: [UncertainValue; N]) -> [Bundle; N] {
    let bundles = Bundle::seed_all(&values);
    let mut iter = bundles.into_iter();
    std::array::from_fn(|_| iter.next().unwrap_or_else(|| Bundle::constant_real(0.0, N)))
}

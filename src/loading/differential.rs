//! Closed-form correction with the high and low transducer outputs each
//! digitized against ground.
//!
//! Node names used below:
//!
//! ```text
//!  A ── Zca/2 ── Hm ── Zca/2 ── H ── Zcb/2 ── Hcm ── Zcb/2 ── Hc ── Yin ── G
//!  │              │                            │
//! src            Yca                          Ycb ── G
//!  │              │                            │
//!  B ── Zcal/2 ── Lm ── Zcal/2 ── L ── Zcb/2 ── Lcm ── Zcb/2 ── Lc ── lo Yin ── G
//!                                              │
//!                                             Ycb ── G
//! ```
//!
//! The two halves of the high and low terminal leads are coupled through
//! `Zcam/2` each.

use super::network::unload;
use super::params::{SeededCircuit, SeededLowSide};
use crate::config::TransducerKind;
use crate::uncertainty::Bundle;

/// Voltage and current entering a cable from the terminal side
struct LeadEnd {
    v: Bundle,
    i: Bundle,
}

/// Walk back from a digitizer node to the terminal end of its cable
fn cable_lead(v_adc: &Bundle, yin: &Bundle, zcb: &Bundle, ycb: &Bundle) -> LeadEnd {
    let half = zcb * 0.5;
    let i_adc = v_adc * yin;
    let v_mid = v_adc + &half * &i_adc;
    let i = &i_adc + &v_mid * ycb;
    let v = &v_mid + &half * &i;
    LeadEnd { v, i }
}

/// Input quantity that produces `v_hi` and `v_lo` at the two digitizer
/// inputs
///
/// The lead currents at the source are evaluated in closed form; with
/// consistent measurements they are equal and opposite, and their mean is
/// the current through the source.
pub fn solve_bin(
    kind: TransducerKind,
    circuit: &SeededCircuit,
    low: &SeededLowSide,
    v_hi: &Bundle,
    v_lo: &Bundle,
) -> Bundle {
    let hi = cable_lead(v_hi, &circuit.yin, &circuit.zcb, &circuit.ycb);
    let lo = cable_lead(v_lo, &low.lo_yin, &circuit.zcb, &circuit.ycb);

    let zca_h = &circuit.zca * 0.5;
    let zcal_h = &low.zcal * 0.5;
    let zcam_h = &low.zcam * 0.5;

    // outer halves of the terminal leads
    let v_hm = &hi.v + &zca_h * &hi.i + &zcam_h * &lo.i;
    let v_lm = &lo.v + &zcal_h * &lo.i + &zcam_h * &hi.i;

    let i_y = (&v_hm - &v_lm) * &circuit.yca;
    let i_h1 = &hi.i + &i_y;
    let i_l1 = &lo.i - &i_y;

    // inner halves up to the source terminals
    let v_a = &v_hm + &zca_h * &i_h1 + &zcam_h * &i_l1;
    let v_b = &v_lm + &zcal_h * &i_l1 + &zcam_h * &i_h1;
    let i_src = (&i_h1 - &i_l1) * 0.5;

    let z_series = &circuit.zca + &low.zcal - &low.zcam * 2.0;
    let unloaded = unload(kind, &circuit.tr, &circuit.zlo, &z_series, &circuit.yca);
    let v_th = &v_a - &v_b + &unloaded.zo * &i_src;
    &unloaded.k * &v_th
}

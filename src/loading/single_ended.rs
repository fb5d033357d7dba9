//! Closed-form correction with the transducer low side tied to digitizer
//! ground.

use super::network::{Abcd, unload};
use super::params::SeededCircuit;
use crate::config::TransducerKind;
use crate::uncertainty::Bundle;

/// Input quantity that produces `v_out` at the digitizer
///
/// The digitizer input is the load of a cascade of the terminal T section,
/// the cable T section and the digitizer admittance; the Thevenin voltage
/// driving the cascade is `A·V_out + Z_o·C·V_out`.
pub fn solve_bin(kind: TransducerKind, circuit: &SeededCircuit, v_out: &Bundle) -> Bundle {
    let unloaded = unload(kind, &circuit.tr, &circuit.zlo, &circuit.zca, &circuit.yca);
    let chain = Abcd::t_section(&circuit.zca, &circuit.yca)
        .cascade(&Abcd::t_section(&circuit.zcb, &circuit.ycb))
        .cascade(&Abcd::shunt(&circuit.yin));
    &unloaded.k * (&chain.a + &unloaded.zo * &chain.c) * v_out
}

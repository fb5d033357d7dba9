//! Two-port algebra over uncertainty bundles.

use crate::config::TransducerKind;
use crate::uncertainty::Bundle;

/// Transmission (ABCD) matrix relating `(V1, I1)` to `(V2, I2)`:
///
/// ```text
/// V1 = A·V2 + B·I2
/// I1 = C·V2 + D·I2
/// ```
#[derive(Debug, Clone)]
pub struct Abcd {
    pub a: Bundle,
    pub b: Bundle,
    pub c: Bundle,
    pub d: Bundle,
}

impl Abcd {
    /// Symmetric T section `Z/2 – Y – Z/2`
    pub fn t_section(z: &Bundle, y: &Bundle) -> Self {
        let zy = z * y;
        let a = &zy * 0.5 + 1.0;
        Self {
            b: z * (&zy * 0.25 + 1.0),
            c: y.clone(),
            d: a.clone(),
            a,
        }
    }

    /// Shunt admittance across the port
    pub fn shunt(y: &Bundle) -> Self {
        let one = Bundle::constant_real(1.0, y.inputs());
        let zero = Bundle::constant_real(0.0, y.inputs());
        Self {
            a: one.clone(),
            b: zero,
            c: y.clone(),
            d: one,
        }
    }

    /// `self` followed by `next`
    pub fn cascade(&self, next: &Abcd) -> Self {
        Self {
            a: &self.a * &next.a + &self.b * &next.c,
            b: &self.a * &next.b + &self.b * &next.d,
            c: &self.c * &next.a + &self.d * &next.c,
            d: &self.c * &next.b + &self.d * &next.d,
        }
    }
}

/// Intrinsic transducer seen from its terminals
#[derive(Debug, Clone)]
pub struct Unloaded {
    /// Input quantity per unit of Thevenin voltage
    pub k: Bundle,
    /// Thevenin output impedance
    pub zo: Bundle,
}

/// Remove the terminal network from the open-terminal calibration `tr`
///
/// `tr` was measured with the output terminals open, i.e. through a T section
/// of total series impedance `z_series` and shunt admittance `yca`. The
/// transducer is a Thevenin source `X/k` behind `zo`, where `zo` follows from
/// the low-side impedance: `zlo·(k−1)/k` for a divider, `zlo` for a shunt.
pub fn unload(
    kind: TransducerKind,
    tr: &Bundle,
    zlo: &Bundle,
    z_series: &Bundle,
    yca: &Bundle,
) -> Unloaded {
    let a_t = yca * z_series * 0.5 + 1.0;
    let zlo_c = zlo * yca;
    let den = &a_t + &zlo_c;
    match kind {
        TransducerKind::Rvd => {
            let k = (tr + &zlo_c) / &den;
            let zo = zlo * (&k - 1.0) / &k;
            Unloaded { k, zo }
        }
        TransducerKind::Shunt => Unloaded {
            k: tr / &den,
            zo: zlo.clone(),
        },
    }
}

//! One-dimensional interpolation kernels.
//!
//! All kernels work on the finite samples of `ys` only, so interior gaps are
//! bridged while queries outside the span of finite samples give NaN.

use crate::config::InterpMode;
use crate::constants::{AXIS_SNAP_EPSILON, NAN_NUDGE_EPSILON};

/// Interpolate `ys(xs)` at every point of `xq`
///
/// `xs` must be strictly increasing. Queries within a tiny fraction of the
/// axis span of a stored sample return that sample; NaN results at in-range
/// points are re-evaluated slightly inside the domain on both sides and the
/// finite results averaged.
pub fn interp1(xs: &[f64], ys: &[f64], xq: &[f64], mode: InterpMode) -> Vec<f64> {
    let (fx, fy): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|(_, y)| y.is_finite())
        .map(|(&x, &y)| (x, y))
        .unzip();

    if fx.is_empty() || xs.is_empty() {
        return vec![f64::NAN; xq.len()];
    }

    let kernel = Kernel::new(&fx, &fy, mode);
    let span = (xs[xs.len() - 1] - xs[0]).abs();
    let snap = AXIS_SNAP_EPSILON * span;
    let nudge = NAN_NUDGE_EPSILON * span;

    xq.iter()
        .map(|&x| {
            if let Some(i) = snap_index(xs, x, snap) {
                if ys[i].is_finite() {
                    return ys[i];
                }
            }
            let v = kernel.eval(x);
            if v.is_finite() || span == 0.0 || x < xs[0] || x > xs[xs.len() - 1] {
                return v;
            }
            let lo = (x - nudge).max(xs[0]);
            let hi = (x + nudge).min(xs[xs.len() - 1]);
            let probes: Vec<f64> = [kernel.eval(lo), kernel.eval(hi)]
                .into_iter()
                .filter(|p| p.is_finite())
                .collect();
            if probes.is_empty() {
                f64::NAN
            } else {
                probes.iter().sum::<f64>() / probes.len() as f64
            }
        })
        .collect()
}

/// Fill interior NaN gaps of `ys` along `xs`; leading and trailing NaN stay
pub fn fill_interior(xs: &[f64], ys: &mut [f64], mode: InterpMode) {
    let first = ys.iter().position(|y| y.is_finite());
    let last = ys.iter().rposition(|y| y.is_finite());
    let (Some(first), Some(last)) = (first, last) else {
        return;
    };
    let gaps: Vec<usize> = (first..=last).filter(|&i| !ys[i].is_finite()).collect();
    if gaps.is_empty() {
        return;
    }
    let queries: Vec<f64> = gaps.iter().map(|&i| xs[i]).collect();
    let filled = interp1(xs, ys, &queries, mode);
    for (&i, v) in gaps.iter().zip(filled) {
        ys[i] = v;
    }
}

fn snap_index(xs: &[f64], x: f64, tolerance: f64) -> Option<usize> {
    let i = xs.partition_point(|&s| s < x);
    [i.checked_sub(1), Some(i)]
        .into_iter()
        .flatten()
        .filter(|&k| k < xs.len())
        .find(|&k| (xs[k] - x).abs() <= tolerance)
}

/// Interpolant over strictly increasing finite samples
enum Kernel<'a> {
    Nearest { xs: &'a [f64], ys: &'a [f64] },
    Linear { xs: &'a [f64], ys: &'a [f64] },
    Hermite { xs: &'a [f64], ys: &'a [f64], slopes: Vec<f64> },
    Spline { xs: &'a [f64], ys: &'a [f64], second: Vec<f64> },
}

impl<'a> Kernel<'a> {
    fn new(xs: &'a [f64], ys: &'a [f64], mode: InterpMode) -> Self {
        match mode {
            InterpMode::Nearest => Kernel::Nearest { xs, ys },
            _ if xs.len() < 3 => Kernel::Linear { xs, ys },
            InterpMode::Linear => Kernel::Linear { xs, ys },
            InterpMode::Pchip => Kernel::Hermite {
                xs,
                ys,
                slopes: pchip_slopes(xs, ys),
            },
            InterpMode::Spline => Kernel::Spline {
                xs,
                ys,
                second: natural_spline_second_derivatives(xs, ys),
            },
        }
    }

    fn xs(&self) -> &[f64] {
        match self {
            Kernel::Nearest { xs, .. }
            | Kernel::Linear { xs, .. }
            | Kernel::Hermite { xs, .. }
            | Kernel::Spline { xs, .. } => xs,
        }
    }

    fn ys(&self) -> &[f64] {
        match self {
            Kernel::Nearest { ys, .. }
            | Kernel::Linear { ys, .. }
            | Kernel::Hermite { ys, .. }
            | Kernel::Spline { ys, .. } => ys,
        }
    }

    fn eval(&self, x: f64) -> f64 {
        let xs = self.xs();
        let n = xs.len();
        if x.is_nan() || x < xs[0] || x > xs[n - 1] {
            return f64::NAN;
        }
        if n == 1 {
            return self.ys()[0];
        }
        // segment k spans xs[k]..xs[k+1]
        let k = xs.partition_point(|&s| s <= x).clamp(1, n - 1) - 1;
        let h = xs[k + 1] - xs[k];
        let t = (x - xs[k]) / h;

        match self {
            Kernel::Nearest { ys, .. } => {
                if t <= 0.5 {
                    ys[k]
                } else {
                    ys[k + 1]
                }
            }
            Kernel::Linear { ys, .. } => ys[k] + t * (ys[k + 1] - ys[k]),
            Kernel::Hermite { ys, slopes, .. } => {
                let t2 = t * t;
                let t3 = t2 * t;
                let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
                let h10 = t3 - 2.0 * t2 + t;
                let h01 = -2.0 * t3 + 3.0 * t2;
                let h11 = t3 - t2;
                h00 * ys[k] + h10 * h * slopes[k] + h01 * ys[k + 1] + h11 * h * slopes[k + 1]
            }
            Kernel::Spline { ys, second, .. } => {
                let a = 1.0 - t;
                let b = t;
                a * ys[k]
                    + b * ys[k + 1]
                    + ((a * a * a - a) * second[k] + (b * b * b - b) * second[k + 1]) * h * h
                        / 6.0
            }
        }
    }
}

/// Fritsch-Carlson shape-preserving derivatives
fn pchip_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|k| (ys[k + 1] - ys[k]) / h[k]).collect();
    let mut d = vec![0.0; n];

    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }

    d[0] = pchip_end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = pchip_end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

fn pchip_end_slope(h0: f64, h1: f64, del0: f64, del1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * del0 - h0 * del1) / (h0 + h1);
    if d.signum() != del0.signum() || del0 == 0.0 {
        0.0
    } else if del0.signum() != del1.signum() && d.abs() > (3.0 * del0).abs() {
        3.0 * del0
    } else {
        d
    }
}

/// Second derivatives of the natural cubic spline (zero at both ends)
fn natural_spline_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    // Thomas algorithm on the interior equations
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];
    for i in 1..n - 1 {
        let h0 = xs[i] - xs[i - 1];
        let h1 = xs[i + 1] - xs[i];
        let a = h0;
        let b = 2.0 * (h0 + h1);
        let c = h1;
        let rhs = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
        let denom = b - a * c_prime[i - 1];
        c_prime[i] = c / denom;
        d_prime[i] = (rhs - a * d_prime[i - 1]) / denom;
    }
    for i in (1..n - 1).rev() {
        m[i] = d_prime[i] - c_prime[i] * m[i + 1];
    }
    m
}

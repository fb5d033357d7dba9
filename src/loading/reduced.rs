//! Reduced-grid solving for spectra with many bins.
//!
//! Single-ended loading does not depend on the signal, so the transfer is
//! solved on a log-spaced grid at unity input and interpolated. The
//! differential transfer depends on how the signal splits between the two
//! inputs, so it is solved at the dominant bin of each contiguous group and
//! the ratio of corrected output to measured difference is interpolated.

use std::ops::Range;

use num_complex::Complex64;

use super::params::seed_signal;
use super::{
    BinSolution, PhasorSpectrum, SolveContext, solve_bin, solve_exact, spectrum_from_solutions,
    wrap_phase,
};
use crate::config::Topology;
use crate::constants::{AMPLITUDE_FLOOR, FREQ_AXIS};
use crate::error::Result;
use crate::table::{Axis, CorrectionTable, Extrapolation, Grid, Quantity};
use crate::uncertainty::Bundle;

/// `max_bins` log-spaced frequencies from the lowest positive to the
/// highest frequency, preceded by DC when the spectrum has a DC bin
pub(crate) fn synthetic_grid(freq: &[f64], max_bins: usize) -> Vec<f64> {
    let mut grid = Vec::with_capacity(max_bins + 1);
    if freq.first() == Some(&0.0) {
        grid.push(0.0);
    }
    let Some(&lo) = freq.iter().find(|&&f| f > 0.0) else {
        return grid;
    };
    let hi = freq[freq.len() - 1];
    let (ln_lo, ln_hi) = (lo.ln(), hi.ln());
    let last = max_bins.saturating_sub(1).max(1);
    for k in 0..max_bins {
        let f = match k {
            0 => lo,
            k if k == last => hi,
            k => (ln_lo + (ln_hi - ln_lo) * k as f64 / last as f64).exp(),
        };
        if grid.last().is_none_or(|&prev| f > prev) {
            grid.push(f);
        }
    }
    grid
}

/// Contiguous index ranges splitting `n` bins into `groups` groups
pub(crate) fn partition(n: usize, groups: usize) -> Vec<Range<usize>> {
    let groups = groups.min(n);
    (0..groups)
        .map(|g| (g * n / groups)..((g + 1) * n / groups))
        .collect()
}

/// Unwrap phases in place so successive values differ by less than π
fn unwrap(phase: &mut [f64]) {
    use std::f64::consts::PI;
    for k in 1..phase.len() {
        let mut d = phase[k] - phase[k - 1];
        while d > PI {
            phase[k] -= 2.0 * PI;
            d -= 2.0 * PI;
        }
        while d < -PI {
            phase[k] += 2.0 * PI;
            d += 2.0 * PI;
        }
    }
}

/// Magnitude and phase of a transfer tabulated on `freq`, interpolated onto
/// `targets`
fn interpolate_transfer(
    ctx: &SolveContext<'_>,
    freq: Vec<f64>,
    solutions: &[BinSolution],
    targets: &[f64],
) -> Result<CorrectionTable> {
    let n = freq.len();
    let mut phase: Vec<f64> = solutions.iter().map(|s| s.phase).collect();
    unwrap(&mut phase);
    let column = |values: Vec<f64>| Grid::new(n, 1, values);
    let table = CorrectionTable::new(
        "transfer",
        Some(Axis::new(FREQ_AXIS, freq)?),
        None,
        vec![
            Quantity::new(
                "mag",
                column(solutions.iter().map(|s| s.amp).collect())?,
                column(solutions.iter().map(|s| s.u_amp).collect())?,
            ),
            Quantity::new(
                "phase",
                column(phase)?,
                column(solutions.iter().map(|s| s.u_phase).collect())?,
            ),
        ],
    )?;
    table.interp(Some(targets), None, ctx.mode, Extrapolation::Error)
}

/// Single-ended spectrum solved through a transfer interpolated from a
/// log-spaced grid
pub(crate) fn single_ended(
    ctx: &SolveContext<'_>,
    input: &PhasorSpectrum,
    max_bins: usize,
) -> Result<PhasorSpectrum> {
    let grid = synthetic_grid(&input.freq, max_bins);
    let components = ctx.components(&grid)?;
    let m = grid.len();
    let unity = PhasorSpectrum::exact(grid.clone(), vec![1.0; m], vec![0.0; m])?;
    let transfer = (0..components.len())
        .map(|j| {
            solve_bin(ctx.kind, &components, j, &unity, None, j)
                .map(|t| BinSolution::from_bundle(&t))
        })
        .collect::<Result<Vec<_>>>()?;

    let interpolated = interpolate_transfer(ctx, grid, &transfer, &input.freq)?;
    let mag = interpolated.require("mag")?;
    let phase = interpolated.require("phase")?;

    let solutions: Vec<BinSolution> = (0..input.len())
        .map(|i| {
            let (t, u_t) = (mag.values.at(i, 0), mag.uncertainty.at(i, 0));
            let (p, u_p) = (phase.values.at(i, 0), phase.uncertainty.at(i, 0));
            let (a, u_a) = (input.amp[i], input.u_amp[i]);
            BinSolution {
                amp: a * t,
                phase: wrap_phase(input.phase[i] + p),
                u_amp: (t * u_a).hypot(a * u_t),
                u_phase: input.u_phase[i].hypot(u_p),
            }
        })
        .collect();
    spectrum_from_solutions(input.freq.clone(), &solutions)
}

/// Difference phasor `hi − lo` with the signal uncertainties seeded in
/// their differential slots
fn signal_difference(input: &PhasorSpectrum, low: &PhasorSpectrum, i: usize) -> Result<Bundle> {
    let hi = seed_signal(Topology::Differential, false, input.amp_value(i), input.phase_value(i))?;
    let lo = seed_signal(Topology::Differential, true, low.amp_value(i), low.phase_value(i))?;
    Ok(hi - lo)
}

/// Differential spectrum solved exactly at the dominant bin of each group
/// and at the outermost usable bins, with the relative transfer interpolated
/// in between
///
/// Only bins whose difference reaches [`AMPLITUDE_FLOOR`] anchor the
/// interpolation. Bins before the first or after the last such bin are
/// solved exactly.
pub(crate) fn differential(
    ctx: &SolveContext<'_>,
    input: &PhasorSpectrum,
    low: &PhasorSpectrum,
    max_bins: usize,
) -> Result<PhasorSpectrum> {
    let n = input.len();
    let diff: Vec<Complex64> = (0..n).map(|i| input.phasor(i) - low.phasor(i)).collect();
    let anchors_ratio = |i: usize| diff[i].norm() >= AMPLITUDE_FLOOR;

    let (Some(first), Some(last)) = (
        (0..n).find(|&i| anchors_ratio(i)),
        (0..n).rev().find(|&i| anchors_ratio(i)),
    ) else {
        log::warn!(
            "No differential bin reaches the amplitude floor, solving all {} bins exactly",
            n
        );
        return solve_exact(ctx, input, Some(low));
    };

    // group boundaries are global: pick every peak before solving anything
    let groups = partition(n, max_bins.saturating_sub(2));
    let mut selected: Vec<usize> = groups
        .iter()
        .filter_map(|g| {
            g.clone()
                .max_by(|&a, &b| diff[a].norm().total_cmp(&diff[b].norm()))
        })
        .chain([first, last])
        .chain((0..first).chain(last + 1..n))
        .collect();
    selected.sort_unstable();
    selected.dedup();
    if first > 0 || last + 1 < n {
        log::debug!(
            "Bins outside {}..={} are below the amplitude floor and solved exactly",
            first,
            last
        );
    }

    let freq: Vec<f64> = selected.iter().map(|&i| input.freq[i]).collect();
    let components = ctx.components(&freq)?;

    let mut exact: Vec<Option<BinSolution>> = vec![None; n];
    let mut anchor_freq = Vec::with_capacity(selected.len());
    let mut relative = Vec::with_capacity(selected.len());
    for (j, &i) in selected.iter().enumerate() {
        let x = solve_bin(ctx.kind, &components, j, input, Some(low), i)?;
        exact[i] = Some(BinSolution::from_bundle(&x));
        if anchors_ratio(i) {
            let d = signal_difference(input, low, i)?;
            anchor_freq.push(input.freq[i]);
            relative.push(BinSolution::from_bundle(&(&x / &d)));
        } else {
            log::trace!("Bin {} difference below amplitude floor", i);
        }
    }

    let transfer = interpolate_transfer(ctx, anchor_freq, &relative, &input.freq[first..=last])?;
    let mag = transfer.require("mag")?;
    let phase = transfer.require("phase")?;

    // widest uncertainty solved in each group
    let group_peak: Vec<(f64, f64)> = groups
        .iter()
        .map(|g| {
            g.clone()
                .filter_map(|i| exact[i])
                .fold((0.0f64, 0.0f64), |(ua, up), s| (ua.max(s.u_amp), up.max(s.u_phase)))
        })
        .collect();

    let mut group_of = vec![None; n];
    for (g, range) in groups.iter().enumerate() {
        for i in range.clone() {
            group_of[i] = Some(g);
        }
    }

    let mut solutions = Vec::with_capacity(n);
    for i in 0..n {
        if let Some(s) = exact[i] {
            solutions.push(s);
            continue;
        }
        // every bin outside first..=last was solved exactly
        let k = i - first;
        // signal uncertainty through the interpolated transfer
        let r = Complex64::from_polar(mag.values.at(k, 0), phase.values.at(k, 0));
        let through = BinSolution::from_bundle(&(signal_difference(input, low, i)? * r));
        let (peak_amp, peak_phase) = group_of[i].map_or((0.0, 0.0), |g| group_peak[g]);
        solutions.push(BinSolution {
            amp: through.amp,
            phase: wrap_phase(through.phase),
            u_amp: through
                .u_amp
                .hypot(diff[i].norm() * mag.uncertainty.at(k, 0))
                .max(peak_amp),
            u_phase: through
                .u_phase
                .hypot(phase.uncertainty.at(k, 0))
                .max(peak_phase),
        });
    }
    spectrum_from_solutions(input.freq.clone(), &solutions)
}

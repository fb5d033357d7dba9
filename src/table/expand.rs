//! Merging several tables onto common axes.

use super::{Axis, AxisKind, CorrectionTable, Extrapolation};
use crate::config::InterpMode;
use crate::constants::AXIS_SNAP_EPSILON;
use crate::error::{CorrError, Result};

/// Range every table along one axis can serve
#[derive(Debug, Clone, PartialEq)]
struct AxisLimits {
    axis: String,
    lo: f64,
    lo_table: String,
    hi: f64,
    hi_table: String,
}

/// Tables re-interpolated onto merged axes
#[derive(Debug, Clone)]
pub struct ExpandedTables {
    pub tables: Vec<CorrectionTable>,
    /// Merged primary axis, `None` when it collapsed or no table has one
    pub primary: Option<Axis>,
    pub secondary: Option<Axis>,
    limits: [Option<AxisLimits>; 2],
}

impl ExpandedTables {
    pub fn get(&self, name: &str) -> Option<&CorrectionTable> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Range of `kind` covered by every table that depends on it
    pub fn common_range(&self, kind: AxisKind) -> Option<(f64, f64)> {
        self.limits[slot(kind)].as_ref().map(|l| (l.lo, l.hi))
    }

    /// Fail unless every value lies inside the common primary range
    pub fn check_primary(&self, values: &[f64]) -> Result<()> {
        self.check(AxisKind::Primary, values)
    }

    pub fn check_secondary(&self, values: &[f64]) -> Result<()> {
        self.check(AxisKind::Secondary, values)
    }

    fn check(&self, kind: AxisKind, values: &[f64]) -> Result<()> {
        let Some(limits) = &self.limits[slot(kind)] else {
            return Ok(());
        };
        if values.is_empty() {
            return Ok(());
        }
        let req_lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let req_hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let snap = AXIS_SNAP_EPSILON * (limits.hi - limits.lo).abs();
        let table = if req_lo < limits.lo - snap {
            &limits.lo_table
        } else if req_hi > limits.hi + snap {
            &limits.hi_table
        } else {
            return Ok(());
        };
        Err(CorrError::Range {
            table: table.clone(),
            axis: limits.axis.clone(),
            requested: (req_lo, req_hi),
            available: (limits.lo, limits.hi),
        })
    }
}

fn slot(kind: AxisKind) -> usize {
    match kind {
        AxisKind::Primary => 0,
        AxisKind::Secondary => 1,
    }
}

/// Put `tables` on common axes
///
/// Each merged axis is the sorted union of the sample points of every table
/// having that axis. With `reduce_axes` the union is clipped to the range all
/// of those tables cover, so no table is ever extrapolated; without it the
/// tables are evaluated on the full union and give NaN outside their own
/// range. Merged axes with fewer than two points collapse.
pub fn expand(
    tables: &[CorrectionTable],
    reduce_axes: bool,
    mode: InterpMode,
) -> Result<ExpandedTables> {
    let mut merged: [Option<Vec<f64>>; 2] = [None, None];
    let mut limits: [Option<AxisLimits>; 2] = [None, None];

    for kind in [AxisKind::Primary, AxisKind::Secondary] {
        let with_axis: Vec<(&CorrectionTable, &Axis)> = tables
            .iter()
            .filter_map(|t| t.axis(kind).map(|a| (t, a)))
            .collect();
        let Some((_, first_axis)) = with_axis.first() else {
            continue;
        };
        if let Some((t, a)) = with_axis.iter().find(|(_, a)| a.name != first_axis.name) {
            return Err(CorrError::Consistency(format!(
                "table '{}' uses axis '{}' where other tables use '{}'",
                t.name(),
                a.name,
                first_axis.name
            )));
        }

        let mut lim = AxisLimits {
            axis: first_axis.name.clone(),
            lo: f64::NEG_INFINITY,
            lo_table: String::new(),
            hi: f64::INFINITY,
            hi_table: String::new(),
        };
        for (t, a) in &with_axis {
            let (lo, hi) = a.range();
            if lo > lim.lo {
                lim.lo = lo;
                lim.lo_table = t.name().to_string();
            }
            if hi < lim.hi {
                lim.hi = hi;
                lim.hi_table = t.name().to_string();
            }
        }
        if lim.lo > lim.hi {
            return Err(CorrError::Range {
                table: lim.hi_table.clone(),
                axis: lim.axis.clone(),
                requested: (lim.lo, lim.lo),
                available: (f64::NEG_INFINITY, lim.hi),
            });
        }

        let mut union: Vec<f64> = with_axis
            .iter()
            .flat_map(|(_, a)| a.values.iter().copied())
            .collect();
        union.sort_by(f64::total_cmp);
        union.dedup();

        if reduce_axes {
            let snap = AXIS_SNAP_EPSILON * (lim.hi - lim.lo).abs();
            let before = union.len();
            union.retain(|&v| v >= lim.lo - snap && v <= lim.hi + snap);
            if union.len() != before {
                log::debug!(
                    "Clipped merged '{}' axis to {:.6e}..{:.6e} ({} of {} points kept)",
                    lim.axis,
                    lim.lo,
                    lim.hi,
                    union.len(),
                    before
                );
            }
        }

        merged[slot(kind)] = Some(union);
        limits[slot(kind)] = Some(lim);
    }

    let extrapolation = if reduce_axes {
        Extrapolation::Error
    } else {
        Extrapolation::Nan
    };
    let expanded = tables
        .iter()
        .map(|t| t.interp(merged[0].as_deref(), merged[1].as_deref(), mode, extrapolation))
        .collect::<Result<Vec<_>>>()?;

    let collapse = |kind: AxisKind, values: Option<Vec<f64>>| -> Result<Option<Axis>> {
        match (values, &limits[slot(kind)]) {
            (Some(v), Some(lim)) if v.len() >= 2 => Ok(Some(Axis::new(lim.axis.clone(), v)?)),
            _ => Ok(None),
        }
    };
    let [merged_primary, merged_secondary] = merged;
    Ok(ExpandedTables {
        tables: expanded,
        primary: collapse(AxisKind::Primary, merged_primary)?,
        secondary: collapse(AxisKind::Secondary, merged_secondary)?,
        limits,
    })
}

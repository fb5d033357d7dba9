//! Correction tables: quantities tabulated against up to two axes.
//!
//! The primary axis is usually frequency, the secondary axis usually the RMS
//! level of the signal. Quantity grids hold one row per primary-axis sample
//! and one column per secondary-axis sample; a missing axis contributes a
//! single row (or column) that is broadcast on lookup.

mod expand;
mod interp;
mod load;
mod set;

pub use expand::{ExpandedTables, expand};
pub use interp::{fill_interior, interp1};
pub use load::TableSource;
pub use set::{TABLE_SPECS, TableSet, TableSpec, table_spec};

use nalgebra::DMatrix;

use crate::config::InterpMode;
use crate::constants::AXIS_SNAP_EPSILON;
use crate::error::{CorrError, Result};

/// Which axis of a table an operation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Primary,
    Secondary,
}

/// What to do with query points outside a table axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extrapolation {
    /// Fail with [`CorrError::Range`]
    #[default]
    Error,
    /// Return NaN for the out-of-range points
    Nan,
}

/// Named, strictly increasing axis
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub values: Vec<f64>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CorrError::Format(format!(
                "axis '{}' contains non-finite values",
                name
            )));
        }
        if values.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CorrError::Format(format!(
                "axis '{}' is not strictly increasing",
                name
            )));
        }
        Ok(Self { name, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn range(&self) -> (f64, f64) {
        (self.values[0], self.values[self.values.len() - 1])
    }
}

/// Samples of one quantity: a row per primary-axis sample and a column per
/// secondary-axis sample
#[derive(Debug, Clone, PartialEq)]
pub struct Grid(DMatrix<f64>);

impl Grid {
    /// Grid from row-major `data`
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(CorrError::Consistency(format!(
                "grid {}x{} cannot hold {} values",
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Self(DMatrix::from_row_slice(rows, cols, &data)))
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self(DMatrix::from_element(rows, cols, value))
    }

    pub fn scalar(value: f64) -> Self {
        Self::filled(1, 1, value)
    }

    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Element lookup with broadcasting of single-row/single-column grids
    pub fn at(&self, row: usize, col: usize) -> f64 {
        let r = if self.rows() == 1 { 0 } else { row };
        let c = if self.cols() == 1 { 0 } else { col };
        self.0[(r, c)]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        self.0.column(col).iter().copied().collect()
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.0.row(row).iter().copied().collect()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.0
    }

    fn from_columns(columns: &[Vec<f64>]) -> Self {
        let rows = columns.first().map_or(0, Vec::len);
        Self(DMatrix::from_fn(rows, columns.len(), |r, c| columns[c][r]))
    }

    fn from_rows(rows: &[Vec<f64>]) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        Self(DMatrix::from_fn(rows.len(), cols, |r, c| rows[r][c]))
    }
}

/// A tabulated quantity and its standard uncertainty
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub name: String,
    pub values: Grid,
    pub uncertainty: Grid,
}

impl Quantity {
    pub fn new(name: impl Into<String>, values: Grid, uncertainty: Grid) -> Self {
        Self {
            name: name.into(),
            values,
            uncertainty,
        }
    }

    /// Quantity with all-zero uncertainty
    pub fn exact(name: impl Into<String>, values: Grid) -> Self {
        let uncertainty = Grid::filled(values.rows(), values.cols(), 0.0);
        Self::new(name, values, uncertainty)
    }
}

/// A 0-, 1- or 2-dimensional correction dependency
///
/// Immutable once built; interpolation returns new tables.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionTable {
    name: String,
    primary: Option<Axis>,
    secondary: Option<Axis>,
    quantities: Vec<Quantity>,
}

impl CorrectionTable {
    /// Build a table, validating every grid against the axes
    ///
    /// Axes with a single sample are dropped and the matching grid dimension
    /// collapsed, so the table becomes independent of that axis.
    pub fn new(
        name: impl Into<String>,
        primary: Option<Axis>,
        secondary: Option<Axis>,
        quantities: Vec<Quantity>,
    ) -> Result<Self> {
        let name = name.into();
        if quantities.is_empty() {
            return Err(CorrError::Format(format!("table '{}' has no quantities", name)));
        }
        let rows = primary.as_ref().map_or(1, Axis::len);
        let cols = secondary.as_ref().map_or(1, Axis::len);
        if rows == 0 || cols == 0 {
            return Err(CorrError::Format(format!("table '{}' has an empty axis", name)));
        }
        for q in &quantities {
            for grid in [&q.values, &q.uncertainty] {
                if grid.rows() != rows || grid.cols() != cols {
                    return Err(CorrError::Format(format!(
                        "quantity '{}' of table '{}' is {}x{}, axes need {}x{}",
                        q.name,
                        name,
                        grid.rows(),
                        grid.cols(),
                        rows,
                        cols
                    )));
                }
            }
        }

        let mut table = Self {
            name,
            primary,
            secondary,
            quantities,
        };
        table.collapse_single_point_axes();
        Ok(table)
    }

    /// Axis-independent table from `(name, value, uncertainty)` triples
    pub fn scalar(name: impl Into<String>, quantities: &[(&str, f64, f64)]) -> Result<Self> {
        let quantities = quantities
            .iter()
            .map(|&(q, v, u)| Quantity::new(q, Grid::scalar(v), Grid::scalar(u)))
            .collect();
        Self::new(name, None, None, quantities)
    }

    fn collapse_single_point_axes(&mut self) {
        if self.primary.as_ref().is_some_and(|a| a.len() == 1) {
            self.primary = None;
        }
        if self.secondary.as_ref().is_some_and(|a| a.len() == 1) {
            self.secondary = None;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary(&self) -> Option<&Axis> {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> Option<&Axis> {
        self.secondary.as_ref()
    }

    pub fn axis(&self, kind: AxisKind) -> Option<&Axis> {
        match kind {
            AxisKind::Primary => self.primary(),
            AxisKind::Secondary => self.secondary(),
        }
    }

    pub fn quantities(&self) -> &[Quantity] {
        &self.quantities
    }

    pub fn quantity_names(&self) -> Vec<&str> {
        self.quantities.iter().map(|q| q.name.as_str()).collect()
    }

    pub fn quantity(&self, name: &str) -> Option<&Quantity> {
        self.quantities.iter().find(|q| q.name == name)
    }

    /// Like [`quantity`](Self::quantity), failing when it is absent
    pub fn require(&self, name: &str) -> Result<&Quantity> {
        self.quantity(name).ok_or_else(|| {
            CorrError::Format(format!("table '{}' has no quantity '{}'", self.name, name))
        })
    }

    /// Evaluate the table on new axis values
    ///
    /// `x` and `y` are the requested primary and secondary axis values. An
    /// axis the table depends on must be supplied; an axis it does not have
    /// is ignored, so the result stays independent of it and its grids are
    /// broadcast on lookup. Requesting both axes of a 2-D table gives a
    /// tensor-product 2-D interpolation.
    ///
    /// For modes other than linear, the difference to linear interpolation is
    /// root-sum-squared into the returned uncertainty.
    pub fn interp(
        &self,
        x: Option<&[f64]>,
        y: Option<&[f64]>,
        mode: InterpMode,
        extrapolation: Extrapolation,
    ) -> Result<Self> {
        let new_primary = self.resolve_axis(AxisKind::Primary, x, extrapolation)?;
        let new_secondary = self.resolve_axis(AxisKind::Secondary, y, extrapolation)?;

        let quantities = self
            .quantities
            .iter()
            .map(|q| {
                let values = self.interp_grid(&q.values, &new_primary, &new_secondary, mode);
                let mut uncertainty = self.interp_grid(
                    &q.uncertainty,
                    &new_primary,
                    &new_secondary,
                    InterpMode::Linear,
                );
                if mode != InterpMode::Linear {
                    let linear = self.interp_grid(
                        &q.values,
                        &new_primary,
                        &new_secondary,
                        InterpMode::Linear,
                    );
                    uncertainty.0 = DMatrix::from_iterator(
                        uncertainty.rows(),
                        uncertainty.cols(),
                        uncertainty
                            .0
                            .iter()
                            .zip(values.0.iter().zip(linear.0.iter()))
                            .map(|(u, (v, l))| (u * u + (v - l) * (v - l)).sqrt()),
                    );
                }
                Quantity::new(q.name.clone(), values, uncertainty)
            })
            .collect();

        let rebuild = |axis: &Option<Axis>, values: Option<Vec<f64>>| -> Result<Option<Axis>> {
            match (axis, values) {
                (Some(axis), Some(values)) => Axis::new(axis.name.clone(), values)
                    .map(Some)
                    .map_err(|_| {
                        CorrError::Consistency(format!(
                            "'{}' query for table '{}' must be finite and strictly increasing",
                            axis.name, self.name
                        ))
                    }),
                _ => Ok(None),
            }
        };
        let primary = rebuild(&self.primary, new_primary)?;
        let secondary = rebuild(&self.secondary, new_secondary)?;
        Self::new(self.name.clone(), primary, secondary, quantities)
    }

    /// 2-D evaluation on the grid `x` × `y`, degrading for missing axes
    pub fn interp_2d(&self, x: &[f64], y: &[f64], mode: InterpMode) -> Result<Self> {
        self.interp(Some(x), Some(y), mode, Extrapolation::Error)
    }

    /// Evaluation along one axis; the table must not depend on the other
    pub fn interp_1d(&self, axis: AxisKind, values: &[f64], mode: InterpMode) -> Result<Self> {
        match axis {
            AxisKind::Primary => self.interp(Some(values), None, mode, Extrapolation::Error),
            AxisKind::Secondary => self.interp(None, Some(values), mode, Extrapolation::Error),
        }
    }

    /// Evaluate at paired points `(x[k], y[k])` and index the result by a
    /// new axis
    ///
    /// `x` and `y` must have equal length or one of them a single value. The
    /// new axis takes its values from the non-scalar input (`x` when both
    /// are vectors) and is placed as the primary or secondary axis of the
    /// result according to `which`.
    pub fn interp_to_new_axis(
        &self,
        x: &[f64],
        y: &[f64],
        new_axis_name: &str,
        which: AxisKind,
        mode: InterpMode,
    ) -> Result<Self> {
        let n = match (x.len(), y.len()) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            (a, b) => {
                return Err(CorrError::Consistency(format!(
                    "cannot pair {} primary values with {} secondary values",
                    a, b
                )));
            }
        };
        if n == 0 {
            return Err(CorrError::Consistency(
                "paired evaluation needs at least one point".into(),
            ));
        }
        let pick = |v: &[f64], k: usize| if v.len() == 1 { v[0] } else { v[k] };

        let mut per_quantity: Vec<(Vec<f64>, Vec<f64>)> =
            vec![(Vec::with_capacity(n), Vec::with_capacity(n)); self.quantities.len()];
        for k in 0..n {
            let point = self.interp(
                Some(&[pick(x, k)][..]),
                Some(&[pick(y, k)][..]),
                mode,
                Extrapolation::Error,
            )?;
            for (acc, q) in per_quantity.iter_mut().zip(point.quantities()) {
                acc.0.push(q.values.at(0, 0));
                acc.1.push(q.uncertainty.at(0, 0));
            }
        }

        let axis_values = if x.len() > 1 || y.len() == 1 {
            (0..n).map(|k| pick(x, k)).collect()
        } else {
            y.to_vec()
        };
        let axis = Axis::new(new_axis_name, axis_values).map_err(|_| {
            CorrError::Consistency(format!(
                "derived axis '{}' is not strictly increasing",
                new_axis_name
            ))
        })?;

        let shape = |data: Vec<f64>| match which {
            AxisKind::Primary => Grid::from_columns(&[data]),
            AxisKind::Secondary => Grid::from_rows(&[data]),
        };
        let quantities = self
            .quantities
            .iter()
            .zip(per_quantity)
            .map(|(q, (v, u))| Quantity::new(q.name.clone(), shape(v), shape(u)))
            .collect();

        match which {
            AxisKind::Primary => Self::new(self.name.clone(), Some(axis), None, quantities),
            AxisKind::Secondary => Self::new(self.name.clone(), None, Some(axis), quantities),
        }
    }

    /// Check the requested axis values against the table and return the
    /// values to interpolate onto (None when the table lacks that axis)
    fn resolve_axis(
        &self,
        kind: AxisKind,
        requested: Option<&[f64]>,
        extrapolation: Extrapolation,
    ) -> Result<Option<Vec<f64>>> {
        let Some(axis) = self.axis(kind) else {
            return Ok(None);
        };
        let Some(requested) = requested else {
            return Err(CorrError::MissingAxis {
                table: self.name.clone(),
                axis: axis.name.clone(),
            });
        };
        if requested.is_empty() {
            return Err(CorrError::Consistency(format!(
                "empty '{}' query for table '{}'",
                axis.name, self.name
            )));
        }

        let (lo, hi) = axis.range();
        let snap = AXIS_SNAP_EPSILON * (hi - lo);
        let req_lo = requested.iter().copied().fold(f64::INFINITY, f64::min);
        let req_hi = requested.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if extrapolation == Extrapolation::Error && (req_lo < lo - snap || req_hi > hi + snap) {
            return Err(CorrError::Range {
                table: self.name.clone(),
                axis: axis.name.clone(),
                requested: (req_lo, req_hi),
                available: (lo, hi),
            });
        }

        // clamp roundoff-level excursions onto the axis ends
        Ok(Some(
            requested
                .iter()
                .map(|&v| {
                    if (v - lo).abs() <= snap {
                        lo
                    } else if (v - hi).abs() <= snap {
                        hi
                    } else {
                        v
                    }
                })
                .collect(),
        ))
    }

    fn interp_grid(
        &self,
        grid: &Grid,
        new_primary: &Option<Vec<f64>>,
        new_secondary: &Option<Vec<f64>>,
        mode: InterpMode,
    ) -> Grid {
        let along_primary = match (&self.primary, new_primary) {
            (Some(axis), Some(xq)) => {
                let columns: Vec<Vec<f64>> = (0..grid.cols())
                    .map(|c| interp1(&axis.values, &grid.column(c), xq, mode))
                    .collect();
                Grid::from_columns(&columns)
            }
            _ => grid.clone(),
        };
        match (&self.secondary, new_secondary) {
            (Some(axis), Some(yq)) => {
                let rows: Vec<Vec<f64>> = (0..along_primary.rows())
                    .map(|r| interp1(&axis.values, &along_primary.row(r), yq, mode))
                    .collect();
                Grid::from_rows(&rows)
            }
            _ => along_primary,
        }
    }
}

//! Loading correction tables from delimited text.
//!
//! Layout, one record per line:
//!
//! ```text
//! divider gain                      <- title
//! f;gain;u_gain;gain;u_gain         <- axis label, quantity per column
//! rms;1;1;10;10                     <- secondary axis value per column (optional)
//! 0;1.000;1e-6;1.001;1e-6           <- primary axis value, quantity values
//! 1000;1.002;2e-6;1.003;2e-6
//! ```
//!
//! The delimiter is `;` when the title contains one, otherwise `,`.

use std::path::PathBuf;

use csv::{ReaderBuilder, StringRecord, Trim};

use super::{Axis, CorrectionTable, Grid, Quantity, fill_interior};
use crate::config::InterpMode;
use crate::error::{CorrError, Result};

/// Where a table comes from
#[derive(Debug, Clone)]
pub enum TableSource {
    File(PathBuf),
    /// Table text already in memory
    Text(String),
    /// One value per requested quantity, giving an axis-independent table
    Values(Vec<f64>),
}

/// Cell states of an axis row or column
enum AxisCells {
    Numeric(Vec<f64>),
    Empty,
}

impl CorrectionTable {
    /// Load a table
    ///
    /// `names[0]` is the primary axis name (empty when the table has no
    /// primary axis), the remaining entries are the quantities to read. A
    /// quantity named `u_X` becomes the uncertainty of quantity `X`.
    /// `secondary` names the secondary axis; without it every quantity must
    /// occupy exactly one column. Interior gaps in a column are filled along
    /// the primary axis with `mode`.
    pub fn load(
        source: &TableSource,
        secondary: Option<&str>,
        names: &[&str],
        mode: InterpMode,
    ) -> Result<Self> {
        if names.len() < 2 {
            return Err(CorrError::Format(format!(
                "need an axis name and at least one quantity name, got {:?}",
                names
            )));
        }
        match source {
            TableSource::File(path) => {
                let text = std::fs::read_to_string(path)?;
                let table = parse_text(&text, secondary, names, mode)?;
                log::debug!(
                    "Loaded table '{}' from {}: {} quantities",
                    table.name(),
                    path.display(),
                    table.quantities().len()
                );
                Ok(table)
            }
            TableSource::Text(text) => parse_text(text, secondary, names, mode),
            TableSource::Values(values) => from_values(values, &names[1..]),
        }
    }

    /// Same table under another name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

fn from_values(values: &[f64], quantities: &[&str]) -> Result<CorrectionTable> {
    if values.len() != quantities.len() {
        return Err(CorrError::Format(format!(
            "{} values given for {} quantities",
            values.len(),
            quantities.len()
        )));
    }
    let columns: Vec<(&str, Grid)> = quantities
        .iter()
        .zip(values)
        .map(|(&q, &v)| (q, Grid::scalar(v)))
        .collect();
    CorrectionTable::new("values", None, None, pair_uncertainties(columns, 1, 1))
}

fn parse_text(
    text: &str,
    secondary: Option<&str>,
    names: &[&str],
    mode: InterpMode,
) -> Result<CorrectionTable> {
    let title_line = text.lines().next().unwrap_or_default();
    let delimiter = if title_line.contains(';') { b';' } else { b',' };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let records: Vec<StringRecord> = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .collect();

    let [title, header, rest @ ..] = records.as_slice() else {
        return Err(CorrError::Format("missing title or header row".into()));
    };
    let table_name = title.get(0).unwrap_or_default().to_string();

    let header: Vec<&str> = trim_trailing_empty(header.iter().skip(1).collect());
    let value_columns = header.len();
    let quantities = &names[1..];
    if value_columns == 0 || value_columns % quantities.len() != 0 {
        return Err(CorrError::Format(format!(
            "table '{}': {} value columns is not a multiple of {} quantities",
            table_name,
            value_columns,
            quantities.len()
        )));
    }
    let per_quantity = value_columns / quantities.len();
    if per_quantity > 1 && secondary.is_none() {
        return Err(CorrError::Format(format!(
            "table '{}' has {} columns per quantity but no secondary axis was named",
            table_name, per_quantity
        )));
    }

    // column indices of every quantity, in file order
    let mut column_map: Vec<Vec<usize>> = Vec::with_capacity(quantities.len());
    for &q in quantities {
        let cols: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, h)| **h == q)
            .map(|(i, _)| i)
            .collect();
        if cols.len() != per_quantity {
            return Err(CorrError::Format(format!(
                "table '{}': quantity '{}' appears in {} columns, expected {}",
                table_name,
                q,
                cols.len(),
                per_quantity
            )));
        }
        column_map.push(cols);
    }

    let (secondary_axis, data_rows) = match secondary {
        Some(axis_name) => {
            let [axis_row, data @ ..] = rest else {
                return Err(CorrError::Format(format!(
                    "table '{}' lacks the '{}' axis row",
                    table_name, axis_name
                )));
            };
            let cells: Vec<&str> = (0..value_columns)
                .map(|c| axis_row.get(c + 1).unwrap_or_default())
                .collect();
            let axis = match parse_axis_cells(&cells, &table_name, axis_name)? {
                AxisCells::Empty if per_quantity == 1 => None,
                AxisCells::Empty => {
                    return Err(CorrError::Format(format!(
                        "table '{}' has several columns per quantity but no '{}' values",
                        table_name, axis_name
                    )));
                }
                AxisCells::Numeric(values) => {
                    let sequence: Vec<f64> = column_map[0].iter().map(|&c| values[c]).collect();
                    for cols in &column_map[1..] {
                        let other: Vec<f64> = cols.iter().map(|&c| values[c]).collect();
                        if other != sequence {
                            return Err(CorrError::Format(format!(
                                "table '{}': quantities disagree on the '{}' axis",
                                table_name, axis_name
                            )));
                        }
                    }
                    Some(Axis::new(axis_name, sequence)?)
                }
            };
            (axis, data)
        }
        None => (None, rest),
    };

    if data_rows.is_empty() {
        return Err(CorrError::Format(format!("table '{}' has no data rows", table_name)));
    }

    let primary_name = names[0];
    let primary_cells: Vec<&str> = data_rows
        .iter()
        .map(|r| r.get(0).unwrap_or_default())
        .collect();
    let primary_axis = if primary_name.is_empty() {
        if data_rows.len() > 1 {
            return Err(CorrError::Format(format!(
                "table '{}' has {} data rows but no primary axis",
                table_name,
                data_rows.len()
            )));
        }
        None
    } else {
        match parse_axis_cells(&primary_cells, &table_name, primary_name)? {
            AxisCells::Numeric(values) => Some(Axis::new(primary_name, values)?),
            AxisCells::Empty if data_rows.len() == 1 => None,
            AxisCells::Empty => {
                return Err(CorrError::Format(format!(
                    "table '{}' has no '{}' values",
                    table_name, primary_name
                )));
            }
        }
    };

    let rows = data_rows.len();
    let mut grids: Vec<(&str, Grid)> = Vec::with_capacity(quantities.len());
    for (&q, cols) in quantities.iter().zip(&column_map) {
        let mut data = vec![f64::NAN; rows * per_quantity];
        for (r, record) in data_rows.iter().enumerate() {
            for (k, &c) in cols.iter().enumerate() {
                data[r * per_quantity + k] =
                    parse_value(record.get(c + 1).unwrap_or_default(), &table_name, q)?;
            }
        }
        if let Some(axis) = &primary_axis {
            for k in 0..per_quantity {
                let mut column: Vec<f64> = (0..rows).map(|r| data[r * per_quantity + k]).collect();
                fill_interior(&axis.values, &mut column, mode);
                for (r, v) in column.into_iter().enumerate() {
                    data[r * per_quantity + k] = v;
                }
            }
        }
        grids.push((q, Grid::new(rows, per_quantity, data)?));
    }

    CorrectionTable::new(
        table_name,
        primary_axis,
        secondary_axis,
        pair_uncertainties(grids, rows, per_quantity),
    )
}

/// Attach each `u_X` grid to quantity `X`; quantities without one get zeros
fn pair_uncertainties(grids: Vec<(&str, Grid)>, rows: usize, cols: usize) -> Vec<Quantity> {
    let names: Vec<&str> = grids.iter().map(|(n, _)| *n).collect();
    let mut slots: Vec<Option<Grid>> = grids.into_iter().map(|(_, g)| Some(g)).collect();
    let mut quantities = Vec::new();
    for (i, &name) in names.iter().enumerate() {
        if name.strip_prefix("u_").is_some_and(|base| names.contains(&base)) {
            continue;
        }
        let Some(values) = slots[i].take() else {
            continue;
        };
        let uncertainty = names
            .iter()
            .position(|n| n.strip_prefix("u_") == Some(name))
            .and_then(|u| slots[u].take())
            .unwrap_or_else(|| Grid::filled(rows, cols, 0.0));
        quantities.push(Quantity::new(name, values, uncertainty));
    }
    quantities
}

fn trim_trailing_empty(mut cells: Vec<&str>) -> Vec<&str> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

fn parse_axis_cells(cells: &[&str], table: &str, axis: &str) -> Result<AxisCells> {
    let parsed: Vec<Option<f64>> = cells.iter().map(|c| c.parse::<f64>().ok()).collect();
    let numeric = parsed.iter().filter(|v| v.is_some()).count();
    if numeric == 0 {
        Ok(AxisCells::Empty)
    } else if numeric == parsed.len() {
        Ok(AxisCells::Numeric(parsed.into_iter().flatten().collect()))
    } else {
        Err(CorrError::Format(format!(
            "table '{}': '{}' axis cells are only partially numeric",
            table, axis
        )))
    }
}

fn parse_value(cell: &str, table: &str, quantity: &str) -> Result<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        CorrError::Format(format!(
            "table '{}': '{}' is not a number (quantity '{}')",
            table, cell, quantity
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> TableSource {
        TableSource::Text(s.to_string())
    }

    #[test]
    fn test_load_1d_with_uncertainty() {
        let t = CorrectionTable::load(
            &text("cable;\nf;Rs;u_Rs;Ls;u_Ls\n0;0.1;0.001;1e-7;1e-9\n1000;0.11;0.001;1e-7;1e-9\n"),
            None,
            &["f", "Rs", "u_Rs", "Ls", "u_Ls"],
            InterpMode::Linear,
        )
        .unwrap();
        assert_eq!(t.name(), "cable");
        assert_eq!(t.quantity_names(), vec!["Rs", "Ls"]);
        let rs = t.quantity("Rs").unwrap();
        assert_eq!(rs.values.at(1, 0), 0.11);
        assert_eq!(rs.uncertainty.at(1, 0), 0.001);
    }

    #[test]
    fn test_load_comma_delimited_missing_uncertainty() {
        let t = CorrectionTable::load(
            &text("gain\nf,gain\n0,1.0\n10,1.1\n"),
            None,
            &["f", "gain", "u_gain"],
            InterpMode::Linear,
        );
        // u_gain is requested but absent from the header
        assert!(matches!(t, Err(CorrError::Format(_))));

        let t = CorrectionTable::load(
            &text("gain\nf,gain\n0,1.0\n10,1.1\n"),
            None,
            &["f", "gain"],
            InterpMode::Linear,
        )
        .unwrap();
        assert_eq!(t.quantity("gain").unwrap().uncertainty.at(1, 0), 0.0);
    }

    #[test]
    fn test_load_2d() {
        let t = CorrectionTable::load(
            &text("gain;\nf;gain;gain\nrms;1;10\n0;1.0;1.01\n100;1.1;1.11\n"),
            Some("rms"),
            &["f", "gain"],
            InterpMode::Linear,
        )
        .unwrap();
        assert_eq!(t.secondary().unwrap().values, vec![1.0, 10.0]);
        assert_eq!(t.quantity("gain").unwrap().values.at(1, 1), 1.11);
    }

    #[test]
    fn test_load_fills_interior_gap() {
        let t = CorrectionTable::load(
            &text("x;\nf;v\n0;\n1;1\n2;\n3;3\n4;NaN\n"),
            None,
            &["f", "v"],
            InterpMode::Linear,
        )
        .unwrap();
        let v = &t.quantity("v").unwrap().values;
        assert!(v.at(0, 0).is_nan());
        assert_eq!(v.at(2, 0), 2.0);
        assert!(v.at(4, 0).is_nan());
    }

    #[test]
    fn test_load_values() {
        let t = CorrectionTable::load(
            &TableSource::Values(vec![1e-10, 1e-12, 0.0, 0.0]),
            None,
            &["", "Cp", "u_Cp", "Gp", "u_Gp"],
            InterpMode::Linear,
        )
        .unwrap();
        assert!(t.primary().is_none());
        assert_eq!(t.quantity("Cp").unwrap().uncertainty.at(0, 0), 1e-12);
    }

    #[test]
    fn test_too_few_names() {
        let err = CorrectionTable::load(&text("t\nf;a\n0;1\n"), None, &["f"], InterpMode::Linear);
        assert!(matches!(err, Err(CorrError::Format(_))));
    }
}

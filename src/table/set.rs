//! The named tables describing one virtual channel.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{CorrectionTable, TableSource};
use crate::config::InterpMode;
use crate::constants::{FREQ_AXIS, RMS_AXIS};
use crate::error::{CorrError, Result};

/// How a canonical table is read and what it defaults to when absent
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub secondary: Option<&'static str>,
    /// Primary axis name followed by the quantity names
    pub columns: &'static [&'static str],
    /// One value per quantity for the in-memory default
    pub defaults: &'static [f64],
}

const SERIES_RL: &[&str] = &[FREQ_AXIS, "Rs", "u_Rs", "Ls", "u_Ls"];
const PARALLEL_CD: &[&str] = &[FREQ_AXIS, "Cp", "u_Cp", "D", "u_D"];
const PARALLEL_CG: &[&str] = &[FREQ_AXIS, "Cp", "u_Cp", "Gp", "u_Gp"];

/// Every table the loading solver knows about
pub const TABLE_SPECS: &[TableSpec] = &[
    TableSpec {
        name: "tr_gain",
        secondary: Some(RMS_AXIS),
        columns: &[FREQ_AXIS, "gain", "u_gain"],
        defaults: &[1.0, 0.0],
    },
    TableSpec {
        name: "tr_phi",
        secondary: Some(RMS_AXIS),
        columns: &[FREQ_AXIS, "phi", "u_phi"],
        defaults: &[0.0, 0.0],
    },
    TableSpec {
        name: "tr_Zlo",
        secondary: None,
        columns: &[FREQ_AXIS, "Rp", "u_Rp", "Cp", "u_Cp"],
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
    TableSpec {
        name: "tr_Zca",
        secondary: None,
        columns: SERIES_RL,
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
    TableSpec {
        name: "tr_Yca",
        secondary: None,
        columns: PARALLEL_CD,
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
    TableSpec {
        name: "tr_Zcal",
        secondary: None,
        columns: SERIES_RL,
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
    TableSpec {
        name: "tr_Zcam",
        secondary: None,
        columns: &[FREQ_AXIS, "M", "u_M"],
        defaults: &[0.0, 0.0],
    },
    TableSpec {
        name: "Zcb",
        secondary: None,
        columns: SERIES_RL,
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
    TableSpec {
        name: "Ycb",
        secondary: None,
        columns: PARALLEL_CD,
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
    TableSpec {
        name: "adc_Yin",
        secondary: None,
        columns: PARALLEL_CG,
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
    TableSpec {
        name: "lo_adc_Yin",
        secondary: None,
        columns: PARALLEL_CG,
        defaults: &[0.0, 0.0, 0.0, 0.0],
    },
];

pub fn table_spec(name: &str) -> Option<&'static TableSpec> {
    TABLE_SPECS.iter().find(|s| s.name == name)
}

impl TableSpec {
    /// Table with the default value of every quantity, independent of all axes
    pub fn default_table(&self) -> Result<CorrectionTable> {
        CorrectionTable::load(
            &TableSource::Values(self.defaults.to_vec()),
            None,
            self.columns,
            InterpMode::Linear,
        )
        .map(|t| t.with_name(self.name))
    }

    pub fn load(&self, source: &TableSource, mode: InterpMode) -> Result<CorrectionTable> {
        CorrectionTable::load(source, self.secondary, self.columns, mode)
            .map(|t| t.with_name(self.name))
    }
}

/// Correction tables of one channel, keyed by canonical name
///
/// Absent tables are tolerated; [`TableSet::get_or_default`] substitutes an
/// ideal component for them.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: BTreeMap<String, CorrectionTable>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `(canonical name, path)` pair
    pub fn load_from_paths(paths: &BTreeMap<String, PathBuf>, mode: InterpMode) -> Result<Self> {
        let mut set = Self::new();
        for (name, path) in paths {
            let spec = table_spec(name)
                .ok_or_else(|| CorrError::Config(format!("unknown correction table '{}'", name)))?;
            let table = spec.load(&TableSource::File(path.clone()), mode)?;
            set.insert(name.clone(), table);
        }
        log::info!("Loaded {} correction tables", set.tables.len());
        Ok(set)
    }

    /// Add or replace a table; it takes `name` as its own name
    pub fn insert(&mut self, name: impl Into<String>, table: CorrectionTable) {
        let name = name.into();
        self.tables.insert(name.clone(), table.with_name(name));
    }

    pub fn get(&self, name: &str) -> Option<&CorrectionTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// The stored table, or the canonical default when absent
    pub fn get_or_default(&self, name: &str) -> Result<CorrectionTable> {
        if let Some(table) = self.tables.get(name) {
            return Ok(table.clone());
        }
        let spec = table_spec(name)
            .ok_or_else(|| CorrError::Config(format!("unknown correction table '{}'", name)))?;
        log::debug!("Table '{}' not supplied, using ideal default", name);
        spec.default_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gain_is_unity() {
        let set = TableSet::new();
        let gain = set.get_or_default("tr_gain").unwrap();
        assert_eq!(gain.name(), "tr_gain");
        assert_eq!(gain.quantity("gain").unwrap().values.at(0, 0), 1.0);
        assert!(gain.secondary().is_none());
    }

    #[test]
    fn test_unknown_table_rejected() {
        assert!(matches!(
            TableSet::new().get_or_default("tr_bogus"),
            Err(CorrError::Config(_))
        ));
    }

    #[test]
    fn test_insert_renames() {
        let mut set = TableSet::new();
        let t = CorrectionTable::scalar("whatever", &[("M", 1e-7, 0.0)]).unwrap();
        set.insert("tr_Zcam", t);
        assert_eq!(set.get("tr_Zcam").unwrap().name(), "tr_Zcam");
        assert!(set.contains("tr_Zcam"));
    }

    #[test]
    fn test_catalogue_load_with_rms_axis() {
        let spec = table_spec("tr_phi").unwrap();
        let t = spec
            .load(
                &TableSource::Text(
                    "phase;\nf;phi;u_phi;phi;u_phi\nrms;1;1;5;5\n\
                     0;0;1e-6;0;1e-6\n1e3;1e-4;1e-6;2e-4;1e-6\n"
                        .into(),
                ),
                InterpMode::Linear,
            )
            .unwrap();
        assert_eq!(t.name(), "tr_phi");
        assert_eq!(t.secondary().unwrap().values, vec![1.0, 5.0]);
        assert_eq!(t.quantity("phi").unwrap().values.at(1, 1), 2e-4);
    }
}

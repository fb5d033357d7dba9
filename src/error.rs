use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorrError {
    #[error("Malformed correction table: {0}")]
    Format(String),

    #[error(
        "Table '{table}' does not cover {axis} range {:.6e}..{:.6e} (available {:.6e}..{:.6e})",
        requested.0, requested.1, available.0, available.1
    )]
    Range {
        table: String,
        axis: String,
        requested: (f64, f64),
        available: (f64, f64),
    },

    #[error("Internal consistency violation: {0}")]
    Consistency(String),

    #[error("Table '{table}' depends on axis '{axis}' which was not supplied")]
    MissingAxis { table: String, axis: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, CorrError>;

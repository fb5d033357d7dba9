mod csv;
mod json;
mod text;

use chrono::Utc;

use crate::loading::PhasorSpectrum;
use crate::power::PowerQuantities;
use crate::uncertainty::UncertainValue;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// One corrected spectral line
#[derive(Debug, Clone, Copy)]
pub struct BinOutput<'a> {
    pub channel: &'a str,
    pub freq: f64,
    pub amp: f64,
    /// Radians
    pub phase: f64,
    pub u_amp: f64,
    pub u_phase: f64,
}

impl<'a> BinOutput<'a> {
    /// Every bin of `spectrum`, labelled with `channel`
    pub fn from_spectrum(channel: &'a str, spectrum: &PhasorSpectrum) -> Vec<Self> {
        (0..spectrum.len())
            .map(|i| Self {
                channel,
                freq: spectrum.freq[i],
                amp: spectrum.amp[i],
                phase: spectrum.phase[i],
                u_amp: spectrum.u_amp[i],
                u_phase: spectrum.u_phase[i],
            })
            .collect()
    }
}

/// Power quantities in print order
pub fn power_rows(power: &PowerQuantities) -> [(&'static str, UncertainValue); 6] {
    [
        ("U", power.u),
        ("I", power.i),
        ("P", power.p),
        ("S", power.s),
        ("Q", power.q),
        ("PF", power.pf),
    ]
}

pub trait Formatter: Send {
    fn format(&self, output: &BinOutput<'_>) -> String;

    fn format_power(&self, power: &PowerQuantities) -> String;

    fn header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat, verbose: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(verbose)),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

pub fn iso8601_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> PhasorSpectrum {
        PhasorSpectrum::new(
            vec![50.0, 100.0],
            vec![325.0, 3.0],
            vec![0.0, -1.5],
            vec![0.01, 0.001],
            vec![1e-5, 1e-4],
        )
        .unwrap()
    }

    #[test]
    fn test_bins_follow_spectrum() {
        let s = spectrum();
        let bins = BinOutput::from_spectrum("u", &s);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[1].freq, 100.0);
        assert_eq!(bins[1].phase, -1.5);
        assert_eq!(bins[0].channel, "u");
    }

    #[test]
    fn test_every_format_renders() {
        let s = spectrum();
        let bins = BinOutput::from_spectrum("u", &s);
        for format in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Csv] {
            let formatter = create_formatter(format, true);
            let line = formatter.format(&bins[0]);
            assert!(line.contains("325"), "{:?}: {}", format, line);
        }
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = iso8601_timestamp();
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
    }
}

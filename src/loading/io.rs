//! Reading measured spectra from CSV.
//!
//! One row per bin with header `f,amp,phase,u_amp,u_phase`; the uncertainty
//! columns may be left out.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::PhasorSpectrum;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct SpectrumRecord {
    f: f64,
    amp: f64,
    phase: f64,
    #[serde(default)]
    u_amp: f64,
    #[serde(default)]
    u_phase: f64,
}

impl PhasorSpectrum {
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut spectrum = Self::exact(Vec::new(), Vec::new(), Vec::new())?;
        for record in csv.deserialize() {
            let r: SpectrumRecord = record?;
            spectrum.freq.push(r.f);
            spectrum.amp.push(r.amp);
            spectrum.phase.push(r.phase);
            spectrum.u_amp.push(r.u_amp);
            spectrum.u_phase.push(r.u_phase);
        }
        Ok(spectrum)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Reading spectrum {}", path.display());
        Self::from_csv_reader(std::fs::File::open(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_with_and_without_uncertainty() {
        let text = "f,amp,phase,u_amp,u_phase\n\
                    50,325.1,0.0,0.01,1e-5\n\
                    100, 3.2, -1.5, 0.002, 2e-4\n";
        let s = PhasorSpectrum::from_csv_reader(text.as_bytes()).unwrap();
        assert_eq!(s.freq, vec![50.0, 100.0]);
        assert_eq!(s.amp[1], 3.2);
        assert_eq!(s.u_phase[1], 2e-4);

        let text = "f,amp,phase\n50,1,0\n";
        let s = PhasorSpectrum::from_csv_reader(text.as_bytes()).unwrap();
        assert_eq!(s.u_amp, vec![0.0]);
    }

    #[test]
    fn test_malformed_value() {
        let text = "f,amp,phase\n50,abc,0\n";
        assert!(PhasorSpectrum::from_csv_reader(text.as_bytes()).is_err());
    }
}

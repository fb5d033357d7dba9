use super::{BinOutput, Formatter, power_rows};
use crate::power::PowerQuantities;

pub struct TextFormatter {
    verbose: bool,
}

impl TextFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, output: &BinOutput<'_>) -> String {
        let phase_deg = output.phase.to_degrees();
        if self.verbose {
            format!(
                "{} {:>12.3} Hz: {:.6} ± {:.3e}  {:>9.4}° ± {:.3e}°",
                output.channel,
                output.freq,
                output.amp,
                output.u_amp,
                phase_deg,
                output.u_phase.to_degrees()
            )
        } else {
            format!(
                "{} {:>12.3} Hz: {:.6}  {:>9.4}°",
                output.channel, output.freq, output.amp, phase_deg
            )
        }
    }

    fn format_power(&self, power: &PowerQuantities) -> String {
        power_rows(power)
            .iter()
            .map(|(name, v)| {
                if self.verbose {
                    format!("{:>2} = {:.6} ± {:.3e}", name, v.value.re, v.uncertainty.re)
                } else {
                    format!("{:>2} = {:.6}", name, v.value.re)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

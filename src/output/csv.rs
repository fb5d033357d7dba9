use super::{BinOutput, Formatter, iso8601_timestamp, power_rows};
use crate::power::PowerQuantities;

pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format(&self, output: &BinOutput<'_>) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            iso8601_timestamp(),
            output.channel,
            output.freq,
            output.amp,
            output.phase,
            output.u_amp,
            output.u_phase
        )
    }

    fn format_power(&self, power: &PowerQuantities) -> String {
        let ts = iso8601_timestamp();
        power_rows(power)
            .iter()
            // power rows reuse the amplitude columns and leave f and phase empty
            .map(|(name, v)| format!("{},{},,{},,{},", ts, name, v.value.re, v.uncertainty.re))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn header(&self) -> Option<&'static str> {
        Some("ts,channel,f,amp,phase,u_amp,u_phase")
    }
}

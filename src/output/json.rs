use serde::Serialize;

use super::{BinOutput, Formatter, iso8601_timestamp, power_rows};
use crate::power::PowerQuantities;

pub struct JsonFormatter;

#[derive(Serialize)]
struct BinRecord<'a> {
    ts: String,
    channel: &'a str,
    f: f64,
    amp: f64,
    phase: f64,
    u_amp: f64,
    u_phase: f64,
}

#[derive(Serialize)]
struct PowerRecord {
    ts: String,
    quantity: &'static str,
    value: f64,
    uncertainty: f64,
}

impl Formatter for JsonFormatter {
    fn format(&self, output: &BinOutput<'_>) -> String {
        let record = BinRecord {
            ts: iso8601_timestamp(),
            channel: output.channel,
            f: output.freq,
            amp: output.amp,
            phase: output.phase,
            u_amp: output.u_amp,
            u_phase: output.u_phase,
        };
        serde_json::to_string(&record).unwrap_or_default()
    }

    fn format_power(&self, power: &PowerQuantities) -> String {
        let ts = iso8601_timestamp();
        power_rows(power)
            .iter()
            .map(|&(quantity, v)| {
                let record = PowerRecord {
                    ts: ts.clone(),
                    quantity,
                    value: v.value.re,
                    uncertainty: v.uncertainty.re,
                };
                serde_json::to_string(&record).unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

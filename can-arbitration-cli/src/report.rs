//! Report generation
//!
//! Writes round results as a TXT report (tables plus an ASCII waveform) or as
//! JSON for a plotting front end.

use crate::scenario::RoundReport;
use anyhow::Result;
use can_arbitration::{bits_to_string, collapse_runs, timeline_duration, Bit, Frame, LevelRun};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// Write a human-readable report
pub fn write_txt<W: Write>(out: &mut W, reports: &[RoundReport]) -> Result<()> {
    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "  CAN Bus Arbitration Report")?;
    writeln!(out, "  Generated: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "═══════════════════════════════════════════════")?;

    for report in reports {
        writeln!(out, "\n▶ Round: {}", report.name)?;
        writeln!(out, "───────────────────────────────────────────────")?;

        writeln!(out, "  Contenders:")?;
        for frame in &report.frames {
            writeln!(out, "    {:<20} {}", frame.label, describe_identifier(frame))?;
        }

        let success = match &report.result {
            Ok(success) => success,
            Err(e) => {
                writeln!(out, "\n  ✗ Arbitration failed: {}", e)?;
                continue;
            }
        };
        let outcome = &success.outcome;

        writeln!(out, "\n  Winner:     {} ({})", outcome.winner().label, describe_identifier(outcome.winner()))?;
        writeln!(out, "  Bus levels: {}", bits_to_string(outcome.bus_levels()))?;

        if outcome.eliminations().is_empty() {
            writeln!(out, "  Eliminations: none")?;
        } else {
            writeln!(out, "  Eliminations:")?;
            for elimination in outcome.eliminations() {
                writeln!(out, "    {:<20} lost at bit {}", elimination.label, elimination.bit_index)?;
            }
        }

        let runs = collapse_runs(&success.samples);
        writeln!(out, "\n  Waveform (one column per bit time):")?;
        for line in render_waveform(&runs, outcome.bit_duration) {
            writeln!(out, "    {}", line)?;
        }

        writeln!(out, "\n  {:>12}  {:>12}  {}", "start", "end", "level")?;
        for run in &runs {
            writeln!(
                out,
                "  {:>12}  {:>12}  {}",
                format_duration(run.start),
                format_duration(run.end),
                level_name(run.level)
            )?;
        }
        writeln!(out, "  Total: {}", format_duration(timeline_duration(&success.samples)))?;
    }

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    writeln!(out, "\n═══════════════════════════════════════════════")?;
    writeln!(out, "  Rounds: {}  Resolved: {}  Failed: {}", reports.len(), reports.len() - failed, failed)?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    rounds: Vec<JsonRound<'a>>,
}

#[derive(Serialize)]
struct JsonRound<'a> {
    name: &'a str,
    contenders: &'a [Frame],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    winner: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bus_levels: Option<String>,
    eliminations: Vec<JsonElimination<'a>>,
    samples: Vec<JsonSample>,
}

#[derive(Serialize)]
struct JsonElimination<'a> {
    label: &'a str,
    bit_index: usize,
}

/// Sample in plotting units: milliseconds and logical level
#[derive(Serialize)]
struct JsonSample {
    time_ms: f64,
    signal: u8,
}

/// Write a JSON report
pub fn write_json<W: Write>(out: &mut W, reports: &[RoundReport]) -> Result<()> {
    let rounds = reports
        .iter()
        .map(|report| match &report.result {
            Ok(success) => JsonRound {
                name: &report.name,
                contenders: &report.frames,
                error: None,
                winner: Some(success.outcome.winner().label.as_str()),
                bus_levels: Some(bits_to_string(success.outcome.bus_levels())),
                eliminations: success
                    .outcome
                    .eliminations()
                    .iter()
                    .map(|e| JsonElimination {
                        label: &e.label,
                        bit_index: e.bit_index,
                    })
                    .collect(),
                samples: success
                    .samples
                    .iter()
                    .map(|s| JsonSample {
                        time_ms: s.time.as_nanos() as f64 / 1_000_000.0,
                        signal: s.level.as_u8(),
                    })
                    .collect(),
            },
            Err(e) => JsonRound {
                name: &report.name,
                contenders: &report.frames,
                error: Some(e.to_string()),
                winner: None,
                bus_levels: None,
                eliminations: Vec::new(),
                samples: Vec::new(),
            },
        })
        .collect();

    let report = JsonReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        rounds,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

fn describe_identifier(frame: &Frame) -> String {
    match frame.id_value() {
        Some(value) => format!("0x{:X} [{}]", value, bits_to_string(&frame.identifier)),
        None => format!("[{}]", bits_to_string(&frame.identifier)),
    }
}

fn level_name(level: Bit) -> &'static str {
    match level {
        Bit::Dominant => "DOM (0)",
        Bit::Recessive => "REC (1)",
    }
}

fn format_duration(d: Duration) -> String {
    if d.as_micros() >= 1000 {
        format!("{:.3}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{}us", d.as_micros())
    }
}

/// Widest a single run is drawn; longer runs end in an ellipsis
const MAX_RUN_COLUMNS: usize = 64;

/// Two-line ASCII waveform: recessive on the top rail, dominant on the bottom
fn render_waveform(runs: &[LevelRun], bit_duration: Duration) -> [String; 2] {
    let mut top = String::from("REC (1) ");
    let mut bottom = String::from("DOM (0) ");

    for run in runs {
        let columns = if bit_duration.is_zero() {
            1
        } else {
            ((run.duration().as_nanos() + bit_duration.as_nanos() / 2) / bit_duration.as_nanos()).max(1)
        };
        let truncated = columns > MAX_RUN_COLUMNS as u128;
        let drawn = if truncated { MAX_RUN_COLUMNS - 1 } else { columns as usize };

        let (rail, other) = match run.level {
            Bit::Recessive => (&mut top, &mut bottom),
            Bit::Dominant => (&mut bottom, &mut top),
        };
        let level_char = if run.level == Bit::Recessive { '‾' } else { '_' };
        rail.extend(std::iter::repeat(level_char).take(drawn));
        other.extend(std::iter::repeat(' ').take(drawn));
        if truncated {
            rail.push('…');
            other.push(' ');
        }
    }

    [top, bottom]
}

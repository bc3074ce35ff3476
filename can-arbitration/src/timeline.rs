//! Timeline synthesis
//!
//! Expands an arbitration outcome into a time-stamped bus level history. Each
//! phase is emitted as a held pair: one sample at the start of the hold and one
//! at its end, both at the same level, so a step-after plot of the samples
//! shows the exact waveform.

use crate::types::{ArbitrationOutcome, Bit, TimelineSample};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synthesize the bus timeline of an arbitration round
///
/// Phases, in order: leading idle (recessive), start-of-frame (dominant, one bit),
/// the arbitration field, the optional trailing bits, trailing idle (recessive).
/// Idle pairs are always emitted, even for zero-length idle.
///
/// # Example
/// ```
/// use can_arbitration::{resolve_arbitration, synthesize_timeline, Bit, Frame};
/// use std::time::Duration;
///
/// let bit = Duration::from_millis(10);
/// let frames = vec![Frame::new("only", vec![Bit::Recessive])];
/// let outcome = resolve_arbitration(&frames, bit).unwrap();
/// let samples = synthesize_timeline(&outcome, bit, bit, bit, None);
///
/// assert_eq!(samples.len(), 8);
/// assert_eq!(samples.last().unwrap().time, Duration::from_millis(40));
/// ```
pub fn synthesize_timeline(
    outcome: &ArbitrationOutcome,
    bit_duration: Duration,
    leading_idle: Duration,
    trailing_idle: Duration,
    trailing_bits: Option<&[Bit]>,
) -> Vec<TimelineSample> {
    let trailing = trailing_bits.unwrap_or(&[]);
    let mut builder = TimelineBuilder::with_capacity(2 * (outcome.identifier_len() + trailing.len() + 3));

    builder.hold(Bit::Recessive, leading_idle);
    builder.hold(Bit::Dominant, bit_duration);
    for &level in outcome.bus_levels() {
        builder.hold(level, bit_duration);
    }
    for &level in trailing {
        builder.hold(level, bit_duration);
    }
    builder.hold(Bit::Recessive, trailing_idle);

    log::debug!(
        "Synthesized {} timeline samples spanning {:?}",
        builder.samples.len(),
        builder.now
    );
    builder.samples
}

/// Accumulates held sample pairs on a running clock
struct TimelineBuilder {
    samples: Vec<TimelineSample>,
    now: Duration,
}

impl TimelineBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            now: Duration::ZERO,
        }
    }

    fn hold(&mut self, level: Bit, duration: Duration) {
        self.samples.push(TimelineSample::new(self.now, level));
        self.now += duration;
        self.samples.push(TimelineSample::new(self.now, level));
    }
}

/// Total span of a timeline (time of its last sample)
pub fn timeline_duration(samples: &[TimelineSample]) -> Duration {
    samples.last().map(|s| s.time).unwrap_or(Duration::ZERO)
}

/// A maximal interval during which the bus holds one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRun {
    pub start: Duration,
    pub end: Duration,
    pub level: Bit,
}

impl LevelRun {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Fold a timeline into level runs, merging adjacent holds of the same level
///
/// Zero-length holds (such as an empty idle phase) vanish into their neighbours.
pub fn collapse_runs(samples: &[TimelineSample]) -> Vec<LevelRun> {
    let mut runs: Vec<LevelRun> = Vec::new();

    for pair in samples.chunks(2) {
        let start = pair[0].time;
        let end = pair.last().map(|s| s.time).unwrap_or(start);
        let level = pair[0].level;

        if end == start {
            continue;
        }

        match runs.last_mut() {
            Some(last) if last.level == level && last.end == start => last.end = end,
            _ => runs.push(LevelRun { start, end, level }),
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::resolve_arbitration;
    use crate::types::Frame;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn outcome(bits: &str) -> ArbitrationOutcome {
        let frames = vec![Frame::new("node", Bit::parse_bits(bits).unwrap())];
        resolve_arbitration(&frames, ms(10)).unwrap()
    }

    #[test]
    fn test_phase_layout() {
        let samples = synthesize_timeline(&outcome("01"), ms(10), ms(5), ms(20), None);

        let expected = vec![
            (0, Bit::Recessive),
            (5, Bit::Recessive),
            (5, Bit::Dominant),
            (15, Bit::Dominant),
            (15, Bit::Dominant),
            (25, Bit::Dominant),
            (25, Bit::Recessive),
            (35, Bit::Recessive),
            (35, Bit::Recessive),
            (55, Bit::Recessive),
        ];
        let actual: Vec<(u64, Bit)> = samples
            .iter()
            .map(|s| (s.time.as_millis() as u64, s.level))
            .collect();
        assert_eq!(actual, expected);
        assert_eq!(timeline_duration(&samples), ms(55));
    }

    #[test]
    fn test_trailing_bits_follow_arbitration() {
        let trailing = Bit::parse_bits("10").unwrap();
        let samples = synthesize_timeline(&outcome("0"), ms(1), ms(0), ms(0), Some(&trailing));

        assert_eq!(samples.len(), 2 + 2 + 2 + 4 + 2);
        assert_eq!(samples[6], TimelineSample::new(ms(2), Bit::Recessive));
        assert_eq!(samples[8], TimelineSample::new(ms(3), Bit::Dominant));
        assert_eq!(timeline_duration(&samples), ms(4));
    }

    #[test]
    fn test_zero_idle_still_emits_pairs() {
        let samples = synthesize_timeline(&outcome("000"), ms(10), Duration::ZERO, Duration::ZERO, None);
        assert_eq!(samples.len(), 2 + 2 + 6 + 2);
        assert_eq!(samples[0], samples[1]);
        assert_eq!(samples[0].time, Duration::ZERO);
    }

    #[test]
    fn test_collapse_runs_merges_levels() {
        let samples = synthesize_timeline(&outcome("0011"), ms(10), ms(10), ms(20), None);
        let runs = collapse_runs(&samples);

        assert_eq!(
            runs,
            vec![
                LevelRun { start: ms(0), end: ms(10), level: Bit::Recessive },
                LevelRun { start: ms(10), end: ms(40), level: Bit::Dominant },
                LevelRun { start: ms(40), end: ms(80), level: Bit::Recessive },
            ]
        );
        assert_eq!(runs[2].duration(), ms(40));
    }

    #[test]
    fn test_timeline_duration_of_empty() {
        assert_eq!(timeline_duration(&[]), Duration::ZERO);
    }
}

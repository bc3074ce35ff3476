//! Timeline configuration types
//!
//! This module defines the timing parameters the synthesizer needs. Bit timing
//! is fixed for the whole round; idle phases pad the timeline on both sides.

use crate::timeline::{synthesize_timeline, timeline_duration};
use crate::types::{ArbitrationOutcome, TimelineSample};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing configuration for timeline synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Duration of one bit time (default: 10ms)
    #[serde(default = "default_bit_duration")]
    pub bit_duration: Duration,

    /// Recessive idle before start-of-frame (default: 10ms)
    #[serde(default = "default_leading_idle")]
    pub leading_idle: Duration,

    /// Recessive idle after the last bit (default: 20ms)
    #[serde(default = "default_trailing_idle")]
    pub trailing_idle: Duration,
}

fn default_bit_duration() -> Duration {
    Duration::from_millis(10)
}

fn default_leading_idle() -> Duration {
    Duration::from_millis(10)
}

fn default_trailing_idle() -> Duration {
    Duration::from_millis(20)
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            bit_duration: default_bit_duration(),
            leading_idle: default_leading_idle(),
            trailing_idle: default_trailing_idle(),
        }
    }
}

impl TimelineConfig {
    /// Create a timeline configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the bit time
    pub fn with_bit_duration(mut self, bit_duration: Duration) -> Self {
        self.bit_duration = bit_duration;
        self
    }

    /// Builder method: set the bit time from a bit rate in bits per second
    ///
    /// A zero rate, or one too fast for a whole nanosecond bit time, leaves
    /// the bit time unchanged.
    pub fn with_bit_rate(mut self, bits_per_second: u32) -> Self {
        if bits_per_second > 0 {
            let nanos = 1_000_000_000 / u64::from(bits_per_second);
            if nanos > 0 {
                self.bit_duration = Duration::from_nanos(nanos);
            }
        }
        self
    }

    /// Builder method: set the leading idle span
    pub fn with_leading_idle(mut self, leading_idle: Duration) -> Self {
        self.leading_idle = leading_idle;
        self
    }

    /// Builder method: set the trailing idle span
    pub fn with_trailing_idle(mut self, trailing_idle: Duration) -> Self {
        self.trailing_idle = trailing_idle;
        self
    }

    /// Synthesize the timeline of an outcome, appending the winner's trailing bits
    ///
    /// Bits are laid out at the bit time the outcome was resolved with; only the
    /// idle spans come from this configuration.
    pub fn synthesize(&self, outcome: &ArbitrationOutcome) -> Vec<TimelineSample> {
        synthesize_timeline(
            outcome,
            outcome.bit_duration,
            self.leading_idle,
            self.trailing_idle,
            outcome.winner().trailing_bits.as_deref(),
        )
    }

    /// Total span of a timeline produced with this configuration
    pub fn duration_of(&self, samples: &[TimelineSample]) -> Duration {
        timeline_duration(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::resolve_arbitration;
    use crate::types::{Bit, Frame};

    #[test]
    fn test_timeline_config_builder() {
        let config = TimelineConfig::new()
            .with_bit_duration(Duration::from_micros(2))
            .with_leading_idle(Duration::from_micros(4))
            .with_trailing_idle(Duration::ZERO);

        assert_eq!(config.bit_duration, Duration::from_micros(2));
        assert_eq!(config.leading_idle, Duration::from_micros(4));
        assert_eq!(config.trailing_idle, Duration::ZERO);
    }

    #[test]
    fn test_bit_rate() {
        let config = TimelineConfig::new().with_bit_rate(500_000);
        assert_eq!(config.bit_duration, Duration::from_micros(2));

        let unchanged = TimelineConfig::new().with_bit_rate(0);
        assert_eq!(unchanged.bit_duration, Duration::from_millis(10));

        let too_fast = TimelineConfig::new().with_bit_rate(2_000_000_000);
        assert_eq!(too_fast.bit_duration, Duration::from_millis(10));

        let one_gbit = TimelineConfig::new().with_bit_rate(1_000_000_000);
        assert_eq!(one_gbit.bit_duration, Duration::from_nanos(1));
    }

    #[test]
    fn test_synthesize_follows_outcome_bit_time() {
        let frames = vec![Frame::from_id("node", 0b10, 2).unwrap()];
        let outcome = resolve_arbitration(&frames, Duration::from_millis(2)).unwrap();
        let config = TimelineConfig::new();
        let samples = config.synthesize(&outcome);

        // 10 idle + 2 SOF + 2 * 2 arbitration + 20 idle
        assert_eq!(config.duration_of(&samples), Duration::from_millis(36));
        assert_eq!(samples[3].time, Duration::from_millis(12));
    }

    #[test]
    fn test_synthesize_uses_winner_trailing_bits() {
        let frames = vec![
            Frame::from_id("winner", 0b01, 2).unwrap().with_trailing_bits(vec![Bit::Recessive; 3]),
            Frame::from_id("loser", 0b10, 2).unwrap().with_trailing_bits(vec![Bit::Dominant; 8]),
        ];
        let config = TimelineConfig::new();
        let outcome = resolve_arbitration(&frames, config.bit_duration).unwrap();
        let samples = config.synthesize(&outcome);

        assert_eq!(samples.len(), 2 + 2 + 4 + 6 + 2);
        // 10 idle + 10 SOF + 2 * 10 arbitration + 3 * 10 trailing + 20 idle
        assert_eq!(config.duration_of(&samples), Duration::from_millis(90));
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: TimelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TimelineConfig::default());
    }
}

//! CAN Arbitration Library
//!
//! A stateless library for resolving CAN-style bitwise bus arbitration and
//! synthesizing the bus level timeline that the contention produces.
//!
//! # Architecture
//!
//! This library is intentionally minimal and purely computational:
//! - Resolves which of several simultaneous frames wins the bus, bit by bit
//! - Records the bus level at every identifier bit and where each loser dropped out
//! - Expands an outcome into a step-after timeline (idle, SOF, arbitration, payload, idle)
//!
//! The library does NOT:
//! - Perform bit stuffing, CRC computation, ACK handling or error frames
//! - Render plots or talk to any transport
//! - Keep state between rounds
//!
//! Scenario loading and reporting live in the application layer (can-arbitration-cli).
//!
//! # Example Usage
//!
//! ```
//! use can_arbitration::{resolve_arbitration, Frame, TimelineConfig};
//!
//! let config = TimelineConfig::new();
//! let frames = vec![
//!     Frame::standard("sun_sensor", 0x001).unwrap(),
//!     Frame::standard("camera", 0x100).unwrap().with_payload_bytes(&[0xCA, 0xFE]),
//! ];
//!
//! let outcome = resolve_arbitration(&frames, config.bit_duration).unwrap();
//! assert_eq!(outcome.winner().label, "sun_sensor");
//!
//! let samples = config.synthesize(&outcome);
//! for sample in &samples {
//!     println!("{:?} -> {}", sample.time, sample.level);
//! }
//! ```

// Public modules
pub mod arbitration;
pub mod config;
pub mod timeline;
pub mod types;

// Re-export main types for convenience
pub use arbitration::resolve_arbitration;
pub use config::TimelineConfig;
pub use timeline::{collapse_runs, synthesize_timeline, timeline_duration, LevelRun};
pub use types::{
    bits_to_string, bytes_to_bits, ArbitrationError, ArbitrationOutcome, Bit, Elimination,
    Frame, Result, TimelineSample, EXTENDED_ID_WIDTH, STANDARD_ID_WIDTH,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Core types for the arbitration engine
//!
//! This module defines the values the engine consumes and emits: bus levels,
//! contending frames, arbitration outcomes and timeline samples. All of them are
//! plain values owned by the caller once returned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result type for arbitration operations
pub type Result<T> = std::result::Result<T, ArbitrationError>;

/// Widest identifier `Frame::from_id` can expand
pub const MAX_NUMERIC_ID_WIDTH: usize = 32;

/// Identifier width of a base-format (11-bit) CAN frame
pub const STANDARD_ID_WIDTH: usize = 11;

/// Identifier width of an extended-format (29-bit) CAN frame
pub const EXTENDED_ID_WIDTH: usize = 29;

/// A bus level
///
/// The bus is wired-OR on the dominant level: when any node drives
/// `Dominant`, every node observes `Dominant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bit {
    /// Logical 0, wins contention
    Dominant,
    /// Logical 1, yields to a dominant bit
    Recessive,
}

impl Bit {
    /// Logical value of this level (dominant = 0, recessive = 1)
    pub fn as_u8(self) -> u8 {
        match self {
            Bit::Dominant => 0,
            Bit::Recessive => 1,
        }
    }

    /// Level carrying the given logical value (0 = dominant, anything else = recessive)
    pub fn from_logical(value: u8) -> Self {
        if value == 0 {
            Bit::Dominant
        } else {
            Bit::Recessive
        }
    }

    /// Parse a single `'0'` / `'1'` character
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '0' => Ok(Bit::Dominant),
            '1' => Ok(Bit::Recessive),
            other => Err(ArbitrationError::InvalidBit(other)),
        }
    }

    /// Parse a bit string such as `"000_0000_0001"`, most significant bit first
    ///
    /// Whitespace and `_` separators are ignored.
    pub fn parse_bits(s: &str) -> Result<Vec<Bit>> {
        s.chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .map(Bit::from_char)
            .collect()
    }

    /// Wired-OR combination of two driven levels
    pub fn wired_or(self, other: Bit) -> Bit {
        if self == Bit::Dominant || other == Bit::Dominant {
            Bit::Dominant
        } else {
            Bit::Recessive
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Render a bit sequence as a `0`/`1` string
pub fn bits_to_string(bits: &[Bit]) -> String {
    bits.iter().map(|b| if *b == Bit::Dominant { '0' } else { '1' }).collect()
}

/// Expand bytes into bits, most significant bit of each byte first
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<Bit> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |shift| Bit::from_logical((byte >> shift) & 1)))
        .collect()
}

/// A transmission attempt contending for the bus
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Diagnostic name of the transmitter
    pub label: String,
    /// Arbitration field, most significant bit first
    pub identifier: Vec<Bit>,
    /// Bits sent after arbitration if this frame wins (opaque)
    #[serde(default)]
    pub trailing_bits: Option<Vec<Bit>>,
}

impl Frame {
    /// Create a frame from an explicit identifier bit sequence
    pub fn new(label: impl Into<String>, identifier: Vec<Bit>) -> Self {
        Self {
            label: label.into(),
            identifier,
            trailing_bits: None,
        }
    }

    /// Create a frame from a numeric identifier of the given width
    ///
    /// # Example
    /// ```
    /// use can_arbitration::{Bit, Frame};
    ///
    /// let frame = Frame::from_id("sun_sensor", 0x1, 3).unwrap();
    /// assert_eq!(frame.identifier, vec![Bit::Dominant, Bit::Dominant, Bit::Recessive]);
    /// ```
    pub fn from_id(label: impl Into<String>, id: u32, width: usize) -> Result<Self> {
        if width == 0 || width > MAX_NUMERIC_ID_WIDTH {
            return Err(ArbitrationError::IdentifierOutOfRange { id, width });
        }
        if width < MAX_NUMERIC_ID_WIDTH && id >> width != 0 {
            return Err(ArbitrationError::IdentifierOutOfRange { id, width });
        }

        let identifier = (0..width)
            .rev()
            .map(|shift| Bit::from_logical(((id >> shift) & 1) as u8))
            .collect();
        Ok(Self::new(label, identifier))
    }

    /// Create a base-format frame with an 11-bit identifier
    pub fn standard(label: impl Into<String>, id: u32) -> Result<Self> {
        Self::from_id(label, id, STANDARD_ID_WIDTH)
    }

    /// Create an extended-format frame with a 29-bit identifier
    pub fn extended(label: impl Into<String>, id: u32) -> Result<Self> {
        Self::from_id(label, id, EXTENDED_ID_WIDTH)
    }

    /// Builder method: attach bits to emit after arbitration if this frame wins
    pub fn with_trailing_bits(mut self, bits: Vec<Bit>) -> Self {
        self.trailing_bits = Some(bits);
        self
    }

    /// Builder method: attach a payload, expanded MSB-first into trailing bits
    pub fn with_payload_bytes(self, payload: &[u8]) -> Self {
        self.with_trailing_bits(bytes_to_bits(payload))
    }

    /// Number of bits in the arbitration field
    pub fn identifier_len(&self) -> usize {
        self.identifier.len()
    }

    /// Identifier read as an unsigned number (dominant = 0)
    ///
    /// Returns `None` if the identifier is wider than 64 bits.
    pub fn id_value(&self) -> Option<u64> {
        if self.identifier.len() > 64 {
            return None;
        }
        Some(
            self.identifier
                .iter()
                .fold(0u64, |acc, bit| (acc << 1) | u64::from(bit.as_u8())),
        )
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.label, bits_to_string(&self.identifier))
    }
}

/// Record of a frame that stopped driving the bus during arbitration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elimination {
    /// Label of the losing frame
    pub label: String,
    /// Bit position (0 = most significant) at which it lost
    pub bit_index: usize,
}

/// Result of one arbitration round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationOutcome {
    /// Bus level observed at each identifier bit time
    pub bus_levels: Vec<Bit>,
    /// Number of frames still driving the bus at each identifier bit time
    pub contenders_per_bit: Vec<usize>,
    /// The frame that won the bus
    pub winner: Frame,
    /// Frames that lost, ordered by bit index
    pub eliminations: Vec<Elimination>,
    /// Bit time used for this round
    pub bit_duration: Duration,
}

impl ArbitrationOutcome {
    /// The winning frame
    pub fn winner(&self) -> &Frame {
        &self.winner
    }

    /// Bus levels during the identifier field
    pub fn bus_levels(&self) -> &[Bit] {
        &self.bus_levels
    }

    /// Frames that lost arbitration
    pub fn eliminations(&self) -> &[Elimination] {
        &self.eliminations
    }

    /// Width of the arbitration field in this round
    pub fn identifier_len(&self) -> usize {
        self.bus_levels.len()
    }

    /// Bit index at which the named frame lost, if it did
    pub fn lost_at(&self, label: &str) -> Option<usize> {
        self.eliminations
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.bit_index)
    }
}

/// A point on the synthesized bus timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSample {
    /// Offset from the start of the timeline
    pub time: Duration,
    /// Bus level at this point
    pub level: Bit,
}

impl TimelineSample {
    pub fn new(time: Duration, level: Bit) -> Self {
        Self { time, level }
    }
}

/// Errors that can occur during arbitration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArbitrationError {
    #[error("No frames supplied for arbitration")]
    EmptyContenderSet,

    #[error("Identifier length mismatch: frame '{label}' has {found} bits, expected {expected}")]
    IdentifierLengthMismatch {
        expected: usize,
        found: usize,
        label: String,
    },

    #[error("Duplicate identifier shared by frames: {}", .labels.join(", "))]
    DuplicateIdentifier { labels: Vec<String> },

    #[error("Bit duration must be greater than zero")]
    InvalidBitDuration,

    #[error("Identifier 0x{id:X} does not fit in {width} bits")]
    IdentifierOutOfRange { id: u32, width: usize },

    #[error("Invalid bit character: {0:?}")]
    InvalidBit(char),
}

//! Arbitration scenarios
//!
//! Turns node descriptions (command-line specs or config entries) into frames,
//! groups them into rounds, and resolves independent rounds in parallel.

use can_arbitration::{
    resolve_arbitration, ArbitrationError, ArbitrationOutcome, Bit, Frame, TimelineConfig,
    TimelineSample,
};
use rayon::prelude::*;
use std::str::FromStr;

/// Errors raised while parsing a node description
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeSpecError {
    #[error("Expected LABEL=ID[:PAYLOAD], got {0:?}")]
    MissingSeparator(String),

    #[error("Empty node label in {0:?}")]
    EmptyLabel(String),

    #[error("Invalid identifier {0:?}")]
    InvalidId(String),

    #[error("Invalid payload hex {0:?}")]
    InvalidPayload(String),

    #[error("Node {0:?} needs either an id or a bit string")]
    MissingIdentifier(String),

    #[error(transparent)]
    Frame(#[from] ArbitrationError),
}

/// How a node writes its identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierSpec {
    /// Numeric identifier, expanded to the round's width
    Numeric(u32),
    /// Literal bit string, which fixes its own width
    Bits(Vec<Bit>),
}

impl IdentifierSpec {
    fn parse(s: &str) -> Result<Self, NodeSpecError> {
        let invalid = || NodeSpecError::InvalidId(s.to_string());
        let s = s.trim();

        if let Some(bits) = s.strip_prefix("0b") {
            let bits = Bit::parse_bits(bits).map_err(|_| invalid())?;
            return Ok(IdentifierSpec::Bits(bits));
        }
        let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse::<u32>(),
        };
        value.map(IdentifierSpec::Numeric).map_err(|_| invalid())
    }
}

/// One contending node, before it is expanded into a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub label: String,
    pub identifier: IdentifierSpec,
    pub payload: Option<Vec<u8>>,
}

impl NodeSpec {
    /// Expand into a frame using `width` for numeric identifiers
    pub fn to_frame(&self, width: usize) -> Result<Frame, NodeSpecError> {
        let frame = match &self.identifier {
            IdentifierSpec::Numeric(id) => Frame::from_id(self.label.clone(), *id, width)?,
            IdentifierSpec::Bits(bits) => Frame::new(self.label.clone(), bits.clone()),
        };
        Ok(match &self.payload {
            Some(payload) => frame.with_payload_bytes(payload),
            None => frame,
        })
    }
}

impl FromStr for NodeSpec {
    type Err = NodeSpecError;

    /// Parse `LABEL=ID[:PAYLOAD_HEX]`, e.g. `camera=0x100:CAFE`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, rest) = s
            .split_once('=')
            .ok_or_else(|| NodeSpecError::MissingSeparator(s.to_string()))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(NodeSpecError::EmptyLabel(s.to_string()));
        }

        let (id, payload) = match rest.split_once(':') {
            Some((id, payload)) => (id, Some(parse_hex_payload(payload)?)),
            None => (rest, None),
        };

        Ok(NodeSpec {
            label: label.to_string(),
            identifier: IdentifierSpec::parse(id)?,
            payload,
        })
    }
}

/// Parse a hex byte string such as `"CA FE"` or `"cafe"`
pub fn parse_hex_payload(s: &str) -> Result<Vec<u8>, NodeSpecError> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(NodeSpecError::InvalidPayload(s.to_string()));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| NodeSpecError::InvalidPayload(s.to_string()))
        })
        .collect()
}

/// A named set of frames contending in one arbitration round
#[derive(Debug, Clone)]
pub struct Round {
    pub name: String,
    pub frames: Vec<Frame>,
}

/// Result of running one round
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub name: String,
    pub frames: Vec<Frame>,
    pub result: Result<RoundSuccess, ArbitrationError>,
}

/// A resolved round with its synthesized timeline
#[derive(Debug, Clone)]
pub struct RoundSuccess {
    pub outcome: ArbitrationOutcome,
    pub samples: Vec<TimelineSample>,
}

impl RoundReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Resolve a single round and synthesize its timeline
pub fn run_round(round: &Round, timing: &TimelineConfig) -> RoundReport {
    log::debug!("Running round '{}' with {} frame(s)", round.name, round.frames.len());

    let result = resolve_arbitration(&round.frames, timing.bit_duration).map(|outcome| {
        let samples = timing.synthesize(&outcome);
        RoundSuccess { outcome, samples }
    });

    match &result {
        Ok(success) => log::info!(
            "Round '{}': '{}' won the bus",
            round.name,
            success.outcome.winner().label
        ),
        Err(e) => log::warn!("Round '{}' failed: {}", round.name, e),
    }

    RoundReport {
        name: round.name.clone(),
        frames: round.frames.clone(),
        result,
    }
}

/// Resolve independent rounds in parallel, keeping input order
pub fn run_rounds(rounds: &[Round], timing: &TimelineConfig) -> Vec<RoundReport> {
    rounds.par_iter().map(|round| run_round(round, timing)).collect()
}

//! Bitwise arbitration engine
//!
//! Resolves which of several simultaneously transmitting frames keeps the bus.
//! Every contender drives its identifier MSB first; the bus shows the wired-OR
//! of the driven levels. A contender that drives recessive while the bus reads
//! dominant has lost and stops driving for the rest of the round.

use crate::types::{ArbitrationError, ArbitrationOutcome, Bit, Elimination, Frame, Result};
use std::time::Duration;

/// Resolve one arbitration round
///
/// # Arguments
/// * `frames` - Contending frames, all with identifiers of the same length
/// * `bit_duration` - Bit time of the round (must be non-zero)
///
/// # Returns
/// * `Ok(ArbitrationOutcome)` with the per-bit bus levels and the unique winner
/// * `Err(ArbitrationError)` if the input is empty, widths differ, the bit time is
///   zero, or more than one frame survives the whole field
///
/// The result does not depend on the order of `frames`.
///
/// # Example
/// ```
/// use can_arbitration::{resolve_arbitration, Frame};
/// use std::time::Duration;
///
/// let frames = vec![
///     Frame::standard("camera", 0x100).unwrap(),
///     Frame::standard("sun_sensor", 0x001).unwrap(),
/// ];
/// let outcome = resolve_arbitration(&frames, Duration::from_millis(10)).unwrap();
/// assert_eq!(outcome.winner().label, "sun_sensor");
/// assert_eq!(outcome.lost_at("camera"), Some(2));
/// ```
pub fn resolve_arbitration(frames: &[Frame], bit_duration: Duration) -> Result<ArbitrationOutcome> {
    let width = validate(frames, bit_duration)?;
    log::debug!(
        "Arbitrating {} frame(s) over a {}-bit identifier field",
        frames.len(),
        width
    );

    let mut state = ContentionState::new(frames);
    let mut bus_levels = Vec::with_capacity(width);
    let mut contenders_per_bit = Vec::with_capacity(width);

    for bit_index in 0..width {
        contenders_per_bit.push(state.len());
        let level = state.drive(bit_index);
        bus_levels.push(level);
    }

    let ContentionState {
        contending,
        mut eliminations,
    } = state;

    if contending.len() > 1 {
        let mut labels: Vec<String> = contending.iter().map(|f| f.label.clone()).collect();
        labels.sort();
        return Err(ArbitrationError::DuplicateIdentifier { labels });
    }

    // At least the smallest identifier survives every bit
    let winner = match contending.first() {
        Some(frame) => Frame::clone(frame),
        None => return Err(ArbitrationError::EmptyContenderSet),
    };

    eliminations.sort_by(|a, b| {
        (a.1.bit_index, &a.0.identifier, &a.0.label).cmp(&(b.1.bit_index, &b.0.identifier, &b.0.label))
    });

    log::debug!(
        "Arbitration won by '{}' ({} eliminated)",
        winner.label,
        eliminations.len()
    );

    Ok(ArbitrationOutcome {
        bus_levels,
        contenders_per_bit,
        winner,
        eliminations: eliminations.into_iter().map(|(_, e)| e).collect(),
        bit_duration,
    })
}

/// Check the round preconditions and return the common identifier width
fn validate(frames: &[Frame], bit_duration: Duration) -> Result<usize> {
    let first = frames.first().ok_or(ArbitrationError::EmptyContenderSet)?;
    let expected = first.identifier_len();

    if let Some(odd) = frames.iter().find(|f| f.identifier_len() != expected) {
        return Err(ArbitrationError::IdentifierLengthMismatch {
            expected,
            found: odd.identifier_len(),
            label: odd.label.clone(),
        });
    }

    if bit_duration.is_zero() {
        return Err(ArbitrationError::InvalidBitDuration);
    }

    Ok(expected)
}

/// Frames still driving the bus during one round
struct ContentionState<'a> {
    contending: Vec<&'a Frame>,
    eliminations: Vec<(&'a Frame, Elimination)>,
}

impl<'a> ContentionState<'a> {
    fn new(frames: &'a [Frame]) -> Self {
        Self {
            contending: frames.iter().collect(),
            eliminations: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.contending.len()
    }

    /// Drive one bit time: compute the bus level and drop the frames that lost
    fn drive(&mut self, bit_index: usize) -> Bit {
        let level = self
            .contending
            .iter()
            .map(|f| f.identifier[bit_index])
            .fold(Bit::Recessive, Bit::wired_or);

        if level == Bit::Dominant {
            let (staying, losing): (Vec<&Frame>, Vec<&Frame>) = self
                .contending
                .iter()
                .copied()
                .partition(|f| f.identifier[bit_index] == Bit::Dominant);

            for frame in losing {
                log::trace!("Bit {}: '{}' sent recessive, lost arbitration", bit_index, frame.label);
                self.eliminations.push((
                    frame,
                    Elimination {
                        label: frame.label.clone(),
                        bit_index,
                    },
                ));
            }
            self.contending = staying;
        }

        log::trace!(
            "Bit {}: bus {} with {} contender(s)",
            bit_index,
            level,
            self.contending.len()
        );
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::bits_to_string;

    const BIT: Duration = Duration::from_millis(10);

    fn frame(label: &str, bits: &str) -> Frame {
        Frame::new(label, Bit::parse_bits(bits).unwrap())
    }

    #[test]
    fn test_lower_identifier_wins() {
        let frames = vec![frame("camera", "0010000"), frame("sun_sensor", "0000001")];
        let outcome = resolve_arbitration(&frames, BIT).unwrap();

        assert_eq!(outcome.winner().label, "sun_sensor");
        assert_eq!(bits_to_string(outcome.bus_levels()), "0000001");
        assert_eq!(outcome.lost_at("camera"), Some(2));
        assert_eq!(outcome.contenders_per_bit, vec![2, 2, 2, 1, 1, 1, 1]);
        assert_eq!(outcome.bit_duration, BIT);
    }

    #[test]
    fn test_all_recessive_bits_keep_everyone() {
        let frames = vec![frame("a", "110"), frame("b", "111")];
        let outcome = resolve_arbitration(&frames, BIT).unwrap();

        assert_eq!(outcome.winner().label, "a");
        assert_eq!(outcome.lost_at("b"), Some(2));
        assert_eq!(bits_to_string(outcome.bus_levels()), "110");
    }

    #[test]
    fn test_several_losers_on_same_bit_are_sorted() {
        let frames = vec![
            frame("z", "0111"),
            frame("y", "0110"),
            frame("winner", "0011"),
            frame("early", "1000"),
        ];
        let outcome = resolve_arbitration(&frames, BIT).unwrap();

        assert_eq!(outcome.winner().label, "winner");
        let order: Vec<(&str, usize)> = outcome
            .eliminations()
            .iter()
            .map(|e| (e.label.as_str(), e.bit_index))
            .collect();
        assert_eq!(order, vec![("early", 0), ("y", 1), ("z", 1)]);
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(
            resolve_arbitration(&[], BIT),
            Err(ArbitrationError::EmptyContenderSet)
        );
    }

    #[test]
    fn test_zero_bit_duration() {
        let frames = vec![frame("a", "01")];
        assert_eq!(
            resolve_arbitration(&frames, Duration::ZERO),
            Err(ArbitrationError::InvalidBitDuration)
        );
    }

    #[test]
    fn test_length_mismatch_names_frame() {
        let frames = vec![frame("short", "000"), frame("long", "0000")];
        assert_eq!(
            resolve_arbitration(&frames, BIT),
            Err(ArbitrationError::IdentifierLengthMismatch {
                expected: 3,
                found: 4,
                label: "long".to_string(),
            })
        );
    }

    #[test]
    fn test_duplicate_survivors_are_reported() {
        let frames = vec![frame("b", "0101"), frame("a", "0101"), frame("c", "0111")];
        assert_eq!(
            resolve_arbitration(&frames, BIT),
            Err(ArbitrationError::DuplicateIdentifier {
                labels: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_duplicate_that_loses_is_not_an_error() {
        let frames = vec![frame("b", "0101"), frame("a", "0101"), frame("low", "0001")];
        let outcome = resolve_arbitration(&frames, BIT).unwrap();
        assert_eq!(outcome.winner().label, "low");
        assert_eq!(outcome.lost_at("a"), Some(1));
        assert_eq!(outcome.lost_at("b"), Some(1));
    }

    #[test]
    fn test_zero_width_identifier() {
        let single = resolve_arbitration(&[frame("only", "")], BIT).unwrap();
        assert!(single.bus_levels().is_empty());
        assert_eq!(single.winner().label, "only");

        let pair = resolve_arbitration(&[frame("x", ""), frame("y", "")], BIT);
        assert!(matches!(pair, Err(ArbitrationError::DuplicateIdentifier { .. })));
    }
}

//! Consumer side of the turn stream
//!
//! Records arrive as back-to-back JSON objects with no delimiter, and the
//! transport is free to split or merge them across chunks. [`TurnDecoder`]
//! buffers bytes until a whole object is available; [`Transcript`] drops
//! records it has already seen, keyed by `seq`.

use super::turn::Turn;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not JSON. The buffer is discarded since there is no
    /// way to find the next record boundary.
    #[error("malformed record: {0}")]
    Malformed(serde_json::Error),
    /// A complete JSON value that is not a turn; decoding continues after it.
    #[error("not a turn record: {0}")]
    NotATurn(serde_json::Error),
}

/// Incremental decoder for the concatenated-JSON wire format
#[derive(Debug, Default)]
pub struct TurnDecoder {
    buffer: Vec<u8>,
}

impl TurnDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next complete record, if the buffer holds one.
    pub fn next_turn(&mut self) -> Result<Option<Turn>, DecodeError> {
        let (next, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&self.buffer)
                .into_iter::<serde_json::Value>();
            let next = values.next();
            (next, values.byte_offset())
        };

        match next {
            None => {
                // Only whitespace left
                self.buffer.clear();
                Ok(None)
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => {
                self.buffer.clear();
                Err(DecodeError::Malformed(e))
            }
            Some(Ok(value)) => {
                self.buffer.drain(..consumed);
                serde_json::from_value(value)
                    .map(Some)
                    .map_err(DecodeError::NotATurn)
            }
        }
    }

    /// Push `chunk` and drain every record it completed. Records that fail
    /// to decode are logged and skipped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Turn> {
        self.push(chunk);
        let mut turns = Vec::new();
        loop {
            match self.next_turn() {
                Ok(Some(turn)) => turns.push(turn),
                Ok(None) => break,
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable record"),
            }
        }
        turns
    }

    /// Bytes waiting for the rest of their record
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Ordered, de-duplicated record of the turns a consumer has shown
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the seed turn delivered alongside the stream.
    pub fn with_initial(initial: Turn) -> Self {
        Self {
            turns: vec![initial],
        }
    }

    /// Append `turn` unless a record with the same or a later `seq` is
    /// already present. Returns the turn when it was new.
    pub fn accept(&mut self, turn: Turn) -> Option<&Turn> {
        if self.turns.last().is_some_and(|last| turn.seq <= last.seq) {
            return None;
        }
        self.turns.push(turn);
        self.turns.last()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::turn::Agent;
    use proptest::prelude::*;

    fn sample_turns() -> Vec<Turn> {
        vec![
            Turn::new(0, Agent::First, "Hello! I'm ready to start our conversation about π"),
            Turn::new(1, Agent::Second, "Why does \"π\" never end? {curious}"),
            Turn::new(2, Agent::First, "Because it is irrational. ✓"),
        ]
    }

    fn wire(turns: &[Turn]) -> Vec<u8> {
        turns.iter().flat_map(|t| t.encode().unwrap()).collect()
    }

    #[test]
    fn merged_records_are_split() {
        let turns = sample_turns();
        let mut decoder = TurnDecoder::new();
        assert_eq!(decoder.feed(&wire(&turns)), turns);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn partial_record_waits_for_the_rest() {
        let bytes = Turn::new(4, Agent::Second, "half").encode().unwrap();
        let (head, tail) = bytes.split_at(bytes.len() / 2);

        let mut decoder = TurnDecoder::new();
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.pending(), head.len());
        assert_eq!(decoder.feed(tail), vec![Turn::new(4, Agent::Second, "half")]);
    }

    #[test]
    fn non_turn_value_is_skipped() {
        let mut bytes = br#"{"status":"ok"}"#.to_vec();
        bytes.extend(Turn::new(1, Agent::Second, "still here").encode().unwrap());

        let mut decoder = TurnDecoder::new();
        decoder.push(&bytes);
        assert!(matches!(decoder.next_turn(), Err(DecodeError::NotATurn(_))));
        assert_eq!(
            decoder.next_turn().unwrap(),
            Some(Turn::new(1, Agent::Second, "still here"))
        );
    }

    #[test]
    fn garbage_resets_the_buffer() {
        let mut decoder = TurnDecoder::new();
        decoder.push(b"}{not json");
        assert!(matches!(decoder.next_turn(), Err(DecodeError::Malformed(_))));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn transcript_drops_the_redelivered_seed() {
        let turns = sample_turns();
        let mut transcript = Transcript::with_initial(turns[0].clone());

        assert!(transcript.accept(turns[0].clone()).is_none());
        assert_eq!(transcript.accept(turns[1].clone()), Some(&turns[1]));
        assert!(transcript.accept(turns[1].clone()).is_none());
        assert_eq!(transcript.turns().len(), 2);
    }

    proptest! {
        #[test]
        fn any_chunking_decodes_the_same_turns(cuts in proptest::collection::vec(0usize..200, 0..12)) {
            let turns = sample_turns();
            let bytes = wire(&turns);

            let mut points: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            points.sort_unstable();

            let mut decoder = TurnDecoder::new();
            let mut decoded = Vec::new();
            let mut start = 0;
            for point in points.into_iter().chain(std::iter::once(bytes.len())) {
                decoded.extend(decoder.feed(&bytes[start..point]));
                start = point;
            }

            prop_assert_eq!(decoded, turns);
            prop_assert_eq!(decoder.pending(), 0);
        }
    }
}

use std::io::{Read, Write};
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chaff_common::EventKind;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DistError, State, Trans, STATE_END};

/// Slack allowed when checking that transition weights sum to at most one.
const WEIGHT_EPSILON: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("machine has no states")]
    Empty,
    #[error("state {state} transitions to out-of-bounds state {next} on {event:?}")]
    BadTarget { state: usize, next: usize, event: EventKind },
    #[error("state {state} has transition weight {weight} outside (0, 1]")]
    BadWeight { state: usize, weight: f64 },
    #[error("state {state} transition weights sum to {sum} on {event:?}")]
    WeightOverflow { state: usize, sum: f64, event: EventKind },
    #[error("invalid distribution in state {state}: {source}")]
    BadDist { state: usize, source: DistError },
    #[error("machine string is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("machine string failed to inflate: {0}")]
    Compression(#[from] std::io::Error),
    #[error("machine string failed to decode: {0}")]
    Codec(#[from] bincode::Error),
}

/// One finite-state automaton reacting to traffic events.
///
/// The definition is immutable once constructed; runtime position lives in a
/// separate [`MachineState`](crate::MachineState) cursor so one definition
/// can back many instances. Construction validates the whole description, so
/// transitions never fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    states: Vec<State>,
}

impl Machine {
    pub fn new(states: Vec<State>) -> Result<Self, MachineError> {
        validate(&states)?;
        Ok(Self { states })
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Encodes the machine as one description line:
    /// `base64(zlib(bincode(machine)))`. The inverse of [`Machine::from_str`].
    pub fn serialize(&self) -> Result<String, MachineError> {
        let raw = bincode::serialize(self)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;

        Ok(BASE64.encode(compressed))
    }
}

impl FromStr for Machine {
    type Err = MachineError;

    /// Decodes one description line and validates the result.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compressed = BASE64.decode(s.trim())?;

        let mut raw = Vec::new();
        ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut raw)?;

        let decoded: Self = bincode::deserialize(&raw)?;
        Self::new(decoded.states)
    }
}

fn validate(states: &[State]) -> Result<(), MachineError> {
    if states.is_empty() {
        return Err(MachineError::Empty);
    }

    for (index, state) in states.iter().enumerate() {
        for kind in [
            EventKind::NormalSent,
            EventKind::NormalReceived,
            EventKind::PaddingSent,
            EventKind::PaddingReceived,
        ] {
            let candidates = &state.transitions[kind.index()];

            let mut sum = 0.0;
            for &Trans { next, weight } in candidates {
                if next >= states.len() && next != STATE_END {
                    return Err(MachineError::BadTarget { state: index, next, event: kind });
                }
                if !weight.is_finite() || weight <= 0.0 || weight > 1.0 {
                    return Err(MachineError::BadWeight { state: index, weight });
                }
                sum += weight;
            }

            if sum > 1.0 + WEIGHT_EPSILON {
                return Err(MachineError::WeightOverflow { state: index, sum, event: kind });
            }
        }

        if let Some(action) = &state.action {
            for dist in action.dists() {
                dist.validate()
                    .map_err(|source| MachineError::BadDist { state: index, source })?;
            }
        }
    }

    Ok(())
}

use chaff_common::EventKind;
use serde::{Deserialize, Serialize};

use crate::Dist;

/// Transition target that permanently ends the machine instead of moving to
/// another state.
pub const STATE_END: usize = usize::MAX;

/// One weighted transition candidate.
///
/// Weights within a state's candidate list for one event must sum to at most
/// one; any shortfall is the probability of staying put without an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trans {
    /// Index of the target state, or [`STATE_END`].
    pub next: usize,
    pub weight: f64,
}

impl Trans {
    pub fn new(next: usize, weight: f64) -> Self {
        Self { next, weight }
    }
}

/// The action template a state requests when entered.
///
/// Dist-valued fields are sampled anew on every entry, so re-entering a
/// state (including self-transitions) re-arms its action with fresh draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpec {
    /// Withdraw the machine's previously scheduled action, if one is pending.
    Cancel,
    /// Schedule a padding packet after a sampled timeout.
    Padding {
        /// Time to wait before injecting, in microseconds.
        timeout: Dist,
        /// Padding packet size in bytes; clamped to the framework MTU.
        size: Dist,
        replace: bool,
        bypass: bool,
    },
    /// Schedule an outgoing-traffic block after a sampled timeout.
    Blocking {
        /// Time to wait before blocking, in microseconds.
        timeout: Dist,
        /// How long to block, in microseconds.
        duration: Dist,
        replace: bool,
        bypass: bool,
    },
}

impl ActionSpec {
    /// The distributions this template samples from, for validation.
    pub(crate) fn dists(&self) -> Vec<&Dist> {
        match self {
            Self::Cancel => vec![],
            Self::Padding { timeout, size, .. } => vec![timeout, size],
            Self::Blocking { timeout, duration, .. } => vec![timeout, duration],
        }
    }
}

/// One state of a machine: a transition table indexed by event kind, plus an
/// optional action template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Transition candidates per event kind, in `EventKind` discriminant
    /// order. The discriminant order is part of the wire format.
    pub transitions: [Vec<Trans>; EventKind::COUNT],
    pub action: Option<ActionSpec>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transition candidates for one event kind.
    pub fn on(mut self, event: EventKind, transitions: Vec<Trans>) -> Self {
        self.transitions[event.index()] = transitions;
        self
    }

    /// Sets the action template sampled when this state is entered.
    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.action = Some(action);
        self
    }
}

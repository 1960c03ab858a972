use std::time::Duration;

use chaff_common::EventKind;
use rand::{Rng, RngCore};

use crate::{ActionSpec, Machine, STATE_END};

/// Ceiling on sampled time values, in microseconds (a bit over 31 years).
/// Keeps later `Instant + Duration` arithmetic clear of overflow.
const MAX_SAMPLED_MICROS: f64 = 1e15;

/// A concrete, fully sampled request produced by one machine transition:
/// "after `timeout`, perform this, unless cancelled". The framework resolves
/// it against budgets, the blocking window and the machine's pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Withdraw the machine's previously scheduled action.
    Cancel,
    /// Inject a padding packet of `size` bytes.
    Padding { timeout: Duration, size: u16, replace: bool, bypass: bool },
    /// Block outgoing traffic for `duration`.
    Blocking { timeout: Duration, duration: Duration, replace: bool, bypass: bool },
}

/// Runtime cursor of one machine.
///
/// The [`Machine`] definition stays immutable; the cursor tracks which state
/// the machine is in and whether it has reached [`STATE_END`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MachineState {
    current: usize,
    ended: bool,
}

impl MachineState {
    /// A cursor positioned at the machine's first state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the state the machine is currently in, or `None` once ended.
    pub fn current(&self) -> Option<usize> {
        (!self.ended).then_some(self.current)
    }

    /// Advances the machine for one event and samples the entered state's
    /// action template, if any.
    ///
    /// The weighted candidates for the event are walked cumulatively against
    /// one uniform draw; any shortfall to probability one means "stay put,
    /// no action". Entering a state (including re-entering the current one)
    /// re-samples its action with fresh draws. A [`STATE_END`] target makes
    /// the machine permanently inert.
    ///
    /// Deterministic for a fixed `rng` state.
    pub fn transition<R: RngCore>(
        &mut self,
        machine: &Machine,
        event: EventKind,
        mtu: u16,
        rng: &mut R,
    ) -> Option<ScheduledAction> {
        if self.ended {
            return None;
        }

        let candidates = &machine.states()[self.current].transitions[event.index()];
        if candidates.is_empty() {
            return None;
        }

        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;
        let mut chosen = None;
        for trans in candidates {
            cumulative += trans.weight;
            if draw < cumulative {
                chosen = Some(trans.next);
                break;
            }
        }

        let next = chosen?;
        if next == STATE_END {
            self.ended = true;
            return None;
        }

        self.current = next;
        machine.states()[next]
            .action
            .as_ref()
            .map(|spec| sample_action(spec, mtu, rng))
    }
}

fn sample_action<R: RngCore>(spec: &ActionSpec, mtu: u16, rng: &mut R) -> ScheduledAction {
    match spec {
        ActionSpec::Cancel => ScheduledAction::Cancel,
        ActionSpec::Padding { timeout, size, replace, bypass } => {
            // A sampled size of zero would be an empty packet; the MTU bounds
            // the other end.
            let size = (size.sample(rng).max(1.0) as u64).min(u64::from(mtu.max(1))) as u16;
            ScheduledAction::Padding {
                timeout: duration_from_micros(timeout.sample(rng)),
                size,
                replace: *replace,
                bypass: *bypass,
            }
        }
        ActionSpec::Blocking { timeout, duration, replace, bypass } => ScheduledAction::Blocking {
            timeout: duration_from_micros(timeout.sample(rng)),
            duration: duration_from_micros(duration.sample(rng)),
            replace: *replace,
            bypass: *bypass,
        },
    }
}

fn duration_from_micros(micros: f64) -> Duration {
    Duration::from_micros(micros.clamp(0.0, MAX_SAMPLED_MICROS) as u64)
}

use std::time::Instant;

use rand::RngCore;
use thiserror::Error;
use tracing::{debug, trace};

use chaff_common::{Budget, Event, EventKind, MachineId};
use chaff_machine::{Machine, MachineError, MachineState, ScheduledAction};

use crate::Action;

/// The closed error taxonomy of the framework.
///
/// Budget exhaustion is deliberately absent: running out of padding or
/// blocking allowance silently suppresses non-bypass actions instead of
/// failing the call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("machine description is not valid UTF-8: {0}")]
    MachineStringNotUtf8(#[from] std::str::Utf8Error),
    #[error("invalid machine string: {0}")]
    InvalidMachineString(#[from] MachineError),
    #[error("failed to start framework: {0}")]
    StartFramework(&'static str),
    #[error("unknown machine: {0}")]
    UnknownMachine(u64),
}

/// A padding action that was emitted but not yet reported as executed.
#[derive(Debug, Clone, Copy)]
struct PendingPadding {
    size: u16,
}

/// The single active outgoing-block window.
#[derive(Debug, Clone, Copy)]
struct BlockingWindow {
    from: Instant,
    until: Instant,
    machine: MachineId,
}

/// A running traffic-shaping instance.
///
/// Owns the configured machines, their runtime cursors, the padding and
/// blocking byte budgets, per-machine pending-action bookkeeping and the
/// blocking window. Every operation is synchronous and non-blocking: the
/// framework computes scheduling decisions immediately and returns future
/// actions for the caller to execute; it owns no timers and no threads.
///
/// Not internally synchronized. `&mut self` on [`Framework::on_event`]
/// serializes callers by construction; independent instances are fully
/// independent.
pub struct Framework<R: RngCore> {
    machines: Vec<Machine>,
    cursors: Vec<MachineState>,
    pending: Vec<Option<PendingPadding>>,
    padding_budget: Budget,
    blocking_budget: Budget,
    blocking: Option<BlockingWindow>,
    mtu: u16,
    rng: R,
}

impl<R: RngCore> Framework<R> {
    /// Starts an instance from an LF-separated machine description.
    ///
    /// Machines are allocated in line order and assigned sequential
    /// identifiers `0..N-1`. Blank lines are skipped. Either a fully valid
    /// running instance is returned or nothing is created.
    pub fn start(
        description: &[u8],
        max_padding_bytes: f64,
        max_blocking_bytes: f64,
        mtu: u16,
        rng: R,
    ) -> Result<Self, Error> {
        let text = std::str::from_utf8(description)?;

        let mut machines = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            machines.push(line.parse::<Machine>()?);
        }

        Self::new(machines, max_padding_bytes, max_blocking_bytes, mtu, rng)
    }

    /// Starts an instance from already-parsed machines.
    pub fn new(
        machines: Vec<Machine>,
        max_padding_bytes: f64,
        max_blocking_bytes: f64,
        mtu: u16,
        rng: R,
    ) -> Result<Self, Error> {
        if mtu == 0 {
            return Err(Error::StartFramework("mtu must be nonzero"));
        }

        debug!(machines = machines.len(), mtu, "starting framework");

        Ok(Self {
            cursors: vec![MachineState::new(); machines.len()],
            pending: vec![None; machines.len()],
            machines,
            padding_budget: Budget::from_limit(max_padding_bytes),
            blocking_budget: Budget::from_limit(max_blocking_bytes),
            blocking: None,
            mtu,
            rng,
        })
    }

    /// Feeds one observed event to every machine and returns the accepted
    /// actions in machine-identifier order.
    ///
    /// Each machine's request is resolved immediately, in identifier order:
    /// the replace policy against the machine's pending action, then the
    /// blocking window, then the relevant byte budget. Superseding a pending
    /// action emits a [`Action::Cancel`] right before its successor. Window
    /// and budget updates apply as soon as an action is accepted, so they
    /// are visible to higher-numbered machines within the same call.
    ///
    /// `now` is the caller's monotonic clock reading for this event.
    pub fn on_event(&mut self, event: Event, now: Instant) -> Result<Vec<Action>, Error> {
        // Reject mis-tagged events before anything mutates.
        if let Some(machine) = event.machine {
            if machine.index() >= self.machines.len() {
                return Err(Error::UnknownMachine(machine.into_raw()));
            }
        }

        if let Some(window) = self.blocking {
            if now >= window.until {
                trace!(machine = %window.machine, "blocking window expired");
                self.blocking = None;
            }
        }

        // A machine-tagged PaddingSent reports that the machine's scheduled
        // injection fired; its pending slot frees up.
        if event.kind == EventKind::PaddingSent {
            if let Some(machine) = event.machine {
                self.pending[machine.index()] = None;
            }
        }

        let mut actions = Vec::new();
        for index in 0..self.machines.len() {
            let request = self.cursors[index].transition(
                &self.machines[index],
                event.kind,
                self.mtu,
                &mut self.rng,
            );

            if let Some(request) = request {
                self.resolve(MachineId::new(index), request, now, &mut actions);
            }
        }

        Ok(actions)
    }

    /// Stops the instance, releasing all owned state.
    ///
    /// Consuming `self` makes double-stop and use-after-stop
    /// unrepresentable; dropping the framework is equivalent.
    pub fn stop(self) {
        debug!(machines = self.machines.len(), "stopping framework");
    }

    pub fn num_machines(&self) -> usize {
        self.machines.len()
    }

    /// Padding bytes still spendable on non-bypass actions.
    pub fn padding_budget(&self) -> Budget {
        self.padding_budget
    }

    /// Blocking bytes still spendable on non-bypass actions.
    pub fn blocking_budget(&self) -> Budget {
        self.blocking_budget
    }

    /// End of the active blocking window, if one exists.
    pub fn blocked_until(&self) -> Option<Instant> {
        self.blocking.map(|window| window.until)
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocking
            .is_some_and(|window| window.from <= now && now < window.until)
    }

    fn resolve(
        &mut self,
        machine: MachineId,
        request: ScheduledAction,
        now: Instant,
        out: &mut Vec<Action>,
    ) {
        match request {
            ScheduledAction::Cancel => {
                // Nothing pending means nothing to withdraw.
                if self.pending[machine.index()].take().is_some() {
                    out.push(Action::Cancel { machine });
                }
            }
            ScheduledAction::Padding { timeout, size, replace, bypass } => {
                if self.pending[machine.index()].is_some() && !replace {
                    trace!(%machine, "padding request dropped, action already pending");
                    return;
                }
                if !bypass {
                    if self.is_blocked(now) {
                        trace!(%machine, "padding request suppressed by blocking window");
                        return;
                    }
                    if !self.padding_budget.try_spend(u64::from(size)) {
                        debug!(
                            %machine,
                            size,
                            remaining = self.padding_budget.remaining(),
                            "padding budget exhausted, request suppressed"
                        );
                        return;
                    }
                }

                if self.pending[machine.index()].take().is_some() {
                    out.push(Action::Cancel { machine });
                }
                self.pending[machine.index()] = Some(PendingPadding { size });
                out.push(Action::InjectPadding { machine, timeout, replace, bypass, size });
            }
            ScheduledAction::Blocking { timeout, duration, replace, bypass } => {
                let from = now + timeout;
                let until = from + duration;

                // A non-replace block may only ever extend the active window.
                if !replace {
                    if let Some(window) = self.blocking {
                        if window.until >= until {
                            trace!(%machine, "blocking request dropped, window already covers it");
                            return;
                        }
                    }
                }
                let estimate = self.blocking_estimate(duration);
                if !bypass && !self.blocking_budget.try_spend(estimate) {
                    debug!(
                        %machine,
                        estimate,
                        remaining = self.blocking_budget.remaining(),
                        "blocking budget exhausted, request suppressed"
                    );
                    return;
                }

                match (&mut self.blocking, replace) {
                    // Reached only when the new window outlasts the old one;
                    // the established start of the window is kept.
                    (Some(window), false) => {
                        window.until = until;
                        window.machine = machine;
                    }
                    _ => self.blocking = Some(BlockingWindow { from, until, machine }),
                }
                out.push(Action::BlockOutgoing { machine, timeout, replace, bypass, duration });
            }
        }
    }

    /// Bytes withheld by a block of `duration`, estimated as one MTU-sized
    /// packet per started second.
    fn blocking_estimate(&self, duration: std::time::Duration) -> u64 {
        u64::from(self.mtu).saturating_mul(duration.as_secs().saturating_add(1))
    }
}

impl<R: RngCore> std::fmt::Debug for Framework<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framework")
            .field("machines", &self.machines.len())
            .field("padding_budget", &self.padding_budget)
            .field("blocking_budget", &self.blocking_budget)
            .field("blocking", &self.blocking)
            .field("mtu", &self.mtu)
            .finish()
    }
}

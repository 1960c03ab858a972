use std::time::Duration;

use chaff_common::MachineId;

/// A directive the transport layer must execute.
///
/// The framework computes all scheduling synchronously and returns actions
/// with timeouts; the caller owns the actual waiting. Once an action is
/// executed, the transport reports the outcome back as an event tagged with
/// the same machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Withdraw the previously emitted, not-yet-executed action for this
    /// machine. The caller must stop the corresponding in-flight timer.
    Cancel { machine: MachineId },
    /// Send a padding packet of `size` bytes after `timeout`.
    InjectPadding {
        machine: MachineId,
        timeout: Duration,
        replace: bool,
        bypass: bool,
        size: u16,
    },
    /// Hold back outgoing traffic for `duration`, starting after `timeout`.
    BlockOutgoing {
        machine: MachineId,
        timeout: Duration,
        replace: bool,
        bypass: bool,
        duration: Duration,
    },
}

impl Action {
    /// The machine that demanded the action.
    pub fn machine(&self) -> MachineId {
        match self {
            Self::Cancel { machine } |
            Self::InjectPadding { machine, .. } |
            Self::BlockOutgoing { machine, .. } => *machine,
        }
    }
}

use crate::MachineId;

/// The four kinds of observable traffic events.
///
/// "Normal" packets carry application data; "padding" packets were injected
/// by a machine. Machine transition tables are indexed by this enum, so the
/// discriminant order is part of the machine wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// We sent a normal packet.
    NormalSent,
    /// We received a normal packet.
    NormalReceived,
    /// We sent a padding packet.
    PaddingSent,
    /// We received a padding packet.
    PaddingReceived,
}

impl EventKind {
    /// Number of event kinds, i.e. the width of a per-state transition table.
    pub const COUNT: usize = 4;

    /// The position of this kind in a transition table.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One observed traffic event, created once per packet and consumed
/// synchronously by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// The number of bytes that was sent or received.
    pub xmit_bytes: u16,
    /// The machine that triggered the packet, if any. Set by the transport
    /// when it executes a scheduled action and reports the outcome back.
    pub machine: Option<MachineId>,
}

impl Event {
    /// An event not attributed to any machine.
    pub fn untagged(kind: EventKind, xmit_bytes: u16) -> Self {
        Self { kind, xmit_bytes, machine: None }
    }

    /// An event attributed to the machine that caused the packet.
    pub fn tagged(kind: EventKind, xmit_bytes: u16, machine: MachineId) -> Self {
        Self { kind, xmit_bytes, machine: Some(machine) }
    }
}

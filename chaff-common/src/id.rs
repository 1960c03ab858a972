/// Identifies one machine within a running framework instance.
///
/// Identifiers are assigned at load time as the machine's position among the
/// configured machines (0..N-1) and stay stable for the lifetime of the
/// instance. They round-trip across the boundary: an action tagged with
/// machine `M`, once executed by the transport, produces an event tagged
/// with machine `M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineId(usize);

impl MachineId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Reconstructs an identifier from its raw boundary representation.
    ///
    /// No validation happens here; the framework rejects unknown machines
    /// when the event is fed to it.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw as usize)
    }

    pub fn into_raw(self) -> u64 {
        self.0 as u64
    }

    /// The machine's position in the framework's machine arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

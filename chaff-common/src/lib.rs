mod budget;
mod event;
mod id;

pub use budget::Budget;
pub use event::{Event, EventKind};
pub use id::MachineId;

mod dist;
mod machine;
mod runtime;
mod state;

pub use dist::{Dist, DistError, DistKind};
pub use machine::{Machine, MachineError};
pub use runtime::{MachineState, ScheduledAction};
pub use state::{ActionSpec, State, Trans, STATE_END};

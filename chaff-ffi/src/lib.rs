//! C boundary for the chaff framework.
//!
//! A stable, binary-compatible marshalling layer over
//! [`chaff_framework::Framework`]:
//!
//! - Create an instance with [`chaff_start`].
//! - Feed it events with [`chaff_on_event`].
//! - Tear it down with [`chaff_stop`].
//!
//! Calls on one handle must be serialized by the caller; independent handles
//! are fully independent. The engine computes scheduling synchronously, so
//! none of these calls block.

use std::ffi::{c_char, CStr};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use chaff_common::{Event, EventKind, MachineId};
use chaff_framework::{Action, Error, Framework};

/// A running framework instance, opaque to the caller.
pub struct ChaffHandle {
    framework: Framework<StdRng>,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaffError {
    Ok = 0,
    MachineStringNotUtf8 = 1,
    InvalidMachineString = 2,
    StartFramework = 3,
    UnknownMachine = 4,
}

impl From<&Error> for ChaffError {
    fn from(err: &Error) -> Self {
        match err {
            Error::MachineStringNotUtf8(_) => Self::MachineStringNotUtf8,
            Error::InvalidMachineString(_) => Self::InvalidMachineString,
            Error::StartFramework(_) => Self::StartFramework,
            Error::UnknownMachine(_) => Self::UnknownMachine,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaffEventType {
    /// We sent a normal packet.
    NormalSent = 0,
    /// We received a normal packet.
    NormalReceived = 1,
    /// We sent a padding packet.
    PaddingSent = 2,
    /// We received a padding packet.
    PaddingReceived = 3,
}

impl From<ChaffEventType> for EventKind {
    fn from(kind: ChaffEventType) -> Self {
        match kind {
            ChaffEventType::NormalSent => Self::NormalSent,
            ChaffEventType::NormalReceived => Self::NormalReceived,
            ChaffEventType::PaddingSent => Self::PaddingSent,
            ChaffEventType::PaddingReceived => Self::PaddingReceived,
        }
    }
}

/// The raw machine value meaning "no machine".
pub const CHAFF_NO_MACHINE: u64 = u64::MAX;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ChaffEvent {
    pub event_type: ChaffEventType,
    /// The number of bytes that was sent or received.
    pub xmit_bytes: u16,
    /// The machine that triggered the event, or [`CHAFF_NO_MACHINE`].
    pub machine: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ChaffDuration {
    /// Number of whole seconds.
    pub secs: u64,
    /// A nanosecond fraction of a second.
    pub nanos: u32,
}

impl From<Duration> for ChaffDuration {
    fn from(duration: Duration) -> Self {
        Self { secs: duration.as_secs(), nanos: duration.subsec_nanos() }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaffActionTag {
    Cancel = 0,
    InjectPadding = 1,
    BlockOutgoing = 2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ChaffCancelBody {
    /// The machine that generated the action.
    pub machine: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ChaffInjectPaddingBody {
    /// The machine that generated the action.
    pub machine: u64,
    /// The time to wait before injecting a padding packet.
    pub timeout: ChaffDuration,
    pub replace: bool,
    pub bypass: bool,
    /// The size of the padding packet.
    pub size: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ChaffBlockOutgoingBody {
    /// The machine that generated the action.
    pub machine: u64,
    /// The time to wait before blocking.
    pub timeout: ChaffDuration,
    pub replace: bool,
    pub bypass: bool,
    /// How long to block.
    pub duration: ChaffDuration,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union ChaffActionBody {
    pub cancel: ChaffCancelBody,
    pub inject_padding: ChaffInjectPaddingBody,
    pub block_outgoing: ChaffBlockOutgoingBody,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ChaffAction {
    pub tag: ChaffActionTag,
    pub body: ChaffActionBody,
}

impl From<&Action> for ChaffAction {
    fn from(action: &Action) -> Self {
        match *action {
            Action::Cancel { machine } => Self {
                tag: ChaffActionTag::Cancel,
                body: ChaffActionBody {
                    cancel: ChaffCancelBody { machine: machine.into_raw() },
                },
            },
            Action::InjectPadding { machine, timeout, replace, bypass, size } => Self {
                tag: ChaffActionTag::InjectPadding,
                body: ChaffActionBody {
                    inject_padding: ChaffInjectPaddingBody {
                        machine: machine.into_raw(),
                        timeout: timeout.into(),
                        replace,
                        bypass,
                        size,
                    },
                },
            },
            Action::BlockOutgoing { machine, timeout, replace, bypass, duration } => Self {
                tag: ChaffActionTag::BlockOutgoing,
                body: ChaffActionBody {
                    block_outgoing: ChaffBlockOutgoingBody {
                        machine: machine.into_raw(),
                        timeout: timeout.into(),
                        replace,
                        bypass,
                        duration: duration.into(),
                    },
                },
            },
        }
    }
}

/// Starts a new framework instance and writes its handle to `out`.
///
/// `machines_str` must point to a null-terminated UTF-8 string of
/// LF-separated machine descriptions. On anything but [`ChaffError::Ok`] no
/// instance is created and `out` is untouched.
///
/// # Safety
///
/// `machines_str` must be a valid null-terminated C string and `out` a valid
/// pointer to write one pointer through.
#[no_mangle]
pub unsafe extern "C" fn chaff_start(
    machines_str: *const c_char,
    max_padding_bytes: f64,
    max_blocking_bytes: f64,
    mtu: u16,
    out: *mut *mut ChaffHandle,
) -> ChaffError {
    if machines_str.is_null() || out.is_null() {
        return ChaffError::StartFramework;
    }

    let description = CStr::from_ptr(machines_str).to_bytes();
    match Framework::start(
        description,
        max_padding_bytes,
        max_blocking_bytes,
        mtu,
        StdRng::from_entropy(),
    ) {
        Ok(framework) => {
            *out = Box::into_raw(Box::new(ChaffHandle { framework }));
            ChaffError::Ok
        }
        Err(err) => (&err).into(),
    }
}

/// Feeds one event to the instance and writes the resulting actions into the
/// caller-provided buffer.
///
/// `actions` must have room for at least two actions per configured machine
/// (a cancel plus its superseding action is the per-machine worst case).
/// The number of actions written is stored in `num_actions_out`; the caller
/// executes each one after its timeout and reports the outcome back as an
/// event tagged with the acting machine.
///
/// # Safety
///
/// `handle` must come from [`chaff_start`] and not have been stopped;
/// `actions` must point to a writable buffer of the capacity above;
/// `num_actions_out` must be a valid pointer. Calls on one handle must be
/// externally serialized.
#[no_mangle]
pub unsafe extern "C" fn chaff_on_event(
    handle: *mut ChaffHandle,
    event: ChaffEvent,
    actions: *mut ChaffAction,
    num_actions_out: *mut u64,
) -> ChaffError {
    let Some(handle) = handle.as_mut() else {
        return ChaffError::UnknownMachine;
    };
    if actions.is_null() || num_actions_out.is_null() {
        return ChaffError::UnknownMachine;
    }

    let machine =
        (event.machine != CHAFF_NO_MACHINE).then(|| MachineId::from_raw(event.machine));
    let event = Event {
        kind: event.event_type.into(),
        xmit_bytes: event.xmit_bytes,
        machine,
    };

    match handle.framework.on_event(event, Instant::now()) {
        Ok(emitted) => {
            for (index, action) in emitted.iter().enumerate() {
                *actions.add(index) = action.into();
            }
            *num_actions_out = emitted.len() as u64;
            ChaffError::Ok
        }
        Err(err) => {
            *num_actions_out = 0;
            (&err).into()
        }
    }
}

/// Stops a running instance and frees its handle.
///
/// # Safety
///
/// `handle` must come from [`chaff_start`] and must not be used afterwards.
/// Passing null is a no-op.
#[no_mangle]
pub unsafe extern "C" fn chaff_stop(handle: *mut ChaffHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

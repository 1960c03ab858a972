use std::time::Instant;

use chaff_common::{Event, EventKind};
use chaff_framework::{Error, Framework};

use crate::helpers;

/// Serializes machines into the LF-separated description format.
fn description(machines: &[chaff_machine::Machine]) -> Vec<u8> {
    machines
        .iter()
        .map(|m| m.serialize().unwrap())
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

#[test]
fn start_then_stop_end_to_end() {
    let _ = tracing_subscriber::fmt::try_init();

    let text = description(&[
        helpers::padding_machine(100.0, false, false),
        helpers::blocking_machine(1_000_000.0, false, false),
    ]);

    let framework = Framework::start(&text, 1000.0, 1000.0, 1500, helpers::rng()).unwrap();
    assert_eq!(framework.num_machines(), 2);
    framework.stop();
}

#[test]
fn parsed_machines_behave_like_their_source() {
    let text = description(&[helpers::padding_machine(100.0, false, false)]);
    let mut framework = Framework::start(&text, 1000.0, 0.0, 1500, helpers::rng()).unwrap();

    let actions = framework
        .on_event(Event::untagged(EventKind::NormalSent, 1500), Instant::now())
        .unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(framework.padding_budget().remaining(), 900);
}

#[test]
fn start_rejects_invalid_utf8() {
    let err = Framework::start(&[0x80, 0xff, 0xfe], 0.0, 0.0, 1500, helpers::rng()).unwrap_err();
    assert!(matches!(err, Error::MachineStringNotUtf8(_)));
}

#[test]
fn start_rejects_unparseable_machines() {
    let err = Framework::start(b"not a machine!", 0.0, 0.0, 1500, helpers::rng()).unwrap_err();
    assert!(matches!(err, Error::InvalidMachineString(_)));

    // Valid base64, but the payload is not a compressed machine.
    let err = Framework::start(b"Z2FyYmFnZQ==", 0.0, 0.0, 1500, helpers::rng()).unwrap_err();
    assert!(matches!(err, Error::InvalidMachineString(_)));
}

#[test]
fn start_rejects_zero_mtu() {
    let err = Framework::start(b"", 0.0, 0.0, 0, helpers::rng()).unwrap_err();
    assert!(matches!(err, Error::StartFramework(_)));
}

#[test]
fn blank_lines_are_skipped() {
    let machine = helpers::padding_machine(100.0, false, false);
    let text = format!("\n{}\n\n", machine.serialize().unwrap());

    let framework = Framework::start(text.as_bytes(), 0.0, 0.0, 1500, helpers::rng()).unwrap();
    assert_eq!(framework.num_machines(), 1);
}

#[test]
fn empty_description_runs_with_zero_machines() {
    let mut framework = Framework::start(b"", 0.0, 0.0, 1500, helpers::rng()).unwrap();
    assert_eq!(framework.num_machines(), 0);

    let actions = framework
        .on_event(Event::untagged(EventKind::NormalSent, 1500), Instant::now())
        .unwrap();
    assert!(actions.is_empty());
}

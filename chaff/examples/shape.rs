//! Drives a framework instance the way a transport layer would: execute each
//! action after its timeout, then report the outcome back as an event.
//!
//! The engine itself never waits; all timers live out here with the caller.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::sleep;

use chaff::{
    Action, ActionSpec, Dist, DistKind, Event, EventKind, Framework, Machine, State, Trans,
};

/// Pads roughly every tenth outgoing packet with 150-600 bytes of chaff,
/// 5-20 ms after the packet that triggered it.
fn responder() -> Machine {
    let state = State::new()
        .on(EventKind::NormalSent, vec![Trans::new(0, 0.1)])
        .with_action(ActionSpec::Padding {
            timeout: Dist {
                kind: DistKind::Uniform { low: 5_000.0, high: 20_000.0 },
                offset: 0.0,
                clamp: 0.0,
            },
            size: Dist {
                kind: DistKind::Uniform { low: 150.0, high: 600.0 },
                offset: 0.0,
                clamp: 0.0,
            },
            replace: false,
            bypass: false,
        });

    Machine::new(vec![state]).expect("valid machine")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut framework =
        Framework::new(vec![responder()], 100_000.0, 0.0, 1500, StdRng::from_entropy())
            .expect("valid configuration");

    for _ in 0..50 {
        // Pretend the application just sent a packet.
        let actions = framework
            .on_event(Event::untagged(EventKind::NormalSent, 1200), Instant::now())
            .expect("untagged events cannot fail");

        for action in actions {
            match action {
                Action::InjectPadding { machine, timeout, size, .. } => {
                    sleep(timeout).await;
                    println!("injecting {size} bytes of padding for machine {machine}");

                    // Report the injection so the machine's pending slot
                    // frees up for the next one.
                    framework
                        .on_event(Event::tagged(EventKind::PaddingSent, size, machine), Instant::now())
                        .expect("machine tag comes from the framework");
                }
                Action::Cancel { machine } => {
                    println!("cancelling pending action of machine {machine}");
                }
                Action::BlockOutgoing { machine, duration, .. } => {
                    println!("blocking outgoing traffic for {duration:?} (machine {machine})");
                }
            }
        }

        sleep(Duration::from_millis(25)).await;
    }

    println!(
        "padding budget remaining: {} bytes",
        framework.padding_budget().remaining()
    );
    framework.stop();
}

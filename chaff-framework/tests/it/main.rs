//! Integration tests for the chaff framework.

mod lifecycle;
mod scheduling;

/// Helper machine builders.
mod helpers {
    use chaff_common::EventKind;
    use chaff_machine::{ActionSpec, Dist, Machine, State, Trans};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub fn rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    /// A machine that requests a padding packet of `size` bytes, with zero
    /// timeout, on every `NormalSent`.
    pub fn padding_machine(size: f64, replace: bool, bypass: bool) -> Machine {
        let state = State::new()
            .on(EventKind::NormalSent, vec![Trans::new(0, 1.0)])
            .with_action(ActionSpec::Padding {
                timeout: Dist::constant(0.0),
                size: Dist::constant(size),
                replace,
                bypass,
            });

        Machine::new(vec![state]).unwrap()
    }

    /// A machine that requests an outgoing block of `duration_micros`, with
    /// zero timeout, on every `NormalSent`.
    pub fn blocking_machine(duration_micros: f64, replace: bool, bypass: bool) -> Machine {
        let state = State::new()
            .on(EventKind::NormalSent, vec![Trans::new(0, 1.0)])
            .with_action(ActionSpec::Blocking {
                timeout: Dist::constant(0.0),
                duration: Dist::constant(duration_micros),
                replace,
                bypass,
            });

        Machine::new(vec![state]).unwrap()
    }

    /// A machine that arms a slow padding action on `NormalSent` and
    /// withdraws it on the next `NormalReceived`.
    pub fn cancelling_machine(size: f64) -> Machine {
        let idle = State::new().on(EventKind::NormalSent, vec![Trans::new(1, 1.0)]);
        let armed = State::new()
            .on(EventKind::NormalReceived, vec![Trans::new(2, 1.0)])
            .with_action(ActionSpec::Padding {
                timeout: Dist::constant(1_000_000.0),
                size: Dist::constant(size),
                replace: false,
                bypass: false,
            });
        let cancelled = State::new().with_action(ActionSpec::Cancel);

        Machine::new(vec![idle, armed, cancelled]).unwrap()
    }
}

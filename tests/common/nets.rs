//! Fixture nets shared across the integration suite.

use std::sync::Arc;

use serde_json::{json, Value};
use tokenweave::marking::Marking;
use tokenweave::net::{NetBuilder, PetriNet, Place, TransitionDef};
use tokenweave::transition::Transition;
use tokenweave::types::PlaceId;

use super::transitions::{FanOut, Relay, SleepyRelay};

/// The unit token.
pub fn unit() -> Value {
    json!(null)
}

/// A marking with a single unit token at `place`.
pub fn unit_marking(place: u32) -> Marking {
    Marking::new().with_token(PlaceId(place), unit())
}

/// `p1 → t1 → p2 → t2 → p3`, both transitions relaying unit tokens.
/// `t2` is automatic when `auto_t2` is set.
pub fn chain_net(auto_t2: bool) -> Arc<PetriNet> {
    let t2 = if auto_t2 {
        TransitionDef::new(2, "t2").automated()
    } else {
        TransitionDef::new(2, "t2")
    };
    Arc::new(
        NetBuilder::new()
            .add_place(Place::new(1, "p1", "unit"))
            .add_place(Place::new(2, "p2", "unit"))
            .add_place(Place::new(3, "p3", "unit"))
            .add_transition(TransitionDef::new(1, "t1"), Relay::new("a", "b"))
            .add_transition(t2, Relay::new("b", "c"))
            .add_input_arc(1, 1, 1, "a")
            .add_output_arc(1, 2, 1, "b")
            .add_input_arc(2, 2, 1, "b")
            .add_output_arc(2, 3, 1, "c")
            .build()
            .expect("chain net builds"),
    )
}

/// `p1 → t1 → p2` with a custom handler on `t1`.
pub fn two_place_net(handler: impl Transition + 'static) -> Arc<PetriNet> {
    Arc::new(
        NetBuilder::new()
            .add_place(Place::new(1, "p1", "unit"))
            .add_place(Place::new(2, "p2", "unit"))
            .add_transition(TransitionDef::new(1, "t1"), handler)
            .add_input_arc(1, 1, 1, "in")
            .add_output_arc(1, 2, 1, "out")
            .build()
            .expect("two-place net builds"),
    )
}

/// `p1 → t1(auto) → p2` with a custom handler on the automatic `t1`.
pub fn auto_two_place_net(handler: impl Transition + 'static) -> Arc<PetriNet> {
    Arc::new(
        NetBuilder::new()
            .add_place(Place::new(1, "p1", "unit"))
            .add_place(Place::new(2, "p2", "unit"))
            .add_transition(TransitionDef::new(1, "t1").automated(), handler)
            .add_input_arc(1, 1, 1, "in")
            .add_output_arc(1, 2, 1, "out")
            .build()
            .expect("auto two-place net builds"),
    )
}

/// `t1 → p1, t1 → p2; p1 → t2(auto) → p3; p2 → t3(auto) → p4` where `t2` and
/// `t3` each sleep `sleep_ms` before forwarding. `t1` has no input places.
pub fn fanout_net(sleep_ms: u64) -> Arc<PetriNet> {
    Arc::new(
        NetBuilder::new()
            .add_place(Place::new(1, "p1", "unit"))
            .add_place(Place::new(2, "p2", "unit"))
            .add_place(Place::new(3, "p3", "unit"))
            .add_place(Place::new(4, "p4", "unit"))
            .add_transition(
                TransitionDef::new(1, "t1"),
                FanOut {
                    left: "left",
                    right: "right",
                },
            )
            .add_transition(
                TransitionDef::new(2, "t2").automated(),
                SleepyRelay {
                    input: "left",
                    output: "done_left",
                    millis: sleep_ms,
                },
            )
            .add_transition(
                TransitionDef::new(3, "t3").automated(),
                SleepyRelay {
                    input: "right",
                    output: "done_right",
                    millis: sleep_ms,
                },
            )
            .add_output_arc(1, 1, 1, "left")
            .add_output_arc(1, 2, 1, "right")
            .add_input_arc(1, 2, 1, "left")
            .add_output_arc(2, 3, 1, "done_left")
            .add_input_arc(2, 3, 1, "right")
            .add_output_arc(3, 4, 1, "done_right")
            .build()
            .expect("fanout net builds"),
    )
}

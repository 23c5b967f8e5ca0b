#![allow(dead_code)]

pub mod nets;
pub mod transitions;

pub use nets::*;
pub use transitions::*;

use std::time::Duration;

use tokenweave::instance::{InstanceHandle, ProcessState};

/// Poll `get_state` until the instance reaches `target` sequence or the
/// timeout elapses. Completion order of concurrent firings is unspecified, so
/// tests wait on the sequence number instead of sleeping fixed amounts.
pub async fn wait_for_sequence(
    handle: &InstanceHandle,
    target: u64,
    timeout_ms: u64,
) -> ProcessState {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let state = handle.get_state().await.expect("get_state");
        if state.sequence >= target {
            return state;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "timed out waiting for sequence {target}, instance is at {}",
                state.sequence
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

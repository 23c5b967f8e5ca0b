//! Fixture transitions shared across the integration suite.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokenweave::transition::{
    FailureStrategy, FiringContext, FiringInput, FiringOutput, Transition, TransitionError,
};

/// Moves every token under `input` to the `output` field, emitting a fixed
/// domain event.
pub struct Relay {
    pub input: &'static str,
    pub output: &'static str,
    pub event: Value,
}

impl Relay {
    pub fn new(input: &'static str, output: &'static str) -> Self {
        Self {
            input,
            output,
            event: json!({ "Added": 1 }),
        }
    }
}

#[async_trait]
impl Transition for Relay {
    async fn fire(
        &self,
        input: FiringInput,
        _ctx: FiringContext,
    ) -> Result<FiringOutput, TransitionError> {
        Ok(FiringOutput::new()
            .with_field(self.output, input.field(self.input).to_vec())
            .with_event(self.event.clone()))
    }
}

/// Like [`Relay`], but sleeps before forwarding.
pub struct SleepyRelay {
    pub input: &'static str,
    pub output: &'static str,
    pub millis: u64,
}

#[async_trait]
impl Transition for SleepyRelay {
    async fn fire(
        &self,
        input: FiringInput,
        _ctx: FiringContext,
    ) -> Result<FiringOutput, TransitionError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.millis)).await;
        Ok(FiringOutput::new()
            .with_field(self.output, input.field(self.input).to_vec())
            .with_event(json!({ "Forwarded": input.field(self.input).len() })))
    }
}

/// Always fails; the default strategy (fatal) applies.
pub struct AlwaysFails;

#[async_trait]
impl Transition for AlwaysFails {
    async fn fire(
        &self,
        _input: FiringInput,
        _ctx: FiringContext,
    ) -> Result<FiringOutput, TransitionError> {
        Err(TransitionError::failed("intentional failure"))
    }
}

/// Always fails and asks to be blocked.
pub struct AlwaysBlocks;

#[async_trait]
impl Transition for AlwaysBlocks {
    async fn fire(
        &self,
        _input: FiringInput,
        _ctx: FiringContext,
    ) -> Result<FiringOutput, TransitionError> {
        Err(TransitionError::failed("blocked on purpose"))
    }

    fn on_exception(&self, _error: &TransitionError, _attempt: u32) -> FailureStrategy {
        FailureStrategy::BlockTransition
    }
}

/// Always fails with an exponential retry ladder:
/// attempt `n` below `max_attempts` yields `RetryWithDelay(base · 2ⁿ)`,
/// `max_attempts` yields `Fatal`.
pub struct RetryLadder {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

#[async_trait]
impl Transition for RetryLadder {
    async fn fire(
        &self,
        _input: FiringInput,
        _ctx: FiringContext,
    ) -> Result<FiringOutput, TransitionError> {
        Err(TransitionError::failed("still failing"))
    }

    fn on_exception(&self, _error: &TransitionError, attempt: u32) -> FailureStrategy {
        if attempt < self.max_attempts {
            FailureStrategy::RetryWithDelay(self.base_delay_ms * 2u64.pow(attempt))
        } else {
            FailureStrategy::Fatal
        }
    }
}

/// No-input transition producing one unit token under each of two fields.
pub struct FanOut {
    pub left: &'static str,
    pub right: &'static str,
}

#[async_trait]
impl Transition for FanOut {
    async fn fire(
        &self,
        _input: FiringInput,
        _ctx: FiringContext,
    ) -> Result<FiringOutput, TransitionError> {
        Ok(FiringOutput::new()
            .with_token(self.left, json!(null))
            .with_token(self.right, json!(null))
            .with_event(json!({ "Spawned": 2 })))
    }
}

//! The transition authoring surface: what user code supplies to a net.
//!
//! A [`Transition`] is the effectful function fired by the engine. Its input
//! and output are structured records whose fields are keyed by the *selectors*
//! of the arcs connecting the transition to its places; the engine assembles
//! the input from consumed tokens and routes the output fields back into
//! places. A transition also owns its exception strategy: when `fire` fails,
//! [`Transition::on_exception`] decides whether the engine blocks the
//! transition, retries it after a delay, or disables it for good.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::marking::Token;
use crate::types::{JobId, TransitionId};

/// Structured input assembled for one firing.
///
/// `fields` holds, per input-arc selector, the tokens consumed from the
/// corresponding place (exactly the arc weight, in place sequence order).
/// `payload` is the optional command payload of a manual fire request;
/// automatic firings carry `None`.
#[derive(Clone, Debug, Default)]
pub struct FiringInput {
    pub fields: FxHashMap<String, Vec<Token>>,
    pub payload: Option<Value>,
}

impl FiringInput {
    /// Tokens under `selector` (empty slice when the selector is absent).
    pub fn field(&self, selector: &str) -> &[Token] {
        self.fields.get(selector).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single token under `selector`, when the arc weight is 1.
    pub fn single(&self, selector: &str) -> Result<&Token, TransitionError> {
        self.field(selector)
            .first()
            .ok_or(TransitionError::MissingInput { what: "field" })
    }
}

/// Structured output of one firing.
///
/// `fields` holds, per output-arc selector, the tokens to route into the
/// connected place (the arc weight dictates how many the executor drains).
/// `event` is the domain event surfaced to user code through the journal for
/// idempotent event-sourced state derivation.
#[derive(Clone, Debug, Default)]
pub struct FiringOutput {
    pub fields: FxHashMap<String, Vec<Token>>,
    pub event: Value,
}

impl FiringOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: route `tokens` out under `selector`.
    #[must_use]
    pub fn with_field(mut self, selector: impl Into<String>, tokens: Vec<Token>) -> Self {
        self.fields.entry(selector.into()).or_default().extend(tokens);
        self
    }

    /// Single-token convenience for [`with_field`](Self::with_field).
    #[must_use]
    pub fn with_token(self, selector: impl Into<String>, token: Token) -> Self {
        self.with_field(selector, vec![token])
    }

    /// Builder-style: attach the domain event payload.
    #[must_use]
    pub fn with_event(mut self, event: Value) -> Self {
        self.event = event;
        self
    }
}

/// Execution context handed to a transition for one firing.
#[derive(Clone, Debug)]
pub struct FiringContext {
    /// The transition being fired.
    pub transition: TransitionId,
    /// Unique id of this firing.
    pub job: JobId,
    /// 1-based attempt counter; greater than 1 only for retries.
    pub attempt: u32,
}

/// What the engine should do with a transition after a failed firing.
///
/// Returned by [`Transition::on_exception`]; journaled verbatim with the
/// failure event, so recovery reproduces the same decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStrategy {
    /// Disable the transition until the instance is rebuilt.
    BlockTransition,
    /// Re-attempt the firing after the given delay in milliseconds.
    RetryWithDelay(u64),
    /// Permanently disable the transition for this instance.
    Fatal,
}

/// Errors a transition's user function can raise.
///
/// These never escape the executor as engine errors: they are captured,
/// stringified into the journaled failure event, and routed through the
/// transition's exception strategy.
#[derive(Debug, Error, Diagnostic)]
pub enum TransitionError {
    /// An expected input field or token was absent.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(tokenweave::transition::missing_input),
        help("Check the arc selectors wiring this transition.")
    )]
    MissingInput { what: &'static str },

    /// The output did not supply enough tokens for an output arc.
    #[error("output field '{selector}' holds {got} token(s), arc weight needs {needed}")]
    #[diagnostic(
        code(tokenweave::transition::output_arity),
        help("Each output arc drains exactly its weight in tokens from its selector.")
    )]
    OutputArity {
        selector: String,
        needed: u64,
        got: usize,
    },

    /// JSON (de)serialization of a token payload failed.
    #[error(transparent)]
    #[diagnostic(code(tokenweave::transition::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Domain-level failure reported by user code.
    #[error("{0}")]
    #[diagnostic(code(tokenweave::transition::failed))]
    Failed(String),

    /// The user function panicked; the panic was contained by the executor.
    #[error("transition panicked: {0}")]
    #[diagnostic(code(tokenweave::transition::panicked))]
    Panicked(String),
}

impl TransitionError {
    /// Domain-level failure from any displayable message.
    pub fn failed(msg: impl Into<String>) -> Self {
        TransitionError::Failed(msg.into())
    }
}

/// A transition's user function plus its exception strategy.
///
/// Implementations must be `Send + Sync`: firings run on the worker pool and
/// may execute in parallel with other transitions. The function should be
/// effectful only through its output; the engine guarantees that no marking
/// change is visible unless the firing's event was journaled.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use tokenweave::transition::{
///     FiringContext, FiringInput, FiringOutput, Transition, TransitionError,
/// };
/// use serde_json::json;
///
/// /// Moves the tokens under "doc" to the output field "reviewed".
/// struct Review;
///
/// #[async_trait]
/// impl Transition for Review {
///     async fn fire(
///         &self,
///         input: FiringInput,
///         _ctx: FiringContext,
///     ) -> Result<FiringOutput, TransitionError> {
///         let docs = input.field("doc").to_vec();
///         Ok(FiringOutput::new()
///             .with_field("reviewed", docs)
///             .with_event(json!({"Reviewed": 1})))
///     }
/// }
/// ```
#[async_trait]
pub trait Transition: Send + Sync {
    /// Execute one firing over the assembled input.
    async fn fire(
        &self,
        input: FiringInput,
        ctx: FiringContext,
    ) -> Result<FiringOutput, TransitionError>;

    /// Decide what to do after a failed firing. `attempt` is 1-based and
    /// counts consecutive failures since the last success.
    fn on_exception(&self, _error: &TransitionError, _attempt: u32) -> FailureStrategy {
        FailureStrategy::Fatal
    }
}

//! ```text
//! NetBuilder ─► PetriNet ─► NetInstance::spawn ─► InstanceHandle
//!                              │
//!                              ├─► token game ─► executor ─► user Transition
//!                              │                             │
//!                              ├─► dispatcher (automatic firings, retries)
//!                              │
//!                              └─► Journal (InMemory / SQLite) ─► replay on restart
//! ```
//!
//! tokenweave is a persistent, concurrent colored Petri net execution engine.
//! A net is an immutable bipartite graph of places and transitions; tokens
//! (JSON payloads) reside in places, and a transition fires by consuming
//! tokens from its input places and producing tokens into its output places
//! through a user-supplied async function. Every firing is journaled before
//! its effect becomes observable, so an instance's marking can be rebuilt
//! after a crash by replaying its event log. Automatic transitions are fired
//! concurrently by the built-in scheduler whenever they are enabled, with
//! per-transition exception strategies (block, retry with delay, fatal),
//! while manual transitions expose a request/response surface through
//! [`InstanceHandle`](instance::InstanceHandle).

pub mod executor;
pub mod instance;
pub mod journal;
pub mod marking;
pub mod net;
pub mod runtime_config;
pub mod token_game;
pub mod transition;
pub mod types;

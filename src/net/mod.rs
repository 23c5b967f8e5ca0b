//! Net topology: immutable bipartite graphs of places and transitions.
//!
//! A [`PetriNet`] is built once through the [`NetBuilder`] fluent API and then
//! shared immutably (the engine holds it behind an `Arc`). The net owns its
//! nodes, the registered [`Transition`](crate::transition::Transition)
//! handlers, and the weighted, selector-carrying arcs between them.

pub mod builder;
pub mod topology;

pub use builder::{NetBuildError, NetBuilder};
pub use topology::{ArcSpec, PetriNet, Place, TransitionDef};

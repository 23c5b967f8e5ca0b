//! Fluent construction of nets with build-time validation.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use super::topology::{ArcSpec, PetriNet, Place, TransitionDef, TransitionNode};
use crate::transition::Transition;
use crate::types::{PlaceId, TransitionId};

/// Errors detected when compiling a [`NetBuilder`] into a [`PetriNet`].
#[derive(Debug, Error, Diagnostic)]
pub enum NetBuildError {
    #[error("duplicate place id {0}")]
    #[diagnostic(code(tokenweave::net::duplicate_place))]
    DuplicatePlace(PlaceId),

    #[error("duplicate transition id {0}")]
    #[diagnostic(code(tokenweave::net::duplicate_transition))]
    DuplicateTransition(TransitionId),

    #[error("arc references unknown place {0}")]
    #[diagnostic(
        code(tokenweave::net::unknown_place),
        help("Add the place before wiring arcs to it.")
    )]
    UnknownPlace(PlaceId),

    #[error("arc references unknown transition {0}")]
    #[diagnostic(
        code(tokenweave::net::unknown_transition),
        help("Register the transition before wiring arcs to it.")
    )]
    UnknownTransition(TransitionId),

    #[error("arc between {place} and {transition} has weight 0")]
    #[diagnostic(
        code(tokenweave::net::zero_weight),
        help("Arc weights are natural numbers ≥ 1.")
    )]
    ZeroWeight {
        place: PlaceId,
        transition: TransitionId,
    },
}

enum ArcEnd {
    Input,
    Output,
}

struct PendingArc {
    place: PlaceId,
    transition: TransitionId,
    spec: ArcSpec,
    end: ArcEnd,
}

/// Builder for [`PetriNet`] values.
///
/// Arcs can only be declared place→transition
/// ([`add_input_arc`](Self::add_input_arc)) or transition→place
/// ([`add_output_arc`](Self::add_output_arc)), so the resulting graph is
/// bipartite by construction. Endpoint existence and positive weights are
/// validated by [`build`](Self::build).
///
/// # Examples
///
/// ```rust
/// use tokenweave::net::{NetBuilder, Place, TransitionDef};
/// use tokenweave::transition::{FiringContext, FiringInput, FiringOutput, Transition, TransitionError};
/// use async_trait::async_trait;
///
/// struct Forward;
///
/// #[async_trait]
/// impl Transition for Forward {
///     async fn fire(
///         &self,
///         input: FiringInput,
///         _ctx: FiringContext,
///     ) -> Result<FiringOutput, TransitionError> {
///         Ok(FiringOutput::new().with_field("out", input.field("in").to_vec()))
///     }
/// }
///
/// let net = NetBuilder::new()
///     .add_place(Place::new(1, "inbox", "unit"))
///     .add_place(Place::new(2, "outbox", "unit"))
///     .add_transition(TransitionDef::new(1, "forward"), Forward)
///     .add_input_arc(1, 1, 1, "in")
///     .add_output_arc(1, 2, 1, "out")
///     .build()
///     .unwrap();
///
/// assert_eq!(net.places().count(), 2);
/// ```
#[derive(Default)]
pub struct NetBuilder {
    places: Vec<Place>,
    transitions: Vec<(TransitionDef, Arc<dyn Transition>)>,
    arcs: Vec<PendingArc>,
}

impl NetBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a place to the net.
    #[must_use]
    pub fn add_place(mut self, place: Place) -> Self {
        self.places.push(place);
        self
    }

    /// Register a transition definition together with its handler.
    #[must_use]
    pub fn add_transition(mut self, def: TransitionDef, handler: impl Transition + 'static) -> Self {
        self.transitions.push((def, Arc::new(handler)));
        self
    }

    /// Wire a place→transition arc carrying `weight` tokens under `selector`.
    #[must_use]
    pub fn add_input_arc(
        mut self,
        place: impl Into<PlaceId>,
        transition: impl Into<TransitionId>,
        weight: u32,
        selector: impl Into<String>,
    ) -> Self {
        self.arcs.push(PendingArc {
            place: place.into(),
            transition: transition.into(),
            spec: ArcSpec::new(weight, selector),
            end: ArcEnd::Input,
        });
        self
    }

    /// Wire a transition→place arc carrying `weight` tokens under `selector`.
    #[must_use]
    pub fn add_output_arc(
        mut self,
        transition: impl Into<TransitionId>,
        place: impl Into<PlaceId>,
        weight: u32,
        selector: impl Into<String>,
    ) -> Self {
        self.arcs.push(PendingArc {
            place: place.into(),
            transition: transition.into(),
            spec: ArcSpec::new(weight, selector),
            end: ArcEnd::Output,
        });
        self
    }

    /// Validate and compile the net.
    pub fn build(self) -> Result<PetriNet, NetBuildError> {
        let mut places: FxHashMap<PlaceId, Place> = FxHashMap::default();
        for place in self.places {
            if places.insert(place.id, place.clone()).is_some() {
                return Err(NetBuildError::DuplicatePlace(place.id));
            }
        }

        let mut transitions: FxHashMap<TransitionId, TransitionNode> = FxHashMap::default();
        for (def, handler) in self.transitions {
            let id = def.id;
            if transitions.insert(id, TransitionNode { def, handler }).is_some() {
                return Err(NetBuildError::DuplicateTransition(id));
            }
        }

        let mut inputs: FxHashMap<TransitionId, Vec<(PlaceId, ArcSpec)>> = FxHashMap::default();
        let mut outputs: FxHashMap<TransitionId, Vec<(PlaceId, ArcSpec)>> = FxHashMap::default();
        let mut downstream: FxHashMap<PlaceId, Vec<TransitionId>> = FxHashMap::default();

        for arc in self.arcs {
            if !places.contains_key(&arc.place) {
                return Err(NetBuildError::UnknownPlace(arc.place));
            }
            if !transitions.contains_key(&arc.transition) {
                return Err(NetBuildError::UnknownTransition(arc.transition));
            }
            if arc.spec.weight == 0 {
                return Err(NetBuildError::ZeroWeight {
                    place: arc.place,
                    transition: arc.transition,
                });
            }
            match arc.end {
                ArcEnd::Input => {
                    inputs
                        .entry(arc.transition)
                        .or_default()
                        .push((arc.place, arc.spec));
                    let consumers = downstream.entry(arc.place).or_default();
                    if !consumers.contains(&arc.transition) {
                        consumers.push(arc.transition);
                    }
                }
                ArcEnd::Output => {
                    outputs
                        .entry(arc.transition)
                        .or_default()
                        .push((arc.place, arc.spec));
                }
            }
        }

        Ok(PetriNet::from_parts(
            places,
            transitions,
            inputs,
            outputs,
            downstream,
        ))
    }
}

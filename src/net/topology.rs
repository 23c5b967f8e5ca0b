//! The compiled, immutable net: nodes, arcs, and adjacency queries.
//!
//! Arcs live in two parallel adjacency tables, `transition -> [(place, arc)]`
//! for inputs and outputs, plus a `place -> [transition]` table for the
//! scheduler. The bipartite invariant (no place↔place or
//! transition↔transition arcs) holds by construction: there is simply no way
//! to express such an arc. All queries are pure and O(degree).

use rustc_hash::FxHashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::marking::CountMarking;
use crate::transition::Transition;
use crate::types::{NodeRef, PlaceId, TransitionId};

/// A place: a location where tokens reside.
///
/// Carries a label and a free-form color type tag describing the token
/// payloads it is meant to hold. Identity (and thus equality and hashing)
/// is the id alone.
#[derive(Clone, Debug)]
pub struct Place {
    pub id: PlaceId,
    pub label: String,
    pub color: String,
}

impl Place {
    pub fn new(id: impl Into<PlaceId>, label: impl Into<String>, color: impl Into<String>) -> Self {
        Place {
            id: id.into(),
            label: label.into(),
            color: color.into(),
        }
    }
}

impl PartialEq for Place {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Place {}

impl Hash for Place {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Static description of a transition: identity, label, and whether the
/// scheduler fires it automatically whenever it is enabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionDef {
    pub id: TransitionId,
    pub label: String,
    pub automated: bool,
}

impl TransitionDef {
    /// A manual transition (fired through the command surface).
    pub fn new(id: impl Into<TransitionId>, label: impl Into<String>) -> Self {
        TransitionDef {
            id: id.into(),
            label: label.into(),
            automated: false,
        }
    }

    /// Mark this transition as automatic.
    #[must_use]
    pub fn automated(mut self) -> Self {
        self.automated = true;
        self
    }
}

/// A directed arc's payload: its weight (≥ 1) and the field selector used to
/// route tokens into or out of the transition's structured input/output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArcSpec {
    pub weight: u32,
    pub selector: String,
}

impl ArcSpec {
    pub fn new(weight: u32, selector: impl Into<String>) -> Self {
        ArcSpec {
            weight,
            selector: selector.into(),
        }
    }
}

pub(crate) struct TransitionNode {
    pub(crate) def: TransitionDef,
    pub(crate) handler: Arc<dyn Transition>,
}

/// An immutable, compiled net. Constructed by [`NetBuilder`](super::NetBuilder).
pub struct PetriNet {
    places: FxHashMap<PlaceId, Place>,
    transitions: FxHashMap<TransitionId, TransitionNode>,
    inputs: FxHashMap<TransitionId, Vec<(PlaceId, ArcSpec)>>,
    outputs: FxHashMap<TransitionId, Vec<(PlaceId, ArcSpec)>>,
    downstream: FxHashMap<PlaceId, Vec<TransitionId>>,
}

impl std::fmt::Debug for PetriNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetriNet")
            .field("places", &self.places.len())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

impl PetriNet {
    pub(crate) fn from_parts(
        places: FxHashMap<PlaceId, Place>,
        transitions: FxHashMap<TransitionId, TransitionNode>,
        inputs: FxHashMap<TransitionId, Vec<(PlaceId, ArcSpec)>>,
        outputs: FxHashMap<TransitionId, Vec<(PlaceId, ArcSpec)>>,
        downstream: FxHashMap<PlaceId, Vec<TransitionId>>,
    ) -> Self {
        PetriNet {
            places,
            transitions,
            inputs,
            outputs,
            downstream,
        }
    }

    /// All places of the net.
    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    /// Look up a place by id.
    pub fn place(&self, id: PlaceId) -> Option<&Place> {
        self.places.get(&id)
    }

    /// All transition definitions of the net.
    pub fn transitions(&self) -> impl Iterator<Item = &TransitionDef> {
        self.transitions.values().map(|node| &node.def)
    }

    /// Look up a transition definition by id.
    pub fn transition(&self, id: TransitionId) -> Option<&TransitionDef> {
        self.transitions.get(&id).map(|node| &node.def)
    }

    /// Ids of all transitions.
    pub fn transition_ids(&self) -> impl Iterator<Item = TransitionId> + '_ {
        self.transitions.keys().copied()
    }

    /// Every node of the bipartite graph.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.places
            .keys()
            .map(|p| NodeRef::Place(*p))
            .chain(self.transitions.keys().map(|t| NodeRef::Transition(*t)))
    }

    /// The registered handler of a transition.
    pub fn handler(&self, id: TransitionId) -> Option<Arc<dyn Transition>> {
        self.transitions.get(&id).map(|node| Arc::clone(&node.handler))
    }

    /// Input arcs of `t` in registration order.
    pub fn input_arcs(&self, t: TransitionId) -> &[(PlaceId, ArcSpec)] {
        self.inputs.get(&t).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Output arcs of `t` in registration order.
    pub fn output_arcs(&self, t: TransitionId) -> &[(PlaceId, ArcSpec)] {
        self.outputs.get(&t).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Places feeding `t`.
    pub fn in_adjacent_places(&self, t: TransitionId) -> impl Iterator<Item = PlaceId> + '_ {
        self.input_arcs(t).iter().map(|(p, _)| *p)
    }

    /// Places fed by `t`.
    pub fn out_adjacent_places(&self, t: TransitionId) -> impl Iterator<Item = PlaceId> + '_ {
        self.output_arcs(t).iter().map(|(p, _)| *p)
    }

    /// The token counts `t` consumes: its input arc weights summed per place.
    pub fn in_marking(&self, t: TransitionId) -> CountMarking {
        self.input_arcs(t)
            .iter()
            .map(|(p, arc)| (*p, u64::from(arc.weight)))
            .collect()
    }

    /// The token counts `t` produces: its output arc weights summed per place.
    pub fn out_marking(&self, t: TransitionId) -> CountMarking {
        self.output_arcs(t)
            .iter()
            .map(|(p, arc)| (*p, u64::from(arc.weight)))
            .collect()
    }

    /// Transitions consuming from `p`.
    pub fn transitions_from_place(&self, p: PlaceId) -> &[TransitionId] {
        self.downstream.get(&p).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The arc connecting two adjacent nodes, if any. Only place→transition
    /// and transition→place pairs can be connected in a bipartite net.
    pub fn connecting_arc(&self, from: NodeRef, to: NodeRef) -> Option<&ArcSpec> {
        match (from, to) {
            (NodeRef::Place(p), NodeRef::Transition(t)) => self
                .input_arcs(t)
                .iter()
                .find(|(place, _)| *place == p)
                .map(|(_, arc)| arc),
            (NodeRef::Transition(t), NodeRef::Place(p)) => self
                .output_arcs(t)
                .iter()
                .find(|(place, _)| *place == p)
                .map(|(_, arc)| arc),
            _ => None,
        }
    }
}

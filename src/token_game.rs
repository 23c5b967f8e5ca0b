//! The token game: which transitions may fire, and with which tokens.
//!
//! Enablement is a pure multiplicity test: a transition is enabled when its
//! input weight map is a sub-multiset of the marking's token counts. Token
//! selection is deliberately deterministic and cheap: for each input arc the
//! first `weight` tokens of the place in sequence order are taken, and exactly
//! one such selection is enumerated per transition rather than the full
//! combination space. Blocked or failed transitions are *not* filtered here;
//! failure records are the scheduler's and command handler's concern.

use rustc_hash::FxHashMap;

use crate::marking::{Marking, MarkingLike};
use crate::net::PetriNet;
use crate::types::TransitionId;

/// True when `t`'s input weights are covered by `marking`. A transition with
/// no input places is always enabled.
pub fn is_enabled(net: &PetriNet, marking: &Marking, t: TransitionId) -> bool {
    net.in_marking(t).is_sub(&marking.multiplicity())
}

/// All transitions enabled at `marking`, sorted by id for determinism.
pub fn enabled_transitions(net: &PetriNet, marking: &Marking) -> Vec<TransitionId> {
    let counts = marking.multiplicity();
    let mut enabled: Vec<TransitionId> = net
        .transition_ids()
        .filter(|t| net.in_marking(*t).is_sub(&counts))
        .collect();
    enabled.sort_unstable();
    enabled
}

/// The deterministic token selection for one firing of `t`, if `t` is
/// enabled: per input arc, the first `weight` tokens of the place in sequence
/// order. Repeated arcs from the same place drain successive tokens.
pub fn select_parameters(net: &PetriNet, marking: &Marking, t: TransitionId) -> Option<Marking> {
    let mut taken_per_place: FxHashMap<crate::types::PlaceId, usize> = FxHashMap::default();
    let mut selection = Marking::new();
    for (place, arc) in net.input_arcs(t) {
        let offset = taken_per_place.entry(*place).or_insert(0);
        let resident = marking.tokens(*place);
        let end = *offset + arc.weight as usize;
        if resident.len() < end {
            return None;
        }
        selection = selection.with_tokens(*place, resident[*offset..end].to_vec());
        *offset = end;
    }
    Some(selection)
}

/// The selections `t` could consume at `marking`. Yields at most one marking:
/// the deterministic first selection of [`select_parameters`].
pub fn consumable_parameters<'a>(
    net: &'a PetriNet,
    marking: &'a Marking,
    t: TransitionId,
) -> impl Iterator<Item = Marking> + 'a {
    select_parameters(net, marking, t).into_iter()
}

/// Selections for every enabled transition.
pub fn enabled_parameters(net: &PetriNet, marking: &Marking) -> FxHashMap<TransitionId, Marking> {
    enabled_transitions(net, marking)
        .into_iter()
        .filter_map(|t| select_parameters(net, marking, t).map(|sel| (t, sel)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{NetBuilder, Place, TransitionDef};
    use crate::transition::{
        FiringContext, FiringInput, FiringOutput, Transition, TransitionError,
    };
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl Transition for Noop {
        async fn fire(
            &self,
            _input: FiringInput,
            _ctx: FiringContext,
        ) -> Result<FiringOutput, TransitionError> {
            Ok(FiringOutput::new())
        }
    }

    fn weighted_net() -> PetriNet {
        NetBuilder::new()
            .add_place(Place::new(1, "src", "int"))
            .add_place(Place::new(2, "dst", "int"))
            .add_transition(TransitionDef::new(1, "pair"), Noop)
            .add_input_arc(1, 1, 2, "pair")
            .add_output_arc(1, 2, 1, "merged")
            .build()
            .unwrap()
    }

    #[test]
    fn enablement_respects_weights() {
        let net = weighted_net();
        let one = Marking::new().with_token(crate::types::PlaceId(1), json!(1));
        assert!(!is_enabled(&net, &one, TransitionId(1)));

        let two = one.clone().with_token(crate::types::PlaceId(1), json!(2));
        assert!(is_enabled(&net, &two, TransitionId(1)));
        assert_eq!(enabled_transitions(&net, &two), vec![TransitionId(1)]);
    }

    #[test]
    fn selection_takes_first_weight_tokens_in_order() {
        let net = weighted_net();
        let marking = Marking::new().with_tokens(
            crate::types::PlaceId(1),
            vec![json!("a"), json!("b"), json!("c")],
        );
        let sel = select_parameters(&net, &marking, TransitionId(1)).unwrap();
        assert_eq!(sel.tokens(crate::types::PlaceId(1)), &[json!("a"), json!("b")]);
    }

    #[test]
    fn selection_yields_exactly_one_candidate() {
        let net = weighted_net();
        let marking = Marking::new().with_tokens(
            crate::types::PlaceId(1),
            vec![json!(1), json!(2), json!(3)],
        );
        let all: Vec<Marking> = consumable_parameters(&net, &marking, TransitionId(1)).collect();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn no_input_transition_is_always_enabled() {
        let net = NetBuilder::new()
            .add_place(Place::new(1, "sink", "unit"))
            .add_transition(TransitionDef::new(1, "source"), Noop)
            .add_output_arc(1, 1, 1, "out")
            .build()
            .unwrap();
        let empty = Marking::new();
        assert!(is_enabled(&net, &empty, TransitionId(1)));
        let sel = select_parameters(&net, &empty, TransitionId(1)).unwrap();
        assert!(crate::marking::MarkingLike::is_empty(&sel));
    }

    #[test]
    fn enabled_parameters_maps_every_enabled_transition() {
        let net = weighted_net();
        let marking = Marking::new()
            .with_tokens(crate::types::PlaceId(1), vec![json!(1), json!(2)]);
        let params = enabled_parameters(&net, &marking);
        assert_eq!(params.len(), 1);
        assert!(params.contains_key(&TransitionId(1)));
    }
}

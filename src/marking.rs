//! Marking algebra: the semantic token containers of a net.
//!
//! A [`Marking`] assigns each place a sequence of colored tokens
//! ([`serde_json::Value`] payloads). A [`CountMarking`] is the multiplicity
//! projection (plain token counts per place) and doubles as the weight map
//! of a transition's input/output arcs. Both implement [`MarkingLike`], the
//! small algebra the token game and the instance fold are written against.
//!
//! Markings are immutable values: every operation returns a fresh marking and
//! the containers uphold one invariant throughout: an empty place is an
//! absent key, never a key with an empty sequence.
//!
//! # Examples
//!
//! ```rust
//! use tokenweave::marking::{Marking, MarkingLike};
//! use tokenweave::types::PlaceId;
//! use serde_json::json;
//!
//! let m = Marking::new()
//!     .with_tokens(PlaceId(1), vec![json!(1), json!(2)])
//!     .with_tokens(PlaceId(2), vec![json!("a")]);
//!
//! let sub = Marking::new().with_tokens(PlaceId(1), vec![json!(2)]);
//! assert!(sub.is_sub(&m));
//!
//! let rest = m.consume(&sub).unwrap();
//! assert_eq!(rest.multiplicity().count(PlaceId(1)), 1);
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::types::PlaceId;

/// A colored token payload. The unit token is `Value::Null`.
pub type Token = Value;

/// Errors raised by marking operations whose preconditions do not hold.
#[derive(Debug, Error, Diagnostic)]
pub enum MarkingError {
    /// `consume` was asked to remove a token that is not resident.
    #[error("place {place} does not hold the requested token(s)")]
    #[diagnostic(
        code(tokenweave::marking::insufficient_tokens),
        help("Check enablement (is_sub) before consuming.")
    )]
    InsufficientTokens { place: PlaceId },
}

/// The marking algebra: the four operations every marking flavor supports.
///
/// Implemented by the colored [`Marking`] and by the multiplicity-only
/// [`CountMarking`]. All operations are value-to-value; nothing mutates in
/// place.
pub trait MarkingLike: Clone + Default + PartialEq {
    /// A marking with no tokens anywhere.
    fn empty() -> Self {
        Self::default()
    }

    /// True when no place holds any token.
    fn is_empty(&self) -> bool;

    /// Token count per place.
    fn multiplicity(&self) -> CountMarking;

    /// Remove `sub` from `self`. Precondition: `sub.is_sub(self)`; violated
    /// preconditions surface as [`MarkingError::InsufficientTokens`].
    fn consume(&self, sub: &Self) -> Result<Self, MarkingError>;

    /// Add `add` to `self`.
    fn produce(&self, add: &Self) -> Self;

    /// True when every token of `self` (with multiplicity) is present in `of`.
    fn is_sub(&self, of: &Self) -> bool;
}

/// Colored marking: each place maps to the sequence of tokens resident there.
///
/// Token order within a place is immaterial to enablement but drives the
/// deterministic selection rule of the token game (first `weight` tokens in
/// sequence order).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Marking {
    places: FxHashMap<PlaceId, Vec<Token>>,
}

impl Marking {
    /// An empty marking.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: add `tokens` to `place`. Empty token lists are ignored,
    /// keeping the no-empty-entries invariant.
    #[must_use]
    pub fn with_tokens(mut self, place: PlaceId, tokens: Vec<Token>) -> Self {
        if !tokens.is_empty() {
            self.places.entry(place).or_default().extend(tokens);
        }
        self
    }

    /// Single-token convenience for [`with_tokens`](Self::with_tokens).
    #[must_use]
    pub fn with_token(self, place: PlaceId, token: Token) -> Self {
        self.with_tokens(place, vec![token])
    }

    /// Tokens currently resident at `place` (empty slice for absent places).
    pub fn tokens(&self, place: PlaceId) -> &[Token] {
        self.places.get(&place).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Places that currently hold at least one token.
    pub fn places(&self) -> impl Iterator<Item = PlaceId> + '_ {
        self.places.keys().copied()
    }

    /// Iterate `(place, tokens)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &[Token])> {
        self.places.iter().map(|(p, ts)| (*p, ts.as_slice()))
    }

    /// Total number of tokens across all places.
    pub fn len(&self) -> usize {
        self.places.values().map(Vec::len).sum()
    }

    fn remove_one(tokens: &mut Vec<Token>, token: &Token) -> bool {
        match tokens.iter().position(|t| t == token) {
            Some(idx) => {
                tokens.remove(idx);
                true
            }
            None => false,
        }
    }
}

impl MarkingLike for Marking {
    fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    fn multiplicity(&self) -> CountMarking {
        let mut counts = CountMarking::new();
        for (place, tokens) in &self.places {
            counts = counts.with_count(*place, tokens.len() as u64);
        }
        counts
    }

    fn consume(&self, sub: &Self) -> Result<Self, MarkingError> {
        let mut out = self.clone();
        for (place, wanted) in &sub.places {
            let Some(resident) = out.places.get_mut(place) else {
                return Err(MarkingError::InsufficientTokens { place: *place });
            };
            for token in wanted {
                if !Self::remove_one(resident, token) {
                    return Err(MarkingError::InsufficientTokens { place: *place });
                }
            }
            if resident.is_empty() {
                out.places.remove(place);
            }
        }
        Ok(out)
    }

    fn produce(&self, add: &Self) -> Self {
        let mut out = self.clone();
        for (place, tokens) in &add.places {
            if !tokens.is_empty() {
                out.places.entry(*place).or_default().extend(tokens.iter().cloned());
            }
        }
        out
    }

    fn is_sub(&self, of: &Self) -> bool {
        self.places.iter().all(|(place, wanted)| {
            let mut pool: Vec<&Token> = match of.places.get(place) {
                Some(resident) => resident.iter().collect(),
                None => return wanted.is_empty(),
            };
            wanted.iter().all(|token| {
                match pool.iter().position(|t| *t == token) {
                    Some(idx) => {
                        pool.swap_remove(idx);
                        true
                    }
                    None => false,
                }
            })
        })
    }
}

impl FromIterator<(PlaceId, Vec<Token>)> for Marking {
    fn from_iter<I: IntoIterator<Item = (PlaceId, Vec<Token>)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Marking::new(), |m, (p, ts)| m.with_tokens(p, ts))
    }
}

/// Multiplicity-only marking: token counts per place.
///
/// Doubles as the weight map of a transition's arc environment
/// ([`PetriNet::in_marking`](crate::net::PetriNet::in_marking) /
/// [`out_marking`](crate::net::PetriNet::out_marking)), which is what makes
/// the enablement test a plain `is_sub` between two `CountMarking`s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountMarking {
    counts: FxHashMap<PlaceId, u64>,
}

impl CountMarking {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: add `count` tokens at `place`. Zero counts are ignored.
    #[must_use]
    pub fn with_count(mut self, place: PlaceId, count: u64) -> Self {
        if count > 0 {
            *self.counts.entry(place).or_insert(0) += count;
        }
        self
    }

    /// Count at `place` (0 for absent places).
    pub fn count(&self, place: PlaceId) -> u64 {
        self.counts.get(&place).copied().unwrap_or(0)
    }

    /// Iterate `(place, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, u64)> + '_ {
        self.counts.iter().map(|(p, c)| (*p, *c))
    }
}

impl MarkingLike for CountMarking {
    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn multiplicity(&self) -> CountMarking {
        self.clone()
    }

    fn consume(&self, sub: &Self) -> Result<Self, MarkingError> {
        let mut out = self.clone();
        for (place, wanted) in &sub.counts {
            let have = out.counts.get_mut(place);
            match have {
                Some(count) if *count >= *wanted => {
                    *count -= *wanted;
                    if *count == 0 {
                        out.counts.remove(place);
                    }
                }
                _ => return Err(MarkingError::InsufficientTokens { place: *place }),
            }
        }
        Ok(out)
    }

    fn produce(&self, add: &Self) -> Self {
        let mut out = self.clone();
        for (place, count) in &add.counts {
            if *count > 0 {
                *out.counts.entry(*place).or_insert(0) += count;
            }
        }
        out
    }

    fn is_sub(&self, of: &Self) -> bool {
        self.counts
            .iter()
            .all(|(place, wanted)| of.count(*place) >= *wanted)
    }
}

impl FromIterator<(PlaceId, u64)> for CountMarking {
    fn from_iter<I: IntoIterator<Item = (PlaceId, u64)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CountMarking::new(), |m, (p, c)| m.with_count(p, c))
    }
}

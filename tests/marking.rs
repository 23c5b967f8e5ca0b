use serde_json::json;
use tokenweave::marking::{CountMarking, Marking, MarkingLike};
use tokenweave::types::PlaceId;

/// Equality as multisets: within-place token order is immaterial.
fn same_tokens(a: &Marking, b: &Marking) {
    assert!(a.is_sub(b), "left not contained in right: {a:?} vs {b:?}");
    assert!(b.is_sub(a), "right not contained in left: {a:?} vs {b:?}");
    assert_eq!(a.multiplicity(), b.multiplicity());
}

#[test]
fn consume_after_produce_restores_original() {
    // x disjoint from m (different place).
    let m = Marking::new().with_tokens(PlaceId(1), vec![json!(1), json!(2)]);
    let x = Marking::new().with_token(PlaceId(2), json!("x"));
    let restored = m.produce(&x).consume(&x).unwrap();
    assert_eq!(restored, m);
}

#[test]
fn produce_after_consume_restores_original() {
    let m = Marking::new()
        .with_tokens(PlaceId(1), vec![json!(1), json!(2), json!(3)])
        .with_token(PlaceId(2), json!("keep"));
    let x = Marking::new().with_token(PlaceId(1), json!(2));
    assert!(x.is_sub(&m));
    let roundtrip = m.consume(&x).unwrap().produce(&x);
    same_tokens(&roundtrip, &m);
}

#[test]
fn produce_commutes_on_disjoint_supports() {
    let m = Marking::new().with_token(PlaceId(1), json!(1));
    let x = Marking::new().with_token(PlaceId(2), json!(2));
    let y = Marking::new().with_token(PlaceId(3), json!(3));
    assert_eq!(m.produce(&x).produce(&y), m.produce(&y).produce(&x));
}

#[test]
fn multiplicity_counts_per_place() {
    let m = Marking::new()
        .with_tokens(PlaceId(1), vec![json!(1), json!(1), json!(2)])
        .with_token(PlaceId(7), json!(null));
    let counts = m.multiplicity();
    assert_eq!(counts.count(PlaceId(1)), 3);
    assert_eq!(counts.count(PlaceId(7)), 1);
    assert_eq!(counts.count(PlaceId(2)), 0);
}

#[test]
fn empty_marking_is_identity_for_produce() {
    let m = Marking::new().with_token(PlaceId(1), json!("a"));
    let empty = Marking::empty();
    assert_eq!(m.produce(&empty), m);
    assert_eq!(empty.produce(&m), m);
}

#[test]
fn is_sub_is_reflexive_and_monotone() {
    let m = Marking::new().with_tokens(PlaceId(1), vec![json!(1), json!(2)]);
    assert!(m.is_sub(&m));
    assert!(Marking::empty().is_sub(&m));
    assert!(!m.is_sub(&Marking::empty()));
}

#[test]
fn count_marking_consume_produce_roundtrip() {
    let m = CountMarking::new()
        .with_count(PlaceId(1), 3)
        .with_count(PlaceId(2), 1);
    let x = CountMarking::new().with_count(PlaceId(1), 2);
    assert!(x.is_sub(&m));
    assert_eq!(m.consume(&x).unwrap().produce(&x), m);
}

#[test]
fn count_marking_drops_zeroed_places() {
    let m = CountMarking::new().with_count(PlaceId(1), 2);
    let rest = m.consume(&m.clone()).unwrap();
    assert!(rest.is_empty());
    assert_eq!(rest.iter().count(), 0);
}

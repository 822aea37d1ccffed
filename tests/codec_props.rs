use layout_include_graph::codec::{decode_map, encode_map, is_encodable};
use layout_include_graph::graph::{DocumentId, IncludeMap};
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.]{0,10}"
}

fn include_map() -> impl Strategy<Value = IncludeMap> {
    prop::collection::hash_map(name(), prop::collection::vec(name(), 0..5), 0..12).prop_map(|m| {
        m.into_iter()
            .map(|(k, vs)| (DocumentId(k), vs.into_iter().map(DocumentId).collect()))
            .collect()
    })
}

proptest! {
    #[test]
    fn decode_inverts_encode(m in include_map()) {
        prop_assert_eq!(decode_map(&encode_map(&m)), m);
    }

    // Same content inserted in a different order encodes identically
    #[test]
    fn encoding_ignores_insertion_order(m in include_map()) {
        let mut entries: Vec<_> = m.clone().into_iter().collect();
        entries.reverse();
        let reordered: IncludeMap = entries.into_iter().collect();
        prop_assert_eq!(encode_map(&reordered), encode_map(&m));
        prop_assert_eq!(encode_map(&m), encode_map(&m));
    }

    #[test]
    fn decode_never_panics(s in ".*") {
        let _ = decode_map(&s);
    }

    #[test]
    fn generated_names_are_encodable(n in name()) {
        prop_assert!(is_encodable(&n));
    }
}

#[test]
fn empty_string_is_empty_map() {
    assert!(decode_map("").is_empty());
    assert_eq!(encode_map(&IncludeMap::new()), "");
}

use layout_include_graph::graph::{DocumentId, IncludeGraph};
use proptest::prelude::*;

const POOL: [&str; 6] = ["main", "header", "footer", "row", "item", "empty"];

fn op() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (0..POOL.len(), prop::collection::vec(0..POOL.len(), 0..5))
}

fn id(i: usize) -> DocumentId {
    DocumentId::from(POOL[i])
}

proptest! {
    // b in included_by(a) iff a in includes_of(b), after any update sequence
    #[test]
    fn reverse_map_is_transpose(ops in prop::collection::vec(op(), 0..40)) {
        let mut g = IncludeGraph::new();
        for (includer, included) in ops {
            g.set_includes(id(includer), included.into_iter().map(id).collect());
        }
        for a in POOL {
            let back = g.included_by(a).unwrap_or(&[]);
            let mut seen = std::collections::HashSet::new();
            for b in back {
                prop_assert!(seen.insert(b), "duplicate includer {} of {}", b, a);
                prop_assert!(g.includes_of(b).unwrap_or(&[]).iter().any(|d| d.as_str() == a));
            }
            for b in g.includes_of(a).unwrap_or(&[]) {
                prop_assert!(g.included_by(b).unwrap_or(&[]).iter().any(|d| d.as_str() == a));
            }
        }
    }

    #[test]
    fn repeating_an_update_changes_nothing(ops in prop::collection::vec(op(), 1..20)) {
        let mut g = IncludeGraph::new();
        for (includer, included) in &ops {
            g.set_includes(id(*includer), included.iter().copied().map(id).collect());
        }
        let snapshot = g.clone();
        let (includer, included) = &ops[ops.len() - 1];
        g.set_includes(id(*includer), included.iter().copied().map(id).collect());
        prop_assert_eq!(g, snapshot);
    }
}

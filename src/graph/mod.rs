//! Include graph model.
//!
//! `IncludeGraph` owns the forward map (layout → layouts it includes) and the
//! reverse map derived from it (layout → layouts including it). The only way to
//! mutate the graph is [`IncludeGraph::set_includes`], which keeps both maps in
//! step, so the reverse map is always the transpose of the forward map.
//!
//! The persisted form of a graph is the forward map alone, see `crate::codec`.
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

/// Canonical name of a layout document: the file stem of `<name>.xml`,
/// independent of folder and extension.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub String);

impl DocumentId {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the id of a layout from its file name (`main.xml` → `main`).
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Self {
        // Keep the full name when stripping would leave nothing (".xml")
        match file_name.strip_suffix(".xml") {
            Some(stem) if !stem.is_empty() => Self(stem.to_string()),
            _ => Self(file_name.to_string()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Forward include map: includer → ordered list of included layouts.
pub type IncludeMap = HashMap<DocumentId, Vec<DocumentId>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeGraph {
    includes: IncludeMap,
    // Derived index; never persisted
    included_by: IncludeMap,
}

impl IncludeGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a forward map (typically freshly decoded), deriving
    /// the reverse map.
    #[must_use]
    pub fn from_includes(includes: IncludeMap) -> Self {
        let mut included_by: IncludeMap = HashMap::with_capacity(2 * includes.len());
        for (includer, included) in &includes {
            link_reverse(&mut included_by, includer, included);
        }
        Self { includes, included_by }
    }

    /// Layouts included by `includer`, or `None` if `includer` was never recorded.
    #[must_use]
    pub fn includes_of<Q>(&self, includer: &Q) -> Option<&[DocumentId]>
    where
        DocumentId: Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        self.includes.get(includer).map(Vec::as_slice)
    }

    /// Layouts that include `included`, in first-seen order.
    #[must_use]
    pub fn included_by<Q>(&self, included: &Q) -> Option<&[DocumentId]>
    where
        DocumentId: Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        self.included_by.get(included).map(Vec::as_slice)
    }

    /// Record the complete list of layouts included by `includer`, replacing
    /// whatever was recorded before.
    pub fn set_includes(&mut self, includer: DocumentId, included: Vec<DocumentId>) {
        if let Some(old) = self.includes.get(&includer) {
            // Targets that stay keep their position in the reverse lists
            for target in old.iter().filter(|t| !included.contains(t)) {
                if let Some(includers) = self.included_by.get_mut(target) {
                    includers.retain(|d| d != &includer);
                }
            }
        }
        link_reverse(&mut self.included_by, &includer, &included);
        self.includes.insert(includer, included);
    }

    /// The forward map, as persisted by the codec.
    #[must_use]
    pub fn includes(&self) -> &IncludeMap {
        &self.includes
    }

    /// Every document with a recorded include list, sorted.
    #[must_use]
    pub fn documents(&self) -> Vec<&DocumentId> {
        let mut docs: Vec<&DocumentId> = self.includes.keys().collect();
        docs.sort();
        docs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.includes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }
}

fn link_reverse(included_by: &mut IncludeMap, includer: &DocumentId, included: &[DocumentId]) {
    for target in included {
        // We don't expect many includers per layout
        let list = included_by.entry(target.clone()).or_insert_with(|| Vec::with_capacity(2));
        if !list.contains(includer) {
            list.push(includer.clone());
        }
    }
}

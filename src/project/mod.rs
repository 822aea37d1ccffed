//! Host-side collaborators of the include finder.
//!
//! The finder never touches the filesystem or the marker UI directly; it goes
//! through [`LayoutProject`] and [`MarkerSink`]. This module also provides the
//! reference implementations used by the CLI and the tests: [`FsLayoutProject`]
//! (layouts under `<root>/res/layout*/`, properties in a JSON file) and
//! [`MarkerStore`] (in-memory markers).
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{IncludeGraphError, ParseError};
use crate::graph::DocumentId;
use crate::utils::{file_walker, properties};

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A layout file as seen by the host: its id, resource folder and location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutFile {
    pub id: DocumentId,
    /// Name of the resource folder holding the file (`layout`, `layout-land`, ...)
    pub folder: String,
    pub path: PathBuf,
}

impl LayoutFile {
    /// Describe the file at `path`, deriving folder and id from its last two components.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let folder = path.parent()?.file_name()?.to_str()?;
        Some(Self {
            id: DocumentId::from_file_name(file_name),
            folder: folder.to_string(),
            path: path.to_path_buf(),
        })
    }
}

bitflags::bitflags! {
    /// Kinds of change carried by a resource notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeKind: u32 {
        const ADDED = 1 << 0;
        const REMOVED = 1 << 1;
        /// Metadata or attribute change.
        const CHANGED = 1 << 2;
        const CONTENT = 1 << 3;
        const MOVED = 1 << 4;
        const MARKERS = 1 << 5;
        const SYNC = 1 << 6;
    }
}

impl ChangeKind {
    /// Kinds that may change the includes of a layout.
    pub const RELEVANT: Self =
        Self::ADDED.union(Self::REMOVED).union(Self::CHANGED).union(Self::CONTENT);

    #[must_use]
    pub fn is_relevant(self) -> bool {
        self.intersects(Self::RELEVANT)
    }
}

/// The project model the include finder works against.
pub trait LayoutProject: Send + Sync {
    fn id(&self) -> &ProjectId;

    /// Every layout file of the project, across all layout folders.
    fn layout_files(&self) -> Vec<LayoutFile>;

    /// # Errors
    /// Returns `ParseError::Io` or `ParseError::InvalidUtf8` when the file can't be read as text.
    fn read_file(&self, file: &LayoutFile) -> Result<String, ParseError>;

    /// Resolve `<folder>/<id>.xml` to an existing resource.
    fn find_document(&self, folder: &str, id: &DocumentId) -> Option<PathBuf>;

    /// # Errors
    /// Returns `IncludeGraphError::Persistence` when the property store is unavailable.
    fn persistent_property(&self, key: &str) -> Result<Option<String>, IncludeGraphError>;

    /// Store `value` under `key`; `None` clears the property.
    ///
    /// # Errors
    /// Returns `IncludeGraphError::Persistence` when the property store can't be written.
    fn set_persistent_property(&self, key: &str, value: Option<&str>)
        -> Result<(), IncludeGraphError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marker {
    pub message: Option<String>,
    pub line: usize,
    pub severity: Severity,
}

impl Marker {
    #[must_use]
    pub fn error(message: impl Into<String>, line: usize) -> Self {
        Self { message: Some(message.into()), line, severity: Severity::Error }
    }
}

/// Problem-marker surface of the host.
pub trait MarkerSink: Send + Sync {
    /// # Errors
    /// Returns an error when the markers of `resource` can't be listed.
    fn markers(&self, resource: &Path) -> Result<Vec<Marker>, IncludeGraphError>;

    /// # Errors
    /// Returns an error when the marker can't be attached.
    fn add_marker(&self, resource: &Path, marker: Marker) -> Result<(), IncludeGraphError>;

    /// # Errors
    /// Returns an error when the marker can't be removed.
    fn delete_marker(&self, resource: &Path, marker: &Marker) -> Result<(), IncludeGraphError>;
}

type MarkerListener = Box<dyn Fn(&Path) + Send + Sync>;

/// In-memory [`MarkerSink`]. Identical markers are stored once.
///
/// An optional listener is called after every mutation, outside the store's
/// lock, the way a host emits a resource change when markers are touched.
#[derive(Default)]
pub struct MarkerStore {
    markers: Mutex<HashMap<PathBuf, Vec<Marker>>>,
    listener: Mutex<Option<MarkerListener>>,
}

impl MarkerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&self, listener: impl Fn(&Path) + Send + Sync + 'static) {
        *self.listener.lock() = Some(Box::new(listener));
    }

    /// Snapshot of every resource with at least one marker, sorted by path.
    #[must_use]
    pub fn all(&self) -> Vec<(PathBuf, Vec<Marker>)> {
        let mut out: Vec<(PathBuf, Vec<Marker>)> = self
            .markers
            .lock()
            .iter()
            .filter(|(_, ms)| !ms.is_empty())
            .map(|(p, ms)| (p.clone(), ms.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn notify(&self, resource: &Path) {
        if let Some(listener) = self.listener.lock().as_ref() {
            listener(resource);
        }
    }
}

impl MarkerSink for MarkerStore {
    fn markers(&self, resource: &Path) -> Result<Vec<Marker>, IncludeGraphError> {
        Ok(self.markers.lock().get(resource).cloned().unwrap_or_default())
    }

    fn add_marker(&self, resource: &Path, marker: Marker) -> Result<(), IncludeGraphError> {
        let added = {
            let mut guard = self.markers.lock();
            let list = guard.entry(resource.to_path_buf()).or_default();
            if list.contains(&marker) {
                false
            } else {
                list.push(marker);
                true
            }
        };
        if added {
            self.notify(resource);
        }
        Ok(())
    }

    fn delete_marker(&self, resource: &Path, marker: &Marker) -> Result<(), IncludeGraphError> {
        let removed = {
            let mut guard = self.markers.lock();
            match guard.get_mut(resource) {
                Some(list) => {
                    let before = list.len();
                    list.retain(|m| m != marker);
                    before != list.len()
                }
                None => false,
            }
        };
        if removed {
            self.notify(resource);
        }
        Ok(())
    }
}

/// Layout project rooted in a directory: layouts live in
/// `<root>/<resource_dir>/layout*/<name>.xml` and persistent properties in
/// `<root>/.layout_includes.json`.
#[derive(Debug, Clone)]
pub struct FsLayoutProject {
    id: ProjectId,
    root: PathBuf,
    resource_dir: String,
    no_ignore: bool,
}

impl FsLayoutProject {
    #[must_use]
    pub fn new(root: &Path, resource_dir: &str, no_ignore: bool) -> Self {
        let id = ProjectId(root.display().to_string());
        Self { id, root: root.to_path_buf(), resource_dir: resource_dir.to_string(), no_ignore }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn resource_root(&self) -> PathBuf {
        self.root.join(&self.resource_dir)
    }
}

impl LayoutProject for FsLayoutProject {
    fn id(&self) -> &ProjectId {
        &self.id
    }

    fn layout_files(&self) -> Vec<LayoutFile> {
        file_walker::layout_files_with_options(&self.resource_root(), self.no_ignore)
            .iter()
            .filter_map(|p| LayoutFile::from_path(p))
            .collect()
    }

    fn read_file(&self, file: &LayoutFile) -> Result<String, ParseError> {
        let bytes = std::fs::read(&file.path)?;
        String::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8 { file: file.path.clone() })
    }

    fn find_document(&self, folder: &str, id: &DocumentId) -> Option<PathBuf> {
        let path = self.resource_root().join(folder).join(format!("{id}.xml"));
        path.is_file().then_some(path)
    }

    fn persistent_property(&self, key: &str) -> Result<Option<String>, IncludeGraphError> {
        Ok(properties::load_properties(&self.root)?.values.get(key).cloned())
    }

    fn set_persistent_property(
        &self,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), IncludeGraphError> {
        let mut props = properties::load_properties(&self.root)?;
        match value {
            Some(v) => {
                props.values.insert(key.to_string(), v.to_string());
            }
            None => {
                props.values.remove(key);
            }
        }
        properties::save_properties(&self.root, &props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn layout_file_from_path() {
        let f = LayoutFile::from_path(Path::new("/p/res/layout-land/main.xml")).unwrap();
        assert_eq!(f.id.as_str(), "main");
        assert_eq!(f.folder, "layout-land");
        assert!(LayoutFile::from_path(Path::new("main.xml")).is_none());
    }

    #[test]
    fn change_kind_relevance() {
        assert!(ChangeKind::CONTENT.is_relevant());
        assert!((ChangeKind::MARKERS | ChangeKind::REMOVED).is_relevant());
        assert!(!ChangeKind::MARKERS.is_relevant());
        assert!(!(ChangeKind::MOVED | ChangeKind::SYNC).is_relevant());
        assert!(!ChangeKind::empty().is_relevant());
    }

    #[test]
    fn marker_store_dedupes_and_notifies() {
        let store = MarkerStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        store.set_listener(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let res = Path::new("res/layout/a.xml");
        let m = Marker::error("boom", 1);
        store.add_marker(res, m.clone()).unwrap();
        store.add_marker(res, m.clone()).unwrap();
        assert_eq!(store.markers(res).unwrap().len(), 1);
        store.delete_marker(res, &m).unwrap();
        store.delete_marker(res, &m).unwrap();
        assert!(store.markers(res).unwrap().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(store.all().is_empty());
    }
}

//! Include finder: keeps a project's include graph current and reports cycles.
//!
//! An [`IncludeFinder`] is created per project and initialized lazily: the
//! first query or update loads the persisted include map, or scans every
//! layout when nothing usable was stored. After that, each changed layout is
//! re-read on its own (`update_file_includes`), the graph is patched with
//! `IncludeGraph::set_includes`, and cycle detection runs from that layout only.
//!
//! [`ProjectContext`] wraps a finder with its marker worker and re-entrancy
//! flag, and [`FinderRegistry`] hands out one context per open project.
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codec::{decode_map, encode_map};
use crate::errors::IncludeGraphError;
use crate::graph::{DocumentId, IncludeGraph};
use crate::parser::{try_find_includes, LayoutParser};
use crate::project::{ChangeKind, LayoutFile, LayoutProject, MarkerSink, ProjectId};
use crate::query::{detect_cycle_from, IncludeChain};
use crate::utils::config::Config;

pub mod markers;

use markers::{cycle_message, spawn_marker_worker, MarkerEffect, MarkerQueue};

/// Property the encoded include map is stored under.
pub const DEFAULT_PROPERTY: &str = "layout-include-graph.includes";
/// Encoded maps this long or longer are not stored.
pub const DEFAULT_MAX_ENCODED_LEN: usize = 2048;
/// The only resource folder whose layouts are tracked.
pub const DEFAULT_LAYOUT_FOLDER: &str = "layout";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderSettings {
    pub layout_folder: String,
    pub platform_namespace: String,
    pub property: String,
    pub max_encoded_len: usize,
}

impl Default for FinderSettings {
    fn default() -> Self {
        Self {
            layout_folder: DEFAULT_LAYOUT_FOLDER.to_string(),
            platform_namespace: crate::parser::DEFAULT_PLATFORM_NAMESPACE.to_string(),
            property: DEFAULT_PROPERTY.to_string(),
            max_encoded_len: DEFAULT_MAX_ENCODED_LEN,
        }
    }
}

impl FinderSettings {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        let mut s = Self::default();
        if let Some(p) = &cfg.project {
            if let Some(v) = &p.layout_folder {
                s.layout_folder.clone_from(v);
            }
            if let Some(v) = &p.platform_namespace {
                s.platform_namespace.clone_from(v);
            }
        }
        if let Some(p) = &cfg.persistence {
            if let Some(v) = &p.property {
                s.property.clone_from(v);
            }
            if let Some(v) = p.max_encoded_len {
                s.max_encoded_len = v;
            }
        }
        s
    }
}

/// What happened to the persisted include map on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    Unchanged,
    /// Too large to store; the property was cleared.
    Cleared,
    Failed,
}

pub struct IncludeFinder {
    project: Arc<dyn LayoutProject>,
    sink: Arc<dyn MarkerSink>,
    queue: MarkerQueue,
    parser: LayoutParser,
    settings: FinderSettings,
    // None until first use
    graph: Option<IncludeGraph>,
    // Cycle message last reported per layout
    reported: HashMap<DocumentId, String>,
}

impl IncludeFinder {
    #[must_use]
    pub fn new(
        project: Arc<dyn LayoutProject>,
        sink: Arc<dyn MarkerSink>,
        queue: MarkerQueue,
        settings: FinderSettings,
    ) -> Self {
        let parser = LayoutParser::with_platform_namespace(&settings.platform_namespace);
        Self { project, sink, queue, parser, settings, graph: None, reported: HashMap::new() }
    }

    #[must_use]
    pub fn settings(&self) -> &FinderSettings {
        &self.settings
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    /// Layouts included by `includer`, or `None` if it was never recorded.
    pub fn includes_from(&mut self, includer: &str) -> Option<&[DocumentId]> {
        self.ensure_initialized().includes_of(includer)
    }

    /// Layouts that include `included`.
    pub fn included_by(&mut self, included: &str) -> Option<&[DocumentId]> {
        self.ensure_initialized().included_by(included)
    }

    pub fn graph(&mut self) -> &IncludeGraph {
        self.ensure_initialized()
    }

    /// Load the persisted graph, or scan the project and persist the result.
    pub fn ensure_initialized(&mut self) -> &mut IncludeGraph {
        if self.graph.is_none() {
            if let Some(graph) = self.read_settings() {
                tracing::debug!(project = %self.project.id(), "restored include map ({} layouts)", graph.len());
                self.graph = Some(graph);
            } else {
                self.graph = Some(IncludeGraph::new());
                self.scan_project();
                self.save_settings();
            }
        }
        self.graph.get_or_insert_with(IncludeGraph::new)
    }

    /// Drop the in-memory graph and rebuild it from the layouts on disk.
    pub fn rescan(&mut self) -> usize {
        self.graph = Some(IncludeGraph::new());
        let changed = self.scan_project();
        self.save_settings();
        changed
    }

    fn read_settings(&self) -> Option<IncludeGraph> {
        match self.project.persistent_property(&self.settings.property) {
            Ok(Some(encoded)) => Some(IncludeGraph::from_includes(decode_map(&encoded))),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("can't read include settings: {e}");
                None
            }
        }
    }

    /// Persist the forward map. The reverse map is always derived on load.
    pub fn save_settings(&self) -> SaveOutcome {
        let Some(graph) = &self.graph else { return SaveOutcome::Unchanged };
        let encoded = encode_map(graph.includes());
        let key = &self.settings.property;

        let len = encoded.chars().count();
        let result = if len >= self.settings.max_encoded_len {
            // Rescanned next session instead of storing a truncated map
            tracing::info!("include map too large to persist ({len} chars); clearing");
            self.project.set_persistent_property(key, None).map(|()| SaveOutcome::Cleared)
        } else {
            match self.project.persistent_property(key) {
                Ok(Some(existing)) if existing == encoded => Ok(SaveOutcome::Unchanged),
                _ => self.project.set_persistent_property(key, Some(&encoded)).map(|()| SaveOutcome::Written),
            }
        };
        result.unwrap_or_else(|e| {
            tracing::warn!("can't store include settings: {e}");
            SaveOutcome::Failed
        })
    }

    /// Read every tracked layout and record its includes. Cycles are not
    /// checked here. Returns the number of layouts whose includes changed.
    pub fn scan_project(&mut self) -> usize {
        let files: Vec<LayoutFile> =
            self.project.layout_files().into_iter().filter(|f| self.is_tracked(f)).collect();
        tracing::info!(project = %self.project.id(), "scanning {} layouts for includes", files.len());

        let project = self.project.as_ref();
        let parser = &self.parser;
        let extracted: Vec<(DocumentId, Vec<DocumentId>)> = files
            .par_iter()
            .map(|f| (f.id.clone(), read_includes(project, parser, f)))
            .collect();

        self.graph.get_or_insert_with(IncludeGraph::new);
        let mut changed = 0;
        for (id, includes) in extracted {
            if self.update_document(id, includes, false) {
                changed += 1;
            }
        }
        changed
    }

    /// Only layouts directly in the layout folder are tracked.
    #[must_use]
    pub fn is_tracked(&self, file: &LayoutFile) -> bool {
        file.folder == self.settings.layout_folder
    }

    /// Re-read `file` and update its includes. With `single_update`, cycles
    /// are checked from it and the map is persisted. Returns true if the
    /// includes changed.
    pub fn update_file_includes(&mut self, file: &LayoutFile, single_update: bool) -> bool {
        if !self.is_tracked(file) {
            return false;
        }
        self.ensure_initialized();
        let includes = read_includes(self.project.as_ref(), &self.parser, file);
        self.update_document(file.id.clone(), includes, single_update)
    }

    /// Record `includes` for `id`. Unchanged lists are a no-op; otherwise the
    /// graph is updated and, for incremental updates, cycles are checked from
    /// `id` and the map is persisted.
    pub fn update_document(&mut self, id: DocumentId, includes: Vec<DocumentId>, incremental: bool) -> bool {
        let graph = self.ensure_initialized();
        if graph.includes_of(&id) == Some(includes.as_slice()) {
            return false;
        }
        graph.set_includes(id.clone(), includes);
        if incremental {
            self.detect_cycles(&id);
            self.save_settings();
        }
        true
    }

    /// Check for a cycle reachable from `from` and add or retract its marker.
    pub fn detect_cycles(&mut self, from: &DocumentId) -> Option<IncludeChain> {
        let graph = self.graph.as_ref()?;
        if graph.is_empty() {
            return None;
        }
        match detect_cycle_from(graph, from) {
            Some(chain) => {
                self.add_error(from, &chain);
                Some(chain)
            }
            None => {
                self.remove_errors(from);
                None
            }
        }
    }

    /// Chain currently reported for `id`, if any.
    #[must_use]
    pub fn reported_cycle(&self, id: &str) -> Option<&str> {
        self.reported.get(id).map(String::as_str)
    }

    fn add_error(&mut self, from: &DocumentId, chain: &IncludeChain) {
        let message = cycle_message(chain);
        if self.reported.get(from) == Some(&message) {
            return;
        }
        let Some(resource) = self.find_resource(from) else {
            tracing::debug!("no resource for layout {from}; cycle not reported");
            return;
        };
        tracing::debug!("{message}");
        self.queue.enqueue(MarkerEffect::Report { resource, message: message.clone() });
        self.reported.insert(from.clone(), message);
    }

    fn remove_errors(&mut self, from: &DocumentId) {
        let was_reported = self.reported.remove(from).is_some();
        let Some(resource) = self.find_resource(from) else { return };
        // A report may still be queued, and markers may predate this session
        let has_cycle_marker = was_reported
            || match self.sink.markers(&resource) {
                Ok(existing) => existing.iter().any(markers::is_cycle_marker),
                // Queue the retraction anyway; the worker re-checks
                Err(_) => true,
            };
        if has_cycle_marker {
            self.queue.enqueue(MarkerEffect::Retract { resource });
        }
    }

    fn find_resource(&self, id: &DocumentId) -> Option<PathBuf> {
        self.project.find_document(&self.settings.layout_folder, id)
    }
}

// I/O and parse failures both mean "no includes known"
fn read_includes(project: &dyn LayoutProject, parser: &LayoutParser, file: &LayoutFile) -> Vec<DocumentId> {
    let content = match project.read_file(file) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("can't read layout {}: {e}", file.path.display());
            return Vec::new();
        }
    };
    try_find_includes(parser, &content, parser.platform_namespace()).unwrap_or_else(|source| {
        let err = IncludeGraphError::Parse { document: file.id.to_string(), source };
        tracing::debug!("{err}");
        Vec::new()
    })
}

/// Result of handling one change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Caused by the finder's own marker update.
    Suppressed,
    /// Not a kind of change or a file the finder tracks.
    Ignored,
    Unchanged,
    Updated,
}

/// One open project: its finder, marker worker, and re-entrancy flag.
pub struct ProjectContext {
    id: ProjectId,
    finder: Mutex<IncludeFinder>,
    refreshing: Arc<AtomicBool>,
    queue: MarkerQueue,
}

impl ProjectContext {
    /// # Errors
    /// Returns `IncludeGraphError::Io` if the marker worker can't be started.
    pub fn open(
        project: Arc<dyn LayoutProject>,
        sink: Arc<dyn MarkerSink>,
        settings: FinderSettings,
    ) -> Result<Self, IncludeGraphError> {
        let id = project.id().clone();
        let refreshing = Arc::new(AtomicBool::new(false));
        let queue = spawn_marker_worker(&id.0, Arc::clone(&sink), Arc::clone(&refreshing))?;
        let finder = IncludeFinder::new(project, sink, queue.clone(), settings);
        Ok(Self { id, finder: Mutex::new(finder), refreshing, queue })
    }

    #[must_use]
    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    /// True while the marker worker is changing markers.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub fn on_document_changed(&self, file: &LayoutFile, kind: ChangeKind) -> ChangeOutcome {
        // Checked before locking: echoes arrive on the marker worker thread
        if self.is_refreshing() {
            return ChangeOutcome::Suppressed;
        }
        if !kind.is_relevant() {
            return ChangeOutcome::Ignored;
        }
        let mut finder = self.finder.lock();
        if !finder.is_tracked(file) {
            return ChangeOutcome::Ignored;
        }
        if finder.update_file_includes(file, true) {
            ChangeOutcome::Updated
        } else {
            ChangeOutcome::Unchanged
        }
    }

    #[must_use]
    pub fn includes_from(&self, includer: &str) -> Option<Vec<DocumentId>> {
        self.finder.lock().includes_from(includer).map(<[DocumentId]>::to_vec)
    }

    #[must_use]
    pub fn included_by(&self, included: &str) -> Option<Vec<DocumentId>> {
        self.finder.lock().included_by(included).map(<[DocumentId]>::to_vec)
    }

    pub fn with_graph<R>(&self, f: impl FnOnce(&IncludeGraph) -> R) -> R {
        let mut finder = self.finder.lock();
        f(finder.graph())
    }

    /// Direct access to the finder; don't hold the guard across `flush_markers`.
    pub fn finder(&self) -> MutexGuard<'_, IncludeFinder> {
        self.finder.lock()
    }

    /// Wait until every queued marker change has been applied.
    pub fn flush_markers(&self) {
        self.queue.flush();
    }
}

/// Open projects by id; a context is created on first use and dropped on close.
pub struct FinderRegistry {
    sink: Arc<dyn MarkerSink>,
    settings: FinderSettings,
    contexts: Mutex<HashMap<ProjectId, Arc<ProjectContext>>>,
}

impl FinderRegistry {
    #[must_use]
    pub fn new(sink: Arc<dyn MarkerSink>, settings: FinderSettings) -> Self {
        Self { sink, settings, contexts: Mutex::new(HashMap::new()) }
    }

    /// The context for `project`, creating it if this is its first use.
    ///
    /// # Errors
    /// Returns `IncludeGraphError::Io` if a new context's marker worker can't be started.
    pub fn get_or_open(
        &self,
        project: &Arc<dyn LayoutProject>,
    ) -> Result<Arc<ProjectContext>, IncludeGraphError> {
        let mut contexts = self.contexts.lock();
        if let Some(ctx) = contexts.get(project.id()) {
            return Ok(Arc::clone(ctx));
        }
        let ctx = Arc::new(ProjectContext::open(
            Arc::clone(project),
            Arc::clone(&self.sink),
            self.settings.clone(),
        )?);
        contexts.insert(project.id().clone(), Arc::clone(&ctx));
        Ok(ctx)
    }

    #[must_use]
    pub fn get(&self, id: &ProjectId) -> Option<Arc<ProjectContext>> {
        self.contexts.lock().get(id).cloned()
    }

    /// Close a project: pending marker changes are applied, then its graph is
    /// dropped. Returns false if the project wasn't open.
    pub fn close(&self, id: &ProjectId) -> bool {
        let removed = self.contexts.lock().remove(id);
        match removed {
            Some(ctx) => {
                ctx.flush_markers();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn open_projects(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.contexts.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Route a change notification to the project's context.
    ///
    /// # Errors
    /// Returns an error only if the project had to be opened and that failed.
    pub fn on_document_changed(
        &self,
        project: &Arc<dyn LayoutProject>,
        file: &LayoutFile,
        kind: ChangeKind,
    ) -> Result<ChangeOutcome, IncludeGraphError> {
        Ok(self.get_or_open(project)?.on_document_changed(file, kind))
    }
}

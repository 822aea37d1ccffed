//! layout-include-graph: incremental include graph for layout documents
//!
//! Tracks which layout documents include which (`<include layout="@layout/x"/>`),
//! keeps a reverse index of includers, persists the forward map as a compact
//! string per project, and reports cyclical include chains as problem markers
//! whenever a layout changes.
//!
//! # Features
//! - Forward and reverse lookups kept in step by a single mutation primitive
//! - Lenient, deterministic encoding of the include map for persistence
//! - Incremental cycle detection from the layout that just changed
//! - Marker updates applied off the notification path, with echo suppression
//! - Layout discovery with `.gitignore`/`.ignore` support
//!
//! # Quickstart (Library)
//! ```no_run
//! use std::sync::Arc;
//! use layout_include_graph::finder::{FinderRegistry, FinderSettings};
//! use layout_include_graph::project::{FsLayoutProject, LayoutProject, MarkerStore};
//!
//! let project: Arc<dyn LayoutProject> =
//!     Arc::new(FsLayoutProject::new(std::path::Path::new("."), "res", false));
//! let registry = FinderRegistry::new(Arc::new(MarkerStore::new()), FinderSettings::default());
//! let ctx = registry.get_or_open(&project).expect("open project");
//! println!("main includes {:?}", ctx.includes_from("main"));
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! layout-includes scan --path .
//! layout-includes query included-by header --format json
//! layout-includes update main
//! ```
pub mod app;
pub mod cli;
pub mod codec;
pub mod errors;
pub mod finder;
pub mod graph;
pub mod parser;
pub mod project;
pub mod query;
pub mod utils;

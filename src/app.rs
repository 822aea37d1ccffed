use crate::cli::{Cli, Commands, OutputFormat, QueryCommands};
use crate::codec::encode_map;
use crate::errors::IncludeGraphError;
use crate::finder::markers::is_cycle_marker;
use crate::finder::{ChangeOutcome, FinderRegistry, FinderSettings, ProjectContext};
use crate::graph::{DocumentId, IncludeGraph};
use crate::project::{ChangeKind, FsLayoutProject, LayoutFile, LayoutProject, Marker, MarkerSink, MarkerStore};
use crate::query::{CyclesQuery, IncludedByQuery, IncludesOfQuery, IncludingRootsQuery, Query};
use crate::utils::config::{load_config_near, try_load_config_at, Config};
use clap::CommandFactory;
use clap_complete::generate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Exit code of `update` when the layout ends up in an include cycle.
pub const EXIT_CYCLE: i32 = 3;
/// Exit code for a layout the graph knows nothing about.
pub const EXIT_UNKNOWN_DOCUMENT: i32 = 2;

// One CLI invocation's view of a project
struct Session {
    config: Config,
    project: Arc<FsLayoutProject>,
    store: Arc<MarkerStore>,
    registry: FinderRegistry,
    ctx: Arc<ProjectContext>,
}

impl Session {
    fn open(path: Option<&Path>, config: Option<&Path>, no_ignore: bool) -> Result<Self, IncludeGraphError> {
        let (root, config) = match config {
            Some(cfg_path) => {
                let cfg = try_load_config_at(cfg_path)?;
                let root = crate::utils::project_root::effective_path_opt(path, cfg.resource_dir());
                (root, cfg)
            }
            None => {
                let root = crate::utils::project_root::effective_path_opt(path, "res");
                let cfg = load_config_near(&root).unwrap_or_default();
                (root, cfg)
            }
        };
        let project = Arc::new(FsLayoutProject::new(&root, config.resource_dir(), no_ignore));
        let store = Arc::new(MarkerStore::new());
        let registry = FinderRegistry::new(store.clone(), FinderSettings::from_config(&config));
        let handle: Arc<dyn LayoutProject> = project.clone();
        let ctx = registry.get_or_open(&handle)?;
        Ok(Self { config, project, store, registry, ctx })
    }

    fn format(&self, requested: OutputFormat) -> OutputFormat {
        match self.config.query.as_ref().and_then(|q| q.default_format.as_deref()) {
            Some("json") => OutputFormat::Json,
            Some("text") => OutputFormat::Text,
            _ => requested,
        }
    }

    fn layout_file(&self, document: &str) -> LayoutFile {
        let folder = self.ctx.finder().settings().layout_folder.clone();
        let path = self.project.resource_root().join(&folder).join(format!("{document}.xml"));
        LayoutFile { id: DocumentId::new(document), folder, path }
    }

    fn close(self) {
        self.registry.close(self.project.id());
    }
}

fn knows(graph: &IncludeGraph, document: &str) -> bool {
    graph.includes_of(document).is_some() || graph.included_by(document).is_some()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            eprintln!("JSON encode error: {e}");
            1
        }
    }
}

fn print_documents(docs: &[DocumentId], fmt: OutputFormat, header: &str) -> i32 {
    if matches!(fmt, OutputFormat::Json) {
        return print_json(docs);
    }
    let rows: Vec<Vec<String>> = docs
        .iter()
        .enumerate()
        .map(|(i, d)| vec![format!("{}", i + 1), d.to_string()])
        .collect();
    println!("{}", crate::utils::table::render(&["#", header], &rows));
    0
}

// Open a session and run a document query against its graph
fn document_query<Q>(
    path: Option<&Path>,
    config: Option<&Path>,
    no_ignore: bool,
    format: OutputFormat,
    document: &str,
    header: &str,
    query: &Q,
) -> i32
where
    Q: Query<Vec<DocumentId>>,
{
    let session = match Session::open(path, config, no_ignore) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open project: {e}");
            return 1;
        }
    };
    let fmt = session.format(format);
    let results = session.ctx.with_graph(|g| knows(g, document).then(|| query.run(g)));
    let code = match results {
        Some(docs) => print_documents(&docs, fmt, header),
        None => {
            eprintln!("{}", IncludeGraphError::Query(format!("unknown layout '{document}'")));
            EXIT_UNKNOWN_DOCUMENT
        }
    };
    session.close();
    code
}

#[derive(Serialize)]
struct UpdateReport<'a> {
    document: &'a str,
    outcome: String,
    includes: Vec<DocumentId>,
    markers: Vec<Marker>,
}

/// Run the CLI logic in-process.
///
/// Returns an exit code (0 = success).
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn run_cli(cli: Cli) -> i32 {
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = crate::cli::Cli::command();
            let bin_name = cmd.get_name().to_string();
            let mut out = io::stdout();
            generate(shell, &mut cmd, bin_name, &mut out);
            0
        }
        Commands::Scan { path, config, no_ignore, rebuild, format } => {
            let session = match Session::open(path.as_deref(), config.as_deref(), no_ignore) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to open project: {e}");
                    return 1;
                }
            };
            if rebuild {
                session.ctx.finder().rescan();
            }
            let fmt = session.format(format);
            let includes: BTreeMap<String, Vec<DocumentId>> = session.ctx.with_graph(|g| {
                g.includes().iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
            });

            let code = if matches!(fmt, OutputFormat::Json) {
                print_json(&includes)
            } else {
                if !cli.quiet {
                    println!("Scanned {} layouts under {}", includes.len(), session.project.root().display());
                }
                let rows: Vec<Vec<String>> = includes
                    .iter()
                    .filter(|(_, v)| !v.is_empty())
                    .map(|(k, v)| {
                        let names: Vec<&str> = v.iter().map(DocumentId::as_str).collect();
                        vec![k.clone(), names.join(", ")]
                    })
                    .collect();
                println!("{}", crate::utils::table::render(&["Layout", "Includes"], &rows));
                0
            };
            session.close();
            code
        }
        Commands::Update { document, path, config, no_ignore, format } => {
            let session = match Session::open(path.as_deref(), config.as_deref(), no_ignore) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to open project: {e}");
                    return 1;
                }
            };
            let fmt = session.format(format);
            let file = session.layout_file(&document);
            let kind = if file.path.is_file() { ChangeKind::CONTENT } else { ChangeKind::REMOVED };
            let outcome = session.ctx.on_document_changed(&file, kind);
            if outcome == ChangeOutcome::Unchanged {
                // Markers live only as long as this process; re-check the stored graph
                session.ctx.finder().detect_cycles(&file.id);
            }
            session.ctx.flush_markers();

            let includes = session.ctx.includes_from(&document).unwrap_or_default();
            let markers = session.store.markers(&file.path).unwrap_or_default();
            let in_cycle = markers.iter().any(is_cycle_marker);

            let code = if matches!(fmt, OutputFormat::Json) {
                let report = UpdateReport {
                    document: &document,
                    outcome: format!("{outcome:?}"),
                    includes,
                    markers,
                };
                print_json(&report)
            } else {
                if !cli.quiet {
                    let names: Vec<&str> = includes.iter().map(DocumentId::as_str).collect();
                    println!("{document} ({outcome:?}): includes [{}]", names.join(", "));
                }
                if !markers.is_empty() {
                    let rows: Vec<Vec<String>> = markers
                        .iter()
                        .map(|m| {
                            vec![
                                m.line.to_string(),
                                format!("{:?}", m.severity),
                                m.message.clone().unwrap_or_default(),
                            ]
                        })
                        .collect();
                    println!("{}", crate::utils::table::render(&["Line", "Severity", "Message"], &rows));
                }
                0
            };
            session.close();
            if code == 0 && in_cycle {
                EXIT_CYCLE
            } else {
                code
            }
        }
        Commands::Query { query } => match query {
            QueryCommands::Includes { document, path, config, no_ignore, format } => document_query(
                path.as_deref(),
                config.as_deref(),
                no_ignore,
                format,
                &document,
                "Includes",
                &IncludesOfQuery::new(document.as_str()),
            ),
            QueryCommands::IncludedBy { document, path, config, no_ignore, format } => {
                document_query(
                    path.as_deref(),
                    config.as_deref(),
                    no_ignore,
                    format,
                    &document,
                    "Included by",
                    &IncludedByQuery::new(document.as_str()),
                )
            }
            QueryCommands::Roots { document, path, config, no_ignore, format } => document_query(
                path.as_deref(),
                config.as_deref(),
                no_ignore,
                format,
                &document,
                "Including layout",
                &IncludingRootsQuery::new(document.as_str()),
            ),
            QueryCommands::Cycles { path, config, no_ignore, format } => {
                let session = match Session::open(path.as_deref(), config.as_deref(), no_ignore) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!("Failed to open project: {e}");
                        return 1;
                    }
                };
                let fmt = session.format(format);
                let cycles = session.ctx.with_graph(|g| CyclesQuery::new().run(g));
                let code = if matches!(fmt, OutputFormat::Json) {
                    print_json(&cycles)
                } else if cycles.is_empty() {
                    println!("<no cycles>");
                    0
                } else {
                    for chain in &cycles {
                        println!("{chain}");
                    }
                    0
                };
                session.close();
                code
            }
            QueryCommands::Encoded { path, config, no_ignore } => {
                let session = match Session::open(path.as_deref(), config.as_deref(), no_ignore) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!("Failed to open project: {e}");
                        return 1;
                    }
                };
                let encoded = session.ctx.with_graph(|g| encode_map(g.includes()));
                println!("{encoded}");
                session.close();
                0
            }
        },
    }
}

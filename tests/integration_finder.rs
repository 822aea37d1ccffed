use layout_include_graph::finder::{ChangeOutcome, FinderRegistry, FinderSettings, DEFAULT_PROPERTY};
use layout_include_graph::graph::DocumentId;
use layout_include_graph::project::{
    ChangeKind, FsLayoutProject, LayoutFile, LayoutProject, MarkerSink, MarkerStore,
};
use layout_include_graph::utils::properties;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut f = fs::File::create(path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

fn layout(includes: &[&str]) -> String {
    let mut xml = String::from(
        "<LinearLayout xmlns:android=\"http://schemas.android.com/apk/res/android\">\n",
    );
    for i in includes {
        xml.push_str(&format!("    <include layout=\"@layout/{i}\"/>\n"));
    }
    xml.push_str("</LinearLayout>\n");
    xml
}

fn open(root: &Path) -> (Arc<MarkerStore>, FinderRegistry, Arc<dyn LayoutProject>) {
    let store = Arc::new(MarkerStore::new());
    let registry = FinderRegistry::new(store.clone(), FinderSettings::default());
    let project: Arc<dyn LayoutProject> = Arc::new(FsLayoutProject::new(root, "res", false));
    (store, registry, project)
}

fn stored(root: &Path) -> Option<String> {
    properties::load_properties(root).unwrap().values.get(DEFAULT_PROPERTY).cloned()
}

#[test]
fn scan_persist_update_and_reload() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let layouts = root.join("res/layout");
    write_file(&layouts.join("main.xml"), &layout(&["header", "footer"]));
    write_file(&layouts.join("header.xml"), &layout(&[]));
    write_file(
        &layouts.join("footer.xml"),
        r#"<merge><include layout="@android:layout/simple_list_item_1"/></merge>"#,
    );
    write_file(&root.join("res/layout-land/main.xml"), &layout(&["land_only"]));

    let (store, registry, project) = open(root);
    let ctx = registry.get_or_open(&project).unwrap();
    assert_eq!(
        ctx.includes_from("main"),
        Some(vec![DocumentId::from("header"), DocumentId::from("footer")])
    );
    assert_eq!(ctx.included_by("land_only"), None);
    assert_eq!(stored(root).as_deref(), Some("footer,header,main=>{header,footer}"));

    // header now includes main: a cycle through the edited layout
    let header = LayoutFile::from_path(&layouts.join("header.xml")).unwrap();
    write_file(&header.path, &layout(&["main"]));
    assert_eq!(ctx.on_document_changed(&header, ChangeKind::CONTENT), ChangeOutcome::Updated);
    ctx.flush_markers();
    let markers = store.markers(&header.path).unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(
        markers[0].message.as_deref(),
        Some("Found cyclical <include> chain: header=>main=>header")
    );
    assert_eq!(stored(root).as_deref(), Some("footer,header=>{main},main=>{header,footer}"));
    assert!(registry.close(project.id()));

    // A new session restores the stored map instead of rescanning
    write_file(&layouts.join("main.xml"), &layout(&[]));
    let (_store, registry, project) = open(root);
    let ctx = registry.get_or_open(&project).unwrap();
    assert_eq!(
        ctx.includes_from("main"),
        Some(vec![DocumentId::from("header"), DocumentId::from("footer")])
    );
    assert_eq!(ctx.included_by("main"), Some(vec![DocumentId::from("header")]));
}

#[test]
fn fixing_a_cycle_retracts_only_cycle_markers() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let layouts = root.join("res/layout");
    write_file(&layouts.join("a.xml"), &layout(&["b"]));
    write_file(&layouts.join("b.xml"), &layout(&[]));

    let (store, registry, project) = open(root);
    let ctx = registry.get_or_open(&project).unwrap();
    ctx.with_graph(|g| assert_eq!(g.len(), 2));

    let b = LayoutFile::from_path(&layouts.join("b.xml")).unwrap();
    write_file(&b.path, &layout(&["b"]));
    assert_eq!(ctx.on_document_changed(&b, ChangeKind::CONTENT), ChangeOutcome::Updated);
    ctx.flush_markers();
    store
        .add_marker(&b.path, layout_include_graph::project::Marker::error("unrelated", 2))
        .unwrap();
    assert_eq!(store.markers(&b.path).unwrap().len(), 2);

    write_file(&b.path, &layout(&[]));
    assert_eq!(ctx.on_document_changed(&b, ChangeKind::CONTENT), ChangeOutcome::Updated);
    ctx.flush_markers();
    let left = store.markers(&b.path).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].message.as_deref(), Some("unrelated"));
}

#[test]
fn oversized_map_is_not_persisted() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let layouts = root.join("res/layout");
    let n = 40;
    for i in 0..n {
        let next = format!("a_rather_long_layout_resource_name_{:03}", (i + 1) % n);
        write_file(
            &layouts.join(format!("a_rather_long_layout_resource_name_{i:03}.xml")),
            &layout(&[next.as_str()]),
        );
    }
    let (_store, registry, project) = open(root);
    let ctx = registry.get_or_open(&project).unwrap();
    ctx.with_graph(|g| assert_eq!(g.len(), n));
    assert_eq!(stored(root), None);
    assert_eq!(
        ctx.included_by("a_rather_long_layout_resource_name_000"),
        Some(vec![DocumentId::from("a_rather_long_layout_resource_name_039")])
    );
}

#[test]
fn unreadable_layout_counts_as_no_includes() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let layouts = root.join("res/layout");
    write_file(&layouts.join("main.xml"), &layout(&["row"]));
    fs::write(layouts.join("binary.xml"), [0xff_u8, 0xfe, b'<', b'i']).unwrap();
    write_file(&layouts.join("broken.xml"), "<merge><include layout=\"@layout/row\"></merge>");

    let (_store, registry, project) = open(root);
    let ctx = registry.get_or_open(&project).unwrap();
    assert_eq!(ctx.includes_from("binary"), Some(vec![]));
    assert_eq!(ctx.includes_from("broken"), Some(vec![]));
    assert_eq!(ctx.included_by("row"), Some(vec![DocumentId::from("main")]));
}

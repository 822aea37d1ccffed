use layout_include_graph::app::{run_cli, EXIT_CYCLE};
use layout_include_graph::cli::{Cli, Commands, OutputFormat, QueryCommands};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::tempdir;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut f = fs::File::create(path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

fn cli(command: Commands) -> Cli {
    Cli { quiet: true, verbose: 0, command }
}

#[test]
fn app_scan_rebuild_and_query_json_branch() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();
    write_file(&root.join("res/layout/main.xml"), r#"<merge><include layout="@layout/row"/></merge>"#);
    write_file(&root.join("res/layout/row.xml"), "<merge/>");

    let code = run_cli(cli(Commands::Scan {
        path: Some(root.clone()),
        config: None,
        no_ignore: false,
        rebuild: true,
        format: OutputFormat::Json,
    }));
    assert_eq!(code, 0);
    assert!(root.join(".layout_includes.json").exists());

    let code = run_cli(cli(Commands::Query {
        query: QueryCommands::Roots {
            document: "row".into(),
            path: Some(root.clone()),
            config: None,
            no_ignore: false,
            format: OutputFormat::Text,
        },
    }));
    assert_eq!(code, 0);
}

#[test]
fn app_update_with_config_file() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let cfg = root.join("custom.toml");
    write_file(&cfg, "[project]\nresource_dir = \"src/res\"\n\n[query]\ndefault_format = \"json\"\n");
    write_file(&root.join("src/res/layout/loop.xml"), r#"<merge><include layout="@layout/loop"/></merge>"#);

    let code = run_cli(cli(Commands::Update {
        document: "loop".into(),
        path: Some(root.clone()),
        config: Some(cfg.clone()),
        no_ignore: false,
        format: OutputFormat::Text,
    }));
    assert_eq!(code, EXIT_CYCLE);

    let bad = root.join("bad.toml");
    write_file(&bad, "[project\n");
    let code = run_cli(cli(Commands::Query {
        query: QueryCommands::Cycles { path: Some(root), config: Some(bad), no_ignore: false, format: OutputFormat::Text },
    }));
    assert_eq!(code, 1);
}

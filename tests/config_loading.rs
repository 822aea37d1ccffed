use layout_include_graph::finder::FinderSettings;
use layout_include_graph::utils::config::{self};
use std::fs;
use std::path::Path;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    fs::write(path, content).unwrap();
}

#[test]
fn parses_full_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("layout-includes.toml");
    let data = r#"
[project]
resource_dir = "src/main/res"
layout_folder = "layout"
platform_namespace = "framework"

[persistence]
property = "my.includes"
max_encoded_len = 512

[query]
default_format = "json"
"#;
    write(&cfg_path, data);

    let cfg = config::load_config_at(&cfg_path).expect("config parsed");
    assert_eq!(cfg.resource_dir(), "src/main/res");
    assert_eq!(
        cfg.query.as_ref().and_then(|q| q.default_format.as_ref()).map(|s| s.as_str()),
        Some("json")
    );

    let settings = FinderSettings::from_config(&cfg);
    assert_eq!(settings.layout_folder, "layout");
    assert_eq!(settings.platform_namespace, "framework");
    assert_eq!(settings.property, "my.includes");
    assert_eq!(settings.max_encoded_len, 512);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("layout-includes.toml");
    write(&cfg_path, "[persistence]\nmax_encoded_len = 100\n");

    let cfg = config::load_config_at(&cfg_path).expect("config parsed");
    assert_eq!(cfg.resource_dir(), "res");
    let settings = FinderSettings::from_config(&cfg);
    assert_eq!(settings.max_encoded_len, 100);
    assert_eq!(settings.property, FinderSettings::default().property);
    assert_eq!(settings.platform_namespace, "android");
}

#[test]
fn load_config_near_looks_for_default_name() {
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("layout-includes.toml"), "[query]\ndefault_format = 'text'\n");

    let cfg = config::load_config_near(tmp.path()).expect("found default config");
    assert_eq!(cfg.query.and_then(|q| q.default_format), Some("text".to_string()));
    assert!(config::load_config_near(&tmp.path().join("elsewhere")).is_none());
}

#[test]
fn invalid_toml_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("layout-includes.toml");
    write(&cfg_path, "[persistence]\nmax_encoded_len = \"lots\"\n");

    let err = config::try_load_config_at(&cfg_path).unwrap_err();
    assert!(err.to_string().starts_with("Invalid configuration"));
    assert!(config::load_config_at(&cfg_path).is_none());
}

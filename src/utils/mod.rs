// Host-side helpers: config, file discovery, property file, root detection, tables
pub mod table {
    fn width(s: &str) -> usize {
        s.chars().count()
    }

    fn sep(widths: &[usize]) -> String {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    }

    fn line(cells: &[&str], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (cell, w) in cells.iter().zip(widths) {
            s.push(' ');
            s.push_str(cell);
            s.push_str(&" ".repeat(w.saturating_sub(width(cell))));
            s.push_str(" |");
        }
        s
    }

    /// Render an ASCII table; rows shorter than the header are padded with blanks.
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let mut widths: Vec<usize> = headers.iter().map(|h| width(h)).collect();
        for row in rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(width(cell));
            }
        }

        let rule = sep(&widths);
        let mut out = Vec::with_capacity(rows.len() + 4);
        out.push(rule.clone());
        out.push(line(headers, &widths));
        out.push(rule.clone());
        for row in rows {
            let cells: Vec<&str> =
                (0..headers.len()).map(|i| row.get(i).map_or("", String::as_str)).collect();
            out.push(line(&cells, &widths));
        }
        out.push(rule);
        out.join("\n")
    }
}

pub mod config {
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::errors::IncludeGraphError;

    pub const CONFIG_FILE_NAME: &str = "layout-includes.toml";

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct ProjectConfig {
        pub resource_dir: Option<String>,
        pub layout_folder: Option<String>,
        pub platform_namespace: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct PersistenceConfig {
        pub property: Option<String>,
        pub max_encoded_len: Option<usize>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct QueryConfig {
        pub default_format: Option<String>, // "text" | "json"
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct Config {
        pub project: Option<ProjectConfig>,
        pub persistence: Option<PersistenceConfig>,
        pub query: Option<QueryConfig>,
    }

    impl Config {
        #[must_use]
        pub fn resource_dir(&self) -> &str {
            self.project.as_ref().and_then(|p| p.resource_dir.as_deref()).unwrap_or("res")
        }
    }

    fn default_config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Read and parse a config file, reporting why it couldn't be used.
    ///
    /// # Errors
    /// Returns `IncludeGraphError::Io` if the file can't be read and
    /// `IncludeGraphError::Config` if it isn't valid TOML for [`Config`].
    pub fn try_load_config_at(path: &Path) -> Result<Config, IncludeGraphError> {
        let data = fs::read_to_string(path)?;
        toml::from_str::<Config>(&data)
            .map_err(|e| IncludeGraphError::Config(format!("{}: {e}", path.display())))
    }

    #[must_use]
    pub fn load_config_at(path: &Path) -> Option<Config> {
        try_load_config_at(path).ok()
    }

    #[must_use]
    pub fn load_config_near(root: &Path) -> Option<Config> {
        let p = default_config_path(root);
        if p.exists() {
            load_config_at(&p)
        } else {
            None
        }
    }
}

pub mod properties {
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    use crate::errors::IncludeGraphError;

    /// Per-project persistent string properties.
    #[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
    pub struct Properties {
        pub values: BTreeMap<String, String>,
    }

    #[must_use]
    pub fn properties_path(root: &Path) -> PathBuf {
        root.join(".layout_includes.json")
    }

    /// Load the property file; a missing file is an empty property set.
    ///
    /// # Errors
    /// Returns `IncludeGraphError::Persistence` if the file exists but can't be
    /// read or parsed.
    pub fn load_properties(root: &Path) -> Result<Properties, IncludeGraphError> {
        let path = properties_path(root);
        let data = match std::fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Properties::default()),
            Err(e) => {
                return Err(IncludeGraphError::Persistence(format!("{}: {e}", path.display())))
            }
        };
        serde_json::from_str::<Properties>(&data)
            .map_err(|e| IncludeGraphError::Persistence(format!("{}: {e}", path.display())))
    }

    /// # Errors
    /// Returns `IncludeGraphError::Persistence` if serialization or writing fails.
    pub fn save_properties(root: &Path, props: &Properties) -> Result<(), IncludeGraphError> {
        let path = properties_path(root);
        let data = serde_json::to_string_pretty(props)
            .map_err(|e| IncludeGraphError::Persistence(e.to_string()))?;
        std::fs::write(&path, data)
            .map_err(|e| IncludeGraphError::Persistence(format!("{}: {e}", path.display())))
    }
}

pub mod file_walker {
    use std::path::{Path, PathBuf};

    /// Discover layout XML files (`<resource root>/layout*/*.xml`), with an
    /// option to bypass ignore rules. Results are sorted by path.
    #[must_use]
    pub fn layout_files_with_options(resource_root: &Path, no_ignore: bool) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if !resource_root.is_dir() {
            return out;
        }
        let mut walker = ignore::WalkBuilder::new(resource_root);
        walker
            .follow_links(false)
            .max_depth(Some(2))
            .hidden(false)
            .git_ignore(!no_ignore)
            .git_global(false)
            .git_exclude(false)
            .ignore(!no_ignore)
            .parents(!no_ignore)
            .require_git(false);
        for entry in walker.build().flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if path.extension() != Some(std::ffi::OsStr::new("xml")) {
                continue;
            }
            let in_layout_folder = path
                .parent()
                .and_then(Path::file_name)
                .and_then(|f| f.to_str())
                .is_some_and(|f| f == "layout" || f.starts_with("layout-"));
            if in_layout_folder {
                out.push(path.to_path_buf());
            }
        }
        out.sort();
        out
    }
}

pub mod project_root {
    use std::env;
    use std::path::{Path, PathBuf};

    /// Walk ancestors of `start` (or the current dir) looking for a directory
    /// containing `<resource_dir>/layout`.
    #[must_use]
    pub fn detect(start: Option<&Path>, resource_dir: &str) -> PathBuf {
        let fallback = || env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut cur = start.map_or_else(fallback, Path::to_path_buf);
        loop {
            if cur.join(resource_dir).join("layout").is_dir() {
                return cur;
            }
            match cur.parent() {
                Some(parent) => cur = parent.to_path_buf(),
                None => return start.map_or_else(fallback, Path::to_path_buf),
            }
        }
    }

    /// None or "." resolve to the detected project root; any other path is used as-is.
    #[must_use]
    pub fn effective_path_opt(p: Option<&Path>, resource_dir: &str) -> PathBuf {
        match p {
            None => detect(None, resource_dir),
            Some(path) if path == Path::new(".") => detect(None, resource_dir),
            Some(path) => path.to_path_buf(),
        }
    }
}

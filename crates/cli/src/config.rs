// ==============================================================================
// closure-infer.toml Configuration
// ==============================================================================
//
// Discovers and loads `closure-infer.toml` project configuration files.
// Provides the files to analyze (as globs relative to the config file) and
// the analysis options.
//
// Example closure-infer.toml:
//
// ```toml
// files = ["src/**/*.js", "third_party/closure/**/*.js"]
//
// [analysis]
// provide_functions = ["goog.provide", "goog.module"]
// require_functions = ["goog.require"]
// ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lang_check::AnalysisConfig;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "closure-infer.toml";

/// Top-level `closure-infer.toml` configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    /// Glob patterns for the files to analyze (relative to the config file).
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("could not read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid file pattern `{pattern}`")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Walk up from `start_dir` looking for `closure-infer.toml`. Returns the
/// first match.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir;
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

/// Read and parse a `closure-infer.toml` file.
pub fn load_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Every `.js` file under `config_dir` matching one of the configured
/// patterns, sorted.
pub fn discover_files(config: &ProjectConfig, config_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if config.files.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = globset::GlobSetBuilder::new();
    for pattern in &config.files {
        let glob = globset::GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    let glob_set = builder.build().map_err(|source| ConfigError::Glob {
        pattern: config.files.join(", "),
        source,
    })?;

    let mut paths = Vec::new();
    let mut seen = HashSet::new();
    walk_dir_matching(config_dir, config_dir, &glob_set, &mut seen, &mut paths);
    paths.sort();
    Ok(paths)
}

/// Recursively walk `dir`, matching files against `glob_set` using paths
/// relative to `root`.
fn walk_dir_matching(
    dir: &Path,
    root: &Path,
    glob_set: &globset::GlobSet,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<PathBuf>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("could not read {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_dir_matching(&path, root, glob_set, seen, out);
        } else if path.is_file() && path.extension().is_some_and(|ext| ext == "js") {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if glob_set.is_match(relative) && seen.insert(path.clone()) {
                out.push(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("closure-infer-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn parse_minimal_config() {
        let toml_str = r#"
            files = ["src/**/*.js"]
        "#;
        let config: ProjectConfig = toml::from_str(toml_str).expect("parse error");
        assert_eq!(config.files, vec!["src/**/*.js"]);
        assert_eq!(config.analysis, AnalysisConfig::default());
    }

    #[test]
    fn parse_config_with_analysis() {
        let toml_str = r#"
            files = ["lib/*.js"]

            [analysis]
            provide_functions = ["goog.provide", "goog.module"]
        "#;
        let config: ProjectConfig = toml::from_str(toml_str).expect("parse error");
        assert_eq!(
            config.analysis.provide_functions,
            vec!["goog.provide", "goog.module"]
        );
        assert_eq!(config.analysis.require_functions, vec!["goog.require"]);
        assert!(config.analysis.is_namespace_fn("goog.module"));
    }

    #[test]
    fn parse_empty_config() {
        let config: ProjectConfig = toml::from_str("").expect("parse error");
        assert!(config.files.is_empty());
        assert!(config.analysis.is_namespace_fn("goog.provide"));
    }

    #[test]
    fn reject_bad_types() {
        let err = toml::from_str::<ProjectConfig>("files = 3").unwrap_err();
        assert!(err.to_string().contains("files"));
    }

    #[test]
    fn find_config_walks_up() {
        let root = scratch_dir("find");
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "").unwrap();

        assert_eq!(find_config(&nested), Some(root.join(CONFIG_FILE)));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn discover_matching_js_files() {
        let root = scratch_dir("discover");
        std::fs::create_dir_all(root.join("src").join("ui")).unwrap();
        std::fs::create_dir_all(root.join("test")).unwrap();
        std::fs::write(root.join("src").join("main.js"), "").unwrap();
        std::fs::write(root.join("src").join("ui").join("button.js"), "").unwrap();
        std::fs::write(root.join("src").join("notes.txt"), "").unwrap();
        std::fs::write(root.join("test").join("main_test.js"), "").unwrap();

        let config = ProjectConfig {
            files: vec!["src/**/*.js".into()],
            ..Default::default()
        };
        let files = discover_files(&config, &root).unwrap();
        assert_eq!(
            files,
            vec![
                root.join("src").join("main.js"),
                root.join("src").join("ui").join("button.js"),
            ]
        );
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let config = ProjectConfig {
            files: vec!["src/[.js".into()],
            ..Default::default()
        };
        let err = discover_files(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Glob { .. }));
    }
}

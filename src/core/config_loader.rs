//! # Config Loader
//!
//! Locates, reads and parses the `bpm` configuration file, then hands the result to
//! the registry build step. TOML and YAML are supported, chosen by file extension.

use crate::{
    core::{
        paths::{self, PathError},
        registry::ActionRegistry,
    },
    models::ConfigFile,
};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Represents errors that can occur while loading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("Could not read config file '{path}': {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Repository discovery failed.
    #[error(transparent)]
    Path(#[from] PathError),
    /// An explicitly requested config file does not exist.
    #[error("Config file '{0}' does not exist.")]
    NotFound(PathBuf),
    /// No config file could be discovered.
    #[error("Config file not found in repo '{0}'.")]
    NoConfigFound(PathBuf),
    /// The file extension is neither TOML nor YAML.
    #[error("Unsupported config file format '{0}'. Use a .toml, .yml or .yaml file.")]
    UnsupportedFormat(PathBuf),
    /// The TOML content is invalid.
    #[error("Failed to parse TOML file at '{path}': {source}")]
    TomlParse {
        /// The path to the file that failed to parse.
        path: PathBuf,
        /// The underlying parsing error from the `toml` crate.
        #[source]
        source: toml::de::Error,
    },
    /// The YAML content is invalid.
    #[error("Failed to parse YAML file at '{path}': {source}")]
    YamlParse {
        /// The path to the file that failed to parse.
        path: PathBuf,
        /// The underlying parsing error from the `serde_yaml` crate.
        #[source]
        source: serde_yaml::Error,
    },
    /// A module or action points at a directory that does not exist.
    #[error("The workdir path '{}' of '{owner}' does not exist within the repo root '{}'.", .path.display(), .root.display())]
    MissingWorkDir {
        /// `module` or `module.action` owning the directory.
        owner: String,
        /// The resolved directory.
        path: PathBuf,
        /// The repository root it was resolved against.
        root: PathBuf,
    },
    /// An action's command line cannot be split into words.
    #[error("The command of action '{action}' cannot be parsed: {command}")]
    InvalidCommand {
        /// Qualified action name.
        action: String,
        /// The offending command line.
        command: String,
    },
}

/// The supported configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.yml` / `.yaml`
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("yml" | "yaml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A configuration that has been located, parsed and built into a registry.
#[derive(Debug)]
pub struct LoadedConfig {
    /// The file the configuration was read from.
    pub path: PathBuf,
    /// The root that working directories were resolved against.
    pub repo_root: PathBuf,
    /// The resulting registry.
    pub registry: ActionRegistry,
}

/// Locates and loads the configuration for the current directory.
///
/// `explicit` comes from `--config` or `BPM_CONFIG_PATH`. Without it the file is
/// discovered from the Git repository root.
///
/// # Errors
/// Any `ConfigError`: missing repository or file, parse failures, invalid modules.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let cwd = env::current_dir().map_err(|source| ConfigError::Io {
        path: PathBuf::from("."),
        source,
    })?;

    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            let repo_root = match paths::find_repo_root(&cwd) {
                Ok(root) => root,
                Err(e) => {
                    let parent = config_parent(path, &cwd);
                    log::debug!(
                        "{}; resolving paths against '{}' instead.",
                        e,
                        parent.display()
                    );
                    parent
                }
            };
            load_from(path, &repo_root)
        }
        None => {
            let repo_root = paths::find_repo_root(&cwd)?;
            let path = paths::find_config_file(&repo_root, &cwd)
                .ok_or_else(|| ConfigError::NoConfigFound(repo_root.clone()))?;
            load_from(&path, &repo_root)
        }
    }
}

/// Loads a specific config file, resolving working directories against `repo_root`.
///
/// # Errors
/// Read, parse and registry build errors.
pub fn load_from(path: &Path, repo_root: &Path) -> Result<LoadedConfig, ConfigError> {
    log::debug!(
        "Loading config '{}' (root: '{}')",
        path.display(),
        repo_root.display()
    );
    let config = parse_config_file(path)?;
    let registry = ActionRegistry::build(config, repo_root)?;
    Ok(LoadedConfig {
        path: path.to_path_buf(),
        repo_root: repo_root.to_path_buf(),
        registry,
    })
}

/// Reads and parses a config file without building the registry.
///
/// # Errors
/// `UnsupportedFormat` for unknown extensions, `Io` and parse errors otherwise.
pub fn parse_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let format =
        ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content, format, path)
}

/// Parses config text in the given format. `origin` is only used in error messages.
///
/// # Errors
/// `TomlParse` or `YamlParse`.
pub fn parse_config_str(
    content: &str,
    format: ConfigFormat,
    origin: &Path,
) -> Result<ConfigFile, ConfigError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|source| ConfigError::TomlParse {
            path: origin.to_path_buf(),
            source,
        }),
        ConfigFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|source| ConfigError::YamlParse {
                path: origin.to_path_buf(),
                source,
            })
        }
    }
}

fn config_parent(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TOML_CONFIG: &str = r#"
[modules.web]
work_dir = "web"

[modules.web.actions.start]
cmd = "npm run dev"
args = true
bg = true

[modules.api]
work_dir = "api"

[modules.api.actions.start]
cmd = "cargo run"

[modules.api.actions.migrate]
cmd = "cargo run --bin migrate"
"#;

    const YAML_CONFIG: &str = r#"
modules:
  web:
    work_dir: web
    actions:
      start:
        cmd: npm run dev
        args: true
        bg: true
  api:
    work_dir: /api
    actions:
      start:
        cmd: cargo run
      migrate:
        cmd: cargo run --bin migrate
        watch_cmd: cargo watch -x "run --bin migrate"
"#;

    fn project_root() -> tempfile::TempDir {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("web")).unwrap();
        fs::create_dir_all(root.path().join("api")).unwrap();
        root
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("bpm.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("bpm.yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("bpm.yaml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("bpm.json")), None);
    }

    #[test]
    fn test_load_toml_keeps_declaration_order() {
        // --- Setup ---
        let root = project_root();
        let path = root.path().join("bpm.toml");
        fs::write(&path, TOML_CONFIG).unwrap();

        // --- Execute ---
        let loaded = load_from(&path, root.path()).unwrap();

        // --- Assert ---
        assert_eq!(loaded.registry.module_names(), ["web", "api"]);
        let group = loaded.registry.group("start").unwrap();
        let members: Vec<String> = group.actions.iter().map(|a| a.qualified_name()).collect();
        assert_eq!(members, ["web.start", "api.start"]);
        assert!(loaded.registry.group("migrate").is_none());
    }

    #[test]
    fn test_load_yaml() {
        let root = project_root();
        let path = root.path().join("bpm.yaml");
        fs::write(&path, YAML_CONFIG).unwrap();

        let loaded = load_from(&path, root.path()).unwrap();

        assert_eq!(loaded.registry.module_names(), ["web", "api"]);
        let api = loaded.registry.module("api").unwrap();
        assert_eq!(
            api.working_directory,
            dunce::canonicalize(root.path().join("api")).unwrap()
        );
        let migrate = api.action("migrate").unwrap();
        assert_eq!(
            migrate.watch_command.as_deref(),
            Some("cargo watch -x \"run --bin migrate\"")
        );
        let web_start = loaded.registry.module("web").unwrap().action("start").unwrap();
        assert!(web_start.accepts_extra_args);
        assert!(web_start.backgroundable);
    }

    #[test]
    fn test_yml_extension_is_yaml() {
        let root = project_root();
        let path = root.path().join("bpm.yml");
        fs::write(&path, YAML_CONFIG).unwrap();

        assert!(load_from(&path, root.path()).is_ok());
    }

    #[test]
    fn test_unsupported_format() {
        let root = project_root();
        let path = root.path().join("bpm.json");
        fs::write(&path, "{}").unwrap();

        let result = parse_config_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_cmd_is_parse_error() {
        let result = parse_config_str(
            "[modules.api]\nwork_dir = \"api\"\n[modules.api.actions.start]\nbg = true\n",
            ConfigFormat::Toml,
            Path::new("bpm.toml"),
        );
        assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let result = parse_config_str("modules: [", ConfigFormat::Yaml, Path::new("bpm.yaml"));
        assert!(matches!(result, Err(ConfigError::YamlParse { .. })));
    }

    #[test]
    fn test_explicit_missing_path() {
        let dir = tempdir().unwrap();
        let result = load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}

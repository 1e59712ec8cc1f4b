//! # Action Registry
//!
//! Turns a loaded `ConfigFile` into immutable `Module`/`Action` values and derives
//! the action groups: names that are shared by two or more modules.
//!
//! The build step fills in every derived field (`name`, `module_name`, an inherited
//! `working_directory`) before the values are constructed. Nothing is mutated
//! afterwards, so actions can be shared freely across concurrently running tasks.

use crate::{
    core::{config_loader::ConfigError, paths},
    models::{Action, ActionConfig, ActionGroup, ConfigFile, Module},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The immutable table of modules, actions and action groups for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRegistry {
    modules: Vec<Module>,
    by_name: Vec<(String, Vec<Arc<Action>>)>,
    groups: Vec<ActionGroup>,
}

impl ActionRegistry {
    /// Builds the registry from a parsed configuration file.
    ///
    /// Module working directories are rebased onto `repo_root`; actions without their
    /// own `work_dir` inherit the module's. Every directory must exist.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingWorkDir` for a directory that does not exist and
    /// `ConfigError::InvalidCommand` for a command line that cannot be tokenized.
    pub fn build(config: ConfigFile, repo_root: &Path) -> Result<Self, ConfigError> {
        let mut modules = Vec::with_capacity(config.modules.len());

        for (module_name, module_config) in config.modules {
            let module_dir = resolve_work_dir(repo_root, &module_config.work_dir, &module_name)?;

            let mut actions = Vec::with_capacity(module_config.actions.len());
            for (action_name, action_config) in module_config.actions {
                let action =
                    build_action(repo_root, &module_name, &module_dir, action_name, action_config)?;
                actions.push(Arc::new(action));
            }

            log::debug!(
                "Module '{}' at '{}' with {} action(s)",
                module_name,
                module_dir.display(),
                actions.len()
            );
            modules.push(Module {
                name: module_name,
                working_directory: module_dir,
                actions,
            });
        }

        Ok(Self::from_modules(modules))
    }

    /// Builds the registry from already-constructed modules. Performs no I/O.
    pub fn from_modules(modules: Vec<Module>) -> Self {
        let mut by_name: Vec<(String, Vec<Arc<Action>>)> = Vec::new();
        for module in &modules {
            for action in &module.actions {
                match by_name.iter_mut().find(|(name, _)| *name == action.name) {
                    Some((_, list)) => list.push(Arc::clone(action)),
                    None => by_name.push((action.name.clone(), vec![Arc::clone(action)])),
                }
            }
        }

        let groups = by_name
            .iter()
            .filter(|(_, list)| list.len() > 1)
            .map(|(name, list)| ActionGroup {
                name: name.clone(),
                actions: list.clone(),
            })
            .collect::<Vec<_>>();

        if log::log_enabled!(log::Level::Trace) {
            for group in &groups {
                log::trace!(
                    "Action group '{}': {}",
                    group.name,
                    group
                        .actions
                        .iter()
                        .map(|a| a.qualified_name())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }

        Self {
            modules,
            by_name,
            groups,
        }
    }

    /// All modules, in declaration order.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Looks up a module by name.
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Names of all modules, in declaration order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Every action sharing `name`, across all modules, in module declaration order.
    /// Returns an empty slice for unknown names.
    pub fn actions_named(&self, name: &str) -> &[Arc<Action>] {
        self.by_name
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, list)| list.as_slice())
            .unwrap_or(&[])
    }

    /// All action names with their actions, in order of first appearance.
    pub fn all_actions(&self) -> impl Iterator<Item = (&str, &[Arc<Action>])> {
        self.by_name.iter().map(|(n, list)| (n.as_str(), list.as_slice()))
    }

    /// The action groups: names defined in two or more modules.
    pub fn groups(&self) -> &[ActionGroup] {
        &self.groups
    }

    /// Looks up an action group by name.
    pub fn group(&self, name: &str) -> Option<&ActionGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

fn build_action(
    repo_root: &Path,
    module_name: &str,
    module_dir: &Path,
    name: String,
    config: ActionConfig,
) -> Result<Action, ConfigError> {
    let qualified = format!("{module_name}.{name}");

    let working_directory = match &config.work_dir {
        Some(dir) => resolve_work_dir(repo_root, dir, &qualified)?,
        None => module_dir.to_path_buf(),
    };

    match shlex::split(&config.cmd) {
        Some(words) if !words.is_empty() => {}
        _ => {
            return Err(ConfigError::InvalidCommand {
                action: qualified,
                command: config.cmd,
            });
        }
    }

    Ok(Action {
        name,
        module_name: module_name.to_string(),
        command: config.cmd,
        working_directory,
        accepts_extra_args: config.args.unwrap_or(false),
        backgroundable: config.bg.unwrap_or(false),
        watch_command: config.watch_cmd,
    })
}

fn resolve_work_dir(repo_root: &Path, dir: &Path, owner: &str) -> Result<PathBuf, ConfigError> {
    let rebased = paths::rebase_path(repo_root, dir);
    if !rebased.is_dir() {
        return Err(ConfigError::MissingWorkDir {
            owner: owner.to_string(),
            path: rebased,
            root: repo_root.to_path_buf(),
        });
    }
    Ok(dunce::canonicalize(&rebased).unwrap_or(rebased))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeclaredMap, ModuleConfig};
    use std::fs;
    use tempfile::tempdir;

    fn action(module: &str, name: &str) -> Arc<Action> {
        Arc::new(Action {
            name: name.to_string(),
            module_name: module.to_string(),
            command: "true".to_string(),
            working_directory: PathBuf::from("/"),
            accepts_extra_args: false,
            backgroundable: false,
            watch_command: None,
        })
    }

    fn module(name: &str, actions: &[&str]) -> Module {
        Module {
            name: name.to_string(),
            working_directory: PathBuf::from("/"),
            actions: actions.iter().map(|a| action(name, a)).collect(),
        }
    }

    fn action_config(cmd: &str) -> ActionConfig {
        ActionConfig {
            cmd: cmd.to_string(),
            args: None,
            watch_cmd: None,
            work_dir: None,
            bg: None,
        }
    }

    fn qualified(actions: &[Arc<Action>]) -> Vec<String> {
        actions.iter().map(|a| a.qualified_name()).collect()
    }

    #[test]
    fn test_groups_only_contain_shared_names() {
        let registry = ActionRegistry::from_modules(vec![
            module("api", &["start", "migrate"]),
            module("web", &["start", "lint"]),
        ]);

        let names: Vec<&str> = registry.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["start"]);
        assert!(registry.group("migrate").is_none());
        assert!(registry.group("lint").is_none());
    }

    #[test]
    fn test_group_members_follow_module_declaration_order() {
        let registry = ActionRegistry::from_modules(vec![
            module("zeta", &["build"]),
            module("alpha", &["build"]),
            module("mid", &["test", "build"]),
        ]);

        let group = registry.group("build").unwrap();
        assert_eq!(group.actions.len(), 3);
        assert_eq!(qualified(&group.actions), ["zeta.build", "alpha.build", "mid.build"]);
    }

    #[test]
    fn test_all_actions_includes_singletons_in_first_appearance_order() {
        let registry = ActionRegistry::from_modules(vec![
            module("api", &["start", "migrate"]),
            module("web", &["lint", "start"]),
        ]);

        let names: Vec<&str> = registry.all_actions().map(|(n, _)| n).collect();
        assert_eq!(names, ["start", "migrate", "lint"]);
        assert_eq!(registry.actions_named("migrate").len(), 1);
        assert!(registry.actions_named("deploy").is_empty());
    }

    #[test]
    fn test_build_fills_derived_fields_and_inherits_work_dir() {
        // --- Setup ---
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("api/scripts")).unwrap();

        let mut start = action_config("cargo run");
        start.args = Some(true);
        start.bg = Some(true);
        start.watch_cmd = Some("cargo watch -x run".to_string());
        let mut seed = action_config("./seed.sh");
        seed.work_dir = Some(PathBuf::from("api/scripts"));

        let config = ConfigFile {
            modules: [(
                "api".to_string(),
                ModuleConfig {
                    work_dir: PathBuf::from("/api"),
                    actions: [("start".to_string(), start), ("seed".to_string(), seed)]
                        .into_iter()
                        .collect(),
                },
            )]
            .into_iter()
            .collect(),
        };

        // --- Execute ---
        let registry = ActionRegistry::build(config, root.path()).unwrap();

        // --- Assert ---
        let canonical_root = dunce::canonicalize(root.path()).unwrap();
        let api = registry.module("api").unwrap();
        assert_eq!(api.working_directory, canonical_root.join("api"));

        let start = api.action("start").unwrap();
        assert_eq!(start.name, "start");
        assert_eq!(start.module_name, "api");
        assert!(start.accepts_extra_args);
        assert!(start.backgroundable);
        assert_eq!(start.working_directory, canonical_root.join("api"));
        assert_eq!(start.watch_command.as_deref(), Some("cargo watch -x run"));

        let seed = api.action("seed").unwrap();
        assert!(!seed.accepts_extra_args);
        assert!(!seed.backgroundable);
        assert_eq!(seed.working_directory, canonical_root.join("api/scripts"));
    }

    #[test]
    fn test_build_rejects_missing_work_dir() {
        let root = tempdir().unwrap();
        let config = ConfigFile {
            modules: [(
                "ghost".to_string(),
                ModuleConfig {
                    work_dir: PathBuf::from("does/not/exist"),
                    actions: DeclaredMap::default(),
                },
            )]
            .into_iter()
            .collect(),
        };

        let result = ActionRegistry::build(config, root.path());
        match result {
            Err(ConfigError::MissingWorkDir { owner, .. }) => assert_eq!(owner, "ghost"),
            other => panic!("Expected MissingWorkDir, got: {other:?}"),
        }
    }

    #[test]
    fn test_build_rejects_missing_action_work_dir() {
        let root = tempdir().unwrap();
        let mut broken = action_config("make");
        broken.work_dir = Some(PathBuf::from("nowhere"));
        let config = ConfigFile {
            modules: [(
                "api".to_string(),
                ModuleConfig {
                    work_dir: PathBuf::from("."),
                    actions: [("build".to_string(), broken)].into_iter().collect(),
                },
            )]
            .into_iter()
            .collect(),
        };

        let result = ActionRegistry::build(config, root.path());
        assert!(matches!(
            result,
            Err(ConfigError::MissingWorkDir { ref owner, .. }) if owner == "api.build"
        ));
    }

    #[test]
    fn test_build_rejects_untokenizable_command() {
        let root = tempdir().unwrap();
        let config = ConfigFile {
            modules: [(
                "api".to_string(),
                ModuleConfig {
                    work_dir: PathBuf::from("."),
                    actions: [("bad".to_string(), action_config("echo 'unterminated"))]
                        .into_iter()
                        .collect(),
                },
            )]
            .into_iter()
            .collect(),
        };

        assert!(matches!(
            ActionRegistry::build(config, root.path()),
            Err(ConfigError::InvalidCommand { .. })
        ));
    }
}

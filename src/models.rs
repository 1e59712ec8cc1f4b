// src/models.rs

use serde::Deserialize;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

// --- CONFIGURATION FILE MODELS (What is read from bpm.toml / bpm.yaml) ---

/// A map that remembers the order in which its keys were declared in the source file.
///
/// Module declaration order decides the order in which grouped actions run, so the
/// configuration models cannot use a `HashMap`. Duplicate keys are rejected while
/// deserializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredMap<T>(Vec<(String, T)>);

impl<T> DeclaredMap<T> {
    /// Returns the entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for DeclaredMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> FromIterator<(String, T)> for DeclaredMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for DeclaredMap<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

struct DeclaredMapVisitor<T> {
    marker: PhantomData<T>,
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for DeclaredMapVisitor<T> {
    type Value = DeclaredMap<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of named entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            if !seen.insert(key.clone()) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            entries.push((key, value));
        }
        Ok(DeclaredMap(entries))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for DeclaredMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DeclaredMapVisitor {
            marker: PhantomData,
        })
    }
}

/// Represents the deserialized structure of a `bpm.toml` / `bpm.yaml` file.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ConfigFile {
    /// Module definitions keyed by module name, in declaration order.
    pub modules: DeclaredMap<ModuleConfig>,
}

/// A module as written in the configuration file.
#[derive(Deserialize, Debug, Clone)]
pub struct ModuleConfig {
    /// Working directory of the module, relative to the repository root.
    pub work_dir: PathBuf,
    /// Actions keyed by action name, in declaration order.
    #[serde(default)]
    pub actions: DeclaredMap<ActionConfig>,
}

/// An action as written in the configuration file.
///
/// `name`, `module_name` and an omitted `work_dir` are filled in by the registry
/// build step; they are never written in the file itself.
#[derive(Deserialize, Debug, Clone)]
pub struct ActionConfig {
    /// Command line to run.
    pub cmd: String,
    /// Whether extra command-line arguments are forwarded to this action.
    #[serde(default)]
    pub args: Option<bool>,
    /// Alternate "watch" variant of the command.
    #[serde(default)]
    pub watch_cmd: Option<String>,
    /// Overrides the module's working directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Whether the action may run alongside its siblings in an action group.
    #[serde(default)]
    pub bg: Option<bool>,
}

// --- RUNTIME MODELS ---

/// A single named, runnable shell command bound to one module and one working directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    /// Action name, unique within its module.
    pub name: String,
    /// Name of the module that owns this action.
    pub module_name: String,
    /// Shell command line, tokenized at launch.
    pub command: String,
    /// Absolute, existing directory the command runs in.
    pub working_directory: PathBuf,
    /// Whether extra arguments given on the command line are appended to the command.
    pub accepts_extra_args: bool,
    /// Whether this action may run concurrently with its siblings.
    pub backgroundable: bool,
    /// Alternate "watch" variant of the command. Not run by the orchestrator.
    pub watch_command: Option<String>,
}

impl Action {
    /// Returns `module.action`, the name used in status lines and output prefixes.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_name, self.name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module_name, self.name)
    }
}

/// A named collection of actions sharing a base working directory.
///
/// Every action in `actions` has `module_name == name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Absolute base directory of the module.
    pub working_directory: PathBuf,
    /// Actions in declaration order.
    pub actions: Vec<Arc<Action>>,
}

impl Module {
    /// Looks up one of this module's actions by name.
    pub fn action(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Names of this module's actions, in declaration order.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }
}

/// Same-named actions defined across two or more modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionGroup {
    /// The shared action name.
    pub name: String,
    /// Member actions, in module declaration order.
    pub actions: Vec<Arc<Action>>,
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunRequest {
    /// Optional module qualifier (`-m <module>`).
    pub module: Option<String>,
    /// Action or action group name.
    pub action: String,
    /// Arguments to forward to the action(s).
    pub extra_args: Vec<String>,
}

/// The resolved unit of work for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The action name that was requested.
    pub action_name: String,
    /// The module qualifier, if the run targets a single module.
    pub module: Option<String>,
    /// Concrete actions to run, in order.
    pub actions: Vec<Arc<Action>>,
    /// Arguments forwarded to the actions that accept them.
    pub extra_args: Vec<String>,
}

impl Invocation {
    /// The execution mode this invocation will run in.
    pub fn run_mode(&self) -> RunMode {
        RunMode::for_actions(&self.actions)
    }

    /// The arguments that `action` will actually receive.
    pub fn args_for(&self, action: &Action) -> &[String] {
        if action.accepts_extra_args {
            &self.extra_args
        } else {
            &[]
        }
    }

    /// Number of actions that will receive the extra arguments.
    pub fn accepting_count(&self) -> usize {
        self.actions.iter().filter(|a| a.accepts_extra_args).count()
    }

    /// Warning for a group run where only some of the actions take the extra arguments.
    pub fn partial_args_warning(&self) -> Option<String> {
        if self.module.is_some() || self.extra_args.is_empty() {
            return None;
        }
        let total = self.actions.len();
        let accepting = self.accepting_count();
        if accepting == 0 || accepting == total {
            return None;
        }
        let ignoring = total - accepting;
        let others = if ignoring <= 1 {
            "action".to_string()
        } else {
            format!("{ignoring} actions")
        };
        Some(format!(
            "Additional arguments were given to the '{}' action group, but only {accepting} of {total} actions accept them. The arguments will be ignored for the other {others}.",
            self.action_name
        ))
    }
}

/// How the orchestrator runs an invocation's actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// All actions at once, output multiplexed with prefixes.
    Concurrent,
    /// One after another, in declaration order.
    Sequential,
}

impl RunMode {
    /// Concurrent iff every action is backgroundable. Mixed groups never partially parallelize.
    pub fn for_actions(actions: &[Arc<Action>]) -> Self {
        if actions.iter().all(|a| a.backgroundable) {
            Self::Concurrent
        } else {
            Self::Sequential
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => f.write_str("concurrent"),
            Self::Sequential => f.write_str("sequential"),
        }
    }
}

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// The action that ran.
    pub action: Arc<Action>,
    /// Its exit code. Signal deaths are reported as `128 + signal` on Unix.
    pub exit_code: i32,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// The mode the run used.
    pub mode: RunMode,
    /// Per-action results, in the order they were reported.
    pub results: Vec<RunResult>,
}

impl RunSummary {
    /// Exit code of the action with the given qualified name, if it ran.
    pub fn exit_code_of(&self, qualified_name: &str) -> Option<i32> {
        self.results
            .iter()
            .find(|r| r.action.qualified_name() == qualified_name)
            .map(|r| r.exit_code)
    }

    /// Returns `true` if every action exited with code 0.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.exit_code == 0)
    }
}

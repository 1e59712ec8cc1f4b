// src/cli.rs

use crate::{constants::CONFIG_PATH_ENV, models::RunRequest};
use clap::Parser;
use std::path::PathBuf;

/// bpm: run shared actions across the modules of a repository.
///
/// Without `--module`, ACTION must be an action group: a name that two or more
/// modules define. The group runs in every one of those modules, all at once if
/// every member is backgroundable, one after another otherwise.
///
/// Examples:
/// - `bpm start`            (run the `start` group)
/// - `bpm -m api migrate`   (run one module's action)
/// - `bpm test -- --nocapture` (forward arguments to actions that accept them)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Run the action of this module only.
    #[arg(short, long)]
    pub module: Option<String>,

    /// Path to the configuration file, instead of discovering it from the repository root.
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// The action (or action group) to run.
    pub action: String,

    /// Additional arguments, appended to the commands of actions that accept them.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// The run request described by the command line.
    pub fn request(&self) -> RunRequest {
        RunRequest {
            module: self.module.clone(),
            action: self.action.clone(),
            extra_args: self.args.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_module_action_and_args() {
        let cli = Cli::try_parse_from(["bpm", "-m", "api", "migrate", "--dry-run", "-v"]).unwrap();
        let request = cli.request();
        assert_eq!(request.module.as_deref(), Some("api"));
        assert_eq!(request.action, "migrate");
        assert_eq!(request.extra_args, ["--dry-run", "-v"]);
    }

    #[test]
    fn test_group_without_args() {
        let cli = Cli::try_parse_from(["bpm", "--config", "other/bpm.yml", "start"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("other/bpm.yml")));
        let request = cli.request();
        assert!(request.module.is_none());
        assert_eq!(request.action, "start");
        assert!(request.extra_args.is_empty());
    }

    #[test]
    fn test_action_is_required() {
        assert!(Cli::try_parse_from(["bpm", "-m", "api"]).is_err());
    }
}

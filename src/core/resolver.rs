// src/core/resolver.rs

use crate::{
    core::registry::ActionRegistry,
    models::{Invocation, RunRequest},
};
use std::sync::Arc;
use thiserror::Error;

/// Why the extra arguments of a request were refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgsRejection {
    /// A module-qualified action that does not take arguments.
    #[error(
        "The '{action}' action on module '{module}' does not allow additional arguments, but {given} were given."
    )]
    Action {
        /// Module name.
        module: String,
        /// Action name.
        action: String,
        /// Number of arguments supplied.
        given: usize,
    },
    /// An action group in which no member takes arguments.
    #[error("None of the actions within the '{action}' action group accept additional arguments.")]
    Group {
        /// The group's action name.
        action: String,
    },
}

/// User input that does not match the configuration. Always raised before anything is spawned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unknown module '{module}'. Allowed options are: {}", .available.join(", "))]
    UnknownModule {
        module: String,
        available: Vec<String>,
    },
    #[error(
        "Action '{action}' is not defined for module '{module}'. Available actions are: {}",
        .available.join(", ")
    )]
    UnknownAction {
        module: String,
        action: String,
        available: Vec<String>,
    },
    #[error("{}", not_a_group_message(.action, .defined_in.as_deref()))]
    NotAGroup {
        action: String,
        /// The single module that defines the action, if any does.
        defined_in: Option<String>,
    },
    #[error(transparent)]
    ArgsNotAllowed(ArgsRejection),
}

fn not_a_group_message(action: &str, defined_in: Option<&str>) -> String {
    match defined_in {
        Some(module) => format!(
            "The '{action}' action is not used by more than one module. To run it, use the `-m <module>` argument to run it within that module's context (e.g. `-m {module} {action}`)."
        ),
        None => format!(
            "The '{action}' action is not defined by any module. Use `-m <module>` to pick a module's action."
        ),
    }
}

/// Maps a request onto the concrete actions to run.
///
/// With a module qualifier the result holds exactly that module's action. Without
/// one, the name must be an action group. Extra arguments are checked against the
/// actions' `accepts_extra_args` flags; for groups it is enough that one member
/// accepts them, the others run without them.
///
/// # Errors
/// `UnknownModule`, `UnknownAction`, `NotAGroup` or `ArgsNotAllowed`.
pub fn resolve(registry: &ActionRegistry, request: &RunRequest) -> Result<Invocation, ResolutionError> {
    match &request.module {
        Some(module_name) => resolve_in_module(registry, module_name, request),
        None => resolve_group(registry, request),
    }
}

fn resolve_in_module(
    registry: &ActionRegistry,
    module_name: &str,
    request: &RunRequest,
) -> Result<Invocation, ResolutionError> {
    let module = registry
        .module(module_name)
        .ok_or_else(|| ResolutionError::UnknownModule {
            module: module_name.to_string(),
            available: registry.module_names().into_iter().map(String::from).collect(),
        })?;

    let action = module
        .action(&request.action)
        .ok_or_else(|| ResolutionError::UnknownAction {
            module: module_name.to_string(),
            action: request.action.clone(),
            available: module.action_names().into_iter().map(String::from).collect(),
        })?;

    if !request.extra_args.is_empty() && !action.accepts_extra_args {
        return Err(ResolutionError::ArgsNotAllowed(ArgsRejection::Action {
            module: module_name.to_string(),
            action: request.action.clone(),
            given: request.extra_args.len(),
        }));
    }

    Ok(Invocation {
        action_name: request.action.clone(),
        module: Some(module_name.to_string()),
        actions: vec![Arc::clone(action)],
        extra_args: request.extra_args.clone(),
    })
}

fn resolve_group(registry: &ActionRegistry, request: &RunRequest) -> Result<Invocation, ResolutionError> {
    let group = registry.group(&request.action).ok_or_else(|| {
        let defined_in = registry
            .actions_named(&request.action)
            .first()
            .map(|a| a.module_name.clone());
        ResolutionError::NotAGroup {
            action: request.action.clone(),
            defined_in,
        }
    })?;

    if !request.extra_args.is_empty() && !group.actions.iter().any(|a| a.accepts_extra_args) {
        return Err(ResolutionError::ArgsNotAllowed(ArgsRejection::Group {
            action: request.action.clone(),
        }));
    }

    Ok(Invocation {
        action_name: request.action.clone(),
        module: None,
        actions: group.actions.clone(),
        extra_args: request.extra_args.clone(),
    })
}

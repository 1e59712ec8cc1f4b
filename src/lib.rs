//! # bpm
//!
//! A task runner for repositories made of several modules (subprojects). Each
//! module declares named actions; an action name shared by two or more modules
//! forms an action group that runs across all of them with one command.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Shared flag set once the user asks the run to stop.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;

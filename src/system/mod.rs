//! # System Interaction Layer
//!
//! Everything that touches the operating system at run time: spawning and
//! supervising child processes, interrupt handling and terminal output.
//!
//! ## Modules
//!
//! - **`executor`**: The orchestrator. Runs the actions of an invocation either
//!   concurrently (prefixed, captured output) or in series (inherited terminal),
//!   and tears everything down on `Ctrl+C`.
//! - **`process`**: Command tokenization, spawning, exit-code mapping and the
//!   SIGTERM-then-kill termination of a single child.
//! - **`interrupt`**: The cancellation token and the `Ctrl+C` listener that sets it.
//! - **`console`**: Status-line formatting and the line-atomic output sink.

pub mod console;
pub mod executor;
pub mod interrupt;
pub mod process;

// src/core/mod.rs

pub mod config_loader;
pub mod paths;
pub mod registry;
pub mod resolver;

// src/config/mod.rs

//! Configuration loading and validation for cirun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate and resolve it into runtime settings (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    BuildSection, CommandValue, ConfigFile, ExecutorSection, ExecutorSettings, OutputSection,
    OutputSettings, RawConfigFile, SuiteSection,
};

#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`runner`]: Process abstraction (`CommandRunner` trait, `ProcessRunner`)
//! - [`workspace`]: Per-run workspace isolation and var-file rendering
//! - [`engine`]: `TerraformEngine`, the `ProvisioningEngine` implementation

pub mod engine;
pub mod runner;
pub mod workspace;

// Engine
pub use engine::TerraformEngine;

// Process execution
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};

// Workspace
pub use workspace::{STATE_FILE_NAME, VAR_FILE_NAME};

#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`ident`]: Unique identifiers and derived resource names
//! - [`render`]: Pure configuration rendering
//! - [`scenario`]: Scenario definition, builder, and observed state
//! - [`verify`]: Presence-guarded checks
//! - [`guard`]: Destroy-on-drop cleanup guard
//! - [`runner`]: Single and concurrent scenario execution
//! - [`catalog`]: The WAF policy scenario catalog
//! - [`error`]: Scenario errors

pub mod catalog;
pub mod error;
pub mod guard;
pub mod ident;
pub mod render;
pub mod runner;
pub mod scenario;
pub mod verify;

// Errors
pub use error::ScenarioError;

// Identifiers and rendering
pub use ident::{ResourceNames, UniqueId};
pub use render::ConfigurationRenderer;

// Scenarios
pub use scenario::{Expectation, Observation, TestScenario, TestScenarioBuilder};
pub use verify::{CheckOutcome, CheckStatus, Checks};

// Execution
pub use guard::{Cleanup, DestroyGuard, Phase};
pub use runner::{RunnerSettings, ScenarioOutcome, ScenarioReport, ScenarioRunner};

//! Shared E2E test helpers.
//!
//! Provides the in-memory cloud (fake provisioning engine and inspector),
//! runner construction with fast retry settings, and report assertions.

pub mod assertions;
pub mod fake_cloud;
pub mod setup;

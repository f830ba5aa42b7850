#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`credential`]: Bearer token sources (`Credential`, `ServicePrincipal`)
//! - [`inspector`]: `AzureWafInspector`, the `ResourceInspector` implementation
//! - `wire`: ARM JSON shapes and error parsing

pub mod credential;
pub mod inspector;
mod wire;

// Inspector
pub use inspector::AzureWafInspector;

// Credentials
pub use credential::{Credential, ServicePrincipal};

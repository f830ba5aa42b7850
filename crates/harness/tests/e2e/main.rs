//! E2E tests for the scenario runner.
//!
//! These tests drive complete scenario runs (identifier, render, apply,
//! output, inspect, verify, destroy) against an in-memory cloud, covering
//! guaranteed cleanup, retry behavior, presence-guarded checks, and isolation
//! between concurrent scenarios.
//!
//! # Test Structure
//!
//! - `helpers/` -- Fake engine/inspector, runner setup, report assertions
//! - `scenarios/` -- Test files organized by scenario (S1-S6)
//!
//! # Running
//!
//! ```bash
//! cargo test -p wafprobe-harness --test e2e
//! ```

mod helpers;

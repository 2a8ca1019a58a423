//! E2E tests for volprobe-harness.
//!
//! Scenarios run through [`volprobe_harness::ScenarioRunner`] against a
//! simulated cluster that parses the rendered docker and admin commands.
//!
//! # Test Structure
//!
//! - `helpers/` -- simulated cluster, test configuration
//! - `scenarios/` -- catalog runs, backend mismatches, teardown, suite
//!
//! # Running
//!
//! ```bash
//! cargo test -p volprobe-harness --test e2e
//! ```

mod helpers;
mod scenarios;

//! E2E scenario test modules.

mod catalog_runs;
mod mismatches;
mod suite;
mod teardown;
mod transcripts;

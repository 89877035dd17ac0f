//! Integration test suite for nupm
//!
//! End-to-end tests over real archives in a temporary local feed. Every test
//! gets its own project, feed and cache through
//! [`nupm_cli::test_utils::TestEnvironment`], so tests run in parallel.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **resolution**: dependency graphs, version ranges, greedy selection
//! - **restore**: restore reports, partial failure, orphan collection
//! - **content**: framework selection, runtimes, tools, assets, unsafe entries
//! - **manifest**: what `packages.config` looks like after engine operations
//! - **cli**: the `nupm` binary

mod cli;
mod content;
mod manifest;
mod resolution;
mod restore;

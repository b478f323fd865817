//! Test utilities for the identity crate.
//!
//! `fixtures` holds in-memory fakes for the provider and the filesystem;
//! `dex` targets a local Dex instance for integration tests.

pub mod dex;

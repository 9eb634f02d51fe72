//! Integration test suite for snipweave
//!
//! End-to-end tests over the public library API and the `snipweave` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **scenarios**: Resolution, ordering and cycle behavior over whole snippet sets
//! - **regeneration**: Dirty propagation, failure isolation, credential retry and
//!   resuming from a persisted store
//! - **cli**: The `snipweave` binary against temporary config and store files

mod cli;
mod regeneration;
mod scenarios;

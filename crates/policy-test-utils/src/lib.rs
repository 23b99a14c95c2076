//! Shared test utilities for the policy workspace.
//!
//! This crate provides standardised test fixtures so each crate's test
//! suite does not hand-write configuration and policy documents. It is a
//! dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`dir`]: [`TestPolicyDir`] builder for a main configuration plus
//!   policy and state documents

pub mod dir;

pub use dir::TestPolicyDir;

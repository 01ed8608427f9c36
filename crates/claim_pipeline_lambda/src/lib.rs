//! AWS-oriented adapters and handlers for the claim pipeline.
//!
//! This crate owns runtime integration details (Lambda handlers, collaborator
//! seams and environment configuration) and exposes a single runtime module
//! boundary for envelope, naming and result primitives.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
pub mod runtime;

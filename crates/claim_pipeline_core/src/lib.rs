//! Shared claim pipeline domain primitives.
//!
//! This crate owns envelope decoding, result composition and naming rules for
//! the upload-to-verdict pipeline. It intentionally excludes AWS SDK and Lambda
//! runtime concerns.

pub mod contract;
pub mod envelope;
pub mod log_stream;
pub mod secret;
pub mod upload_keys;
pub mod wait_policy;

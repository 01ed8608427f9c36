pub use claim_pipeline_core::{contract, envelope, log_stream, secret, upload_keys, wait_policy};

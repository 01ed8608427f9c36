pub mod orchestrator;
pub mod presign;

pub mod logs;
pub mod notify;
pub mod pause;
pub mod presign;
pub mod secrets;
pub mod worker;

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    pub expires_in: Duration,
}

pub trait UploadPresigner {
    /// Returns a URL authorising one PUT of `request.key`.
    fn presign_put(&self, request: &PresignRequest) -> Result<String, String>;
}

pub trait SecretSource {
    /// Returns the current secret string; never cached by callers.
    fn fetch_secret(&self, secret_id: &str) -> Result<String, String>;
}

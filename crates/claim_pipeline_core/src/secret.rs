use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

pub const DEFAULT_SECRET_FIELD: &str = "OPENAI_API_KEY";

/// Credential handed to the worker. `Debug` prints a fingerprint only.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Accepts either a raw string or a JSON object holding the value under
    /// `field`. Anything that is not such an object is used verbatim.
    pub fn from_secret_string(raw: &str, field: &str) -> Self {
        let resolved = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => match object.get(field) {
                Some(Value::String(value)) => value.clone(),
                _ => raw.to_string(),
            },
            _ => raw.to_string(),
        };
        Self(resolved)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        secret_fingerprint(&self.0)
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue({})", self.fingerprint())
    }
}

/// First 12 hex digits of the SHA-256 digest; enough to spot a rotation in
/// logs without revealing the value.
pub fn secret_fingerprint(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

use std::fmt;

use chrono::{DateTime, Utc};

/// A resolved secret, identified by the key it was looked up with
#[derive(Clone)]
pub struct Credential {
    key: String,
    api_key: String,
    fetched_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(key: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            api_key: api_key.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("api_key", &"<redacted>")
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_creation() {
        let cred = Credential::new("OPENAI_API_KEY", "sk-test-key");

        assert_eq!(cred.key(), "OPENAI_API_KEY");
        assert_eq!(cred.api_key(), "sk-test-key");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let cred = Credential::new("OPENAI_API_KEY", "sk-test-key");

        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("sk-test-key"));
        assert!(rendered.contains("<redacted>"));
    }
}

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Signed-in user session as handed over by the auth collaborator.
pub struct Session {
    access_token: SecretString,
    pub user_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            user_email: None,
            expires_at: None,
        }
    }

    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    pub fn has_token(&self) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_email", &self.user_email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

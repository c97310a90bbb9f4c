use std::sync::Arc;

use tracing::warn;

use super::store::KeyValueStore;
use crate::error::{TrackerError, TrackerResult};

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_EMAIL_KEY: &str = "user_email";
pub const TOKEN_TYPE_KEY: &str = "token_type";

/// Bearer credentials kept in durable storage.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn KeyValueStore>,
}

impl Credentials {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn token(&self) -> Option<String> {
        match self.store.get(AUTH_TOKEN_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => Some(token.trim().to_string()),
            Ok(_) => None,
            Err(err) => {
                warn!("failed to read auth token: {}", err);
                None
            }
        }
    }

    pub fn require_token(&self) -> TrackerResult<String> {
        self.token().ok_or(TrackerError::AuthRequired)
    }

    pub fn set_token(&self, token: &str) -> TrackerResult<()> {
        self.store.set(AUTH_TOKEN_KEY, token.trim())?;
        self.store.set(TOKEN_TYPE_KEY, "bearer")
    }

    pub fn clear(&self) -> TrackerResult<()> {
        for key in [AUTH_TOKEN_KEY, USER_EMAIL_KEY, TOKEN_TYPE_KEY] {
            self.store.remove(key)?;
        }
        Ok(())
    }
}

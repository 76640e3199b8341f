//! Auth token persisted in local storage under `auth_token`

use crate::domain::error::Result;
use crate::io::local_storage::SharedStorage;
use tracing::{info, warn};

pub const AUTH_TOKEN_KEY: &str = "auth_token";

pub struct AuthSession {
    storage: SharedStorage,
    token: Option<String>,
}

impl AuthSession {
    pub fn restore(storage: SharedStorage) -> Self {
        let restored = storage.lock().get::<String>(AUTH_TOKEN_KEY);
        let token = match restored {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(key = %AUTH_TOKEN_KEY, error = %e, "auth_token_restore_failed_removing");
                if let Err(e) = storage.lock().remove(AUTH_TOKEN_KEY) {
                    warn!(key = %AUTH_TOKEN_KEY, error = %e, "auth_token_remove_failed");
                }
                None
            }
        };
        Self { storage, token }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn login(&mut self, token: &str) -> Result<()> {
        self.storage.lock().set(AUTH_TOKEN_KEY, token)?;
        self.token = Some(token.to_string());
        info!("auth_session_started");
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        self.storage.lock().remove(AUTH_TOKEN_KEY)?;
        self.token = None;
        info!("auth_session_ended");
        Ok(())
    }
}

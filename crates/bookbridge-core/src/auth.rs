//! Bearer token and user profile, as persisted by the login page.

use std::rc::Rc;

use bookbridge_types::{ChatError, Result, user::CurrentUser};
use crate::ports::StoragePort;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Credentials every authenticated call needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: CurrentUser,
}

impl AuthSession {
    pub fn new(token: impl Into<String>, user: CurrentUser) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Reads and writes the auth keys of client storage
#[derive(Clone)]
pub struct AuthStore {
    storage: Rc<dyn StoragePort>,
}

impl AuthStore {
    pub fn new(storage: Rc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// Both a token and a readable profile must be present. A corrupt
    /// profile counts as signed out.
    pub async fn load(&self) -> Result<Option<AuthSession>> {
        let token = match self.storage.get(TOKEN_KEY).await? {
            Some(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            None => return Ok(None),
        };
        if token.is_empty() {
            return Ok(None);
        }

        let Some(profile) = self.storage.get(USER_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<CurrentUser>(&profile) {
            Ok(user) => Ok(Some(AuthSession { token, user })),
            Err(e) => {
                log::warn!("Stored user profile is unreadable: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn require(&self) -> Result<AuthSession> {
        self.load().await?.ok_or(ChatError::AuthRequired)
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(self.load().await, Ok(Some(_)))
    }

    pub async fn store(&self, session: &AuthSession) -> Result<()> {
        let profile = serde_json::to_vec(&session.user)?;
        self.storage.set(TOKEN_KEY, session.token.as_bytes()).await?;
        self.storage.set(USER_KEY, &profile).await?;
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.storage.delete(TOKEN_KEY).await?;
        self.storage.delete(USER_KEY).await?;
        log::info!("Signed out");
        Ok(())
    }
}

//! Signed-in user record stored under `userData`

use std::sync::Arc;

use aidline_common::Result;

use super::storage::{run_blocking, KeyValueStore};
use crate::domain::entities::AppUser;

pub const SESSION_KEY: &str = "userData";

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Restore the stored user. A record that fails to parse is removed.
    pub async fn load(&self) -> Result<Option<AppUser>> {
        let Some(raw) = run_blocking(&self.store, |s| s.get(SESSION_KEY)).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<AppUser>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session record");
                run_blocking(&self.store, |s| s.remove(SESSION_KEY)).await?;
                Ok(None)
            }
        }
    }

    pub async fn save(&self, user: &AppUser) -> Result<()> {
        let json = serde_json::to_string(user)?;
        run_blocking(&self.store, move |s| s.set(SESSION_KEY, &json)).await
    }

    pub async fn clear(&self) -> Result<()> {
        run_blocking(&self.store, |s| s.remove(SESSION_KEY)).await
    }
}

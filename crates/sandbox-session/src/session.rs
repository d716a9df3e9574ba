use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sandbox_container::{ContainerDriver, ContainerHandle};
use sandbox_types::{Result, SessionId, UserId};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One live browser terminal's binding to a user's container.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub container_id: String,
    pub container_name: String,
    pub created_at: DateTime<Utc>,
}

/// §4.4 session manager. Holds the only two pieces of server-side state
/// that are not in the relational store: which session ids are live, and
/// which container each belongs to.
pub struct SessionManager {
    pool: SqlitePool,
    driver: ContainerDriver,
    sessions: DashMap<SessionId, Session>,
}

impl SessionManager {
    pub fn new(pool: SqlitePool, driver: ContainerDriver) -> Arc<Self> {
        Arc::new(Self {
            pool,
            driver,
            sessions: DashMap::new(),
        })
    }

    /// `start_session(user_id) -> {session_id, container_id}`. Composes C1's
    /// `ensure_container` and C3's `seed`, then mints a fresh 128-bit random
    /// session id.
    pub async fn start_session(&self, user_id: &UserId) -> Result<Session> {
        let handle = self.driver.ensure_container(user_id).await?;
        sandbox_materializer::seed(&self.pool, user_id, &self.driver, &handle).await?;

        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            container_id: handle.id.clone(),
            container_name: handle.name.clone(),
            created_at: Utc::now(),
        };

        self.sessions.insert(session.session_id.clone(), session.clone());
        info!(
            "started session {} for user {} on container {}",
            session.session_id, session.user_id, session.container_name
        );

        // Reap only after this user's session is tracked, so a process
        // restart (which empties `sessions`) can never race the container it
        // just reused out from under the caller.
        if let Err(e) = self.reap_orphans().await {
            warn!("reap_orphans failed during start_session: {e}");
        }

        Ok(session)
    }

    /// `lookup(session_id) -> session | null`. P7: returns the same record
    /// until `end_session` is called, then `None`.
    pub fn lookup(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    /// `end_session(session_id)`. The container is left running — other
    /// sessions for the same user may still reference it.
    pub fn end_session(&self, session_id: &SessionId) {
        self.sessions.remove(session_id);
    }

    /// Every currently tracked session belonging to `user_id`. Used by
    /// endpoints that only receive a `user_id` (not a session id) but need a
    /// container handle, e.g. the editor's `PUT` materializing a write.
    pub fn sessions_for_user(&self, user_id: &UserId) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|entry| &entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// `cleanup_user(user_id)`: force-removes the user's container and
    /// drops every session bound to it.
    pub async fn cleanup_user(&self, user_id: &UserId) -> Result<()> {
        self.driver.delete_container(user_id).await?;
        self.sessions.retain(|_, s| &s.user_id != user_id);
        Ok(())
    }

    /// `reap_orphans()`: removes every managed container whose `user_id`
    /// has no currently tracked session. Run at each `start_session` and
    /// may also be driven periodically by the caller.
    pub async fn reap_orphans(&self) -> Result<()> {
        let tracked: HashSet<UserId> = self
            .sessions
            .iter()
            .map(|entry| entry.value().user_id.clone())
            .collect();

        let managed = self.driver.list_managed().await?;
        for container in managed {
            if !tracked.contains(&container.user_id) {
                warn!(
                    "reaping orphaned container for untracked user {}",
                    container.user_id
                );
                self.driver.delete_container(&container.user_id).await?;
            }
        }
        Ok(())
    }

    /// Whether any currently tracked session belongs to `user_id`. Used by
    /// endpoints that receive a bare `user_id` in the request body (the fs-event
    /// intake, the editor PUT) to confirm a container was actually provisioned
    /// for that user before trusting the body — see the workspace `DESIGN.md`
    /// note on the source's authorization gap.
    pub fn has_session_for_user(&self, user_id: &UserId) -> bool {
        self.sessions.iter().any(|entry| &entry.value().user_id == user_id)
    }

    pub fn driver(&self) -> &ContainerDriver {
        &self.driver
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Session {
    pub fn handle(&self) -> ContainerHandle {
        ContainerHandle {
            id: self.container_id.clone(),
            name: self.container_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_handle_mirrors_container_fields() {
        let session = Session {
            session_id: "sid".into(),
            user_id: "alice".into(),
            container_id: "abc123".into(),
            container_name: "terminal-alice".into(),
            created_at: Utc::now(),
        };
        let handle = session.handle();
        assert_eq!(handle.id, "abc123");
        assert_eq!(handle.name, "terminal-alice");
    }
}

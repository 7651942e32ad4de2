use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};

use finscope_core::{MessageId, SessionId, UserId};
use finscope_protocol::{Message, Session};

use crate::error::{Result, StateError};

const SESSION_TTL_SECS: u64 = crate::SESSION_TTL_SECS;
const MESSAGE_TTL_SECS: u64 = crate::SESSION_TTL_SECS;

fn session_key(id: &SessionId) -> String {
    format!("session:{}", id)
}

fn message_key(id: &MessageId) -> String {
    format!("message:{}", id)
}

fn owner_index_key(owner_id: &UserId) -> String {
    format!("owner_sessions:{}", owner_id)
}

/// Typed read/write access to Session and Message records keyed in
/// Redis with a refresh-on-write TTL (spec.md §4.1 State Store).
///
/// Each record has exactly one owning writer — the Orchestrator for a
/// Message, the HTTP layer for Session metadata — so no locking beyond
/// single-writer discipline is needed.
pub struct StateStore {
    conn: ConnectionManager,
}

impl StateStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(session)?;
        conn.set_ex::<_, _, ()>(session_key(&session.id), payload, SESSION_TTL_SECS)
            .await?;
        conn.sadd::<_, _, ()>(owner_index_key(&session.owner_id), session.id.as_str())
            .await?;
        conn.expire::<_, ()>(owner_index_key(&session.owner_id), SESSION_TTL_SECS as i64)
            .await?;
        Ok(())
    }

    /// Lists every Session a single owner has created (spec.md §6 "GET
    /// /sessions"). Ids in the owner index may outlive their Session's
    /// TTL by a few seconds; a missing record is skipped rather than
    /// surfaced as an error.
    #[instrument(skip(self))]
    pub async fn list_sessions(&self, owner_id: &UserId) -> Result<Vec<Session>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(owner_index_key(owner_id)).await?;
        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(session) = self.get_session(&SessionId::from(id)).await? {
                sessions.push(session);
            }
        }
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    #[instrument(skip(self))]
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(session_key(id)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub async fn require_session(&self, id: &SessionId) -> Result<Session> {
        self.get_session(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("session {}", id)))
    }

    /// Cascading delete: removes the Session record and every Message it
    /// references (spec.md §4.1).
    #[instrument(skip(self))]
    pub async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let session = self.require_session(id).await?;
        let mut conn = self.conn.clone();
        for message_id in &session.message_ids {
            conn.del::<_, ()>(message_key(message_id)).await?;
        }
        conn.del::<_, ()>(session_key(id)).await?;
        conn.srem::<_, _, ()>(owner_index_key(&session.owner_id), id.as_str())
            .await?;
        debug!(deleted_messages = session.message_ids.len(), "session deleted");
        Ok(())
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    pub async fn save_message(&self, message: &Message) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(message)?;
        conn.set_ex::<_, _, ()>(message_key(&message.id), payload, MESSAGE_TTL_SECS)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(message_key(id)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub async fn require_message(&self, id: &MessageId) -> Result<Message> {
        self.get_message(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("message {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formatting_is_prefixed() {
        let id = SessionId::from("abc".to_string());
        assert_eq!(session_key(&id), "session:abc");
    }

    #[test]
    fn owner_index_key_is_prefixed() {
        let owner = UserId::from("u1");
        assert_eq!(owner_index_key(&owner), "owner_sessions:u1");
    }
}

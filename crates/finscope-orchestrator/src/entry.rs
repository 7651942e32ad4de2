use chrono::Utc;

use finscope_protocol::{Message, MessageStatus, Session};
use finscope_state::{StateError, StateStore};

/// Idempotent Message creation for the "start analysis" HTTP handler
/// (spec.md §4.9 "Idempotency and re-entry"): a request whose previous
/// last Message on this Session is still `processing` and carries the
/// same `user_query` re-attaches to it instead of spawning a duplicate
/// Orchestrator run.
pub async fn start_or_reuse_message(
    state: &StateStore,
    session: &mut Session,
    user_query: &str,
) -> Result<Message, StateError> {
    if let Some(last_id) = session.current_message_id.clone() {
        if let Some(existing) = state.get_message(&last_id).await? {
            if existing.status == MessageStatus::Processing && existing.user_query == user_query {
                return Ok(existing);
            }
        }
    }

    let message = Message::new(session.id.clone(), user_query);
    session.message_ids.push(message.id.clone());
    session.current_message_id = Some(message.id.clone());
    session.updated_at = Utc::now();

    state.save_session(session).await?;
    state.save_message(&message).await?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscope_core::UserId;

    #[test]
    fn fresh_session_has_no_reusable_message() {
        let session = Session::new(UserId::from("u1"), "chat");
        assert!(session.current_message_id.is_none());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finscope_core::{MessageId, SessionId, UserId};

use crate::entity::EntityMatch;
use crate::errors::DataFetchError;
use crate::intent::{Intent, ResolvedKeywords};
use crate::timeseries::TimePoint;

/// Role/content pair in a Session's bounded conversation transcript
/// (spec.md §3 Session, capped at 20).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

pub const TRANSCRIPT_CAP: usize = 20;

/// A multi-turn conversation with persistent history (spec.md §3, GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner_id: UserId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_ids: Vec<MessageId>,
    pub current_message_id: Option<MessageId>,
    pub transcript: Vec<Turn>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Deleted,
}

impl Session {
    pub fn new(owner_id: UserId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            owner_id,
            title: title.into(),
            created_at: now,
            updated_at: now,
            message_ids: Vec::new(),
            current_message_id: None,
            transcript: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    /// Append a turn, trimming to the most recent `TRANSCRIPT_CAP`
    /// entries (spec.md §3 Session transcript cap).
    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
        self.transcript.push(Turn {
            role,
            content: content.into(),
        });
        if self.transcript.len() > TRANSCRIPT_CAP {
            let excess = self.transcript.len() - TRANSCRIPT_CAP;
            self.transcript.drain(0..excess);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingStatus {
    Idle,
    Streaming,
    Completed,
    Error,
}

/// A single step in a Message's progress schedule (spec.md §9 "Dynamic
/// step list").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepProgress {
    pub step: u32,
    pub name: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// Artifacts accumulated on a Message as stages complete (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifacts {
    pub time_series_original: Option<Vec<TimePoint>>,
    pub time_series_full: Option<Vec<TimePoint>>,
    pub prediction_start_day: Option<chrono::NaiveDate>,
    pub news: Vec<NewsItem>,
    pub research_excerpts: Vec<ResearchExcerpt>,
    pub sentiment_score: Option<f64>,
    pub sentiment_narrative: Option<String>,
    pub selected_model: Option<String>,
    pub baseline_comparison: Option<serde_json::Value>,
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_type: String,
    pub source_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchExcerpt {
    pub filename: String,
    pub page: u32,
    pub content: String,
    pub relevance_score: f64,
}

/// One request/response turn inside a Session (spec.md §3 Message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub user_query: String,
    pub intent: Option<Intent>,
    pub entity: Option<EntityMatch>,
    pub resolved_keywords: Option<ResolvedKeywords>,
    pub steps: Vec<StepProgress>,
    pub artifacts: Artifacts,
    pub status: MessageStatus,
    pub streaming_status: StreamingStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: SessionId, user_query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            session_id,
            user_query: user_query.into(),
            intent: None,
            entity: None,
            resolved_keywords: None,
            steps: Vec::new(),
            artifacts: Artifacts::default(),
            status: MessageStatus::Pending,
            streaming_status: StreamingStatus::Idle,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_error(&mut self, error: impl Into<String>, data_fetch_error: Option<&DataFetchError>) {
        self.status = MessageStatus::Error;
        self.streaming_status = StreamingStatus::Error;
        let mut msg = error.into();
        if let Some(dfe) = data_fetch_error {
            msg = format!("{} ({})", msg, dfe.context());
        }
        self.error = Some(msg);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_trims_to_cap() {
        let mut session = Session::new(UserId::from("u1"), "chat");
        for i in 0..25 {
            session.push_turn(Role::User, format!("turn {i}"));
        }
        assert_eq!(session.transcript.len(), TRANSCRIPT_CAP);
        assert_eq!(session.transcript[0].content, "turn 5");
    }
}

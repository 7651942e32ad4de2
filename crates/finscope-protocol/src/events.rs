use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use finscope_core::{MessageId, SessionId};

/// Event type discriminator (spec.md §3 Event record). `data{kind}`
/// collapses to a single `Data` variant carrying the kind as a field so
/// that the wire `event:` line stays a fixed small vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionCreated,
    ThinkingChunk,
    ThinkingComplete,
    IntentDetermined,
    StepUpdate,
    Data,
    ModelSelection,
    ReportChunk,
    ChatChunk,
    EmotionChunk,
    Error,
    Heartbeat,
    AnalysisComplete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionCreated => "session_created",
            EventType::ThinkingChunk => "thinking_chunk",
            EventType::ThinkingComplete => "thinking_complete",
            EventType::IntentDetermined => "intent_determined",
            EventType::StepUpdate => "step_update",
            EventType::Data => "data",
            EventType::ModelSelection => "model_selection",
            EventType::ReportChunk => "report_chunk",
            EventType::ChatChunk => "chat_chunk",
            EventType::EmotionChunk => "emotion_chunk",
            EventType::Error => "error",
            EventType::Heartbeat => "heartbeat",
            EventType::AnalysisComplete => "analysis_complete",
        }
    }
}

/// One entry in a Message's append-only event log (spec.md §3 "Event
/// record", §4.2 Event Fabric).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub payload: Value,
    /// Monotone position of this event within the Message's log — the
    /// sequence number subscribers dedup on during replay-to-tail
    /// transition (spec.md §4.2, §9 "Replay-safe pub/sub").
    pub seq: u64,
}

impl EventRecord {
    pub fn new(
        event_type: EventType,
        session_id: SessionId,
        message_id: MessageId,
        payload: impl Serialize,
        seq: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            timestamp,
            session_id,
            message_id,
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
            seq,
        }
    }

    /// Render as the line-oriented SSE framing (spec.md §4.2 "Format"):
    /// two lines, `event: <type>` and `data: <JSON>`, then a blank line.
    pub fn to_sse(&self) -> String {
        format!(
            "event: {}\ndata: {}\n\n",
            self.event_type.as_str(),
            self.payload
        )
    }
}

/// A non-data keepalive comment line, sent by the subscriber side every
/// ~15s of idle tail (spec.md §4.2).
pub fn sse_heartbeat_comment() -> &'static str {
    ": heartbeat\n\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sse_framing_has_two_lines_and_blank_terminator() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let record = EventRecord::new(
            EventType::Heartbeat,
            SessionId::new(),
            MessageId::new(),
            serde_json::json!({}),
            0,
            ts,
        );
        let framed = record.to_sse();
        assert!(framed.starts_with("event: heartbeat\n"));
        assert!(framed.ends_with("\n\n"));
    }

    #[test]
    fn event_type_wire_names_match_catalog() {
        assert_eq!(EventType::Data.as_str(), "data");
        assert_eq!(EventType::AnalysisComplete.as_str(), "analysis_complete");
    }
}

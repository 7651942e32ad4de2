use std::time::Duration;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::warn;

use finscope_core::{MessageId, SessionId};
use finscope_protocol::{EventRecord, EventType};

use crate::error::{FabricError, Result};

const LOG_RING_SIZE: isize = 1000;
const LOG_TTL_SECS: i64 = 24 * 60 * 60;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const HEARTBEAT_BUFFER: usize = 256;

fn log_key(id: &MessageId) -> String {
    format!("events:{}", id)
}
fn seq_key(id: &MessageId) -> String {
    format!("events:{}:seq", id)
}
fn channel_key(id: &MessageId) -> String {
    format!("channel:{}", id)
}

/// Per-message append-only event log plus pub/sub channel, combined
/// behind a single publish/subscribe API (spec.md §4.2, GLOSSARY
/// "Event Fabric").
#[derive(Clone)]
pub struct EventFabric {
    conn: ConnectionManager,
    client: redis::Client,
}

impl EventFabric {
    pub fn new(conn: ConnectionManager, client: redis::Client) -> Self {
        Self { conn, client }
    }

    /// Append an event to the durable log and publish it on the
    /// pub/sub channel. Publish-then-append is acceptable ordering
    /// because the log is only ever used for replay, never live
    /// tailing (spec.md §4.2 "Publish").
    pub async fn publish(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        event_type: EventType,
        payload: impl serde::Serialize,
    ) -> Result<EventRecord> {
        let mut conn = self.conn.clone();

        let next: u64 = conn.incr(seq_key(&message_id), 1u64).await?;
        let seq = next - 1;
        conn.expire::<_, ()>(seq_key(&message_id), LOG_TTL_SECS)
            .await?;

        let record = EventRecord::new(
            event_type,
            session_id,
            message_id.clone(),
            payload,
            seq,
            chrono::Utc::now(),
        );
        let raw = serde_json::to_string(&record)?;

        conn.publish::<_, _, ()>(channel_key(&message_id), raw.clone())
            .await?;

        conn.rpush::<_, _, ()>(log_key(&message_id), raw).await?;
        conn.ltrim::<_, ()>(log_key(&message_id), -LOG_RING_SIZE, -1)
            .await?;
        conn.expire::<_, ()>(log_key(&message_id), LOG_TTL_SECS)
            .await?;

        Ok(record)
    }

    /// Replay the durable log in order, then tail the live channel,
    /// de-duplicating by sequence number at the seam. The channel
    /// subscription opens before the log is read ("subscribe before
    /// replay", spec.md §9 "Replay-safe pub/sub") so no event is ever
    /// skipped between the two.
    ///
    /// The stream ends after yielding `analysis_complete` or `error`,
    /// or when the subscriber drops it — either way the Orchestrator
    /// keeps running; only this subscription is torn down (spec.md
    /// §4.2 "Cancellation").
    pub fn subscribe(
        &self,
        session_id: SessionId,
        message_id: MessageId,
    ) -> impl Stream<Item = Result<EventRecord>> {
        let conn = self.conn.clone();
        let client = self.client.clone();

        stream! {
            let (tx, mut rx) = mpsc::channel::<String>(HEARTBEAT_BUFFER);

            let mut pubsub = match client.get_async_pubsub().await {
                Ok(p) => p,
                Err(e) => {
                    yield Err(FabricError::Redis(e));
                    return;
                }
            };
            if let Err(e) = pubsub.subscribe(channel_key(&message_id)).await {
                yield Err(FabricError::Redis(e));
                return;
            }

            tokio::spawn(async move {
                let mut messages = pubsub.on_message();
                while let Some(msg) = messages.next().await {
                    if let Ok(payload) = msg.get_payload::<String>() {
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                }
            });

            let mut conn = conn;
            let raw_log: Vec<String> = match conn.lrange(log_key(&message_id), 0, -1).await {
                Ok(v) => v,
                Err(e) => {
                    yield Err(FabricError::Redis(e));
                    return;
                }
            };

            let mut max_seq: Option<u64> = None;
            for raw in raw_log {
                match serde_json::from_str::<EventRecord>(&raw) {
                    Ok(record) => {
                        max_seq = Some(record.seq);
                        yield Ok(record);
                    }
                    Err(e) => warn!(error = %e, "dropping malformed log entry during replay"),
                }
            }

            loop {
                tokio::select! {
                    maybe_raw = rx.recv() => {
                        let Some(raw) = maybe_raw else { return };
                        match serde_json::from_str::<EventRecord>(&raw) {
                            Ok(record) => {
                                if max_seq.is_some_and(|m| record.seq <= m) {
                                    continue;
                                }
                                max_seq = Some(record.seq);
                                let terminal = matches!(
                                    record.event_type,
                                    EventType::AnalysisComplete | EventType::Error
                                );
                                yield Ok(record);
                                if terminal {
                                    return;
                                }
                            }
                            Err(e) => warn!(error = %e, "dropping malformed live event"),
                        }
                    }
                    _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                        yield Ok(EventRecord::new(
                            EventType::Heartbeat,
                            session_id.clone(),
                            message_id.clone(),
                            serde_json::json!({}),
                            max_seq.unwrap_or(0),
                            chrono::Utc::now(),
                        ));
                    }
                }
            }
        }
    }
}

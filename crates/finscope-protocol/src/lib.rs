pub mod domain;
pub mod entity;
pub mod errors;
pub mod events;
pub mod intent;
pub mod timeseries;

pub use domain::{
    Artifacts, Message, MessageStatus, NewsItem, ResearchExcerpt, Role, Session, SessionStatus,
    StepProgress, StepStatus, StreamingStatus, Turn,
};
pub use entity::{infer_market, Entity, EntityMatch, Market};
pub use errors::DataFetchError;
pub use events::{sse_heartbeat_comment, EventRecord, EventType};
pub use intent::{Intent, ResolvedKeywords};
pub use timeseries::TimePoint;

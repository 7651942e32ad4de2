pub mod calendar;
pub mod config;
pub mod error;
pub mod ids;

pub use calendar::{SimpleTradingCalendar, TradingCalendar};
pub use config::FinscopeConfig;
pub use error::{FinscopeError, Result};
pub use ids::{MessageId, SessionId, UserId};

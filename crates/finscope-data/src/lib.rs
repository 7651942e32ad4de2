pub mod anomaly;
pub mod news;
pub mod price;
pub mod research;

pub use anomaly::{AnomalyZone, AnomalyZoneCache};
pub use news::NewsCollector;
pub use price::{HttpPriceCollector, PriceCollector};
pub use research::ResearchCollector;

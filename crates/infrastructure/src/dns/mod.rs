pub mod cache;
pub mod forwarder;
pub mod handler;
pub mod message;
pub mod overlay;
pub mod reload;
pub mod translator;
pub mod transport;

pub use cache::{CacheKey, CacheMetrics, ZoneCache};
pub use forwarder::Forwarder;
pub use handler::QueryHandler;
pub use overlay::OverlayNetwork;
pub use reload::{Coordinator, ZoneRuntime};
pub use translator::{SyntheticRule, Translator};
pub use transport::DialPath;

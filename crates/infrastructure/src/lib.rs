pub mod dns;
pub mod memory;
pub mod metrics;

pub use memory::{MemoryLimitError, MemoryLimits, MemoryMonitor};
pub use metrics::{Metrics, StatsSnapshot, ZoneMetrics, ZoneStats};

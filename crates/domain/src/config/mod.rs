pub mod errors;
pub mod root;
pub mod runtime;
pub mod zone;

pub use errors::ConfigError;
pub use root::{Config, GlobalConfig};
pub use runtime::{LogFormat, RuntimeOptions};
pub use zone::{normalize_fqdn, BackendConfig, CacheConfig, Zone};

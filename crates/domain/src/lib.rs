pub mod classifier;
pub mod config;
pub mod errors;
pub mod synthetic;

pub use classifier::{classify, ClientClass};
pub use config::{
    normalize_fqdn, BackendConfig, CacheConfig, Config, ConfigError, GlobalConfig, LogFormat,
    RuntimeOptions, Zone,
};
pub use errors::DomainError;

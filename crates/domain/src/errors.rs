use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("no zone matches {0}")]
    ZoneNotFound(String),

    #[error("address is outside the synthetic prefix")]
    NotSynthetic,

    #[error("no zone registered for site id {0}")]
    UnknownSite(u16),

    #[error("failed to resolve reflected target {target}: {reason}")]
    ReflectFailed { target: String, reason: String },

    #[error("all upstream servers failed after {attempts} attempts")]
    UpstreamUnavailable { attempts: u32 },

    #[error("malformed DNS message: {0}")]
    Malformed(String),

    #[error("timeout waiting for {server}")]
    TransportTimeout { server: String },

    #[error("transport error contacting {server}: {detail}")]
    Transport { server: String, detail: String },
}

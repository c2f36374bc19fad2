use std::fmt;
use std::str::FromStr;

/// Process-lifetime options supplied by flags and environment, never
/// by the zone file. Fixed between reloads.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub dns_port: u16,
    pub http_port: u16,
    pub bind_address: String,
    /// TTL stamped on synthetic and overlay-system answers.
    pub default_ttl: u32,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_queries: bool,
    /// Credential handed to an overlay backend when one is linked in.
    pub overlay_auth_key: Option<String>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            dns_port: 53,
            http_port: 8080,
            bind_address: "0.0.0.0".to_string(),
            default_ttl: 300,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            log_queries: false,
            overlay_auth_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "plain" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

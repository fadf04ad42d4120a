//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::errors::SharedError;

/// Global run ID singleton - set once at startup
static RUN_ID: OnceLock<RunId> = OnceLock::new();

/// Identifier stamped on every log line and run summary of one dispatcher invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(uuid[..8].to_string())
    }

    /// Initialize the global run ID (first caller wins)
    pub fn init() -> &'static RunId {
        RUN_ID.get_or_init(RunId::new)
    }

    /// Get the global run ID, initializing it on first use
    pub fn current() -> &'static RunId {
        Self::init()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Brain hemisphere a task is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    Left,
    Right,
}

impl Hemisphere {
    /// Hemisphere axis for a run: both sides when separated, a single unseparated slot otherwise
    pub fn axis(separate: bool) -> Vec<Option<Hemisphere>> {
        if separate {
            vec![Some(Hemisphere::Left), Some(Hemisphere::Right)]
        } else {
            vec![None]
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hemisphere::Left => write!(f, "left"),
            Hemisphere::Right => write!(f, "right"),
        }
    }
}

/// Kind of analysis a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Functions,
    Probabilities,
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisType::Functions => write!(f, "functions"),
            AnalysisType::Probabilities => write!(f, "probabilities"),
        }
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "functions" => Ok(AnalysisType::Functions),
            "probabilities" => Ok(AnalysisType::Probabilities),
            _ => Err(SharedError::InvalidConfig {
                field: "analysis_type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// One unit of dispatched work: a single provider request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Task {
    pub region: String,
    pub hemisphere: Option<Hemisphere>,
    pub function: Option<String>,
    pub model: String,
    pub analysis_type: AnalysisType,
}

impl Task {
    pub fn functions(region: impl Into<String>, hemisphere: Option<Hemisphere>, model: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            hemisphere,
            function: None,
            model: model.into(),
            analysis_type: AnalysisType::Functions,
        }
    }

    pub fn probability(
        region: impl Into<String>,
        hemisphere: Option<Hemisphere>,
        function: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            hemisphere,
            function: Some(function.into()),
            model: model.into(),
            analysis_type: AnalysisType::Probabilities,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.region)?;
        if let Some(hemisphere) = self.hemisphere {
            write!(f, " ({hemisphere})")?;
        }
        if let Some(function) = &self.function {
            write!(f, " / {function}")?;
        }
        write!(f, " @ {}", self.model)
    }
}

/// Text-generation providers available in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    OpenAI,
    Claude,
    Gemini,
    Together,
    Dummy,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::OpenAI,
        ProviderId::Claude,
        ProviderId::Gemini,
        ProviderId::Together,
        ProviderId::Dummy,
    ];

    /// Environment variable holding the provider's API key, if it needs one
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderId::OpenAI => Some("OPENAI_API_KEY"),
            ProviderId::Claude => Some("CLAUDE_API_KEY"),
            ProviderId::Gemini => Some("GEMINI_API_KEY"),
            ProviderId::Together => Some("TOGETHERAI_API_KEY"),
            ProviderId::Dummy => None,
        }
    }

    /// Prefix for provider-specific environment overrides
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "OPENAI",
            ProviderId::Claude => "CLAUDE",
            ProviderId::Gemini => "GEMINI",
            ProviderId::Together => "TOGETHER",
            ProviderId::Dummy => "DUMMY",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::OpenAI => write!(f, "openai"),
            ProviderId::Claude => write!(f, "claude"),
            ProviderId::Gemini => write!(f, "gemini"),
            ProviderId::Together => write!(f, "together"),
            ProviderId::Dummy => write!(f, "dummy"),
        }
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAI),
            "claude" | "anthropic" => Ok(ProviderId::Claude),
            "gemini" | "google" => Ok(ProviderId::Gemini),
            "together" | "togetherai" => Ok(ProviderId::Together),
            "dummy" => Ok(ProviderId::Dummy),
            _ => Err(format!("Unknown provider: {s}")),
        }
    }
}

/// API failure types reported by provider clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiFailure {
    /// Authentication failed (invalid API key)
    AuthenticationFailed,
    /// Rate limit exceeded
    RateLimitExceeded,
    /// Service temporarily unavailable
    ServiceUnavailable,
    /// Server error from provider
    ServerError(String),
    /// Network/connection error
    NetworkError(String),
    /// Response could not be parsed or carried no content
    MalformedResponse(String),
    /// Unknown or unhandled error
    Unknown(String),
}

impl ApiFailure {
    /// Map a non-success HTTP status onto a failure kind
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        match status {
            401 | 403 => ApiFailure::AuthenticationFailed,
            429 => ApiFailure::RateLimitExceeded,
            503 => ApiFailure::ServiceUnavailable,
            _ => ApiFailure::ServerError(format!("HTTP {status}: {}", detail.into())),
        }
    }

    /// Short machine-readable label used in task failure records
    pub fn kind(&self) -> &'static str {
        match self {
            ApiFailure::AuthenticationFailed => "authentication_failed",
            ApiFailure::RateLimitExceeded => "rate_limited",
            ApiFailure::ServiceUnavailable => "service_unavailable",
            ApiFailure::ServerError(_) => "server_error",
            ApiFailure::NetworkError(_) => "network_error",
            ApiFailure::MalformedResponse(_) => "malformed_response",
            ApiFailure::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::AuthenticationFailed => write!(f, "authentication failed"),
            ApiFailure::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ApiFailure::ServiceUnavailable => write!(f, "service unavailable"),
            ApiFailure::ServerError(detail) => write!(f, "server error: {detail}"),
            ApiFailure::NetworkError(detail) => write!(f, "network error: {detail}"),
            ApiFailure::MalformedResponse(detail) => write!(f, "malformed response: {detail}"),
            ApiFailure::Unknown(detail) => write!(f, "unknown error: {detail}"),
        }
    }
}

impl std::error::Error for ApiFailure {}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A media payload carried as base64 text together with its media type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub payload: String,
    pub media_type: String,
}

impl Artifact {
    pub fn new(payload: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            media_type: media_type.into(),
        }
    }
}

/// Closed set of remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Generate,
    Edit,
    Inpaint,
    Combine,
    Upscale,
    Refine,
    Reframe,
    Animate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Generate => "generate",
            OperationKind::Edit => "edit",
            OperationKind::Inpaint => "inpaint",
            OperationKind::Combine => "combine",
            OperationKind::Upscale => "upscale",
            OperationKind::Refine => "refine",
            OperationKind::Reframe => "reframe",
            OperationKind::Animate => "animate",
        }
    }

    /// Operations gated by the daily quota
    pub fn is_metered(&self) -> bool {
        matches!(self, OperationKind::Animate)
    }

    /// Operations that complete out of band and must be polled
    pub fn is_long_running(&self) -> bool {
        matches!(self, OperationKind::Animate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpscaleFactor {
    X2,
    X4,
}

impl UpscaleFactor {
    pub fn multiplier(&self) -> u32 {
        match self {
            UpscaleFactor::X2 => 2,
            UpscaleFactor::X4 => 4,
        }
    }
}

/// Operation-specific settings forwarded to the service and kept on the record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSettings {
    pub aspect_ratio: Option<String>,
    pub resolution: Option<UpscaleFactor>,
    pub seed: Option<u64>,
    pub image_count: u32,
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: None,
            resolution: None,
            seed: None,
            image_count: 1,
        }
    }
}

/// Fully built request for one remote operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: Uuid,
    pub kind: OperationKind,
    pub instruction: String,
    pub images: Vec<Artifact>,
    pub mask: Option<Artifact>,
    pub settings: OperationSettings,
}

impl GenerationRequest {
    pub fn new(kind: OperationKind, instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            instruction: instruction.into(),
            images: Vec::new(),
            mask: None,
            settings: OperationSettings::default(),
        }
    }
}

/// Raw service answer: result payloads and optional model text
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    pub results: Vec<Artifact>,
    pub text: Option<String>,
}

impl GenerationResponse {
    /// Convert into the result list, surfacing a textual refusal when the
    /// model produced no payload.
    pub fn into_results(self) -> Result<Vec<Artifact>, GenerationError> {
        if !self.results.is_empty() {
            return Ok(self.results);
        }

        match self.text {
            Some(text) if !text.trim().is_empty() => Err(GenerationError::SafetyRefusal(text)),
            _ => Err(GenerationError::MalformedModelOutput(
                "response contained neither results nor text".to_string(),
            )),
        }
    }
}

/// Handle to an asynchronous job running on the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatus {
    pub done: bool,
    pub error: Option<String>,
}

/// Connection settings for the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub request_timeout_secs: u64,
    pub dry_run: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key_env: crate::env::API_KEY_ENV.to_string(),
            request_timeout_secs: 120,
            dry_run: false,
        }
    }
}

/// Classification used for retry decisions and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    PermissionDenied,
    NotFound,
    Network,
    SafetyRefusal,
    QuotaExceeded,
    MalformedModelOutput,
    InvalidRequest,
    Cancelled,
    Unknown,
}

impl ErrorClass {
    /// Failures for which one credential reselection is attempted
    pub fn is_reauth_eligible(&self) -> bool {
        matches!(self, ErrorClass::PermissionDenied | ErrorClass::NotFound)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::PermissionDenied => "PermissionDenied",
            ErrorClass::NotFound => "NotFound",
            ErrorClass::Network => "NetworkError",
            ErrorClass::SafetyRefusal => "SafetyRefusal",
            ErrorClass::QuotaExceeded => "QuotaExceeded",
            ErrorClass::MalformedModelOutput => "MalformedModelOutput",
            ErrorClass::InvalidRequest => "InvalidRequest",
            ErrorClass::Cancelled => "Cancelled",
            ErrorClass::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("The model declined the request: {0}")]
    SafetyRefusal(String),
    #[error("Daily quota exhausted")]
    QuotaExceeded,
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl GenerationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GenerationError::PermissionDenied(_) => ErrorClass::PermissionDenied,
            GenerationError::NotFound(_) => ErrorClass::NotFound,
            GenerationError::NetworkError(_) => ErrorClass::Network,
            GenerationError::SafetyRefusal(_) => ErrorClass::SafetyRefusal,
            GenerationError::QuotaExceeded => ErrorClass::QuotaExceeded,
            GenerationError::MalformedModelOutput(_) => ErrorClass::MalformedModelOutput,
            GenerationError::InvalidRequest(_) => ErrorClass::InvalidRequest,
            GenerationError::Cancelled => ErrorClass::Cancelled,
            GenerationError::Unknown(_) => ErrorClass::Unknown,
        }
    }

    pub fn is_reauth_eligible(&self) -> bool {
        self.class().is_reauth_eligible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusal_surfaces_text_verbatim() {
        let response = GenerationResponse {
            results: Vec::new(),
            text: Some("I can't help with that image.".to_string()),
        };

        assert_eq!(
            response.into_results(),
            Err(GenerationError::SafetyRefusal(
                "I can't help with that image.".to_string()
            ))
        );
    }

    #[test]
    fn test_results_win_over_text() {
        let response = GenerationResponse {
            results: vec![Artifact::new("aGVsbG8=", "image/png")],
            text: Some("here you go".to_string()),
        };

        assert_eq!(response.into_results().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_response_is_malformed() {
        let response = GenerationResponse::default();
        assert!(matches!(
            response.into_results(),
            Err(GenerationError::MalformedModelOutput(_))
        ));
    }

    #[test]
    fn test_error_classification() {
        assert!(GenerationError::PermissionDenied("key".into()).is_reauth_eligible());
        assert!(GenerationError::NotFound("model".into()).is_reauth_eligible());
        assert!(!GenerationError::NetworkError("reset".into()).is_reauth_eligible());
        assert!(!GenerationError::SafetyRefusal("no".into()).is_reauth_eligible());
        assert!(!GenerationError::QuotaExceeded.is_reauth_eligible());
        assert_eq!(GenerationError::Cancelled.class(), ErrorClass::Cancelled);
    }

    #[test]
    fn test_operation_kind_serializes_lowercase() {
        let json = serde_json::to_string(&OperationKind::Inpaint).unwrap();
        assert_eq!(json, "\"inpaint\"");
        assert!(OperationKind::Animate.is_metered());
    }
}

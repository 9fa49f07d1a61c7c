//! Strict wire schemas for service responses
//!
//! Model output is never accessed field-by-field on an untyped value. Every
//! body is decoded into one of the types below; anything that does not match
//! becomes [`GenerationError::MalformedModelOutput`].

use crate::service::types::{
    Artifact, GenerationError, GenerationRequest, GenerationResponse, JobHandle, JobStatus,
    OperationSettings,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WirePayload {
    pub data: String,
    pub mime_type: String,
}

impl From<&Artifact> for WirePayload {
    fn from(artifact: &Artifact) -> Self {
        Self {
            data: artifact.payload.clone(),
            mime_type: artifact.media_type.clone(),
        }
    }
}

impl From<WirePayload> for Artifact {
    fn from(payload: WirePayload) -> Self {
        Artifact::new(payload.data, payload.mime_type)
    }
}

/// Request body shared by the generate and job-submission endpoints
#[derive(Debug, Clone, Serialize)]
pub struct WireRequest<'a> {
    pub id: String,
    pub kind: &'static str,
    pub instruction: &'a str,
    pub images: Vec<WirePayload>,
    pub mask: Option<WirePayload>,
    pub settings: &'a OperationSettings,
}

impl<'a> From<&'a GenerationRequest> for WireRequest<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            id: request.id.to_string(),
            kind: request.kind.as_str(),
            instruction: &request.instruction,
            images: request.images.iter().map(WirePayload::from).collect(),
            mask: request.mask.as_ref().map(WirePayload::from),
            settings: &request.settings,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireGenerateResponse {
    #[serde(default)]
    pub results: Vec<WirePayload>,
    #[serde(default)]
    pub text: Option<String>,
}

impl From<WireGenerateResponse> for GenerationResponse {
    fn from(wire: WireGenerateResponse) -> Self {
        Self {
            results: wire.results.into_iter().map(Artifact::from).collect(),
            text: wire.text,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireJobSubmitted {
    pub job_id: String,
}

impl From<WireJobSubmitted> for JobHandle {
    fn from(wire: WireJobSubmitted) -> Self {
        JobHandle::new(wire.job_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct WireJobError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct WireJobStatus {
    pub done: bool,
    #[serde(default)]
    pub error: Option<WireJobError>,
}

impl From<WireJobStatus> for JobStatus {
    fn from(wire: WireJobStatus) -> Self {
        Self {
            done: wire.done,
            error: wire.error.map(|e| e.message),
        }
    }
}

/// Decode a JSON body into a strict schema type
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, GenerationError> {
    serde_json::from_slice(body).map_err(|e| GenerationError::MalformedModelOutput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_generate_response() {
        let body = br#"{"results":[{"data":"AAAA","mime_type":"image/png"}]}"#;
        let wire: WireGenerateResponse = decode(body).unwrap();
        let response = GenerationResponse::from(wire);

        assert_eq!(response.results, vec![Artifact::new("AAAA", "image/png")]);
        assert!(response.text.is_none());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let body = br#"{"results":"not-a-list"}"#;
        let result: Result<WireGenerateResponse, _> = decode(body);
        assert!(matches!(
            result,
            Err(GenerationError::MalformedModelOutput(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_payload_fields() {
        let body = br#"{"data":"AAAA","mime_type":"image/png","extra":1}"#;
        let result: Result<WirePayload, _> = decode(body);
        assert!(result.is_err());
    }

    #[test]
    fn test_job_status_error_message() {
        let body = br#"{"done":false,"error":{"message":"render failed"}}"#;
        let status = JobStatus::from(decode::<WireJobStatus>(body).unwrap());
        assert!(!status.done);
        assert_eq!(status.error.as_deref(), Some("render failed"));
    }
}

use serde::{Deserialize, Serialize};

/// JSON envelope returned by `POST /generate-caption`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaptionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptionResponse {
    pub fn ok(caption: impl Into<String>) -> Self {
        Self {
            success: true,
            caption: Some(caption.into()),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            caption: None,
            error: Some(message.into()),
        }
    }
}

/// JSON body returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::gemini::GeminiError;

/// Why the remote service refused to return an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    Safety,
    Recitation,
    MaxTokens,
    Other { reason: String, details: Option<String> },
}

impl Refusal {
    pub fn user_message(&self) -> String {
        match self {
            Refusal::Safety => "The request was blocked due to safety concerns. Your prompt or image may have violated the safety policy. Please try a different image or a more neutral prompt.".to_string(),
            Refusal::Recitation => "The request was blocked because the response may have contained copyrighted material. Please try a different prompt.".to_string(),
            Refusal::MaxTokens => "The request failed because the maximum number of tokens was reached. Please try with a smaller image or a shorter prompt.".to_string(),
            Refusal::Other { reason, details } => {
                let mut message = format!("Image generation failed. Reason: {reason}.");
                if let Some(details) = details {
                    message.push_str(&format!(" Details: {details}"));
                }
                message
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Decode(String),

    #[error("{}", .0.user_message())]
    Refused(Refusal),

    #[error("{0}")]
    Empty(String),

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Decode(_) => "DECODE_ERROR",
            AppError::Refused(_) => "REMOTE_REFUSED",
            AppError::Empty(_) => "REMOTE_EMPTY",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Refused(_) | AppError::Empty(_) | AppError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<GeminiError> for AppError {
    fn from(err: GeminiError) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "code": self.code(), "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn other_refusal_interpolates_reason_and_details() {
        let refusal = Refusal::Other { reason: "PROHIBITED_CONTENT".into(), details: Some("image flagged".into()) };
        assert_eq!(
            refusal.user_message(),
            "Image generation failed. Reason: PROHIBITED_CONTENT. Details: image flagged"
        );

        let bare = Refusal::Other { reason: "OTHER".into(), details: None };
        assert_eq!(bare.user_message(), "Image generation failed. Reason: OTHER.");
    }

    #[test]
    fn refusal_messages_are_distinct() {
        let messages = [Refusal::Safety, Refusal::Recitation, Refusal::MaxTokens]
            .map(|r| r.user_message());
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert!(messages[2].contains("smaller image"));
    }

    #[tokio::test]
    async fn validation_error_maps_to_400_json() {
        let response = AppError::Validation("Please describe the new background you want.".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"], "Please describe the new background you want.");
    }
}

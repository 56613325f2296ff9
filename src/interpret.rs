//! Reading remote responses: pull out the image or say why there is none.

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, Refusal};
use crate::models::ImageData;

pub const NO_CANDIDATE_MESSAGE: &str = "The API did not return an image. This could be due to a network issue or an invalid request.";
pub const NO_IMAGE_MESSAGE: &str = "Could not find image data in the API response. The operation may have been blocked or the image could not be processed.";
pub const NO_GENERATED_IMAGE_MESSAGE: &str = "Could not find image data in the API response. The operation may have been blocked or the prompt might be too complex.";

// --- Edit call (generateContent) ---

#[derive(Debug, Default, Deserialize)]
pub struct EditResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub finish_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Deserialize)]
pub struct InlineData {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FinishReason {
    Unspecified,
    Stop,
    Safety,
    Recitation,
    MaxTokens,
    Other(String),
}

impl From<String> for FinishReason {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "" | "UNSPECIFIED" | "FINISH_REASON_UNSPECIFIED" => FinishReason::Unspecified,
            "STOP" => FinishReason::Stop,
            "SAFETY" => FinishReason::Safety,
            "RECITATION" => FinishReason::Recitation,
            "MAX_TOKENS" => FinishReason::MaxTokens,
            _ => FinishReason::Other(raw),
        }
    }
}

impl Candidate {
    fn first_inline_image(&self) -> Option<&InlineData> {
        self.content.as_ref()?.parts.iter().find_map(|part| match part {
            Part::Inline { inline_data } => Some(inline_data),
            _ => None,
        })
    }

    fn text(&self) -> String {
        let Some(content) = &self.content else {
            return String::new();
        };
        content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Failure for a candidate that carries no image. `STOP` counts as no
    /// reason given.
    fn failure(&self) -> AppError {
        match &self.finish_reason {
            None | Some(FinishReason::Unspecified) | Some(FinishReason::Stop) => AppError::Empty(NO_IMAGE_MESSAGE.into()),
            Some(FinishReason::Safety) => AppError::Refused(Refusal::Safety),
            Some(FinishReason::Recitation) => AppError::Refused(Refusal::Recitation),
            Some(FinishReason::MaxTokens) => AppError::Refused(Refusal::MaxTokens),
            Some(FinishReason::Other(code)) => AppError::Refused(Refusal::Other {
                reason: code.clone(),
                details: self.finish_message.clone(),
            }),
        }
    }
}

pub fn interpret_edit_response(response: &EditResponse) -> Result<ImageData, AppError> {
    let Some(candidate) = response.candidates.first() else {
        warn!("⚠️ Edit response carried no candidates");
        return Err(AppError::Empty(NO_CANDIDATE_MESSAGE.into()));
    };

    match candidate.first_inline_image() {
        Some(inline) => {
            info!("🎯 Found image data with mime type: {}", inline.mime_type);
            ImageData::from_base64(&inline.data, inline.mime_type.clone())
        }
        None => {
            let failure = candidate.failure();
            warn!(
                finish_reason = ?candidate.finish_reason,
                text = %candidate.text(),
                "⚠️ No inline image data in response: {}",
                failure
            );
            Err(failure)
        }
    }
}

// --- Generate call (predict) ---

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

pub fn interpret_generate_response(response: &GenerateResponse) -> Result<ImageData, AppError> {
    let generated = response
        .predictions
        .iter()
        .find_map(|p| p.bytes_base64_encoded.as_deref().map(|data| (data, p.mime_type.as_deref())));

    match generated {
        Some((data, mime_type)) => ImageData::from_base64(data, mime_type.unwrap_or("image/jpeg")),
        None => {
            warn!("⚠️ Generate response carried no images");
            Err(AppError::Empty(NO_GENERATED_IMAGE_MESSAGE.into()))
        }
    }
}

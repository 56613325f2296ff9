use std::io::Cursor;

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::error::AppError;
use crate::mask::PointerEvent;

/// The uploaded photo. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub filename: String,
    pub bytes: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl SourceImage {
    /// Reads the natural dimensions from the image header. Anything that is
    /// not a recognisable image is a decode error.
    pub fn load(filename: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self, AppError> {
        let bytes: Bytes = bytes.into();
        let reader = image::ImageReader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .map_err(|e| AppError::Decode(format!("Could not read the uploaded file: {e}")))?;
        let format = reader
            .format()
            .ok_or_else(|| AppError::Decode("The uploaded file is not a supported image.".into()))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| AppError::Decode(format!("Could not decode the uploaded image: {e}")))?;

        let mut mime_type: String = mime_type.into();
        if mime_type.trim().is_empty() {
            mime_type = format.to_mime_type().to_string();
        }

        Ok(Self { filename: filename.into(), bytes, mime_type, width, height })
    }

    pub fn is_png(&self) -> bool {
        self.mime_type == "image/png"
    }

    /// Filename without its final extension, `image` when nothing is left.
    pub fn stem(&self) -> String {
        let stem = match self.filename.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => self.filename.as_str(),
        };
        if stem.is_empty() { "image".to_string() } else { stem.to_string() }
    }
}

/// Base64 data ready to be placed in a request part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedPayload {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl EncodedPayload {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, AppError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| AppError::Decode(format!("invalid base64 image data: {e}")))
    }
}

/// Decoded image bytes plus their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImageData {
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self, AppError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| AppError::Decode(format!("The returned image could not be decoded: {e}")))?;
        Ok(Self { bytes: bytes.into(), mime_type: mime_type.into() })
    }

    pub fn extension(&self) -> &'static str {
        if self.mime_type == "image/png" { "png" } else { "jpg" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditMode {
    Colorize,
    RemoveObject,
    RemovePeople,
    RemoveBackground,
    ChangeBackground,
    EditClothing,
    StyleTransfer,
    TimeTravel,
    GenerateImage,
}

impl EditMode {
    /// Modes whose workflow starts as soon as the photo is uploaded.
    pub fn runs_on_upload(self) -> bool {
        matches!(self, EditMode::Colorize | EditMode::RemovePeople | EditMode::RemoveBackground | EditMode::TimeTravel)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EditMode::Colorize => "colorize",
            EditMode::RemoveObject => "remove-object",
            EditMode::RemovePeople => "remove-people",
            EditMode::RemoveBackground => "remove-background",
            EditMode::ChangeBackground => "change-background",
            EditMode::EditClothing => "edit-clothing",
            EditMode::StyleTransfer => "style-transfer",
            EditMode::TimeTravel => "time-travel",
            EditMode::GenerateImage => "generate-image",
        }
    }

    /// Title and blurb shown on the tool page before upload.
    pub fn tool_page(self) -> (&'static str, &'static str) {
        match self {
            EditMode::Colorize => ("Colorize Photo", "Breathe new life into your black and white memories. Our AI will intelligently add realistic and vibrant colors to your images. Upload a photo to begin."),
            EditMode::RemoveObject => ("Remove Object", "Erase unwanted objects, people, or blemishes from any picture. Simply upload your image to start masking the area you want to remove."),
            EditMode::RemovePeople => ("Remove People", "Automatically detect and remove all people from an image, leaving a clean, empty scene. Upload a photo with people to see the magic."),
            EditMode::RemoveBackground => ("Remove Background", "Instantly isolate the main subject of your photo by making the background transparent. Perfect for creating profile pictures, product shots, and more."),
            EditMode::ChangeBackground => ("Change Background", "Transport your subject to a completely new environment. Upload a photo and then describe the new background you want to generate."),
            EditMode::EditClothing => ("Edit Clothing", "Digitally alter or completely change outfits in your photos. Upload an image and describe the clothing modifications you want to make."),
            EditMode::StyleTransfer => ("Artistic Style", "Redraw your photo in a different artistic style. Choose from styles like Pixar, Anime, Cyberpunk, and more. Upload a photo to begin."),
            EditMode::TimeTravel => ("Time Travel Filter", "See your photos in a new light by applying iconic styles from different eras. The AI will generate versions of your image in 1920s, 1980s, and modern HDR styles."),
            EditMode::GenerateImage => ("Create Image", "Describe the image you want to create."),
        }
    }
}

impl std::fmt::Display for EditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleId {
    Pixar,
    Anime,
    Cyberpunk,
    Painting,
    Disney,
    Portrait,
}

impl StyleId {
    pub const ALL: [StyleId; 6] = [StyleId::Pixar, StyleId::Anime, StyleId::Cyberpunk, StyleId::Painting, StyleId::Disney, StyleId::Portrait];

    pub fn parse(id: &str) -> Result<Self, AppError> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == id)
            .ok_or_else(|| AppError::Validation("Invalid style selected.".into()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StyleId::Pixar => "pixar",
            StyleId::Anime => "anime",
            StyleId::Cyberpunk => "cyberpunk",
            StyleId::Painting => "painting",
            StyleId::Disney => "disney",
            StyleId::Portrait => "portrait",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Era {
    #[serde(rename = "1920s")]
    Twenties,
    #[serde(rename = "1980s")]
    Eighties,
    #[serde(rename = "modern")]
    Modern,
}

impl Era {
    pub const ALL: [Era; 3] = [Era::Twenties, Era::Eighties, Era::Modern];

    pub fn id(self) -> &'static str {
        match self {
            Era::Twenties => "1920s",
            Era::Eighties => "1980s",
            Era::Modern => "modern",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|era| era.id() == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Tall => "9:16",
            AspectRatio::Wide => "16:9",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    High,
}

// --- HTTP bodies ---

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: EditMode,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct StyleRequest {
    pub style: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub quality: Option<Quality>,
}

#[derive(Debug, Deserialize)]
pub struct SliderRequest {
    pub value: f32,
}

#[derive(Debug, Deserialize)]
pub struct BrushRequest {
    pub size: f32,
}

#[derive(Debug, Deserialize)]
pub struct MaskEventsRequest {
    pub events: Vec<PointerEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn load_reads_natural_dimensions_and_guesses_missing_mime() {
        let source = SourceImage::load("cat.photo.png", "", png_bytes(12, 7)).unwrap();
        assert_eq!((source.width, source.height), (12, 7));
        assert_eq!(source.mime_type, "image/png");
        assert_eq!(source.stem(), "cat.photo");
    }

    #[test]
    fn load_rejects_non_images() {
        let err = SourceImage::load("notes.txt", "text/plain", b"hello world".to_vec()).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn stem_falls_back_when_filename_has_nothing_before_the_dot() {
        let source = SourceImage::load(".png", "image/png", png_bytes(1, 1)).unwrap();
        assert_eq!(source.stem(), "image");
        let plain = SourceImage::load("holiday", "image/png", png_bytes(1, 1)).unwrap();
        assert_eq!(plain.stem(), "holiday");
    }

    #[test]
    fn mode_and_option_ids_match_the_wire_names() {
        let mode: EditMode = serde_json::from_str("\"remove-object\"").unwrap();
        assert_eq!(mode, EditMode::RemoveObject);
        let ratio: AspectRatio = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(ratio.as_str(), "16:9");
        assert_eq!(AspectRatio::default().as_str(), "1:1");
        assert_eq!(Era::parse("1980s"), Some(Era::Eighties));
        assert!(StyleId::parse("vaporwave").is_err());
    }
}

use std::borrow::Cow;

use crate::error::AppError;
use crate::mask::MaskSurface;
use crate::models::{AspectRatio, EditMode, Era, Quality, SourceImage, StyleId};

pub const COLORIZE_INSTRUCTION: &str = "Colorize this black and white photo. Make the colors vibrant and realistic. Do not alter the content of the image, only add color.";

pub const REMOVE_OBJECT_INSTRUCTION: &str = "Remove the object that has been scribbled on with a red brush and realistically fill in the background. The red scribble itself should not be in the final image, and the filled area should blend seamlessly.";

pub const REMOVE_PEOPLE_INSTRUCTION: &str = "Your task is to expertly remove every person from this image. It is critical that you analyze the surrounding environment—including textures, lighting, shadows, and patterns—and then meticulously reconstruct the background where the people were. The filled-in areas must blend seamlessly and be indistinguishable from the original background. Do not leave any ghosts, blurs, smudges, or artifacts. The final image must be completely free of people and appear as if they were never there.";

pub const REMOVE_BACKGROUND_INSTRUCTION: &str = "Segment the main subject from the background. Make the background fully transparent. The output must be a PNG file with an alpha channel.";

pub const HIGH_QUALITY_SUFFIX: &str = ", 4k, highly detailed, photorealistic";

pub fn clothing_instruction(description: &str) -> Result<String, AppError> {
    let description = required(description, "Please describe the clothing change you want to make.")?;
    Ok(format!(
        "Your task is to edit the clothing on the subject in this image based on the following description: \"{description}\". It is absolutely critical that you do not alter the subject's pose, body shape, camera angle, perspective, or the background. Only change the specified clothing. The new clothing should realistically match the existing lighting, shadows, and style of the image to create a seamless and believable result."
    ))
}

pub fn background_instruction(description: &str) -> Result<String, AppError> {
    let description = required(description, "Please describe the new background you want.")?;
    Ok(format!(
        "Analyze the main subject of this image, paying close attention to the existing camera angle, perspective, and lighting. Replace the entire background with a new one described as: \"{description}\". It is critical that you **do not change the original camera angle or perspective of the subject**. The new background must be photorealistic and high-quality. Seamlessly blend the original subject into this new background by matching the lighting, shadows, and perspective of the subject to the new environment to create a completely natural and believable final image. The original subject's form and angle must not be altered."
    ))
}

pub fn style_instruction(style: StyleId) -> &'static str {
    match style {
        StyleId::Pixar => "Recreate this image in the playful, stylized 3D animation aesthetic of a Pixar movie. Emphasize rounded shapes, vibrant colors, and soft, friendly lighting. The subjects should look like charming animated characters while preserving their original identities and composition.",
        StyleId::Anime => "Transform this image into a vibrant, high-quality Japanese anime style. Feature clean lines, expressive, large eyes, and dynamic, cel-shaded coloring. The background should be painterly and detailed, complementing the character art. Maintain the original pose and composition.",
        StyleId::Cyberpunk => "Convert this image into a gritty, futuristic cyberpunk scene. Incorporate neon lights, a dark, rainy atmosphere, and high-tech, cybernetic elements. The overall mood should be dystopian and moody, with a strong emphasis on glowing blues, pinks, and purples.",
        StyleId::Painting => "Reinterpret this image as a classical oil painting. The style should mimic the brushstrokes, color palette, and texture of an old master. Focus on realistic lighting and shadow (chiaroscuro) to create a dramatic, timeless piece of art. Preserve the original subject and composition.",
        StyleId::Disney => "Redraw this image in the style of a modern 3D Disney animated film. Focus on creating expressive characters with large, emotive eyes, smooth features, and a touch of magical realism. The lighting and colors should be enchanting and vibrant, creating a heartwarming scene.",
        StyleId::Portrait => "Enhance this image into a hyper-realistic, professional studio portrait. Refine the details, balance the lighting to be flattering and dramatic, and ensure the skin texture is natural yet perfected. The background should be simple and non-distracting, focusing all attention on the subject.",
    }
}

pub fn era_instruction(era: Era) -> &'static str {
    match era {
        Era::Twenties => "Recreate this image as an authentic 1920s retro photograph. Apply a distinct sepia tone for a vintage feel. Introduce soft contrast and the characteristic imperfections of early photography, such as subtle film grain and light scratches. The overall mood should be nostalgic and period-accurate, preserving the original subject and composition.",
        Era::Eighties => "Transform this photo with an 80s neon and synthwave aesthetic. Overhaul the lighting to include bright, vibrant neon glows, focusing on purple and blue hues. Introduce classic VHS effects, such as faint scan lines and subtle color bleeding, to give it an authentic retro-futuristic, VCR-era look. The subject and composition should remain recognizable but fully immersed in this neon-drenched style.",
        Era::Modern => "Render this image as an ultra-realistic, high-definition modern photograph. Enhance it with a prominent and well-balanced HDR effect, bringing out sharp details in both the shadows and highlights. The colors should be vivid and true-to-life, and the final image must be crystal clear and high-resolution, as if captured with a top-tier professional camera. Maintain the original subject and composition.",
    }
}

pub fn generation_prompt(prompt: &str, quality: Quality) -> Result<String, AppError> {
    let prompt = required(prompt, "Please describe the image you want to create.")?;
    Ok(match quality {
        Quality::Standard => prompt.to_string(),
        Quality::High => format!("{prompt}{HIGH_QUALITY_SUFFIX}"),
    })
}

fn required<'a>(text: &'a str, message: &str) -> Result<&'a str, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(trimmed)
}

/// Inputs for the generate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// What the user typed, trimmed. Used for the download name.
    pub description: String,
    /// Text actually sent, including any quality suffix.
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
}

/// One submit action, fully validated.
#[derive(Debug, Clone)]
pub enum EditRequest {
    Colorize { image: SourceImage },
    RemoveObject { image: SourceImage, mask: MaskSurface },
    RemovePeople { image: SourceImage },
    RemoveBackground { image: SourceImage },
    ChangeBackground { image: SourceImage, instruction: String },
    EditClothing { image: SourceImage, instruction: String },
    StyleTransfer { image: SourceImage, style: StyleId },
    TimeTravel { image: SourceImage },
    GenerateImage(GenerateRequest),
}

impl EditRequest {
    pub fn colorize(image: SourceImage) -> Self {
        EditRequest::Colorize { image }
    }

    pub fn remove_object(image: SourceImage, mask: MaskSurface) -> Self {
        EditRequest::RemoveObject { image, mask }
    }

    pub fn remove_people(image: SourceImage) -> Self {
        EditRequest::RemovePeople { image }
    }

    pub fn remove_background(image: SourceImage) -> Self {
        EditRequest::RemoveBackground { image }
    }

    pub fn change_background(image: SourceImage, description: &str) -> Result<Self, AppError> {
        Ok(EditRequest::ChangeBackground { image, instruction: background_instruction(description)? })
    }

    pub fn edit_clothing(image: SourceImage, description: &str) -> Result<Self, AppError> {
        Ok(EditRequest::EditClothing { image, instruction: clothing_instruction(description)? })
    }

    pub fn style_transfer(image: SourceImage, style: Option<StyleId>) -> Result<Self, AppError> {
        let style = style.ok_or_else(|| AppError::Validation("Please choose an artistic style.".into()))?;
        Ok(EditRequest::StyleTransfer { image, style })
    }

    pub fn time_travel(image: SourceImage) -> Self {
        EditRequest::TimeTravel { image }
    }

    pub fn generate_image(prompt: &str, aspect_ratio: AspectRatio, quality: Quality) -> Result<Self, AppError> {
        let full = generation_prompt(prompt, quality)?;
        Ok(EditRequest::GenerateImage(GenerateRequest {
            description: prompt.trim().to_string(),
            prompt: full,
            aspect_ratio,
        }))
    }

    pub fn mode(&self) -> EditMode {
        match self {
            EditRequest::Colorize { .. } => EditMode::Colorize,
            EditRequest::RemoveObject { .. } => EditMode::RemoveObject,
            EditRequest::RemovePeople { .. } => EditMode::RemovePeople,
            EditRequest::RemoveBackground { .. } => EditMode::RemoveBackground,
            EditRequest::ChangeBackground { .. } => EditMode::ChangeBackground,
            EditRequest::EditClothing { .. } => EditMode::EditClothing,
            EditRequest::StyleTransfer { .. } => EditMode::StyleTransfer,
            EditRequest::TimeTravel { .. } => EditMode::TimeTravel,
            EditRequest::GenerateImage(_) => EditMode::GenerateImage,
        }
    }

    /// Instruction for modes that make exactly one edit call.
    pub fn instruction(&self) -> Option<Cow<'_, str>> {
        match self {
            EditRequest::Colorize { .. } => Some(Cow::Borrowed(COLORIZE_INSTRUCTION)),
            EditRequest::RemoveObject { .. } => Some(Cow::Borrowed(REMOVE_OBJECT_INSTRUCTION)),
            EditRequest::RemovePeople { .. } => Some(Cow::Borrowed(REMOVE_PEOPLE_INSTRUCTION)),
            EditRequest::RemoveBackground { .. } => Some(Cow::Borrowed(REMOVE_BACKGROUND_INSTRUCTION)),
            EditRequest::ChangeBackground { instruction, .. } | EditRequest::EditClothing { instruction, .. } => {
                Some(Cow::Borrowed(instruction.as_str()))
            }
            EditRequest::StyleTransfer { style, .. } => Some(Cow::Borrowed(style_instruction(*style))),
            EditRequest::TimeTravel { .. } | EditRequest::GenerateImage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::jpeg_source;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn every_style_maps_to_distinct_non_empty_text() {
        let texts: HashSet<&str> = StyleId::ALL.into_iter().map(style_instruction).collect();
        assert_eq!(texts.len(), 6);
        assert!(texts.iter().all(|t| !t.trim().is_empty()));
        for style in StyleId::ALL {
            assert_eq!(StyleId::parse(style.as_str()).map(style_instruction).unwrap(), style_instruction(style));
        }
    }

    #[test]
    fn unknown_style_id_is_a_validation_failure() {
        assert!(matches!(StyleId::parse("watercolor"), Err(AppError::Validation(_))));
        let image = jpeg_source("me.jpg", 4, 4);
        assert!(matches!(EditRequest::style_transfer(image, None), Err(AppError::Validation(_))));
    }

    #[test]
    fn era_instructions_are_distinct() {
        let texts: HashSet<&str> = Era::ALL.into_iter().map(era_instruction).collect();
        assert_eq!(texts.len(), 3);
    }

    #[test]
    fn descriptions_are_interpolated_trimmed() {
        let text = background_instruction("  a snowy mountain lake ").unwrap();
        assert!(text.contains("described as: \"a snowy mountain lake\""));
        let clothing = clothing_instruction("a red raincoat").unwrap();
        assert!(clothing.contains("description: \"a red raincoat\""));
    }

    #[test]
    fn blank_descriptions_are_rejected() {
        let image = jpeg_source("me.jpg", 4, 4);
        assert!(matches!(EditRequest::change_background(image.clone(), " \t\n"), Err(AppError::Validation(_))));
        assert!(matches!(EditRequest::edit_clothing(image, ""), Err(AppError::Validation(_))));
        assert!(matches!(
            EditRequest::generate_image("   ", AspectRatio::Square, Quality::High),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn high_quality_appends_detail_suffix() {
        let request = EditRequest::generate_image("a red fox", AspectRatio::default(), Quality::High).unwrap();
        let EditRequest::GenerateImage(generate) = request else { panic!("expected generate request") };
        assert_eq!(
            generate,
            GenerateRequest {
                description: "a red fox".into(),
                prompt: "a red fox, 4k, highly detailed, photorealistic".into(),
                aspect_ratio: AspectRatio::Square,
            }
        );
        assert_eq!(generation_prompt("a red fox", Quality::Standard).unwrap(), "a red fox");
    }

    #[test]
    fn fixed_modes_carry_fixed_instructions() {
        let image = jpeg_source("me.jpg", 4, 4);
        assert_eq!(EditRequest::colorize(image.clone()).instruction().as_deref(), Some(COLORIZE_INSTRUCTION));
        assert_eq!(
            EditRequest::remove_object(image.clone(), MaskSurface::new(4, 4)).instruction().as_deref(),
            Some(REMOVE_OBJECT_INSTRUCTION)
        );
        assert!(REMOVE_OBJECT_INSTRUCTION.contains("red brush"));
        assert_eq!(EditRequest::time_travel(image).instruction(), None);
    }
}

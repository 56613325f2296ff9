//! Result presentation: the before/after comparison slider and the download
//! names for everything a workflow can produce.

use serde::Serialize;

use crate::models::{EditMode, Era, ImageData};

pub const DEFAULT_SLIDER_POSITION: f32 = 50.0;
const GENERATED_NAME_CHARS: usize = 30;

/// State of the comparison reveal. `position` is how much of the result is
/// shown from the left edge, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonView {
    pub position: f32,
    pub slider_hidden: bool,
    pub revealing: bool,
    pub clipped: bool,
}

impl Default for ComparisonView {
    fn default() -> Self {
        Self::manual()
    }
}

impl ComparisonView {
    /// Slider visible at 50.
    pub fn manual() -> Self {
        Self { position: DEFAULT_SLIDER_POSITION, slider_hidden: false, revealing: false, clipped: true }
    }

    /// Sweep animation running; slider hidden until it ends.
    pub fn revealing() -> Self {
        Self { slider_hidden: true, revealing: true, ..Self::manual() }
    }

    /// Nothing to compare against: full result, no slider.
    pub fn unclipped() -> Self {
        Self { position: 100.0, slider_hidden: true, revealing: false, clipped: false }
    }

    /// Moves the slider. Ignored while it is hidden.
    pub fn set_position(&mut self, value: f32) -> bool {
        if self.slider_hidden || !value.is_finite() {
            return false;
        }
        self.position = value.clamp(0.0, 100.0);
        true
    }

    /// Hands control back to the slider once the reveal has played.
    pub fn finish_reveal(&mut self) -> bool {
        if !self.revealing {
            return false;
        }
        *self = Self::manual();
        true
    }

    /// CSS clip applied to the result layer.
    pub fn clip_path(&self) -> String {
        if self.clipped {
            format!("inset(0 {}% 0 0)", 100.0 - self.position)
        } else {
            "inset(0 0 0 0)".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraResult {
    pub era: Era,
    pub image: ImageData,
}

#[derive(Debug, Clone)]
pub enum Presentation {
    Comparison { mode: EditMode, original: ImageData, result: ImageData, view: ComparisonView },
    Generated { description: String, result: ImageData, view: ComparisonView },
    TimeTravel { results: Vec<EraResult> },
}

impl Presentation {
    /// Colorize results get the one-off sweep reveal; every other edit starts
    /// with the slider at 50.
    pub fn comparison(mode: EditMode, original: ImageData, result: ImageData) -> Self {
        let view = if mode == EditMode::Colorize { ComparisonView::revealing() } else { ComparisonView::manual() };
        Presentation::Comparison { mode, original, result, view }
    }

    pub fn generated(description: impl Into<String>, result: ImageData) -> Self {
        Presentation::Generated { description: description.into(), result, view: ComparisonView::unclipped() }
    }

    pub fn time_travel(results: Vec<EraResult>) -> Self {
        Presentation::TimeTravel { results }
    }

    pub fn mode(&self) -> EditMode {
        match self {
            Presentation::Comparison { mode, .. } => *mode,
            Presentation::Generated { .. } => EditMode::GenerateImage,
            Presentation::TimeTravel { .. } => EditMode::TimeTravel,
        }
    }

    pub fn view(&self) -> Option<&ComparisonView> {
        match self {
            Presentation::Comparison { view, .. } | Presentation::Generated { view, .. } => Some(view),
            Presentation::TimeTravel { .. } => None,
        }
    }

    pub fn view_mut(&mut self) -> Option<&mut ComparisonView> {
        match self {
            Presentation::Comparison { view, .. } | Presentation::Generated { view, .. } => Some(view),
            Presentation::TimeTravel { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&ImageData> {
        match self {
            Presentation::Comparison { result, .. } | Presentation::Generated { result, .. } => Some(result),
            Presentation::TimeTravel { .. } => None,
        }
    }

    /// The generated image doubles as its own original.
    pub fn original(&self) -> Option<&ImageData> {
        match self {
            Presentation::Comparison { original, .. } => Some(original),
            Presentation::Generated { result, .. } => Some(result),
            Presentation::TimeTravel { .. } => None,
        }
    }

    pub fn era(&self, era: Era) -> Option<&ImageData> {
        match self {
            Presentation::TimeTravel { results } => results.iter().find(|r| r.era == era).map(|r| &r.image),
            _ => None,
        }
    }

    /// Download name and bytes for the main result.
    pub fn download(&self, source_stem: &str) -> Option<(String, &ImageData)> {
        match self {
            Presentation::Comparison { result, .. } => Some((edited_filename(source_stem, result), result)),
            Presentation::Generated { description, result, .. } => Some((generated_filename(description, result), result)),
            Presentation::TimeTravel { .. } => None,
        }
    }
}

pub fn edited_filename(stem: &str, result: &ImageData) -> String {
    format!("{}_edited.{}", stem, result.extension())
}

/// First 30 characters of the prompt with whitespace runs turned into `_`.
pub fn generated_filename(description: &str, result: &ImageData) -> String {
    let head: String = description.trim().chars().take(GENERATED_NAME_CHARS).collect();
    let mut base = String::with_capacity(head.len());
    let mut in_space = false;
    for c in head.chars() {
        if c.is_whitespace() {
            if !in_space {
                base.push('_');
            }
            in_space = true;
        } else {
            base.push(c);
            in_space = false;
        }
    }
    if base.is_empty() {
        base.push_str("generated");
    }
    format!("{}_generated.{}", base, result.extension())
}

pub fn era_filename(stem: &str, era: Era, image: &ImageData) -> String {
    format!("{}_{}.{}", stem, era.id(), image.extension())
}

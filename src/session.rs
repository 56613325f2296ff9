use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::mask::MaskEditor;
use crate::models::{AspectRatio, EditMode, Era, Quality, SourceImage, StyleId};
use crate::presenter::{ComparisonView, Presentation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    Upload,
    ToolPage,
    Loading,
    Result,
    Masking,
    Clothing,
    Background,
    StyleTransfer,
    TimeTravel,
    Generation,
}

impl Screen {
    /// Where a mode collects its extra input before submitting.
    pub fn capture_for(mode: EditMode) -> Screen {
        match mode {
            EditMode::RemoveObject => Screen::Masking,
            EditMode::EditClothing => Screen::Clothing,
            EditMode::ChangeBackground => Screen::Background,
            EditMode::StyleTransfer => Screen::StyleTransfer,
            EditMode::GenerateImage => Screen::Generation,
            EditMode::Colorize | EditMode::RemovePeople | EditMode::RemoveBackground | EditMode::TimeTravel => Screen::Upload,
        }
    }
}

/// Identifies one in-flight workflow. A result is only applied while the
/// session still holds the token it was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkflowToken(Uuid);

impl WorkflowToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Text fields and pickers that are cleared after every workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureInputs {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub quality: Quality,
}

/// Everything the editor knows about the current user session.
#[derive(Debug, Clone)]
pub struct Session {
    pub mode: Option<EditMode>,
    pub source: Option<SourceImage>,
    pub mask: Option<MaskEditor>,
    pub style: Option<StyleId>,
    pub inputs: CaptureInputs,
    pub screen: Screen,
    pub presentation: Option<Presentation>,
    pub notice: Option<String>,
    pub updated_at: DateTime<Utc>,
    workflow: Option<WorkflowToken>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            mode: None,
            source: None,
            mask: None,
            style: None,
            inputs: CaptureInputs::default(),
            screen: Screen::Upload,
            presentation: None,
            notice: None,
            updated_at: Utc::now(),
            workflow: None,
        }
    }
}

impl Session {
    /// A blank session. Whatever was in flight no longer matches.
    pub fn reset(&self) -> Session {
        if self.workflow.is_some() {
            info!("🔄 Reset while a workflow was in flight; its result will be discarded");
        }
        Session::default()
    }

    /// A blank session for `mode`, on its tool page (or straight to the prompt
    /// screen for generation).
    pub fn with_mode(&self, mode: EditMode) -> Session {
        let screen = if mode == EditMode::GenerateImage { Screen::Generation } else { Screen::ToolPage };
        Session { mode: Some(mode), screen, ..self.reset() }
    }

    pub fn is_busy(&self) -> bool {
        self.workflow.is_some()
    }

    pub fn is_current(&self, token: WorkflowToken) -> bool {
        self.workflow == Some(token)
    }

    pub fn begin_workflow(&mut self) -> WorkflowToken {
        let token = WorkflowToken::new();
        self.workflow = Some(token);
        self.screen = Screen::Loading;
        self.notice = None;
        self.presentation = None;
        self.updated_at = Utc::now();
        token
    }

    /// Forgets the in-flight workflow so its result is dropped when it lands.
    pub fn abandon_workflow(&mut self) {
        if self.workflow.take().is_some() {
            info!("🔄 New photo while a workflow was in flight; its result will be discarded");
        }
    }

    /// Applies a finished workflow. Returns false when the result belongs to a
    /// workflow the session has since moved away from.
    pub fn complete(&mut self, token: WorkflowToken, outcome: Result<Presentation, AppError>) -> bool {
        if !self.is_current(token) {
            warn!("⏭️ Discarding result of an abandoned workflow");
            return false;
        }
        self.workflow = None;
        self.inputs = CaptureInputs::default();
        self.updated_at = Utc::now();

        match outcome {
            Ok(presentation) => {
                self.screen = match presentation.mode() {
                    EditMode::TimeTravel => Screen::TimeTravel,
                    _ => Screen::Result,
                };
                self.presentation = Some(presentation);
            }
            Err(err) => self.fail(err),
        }
        true
    }

    /// Shows a blocking notice and goes back to the entry screen.
    pub fn fail(&mut self, err: AppError) {
        error!(code = err.code(), "❌ Workflow failed: {}", err);
        self.workflow = None;
        self.presentation = None;
        self.notice = Some(err.to_string());
        self.screen = Screen::Upload;
        self.updated_at = Utc::now();
    }

    /// Missing input: stay on the capture screen so the user can fix it.
    pub fn reject(&mut self, err: AppError, screen: Screen) {
        warn!("✋ Validation failed: {}", err);
        self.notice = Some(err.to_string());
        self.screen = screen;
        self.updated_at = Utc::now();
    }

    pub fn acknowledge_notice(&mut self) {
        self.notice = None;
    }

    pub fn source_stem(&self) -> String {
        self.source.as_ref().map(SourceImage::stem).unwrap_or_else(|| "image".to_string())
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            mode: self.mode,
            screen: self.screen,
            busy: self.is_busy(),
            tool_page: self.mode.map(|mode| {
                let (title, description) = mode.tool_page();
                ToolPageView { title, description }
            }),
            source: self.source.as_ref().map(|s| SourceView {
                filename: s.filename.clone(),
                mime_type: s.mime_type.clone(),
                width: s.width,
                height: s.height,
            }),
            style: self.style,
            prompt: self.inputs.prompt.clone(),
            aspect_ratio: self.inputs.aspect_ratio,
            quality: self.inputs.quality,
            notice: self.notice.clone(),
            mask: self.mask.as_ref().map(|m| MaskView {
                history: m.history_len(),
                brush_size: m.brush_size(),
                stroking: m.is_stroking(),
                empty: m.surface().is_empty(),
            }),
            comparison: self.presentation.as_ref().and_then(|p| p.view()).map(|view| ComparisonEcho {
                clip_path: view.clip_path(),
                view: *view,
            }),
            result_mime_type: self.presentation.as_ref().and_then(|p| p.result()).map(|r| r.mime_type.clone()),
            download: self
                .presentation
                .as_ref()
                .and_then(|p| p.download(&self.source_stem()))
                .map(|(name, _)| name),
            eras: match &self.presentation {
                Some(Presentation::TimeTravel { results }) => results.iter().map(|r| r.era).collect(),
                _ => Vec::new(),
            },
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolPageView {
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SourceView {
    pub filename: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
pub struct MaskView {
    pub history: usize,
    pub brush_size: f32,
    pub stroking: bool,
    pub empty: bool,
}

#[derive(Debug, Serialize)]
pub struct ComparisonEcho {
    #[serde(flatten)]
    pub view: ComparisonView,
    pub clip_path: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub mode: Option<EditMode>,
    pub screen: Screen,
    pub busy: bool,
    pub tool_page: Option<ToolPageView>,
    pub source: Option<SourceView>,
    pub style: Option<StyleId>,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub quality: Quality,
    pub notice: Option<String>,
    pub mask: Option<MaskView>,
    pub comparison: Option<ComparisonEcho>,
    pub result_mime_type: Option<String>,
    pub download: Option<String>,
    pub eras: Vec<Era>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageData;
    use pretty_assertions::assert_eq;

    fn image() -> ImageData {
        ImageData { bytes: bytes::Bytes::from_static(b"img"), mime_type: "image/png".into() }
    }

    #[test]
    fn mode_selection_starts_from_a_clean_slate() {
        let mut session = Session::default().with_mode(EditMode::EditClothing);
        session.inputs.prompt = "denim jacket".into();
        session.style = Some(StyleId::Anime);

        let switched = session.with_mode(EditMode::GenerateImage);
        assert_eq!(switched.screen, Screen::Generation);
        assert_eq!(switched.inputs, CaptureInputs::default());
        assert_eq!(switched.style, None);
        assert_eq!(Session::default().with_mode(EditMode::Colorize).screen, Screen::ToolPage);
    }

    #[test]
    fn completion_clears_transient_inputs() {
        let mut session = Session::default().with_mode(EditMode::ChangeBackground);
        session.inputs.prompt = "a beach".into();
        let token = session.begin_workflow();
        assert!(session.is_busy());
        assert_eq!(session.screen, Screen::Loading);

        assert!(session.complete(token, Ok(Presentation::comparison(EditMode::ChangeBackground, image(), image()))));
        assert_eq!(session.screen, Screen::Result);
        assert_eq!(session.inputs.prompt, "");
        assert!(!session.is_busy());
    }

    #[test]
    fn failure_shows_notice_and_returns_to_upload() {
        let mut session = Session::default().with_mode(EditMode::Colorize);
        let token = session.begin_workflow();
        session.complete(token, Err(AppError::Transport("connection reset".into())));
        assert_eq!(session.screen, Screen::Upload);
        assert_eq!(session.notice.as_deref(), Some("connection reset"));
        session.acknowledge_notice();
        assert_eq!(session.notice, None);
    }

    #[test]
    fn stale_results_are_ignored_after_reset() {
        let mut session = Session::default().with_mode(EditMode::Colorize);
        let token = session.begin_workflow();
        session = session.reset();

        let applied = session.complete(token, Ok(Presentation::comparison(EditMode::Colorize, image(), image())));
        assert!(!applied);
        assert_eq!(session.screen, Screen::Upload);
        assert!(session.presentation.is_none());
    }

    #[test]
    fn newer_workflow_wins_over_older_one() {
        let mut session = Session::default().with_mode(EditMode::RemovePeople);
        let first = session.begin_workflow();
        let second = session.begin_workflow();
        assert!(!session.complete(first, Err(AppError::Empty("late".into()))));
        assert_eq!(session.notice, None);
        assert!(session.complete(second, Ok(Presentation::comparison(EditMode::RemovePeople, image(), image()))));
    }

    #[test]
    fn view_echoes_slider_and_download_name() {
        let mut session = Session::default().with_mode(EditMode::RemovePeople);
        let token = session.begin_workflow();
        session.complete(token, Ok(Presentation::comparison(EditMode::RemovePeople, image(), image())));
        let view = serde_json::to_value(session.view()).unwrap();
        assert_eq!(view["screen"], "result");
        assert_eq!(view["comparison"]["position"], 50.0);
        assert_eq!(view["comparison"]["clip_path"], "inset(0 50% 0 0)");
        assert_eq!(view["download"], "image_edited.png");
    }
}

//! Per-mode workflow control: validate, go busy, build the request, call the
//! remote service, interpret, present.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::codec;
use crate::error::AppError;
use crate::gemini::ImageService;
use crate::interpret::{interpret_edit_response, interpret_generate_response};
use crate::mask::{self, MaskEditor};
use crate::models::{EditMode, EncodedPayload, Era, ImageData, SourceImage, StyleId, SubmitRequest};
use crate::presenter::{EraResult, Presentation};
use crate::prompts::{era_instruction, EditRequest, REMOVE_OBJECT_INSTRUCTION};
use crate::session::{Screen, Session, WorkflowToken};

/// A validated request together with the token it will report back under.
#[derive(Debug)]
pub struct PendingWorkflow {
    pub token: WorkflowToken,
    pub request: EditRequest,
}

pub struct Orchestrator {
    service: Arc<dyn ImageService>,
    max_dimension: u32,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn ImageService>, max_dimension: u32) -> Self {
        Self { service, max_dimension }
    }

    /// Takes a freshly decoded upload. Modes without a capture step start
    /// their workflow right away; the others move to their capture screen.
    pub fn accept_upload(&self, session: &mut Session, source: SourceImage) -> Result<Option<PendingWorkflow>, AppError> {
        let mode = session
            .mode
            .ok_or_else(|| AppError::BadRequest("Choose a tool before uploading a photo.".into()))?;
        if mode == EditMode::GenerateImage {
            return Err(AppError::BadRequest("Image generation does not take an upload.".into()));
        }

        info!("📥 Accepted {} ({}x{}, {}) for {}", source.filename, source.width, source.height, source.mime_type, mode);
        session.abandon_workflow();
        session.presentation = None;
        session.mask = (mode == EditMode::RemoveObject).then(|| MaskEditor::for_source(&source));
        session.source = Some(source.clone());

        let request = match mode {
            EditMode::Colorize => EditRequest::colorize(source),
            EditMode::RemovePeople => EditRequest::remove_people(source),
            EditMode::RemoveBackground => EditRequest::remove_background(source),
            EditMode::TimeTravel => EditRequest::time_travel(source),
            capture => {
                session.screen = Screen::capture_for(capture);
                return Ok(None);
            }
        };
        Ok(Some(PendingWorkflow { token: session.begin_workflow(), request }))
    }

    pub fn select_style(&self, session: &mut Session, id: &str) {
        match StyleId::parse(id) {
            Ok(style) => session.style = Some(style),
            Err(err) => {
                session.style = None;
                session.reject(err, Screen::StyleTransfer);
            }
        }
    }

    /// Submit from a capture screen. Missing input leaves the session on that
    /// screen with a notice and no remote call is made.
    pub fn submit(&self, session: &mut Session, input: SubmitRequest) -> Result<Option<PendingWorkflow>, AppError> {
        if let Some(prompt) = input.prompt {
            session.inputs.prompt = prompt;
        }
        if let Some(aspect_ratio) = input.aspect_ratio {
            session.inputs.aspect_ratio = aspect_ratio;
        }
        if let Some(quality) = input.quality {
            session.inputs.quality = quality;
        }

        let mode = session.mode.ok_or_else(|| AppError::BadRequest("No tool selected.".into()))?;
        if mode.runs_on_upload() {
            return Err(AppError::BadRequest(format!("{mode} starts when a photo is uploaded")));
        }
        if session.is_busy() {
            return Err(AppError::BadRequest("A request is already in progress.".into()));
        }

        match Self::build_request(session, mode) {
            Ok(request) => Ok(Some(PendingWorkflow { token: session.begin_workflow(), request })),
            Err(AppError::Validation(message)) => {
                session.reject(AppError::Validation(message), Screen::capture_for(mode));
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    fn build_request(session: &Session, mode: EditMode) -> Result<EditRequest, AppError> {
        let inputs = &session.inputs;
        if mode == EditMode::GenerateImage {
            return EditRequest::generate_image(&inputs.prompt, inputs.aspect_ratio, inputs.quality);
        }

        let source = session
            .source
            .clone()
            .ok_or_else(|| AppError::BadRequest("Upload a photo first.".into()))?;
        match mode {
            EditMode::RemoveObject => {
                let mask = session
                    .mask
                    .as_ref()
                    .ok_or_else(|| AppError::BadRequest("No mask to submit.".into()))?;
                Ok(EditRequest::remove_object(source, mask.surface().clone()))
            }
            EditMode::EditClothing => EditRequest::edit_clothing(source, &inputs.prompt),
            EditMode::ChangeBackground => EditRequest::change_background(source, &inputs.prompt),
            EditMode::StyleTransfer => EditRequest::style_transfer(source, session.style),
            other => Err(AppError::BadRequest(format!("{other} has no capture step"))),
        }
    }

    /// Runs the remote part of a workflow and applies the outcome if the
    /// session has not moved on in the meantime.
    pub async fn run(&self, session: &RwLock<Session>, pending: PendingWorkflow) -> bool {
        let outcome = self.execute(pending.request).await;
        session.write().complete(pending.token, outcome)
    }

    pub async fn execute(&self, request: EditRequest) -> Result<Presentation, AppError> {
        let mode = request.mode();
        info!("🚀 Starting {} workflow", mode);

        let presentation = match request {
            EditRequest::GenerateImage(generate) => {
                let response = self.service.generate_image(&generate).await?;
                let result = interpret_generate_response(&response)?;
                Presentation::generated(generate.description, result)
            }
            EditRequest::TimeTravel { image } => {
                let payload = codec::resize_image(image, self.max_dimension).await?;
                // first failure wins; the other calls are dropped with it
                let (twenties, eighties, modern) = tokio::try_join!(
                    self.edit(&payload, era_instruction(Era::Twenties)),
                    self.edit(&payload, era_instruction(Era::Eighties)),
                    self.edit(&payload, era_instruction(Era::Modern)),
                )?;
                Presentation::time_travel(vec![
                    EraResult { era: Era::Twenties, image: twenties },
                    EraResult { era: Era::Eighties, image: eighties },
                    EraResult { era: Era::Modern, image: modern },
                ])
            }
            EditRequest::RemoveObject { image, mask } => {
                let original = ImageData { bytes: image.bytes.clone(), mime_type: image.mime_type.clone() };
                let flattened = mask::flatten(image, mask, self.max_dimension).await?;
                let result = self.edit(&flattened, REMOVE_OBJECT_INSTRUCTION).await?;
                Presentation::comparison(mode, original, result)
            }
            request => {
                let instruction = request
                    .instruction()
                    .ok_or_else(|| AppError::BadRequest(format!("{mode} has no instruction")))?
                    .into_owned();
                let image = match request {
                    EditRequest::Colorize { image }
                    | EditRequest::RemovePeople { image }
                    | EditRequest::RemoveBackground { image }
                    | EditRequest::ChangeBackground { image, .. }
                    | EditRequest::EditClothing { image, .. }
                    | EditRequest::StyleTransfer { image, .. } => image,
                    _ => return Err(AppError::BadRequest(format!("{mode} is not a single edit"))),
                };
                let payload = codec::resize_image(image, self.max_dimension).await?;
                let original = ImageData { bytes: payload.decode()?.into(), mime_type: payload.mime_type.clone() };
                let result = self.edit(&payload, &instruction).await?;
                if mode == EditMode::Colorize {
                    preload(&result).await?;
                }
                Presentation::comparison(mode, original, result)
            }
        };

        info!("✅ {} workflow finished", mode);
        Ok(presentation)
    }

    async fn edit(&self, payload: &EncodedPayload, instruction: &str) -> Result<ImageData, AppError> {
        let response = self.service.edit_image(payload, instruction).await?;
        interpret_edit_response(&response)
    }
}

/// Makes sure the result decodes before it is shown, so the reveal plays on a
/// complete image.
async fn preload(result: &ImageData) -> Result<(), AppError> {
    let bytes = result.bytes.clone();
    tokio::task::spawn_blocking(move || codec::decode(&bytes).map(|_| ()))
        .await
        .map_err(|e| AppError::Decode(format!("image task failed: {e}")))?
}

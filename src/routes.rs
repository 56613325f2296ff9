use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use image::DynamicImage;
use parking_lot::RwLock;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::codec;
use crate::error::AppError;
use crate::models::{
    BrushRequest, Era, ImageData, MaskEventsRequest, ModeRequest, SliderRequest, SourceImage, StyleRequest, SubmitRequest,
    UploadRequest,
};
use crate::orchestrator::{Orchestrator, PendingWorkflow};
use crate::presenter::era_filename;
use crate::session::{Session, SessionView};

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { session: Arc::default(), orchestrator: Arc::new(orchestrator) }
    }

    fn view(&self) -> Json<SessionView> {
        Json(self.session.read().view())
    }

    async fn run(&self, pending: Option<PendingWorkflow>) {
        if let Some(pending) = pending {
            self.orchestrator.run(&self.session, pending).await;
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/mode", post(select_mode))
        .route("/api/upload", post(upload))
        .route("/api/mask", get(get_mask))
        .route("/api/mask/events", post(mask_events))
        .route("/api/mask/brush", post(mask_brush))
        .route("/api/mask/undo", post(mask_undo))
        .route("/api/mask/clear", post(mask_clear))
        .route("/api/style", post(select_style))
        .route("/api/submit", post(submit))
        .route("/api/slider", post(move_slider))
        .route("/api/reveal/complete", post(reveal_complete))
        .route("/api/notice/ack", post(acknowledge_notice))
        .route("/api/reset", post(reset))
        .route("/api/result", get(download_result))
        .route("/api/result/original", get(download_original))
        .route("/api/time-travel/:era", get(download_era))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn image_response(image: &ImageData, disposition: &str, filename: &str) -> Response {
    let filename = filename.replace('"', "_");
    (
        [
            (header::CONTENT_TYPE, image.mime_type.clone()),
            (header::CONTENT_DISPOSITION, format!("{disposition}; filename=\"{filename}\"")),
        ],
        image.bytes.clone(),
    )
        .into_response()
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    state.view()
}

pub async fn select_mode(
    State(state): State<AppState>,
    payload: Result<Json<ModeRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let request = body(payload)?;
    tracing::info!("🧰 Mode selected: {}", request.mode);
    {
        let mut session = state.session.write();
        *session = session.with_mode(request.mode);
    }
    Ok(state.view())
}

pub async fn upload(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let request = body(payload)?;
    if state.session.read().mode.is_none() {
        return Err(AppError::BadRequest("Choose a tool before uploading a photo.".into()));
    }

    let pending = match SourceImage::load(request.filename, request.mime_type, request.data) {
        Ok(source) => state.orchestrator.accept_upload(&mut state.session.write(), source)?,
        Err(err) => {
            state.session.write().fail(err);
            None
        }
    };
    state.run(pending).await;
    Ok(state.view())
}

pub async fn get_mask(State(state): State<AppState>) -> Result<Response, AppError> {
    let pixels = {
        let session = state.session.read();
        let mask = session.mask.as_ref().ok_or_else(|| AppError::NotFound("No mask in progress.".into()))?;
        mask.surface().pixels().clone()
    };
    let png = codec::encode_png(&DynamicImage::ImageRgba8(pixels))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

fn with_mask<F>(state: &AppState, apply: F) -> Result<Json<SessionView>, AppError>
where
    F: FnOnce(&mut crate::mask::MaskEditor) -> Result<(), AppError>,
{
    {
        let mut session = state.session.write();
        let mask = session.mask.as_mut().ok_or_else(|| AppError::BadRequest("No mask in progress.".into()))?;
        apply(mask)?;
    }
    Ok(state.view())
}

pub async fn mask_events(
    State(state): State<AppState>,
    payload: Result<Json<MaskEventsRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let request = body(payload)?;
    with_mask(&state, |mask| request.events.iter().try_for_each(|event| mask.handle(event)))
}

pub async fn mask_brush(
    State(state): State<AppState>,
    payload: Result<Json<BrushRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let request = body(payload)?;
    with_mask(&state, |mask| {
        mask.set_brush_size(request.size);
        Ok(())
    })
}

pub async fn mask_undo(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    with_mask(&state, |mask| {
        mask.undo();
        Ok(())
    })
}

pub async fn mask_clear(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    with_mask(&state, |mask| mask.clear())
}

pub async fn select_style(
    State(state): State<AppState>,
    payload: Result<Json<StyleRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let request = body(payload)?;
    state.orchestrator.select_style(&mut state.session.write(), &request.style);
    Ok(state.view())
}

pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let request = body(payload)?;
    let pending = state.orchestrator.submit(&mut state.session.write(), request)?;
    state.run(pending).await;
    Ok(state.view())
}

pub async fn move_slider(
    State(state): State<AppState>,
    payload: Result<Json<SliderRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let request = body(payload)?;
    {
        let mut session = state.session.write();
        let view = session
            .presentation
            .as_mut()
            .and_then(|p| p.view_mut())
            .ok_or_else(|| AppError::BadRequest("Nothing to compare yet.".into()))?;
        view.set_position(request.value);
    }
    Ok(state.view())
}

pub async fn reveal_complete(State(state): State<AppState>) -> Json<SessionView> {
    if let Some(view) = state.session.write().presentation.as_mut().and_then(|p| p.view_mut()) {
        view.finish_reveal();
    }
    state.view()
}

pub async fn acknowledge_notice(State(state): State<AppState>) -> Json<SessionView> {
    state.session.write().acknowledge_notice();
    state.view()
}

pub async fn reset(State(state): State<AppState>) -> Json<SessionView> {
    {
        let mut session = state.session.write();
        *session = session.reset();
    }
    tracing::info!("🔄 Session reset");
    state.view()
}

pub async fn download_result(State(state): State<AppState>) -> Result<Response, AppError> {
    let session = state.session.read();
    let stem = session.source_stem();
    let (filename, image) = session
        .presentation
        .as_ref()
        .and_then(|p| p.download(&stem))
        .ok_or_else(|| AppError::NotFound("No result to download.".into()))?;
    Ok(image_response(image, "attachment", &filename))
}

pub async fn download_original(State(state): State<AppState>) -> Result<Response, AppError> {
    let session = state.session.read();
    let image = session
        .presentation
        .as_ref()
        .and_then(|p| p.original())
        .ok_or_else(|| AppError::NotFound("No original to show.".into()))?;
    let filename = session.source.as_ref().map(|s| s.filename.clone()).unwrap_or_else(|| "original".into());
    Ok(image_response(image, "inline", &filename))
}

pub async fn download_era(Path(era): Path<String>, State(state): State<AppState>) -> Result<Response, AppError> {
    let era = Era::parse(&era).ok_or_else(|| AppError::NotFound(format!("Unknown era: {era}")))?;
    let session = state.session.read();
    let image = session
        .presentation
        .as_ref()
        .and_then(|p| p.era(era))
        .ok_or_else(|| AppError::NotFound("No time travel result for that era.".into()))?;
    Ok(image_response(image, "attachment", &era_filename(&session.source_stem(), era, image)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::ScriptedService;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use base64::Engine;
    use image::{ImageFormat, RgbImage};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::io::Cursor;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<ScriptedService>) {
        let service = Arc::new(ScriptedService::returning_png());
        let state = AppState::new(Orchestrator::new(service.clone(), 2048));
        (router(state), service)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Response) {
        let request = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, response) = call(app, Method::POST, uri, Some(body)).await;
        (status, json_body(response).await)
    }

    fn upload_body(filename: &str, width: u32, height: u32) -> Value {
        let mut png = Vec::new();
        RgbImage::new(width, height).write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        json!({
            "filename": filename,
            "mime_type": "image/png",
            "data": base64::engine::general_purpose::STANDARD.encode(png),
        })
    }

    #[tokio::test]
    async fn colorize_upload_runs_and_offers_download() {
        let (app, service) = app();
        post(&app, "/api/mode", json!({ "mode": "colorize" })).await;
        let (status, view) = post(&app, "/api/upload", upload_body("grandma.png", 40, 30)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["screen"], "result");
        assert_eq!(view["comparison"]["slider_hidden"], true);
        assert_eq!(service.calls().len(), 1);

        let (_, view) = post(&app, "/api/slider", json!({ "value": 10 })).await;
        assert_eq!(view["comparison"]["position"], 50.0);
        post(&app, "/api/reveal/complete", json!({})).await;
        let (_, view) = post(&app, "/api/slider", json!({ "value": 10 })).await;
        assert_eq!(view["comparison"]["clip_path"], "inset(0 90% 0 0)");

        let (status, response) = call(&app, Method::GET, "/api/result", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"grandma_edited.png\""
        );
    }

    #[tokio::test]
    async fn undecodable_upload_becomes_a_notice() {
        let (app, service) = app();
        post(&app, "/api/mode", json!({ "mode": "remove-people" })).await;
        let body = json!({
            "filename": "notes.txt",
            "mime_type": "text/plain",
            "data": base64::engine::general_purpose::STANDARD.encode("hello"),
        });
        let (status, view) = post(&app, "/api/upload", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["screen"], "upload");
        assert!(view["notice"].is_string());
        assert!(service.calls().is_empty());

        let (_, view) = post(&app, "/api/notice/ack", json!({})).await;
        assert_eq!(view["notice"], Value::Null);
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_with_json_error() {
        let (app, _) = app();
        let (status, error) = post(&app, "/api/mode", json!({ "mode": "sharpen" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "BAD_REQUEST");

        post(&app, "/api/mode", json!({ "mode": "colorize" })).await;
        let (status, error) =
            post(&app, "/api/upload", json!({ "filename": "a.png", "data": "%%% not base64 %%%" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "BAD_REQUEST");

        let (status, _) = call(&app, Method::GET, "/api/result", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_before_choosing_a_tool_is_rejected() {
        let (app, _) = app();
        let (status, error) = post(&app, "/api/upload", upload_body("a.png", 4, 4)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "Choose a tool before uploading a photo.");
    }

    #[tokio::test]
    async fn mask_strokes_undo_and_submit() {
        let (app, service) = app();
        post(&app, "/api/mode", json!({ "mode": "remove-object" })).await;
        let (_, view) = post(&app, "/api/upload", upload_body("street.png", 20, 10)).await;
        assert_eq!(view["screen"], "masking");

        let stroke = |kind: &str, x: f32| json!({ "kind": kind, "x": x, "y": 5.0, "display_width": 40.0, "display_height": 20.0 });
        let events = json!({ "events": [stroke("down", 2.0), stroke("move", 30.0), stroke("up", 30.0)] });
        let (_, view) = post(&app, "/api/mask/events", events).await;
        assert_eq!(view["mask"]["history"], 1);
        assert_eq!(view["mask"]["stroking"], false);

        let (status, response) = call(&app, Method::GET, "/api/mask", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let png = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mask = image::load_from_memory(&png).unwrap();
        assert_eq!((mask.width(), mask.height()), (20, 10));

        let (_, view) = post(&app, "/api/mask/undo", json!({})).await;
        assert_eq!(view["mask"]["history"], 0);

        let (_, view) = post(&app, "/api/submit", json!({})).await;
        assert_eq!(view["screen"], "result");
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_description_keeps_user_on_capture_screen() {
        let (app, service) = app();
        post(&app, "/api/mode", json!({ "mode": "edit-clothing" })).await;
        post(&app, "/api/upload", upload_body("me.png", 8, 8)).await;
        let (status, view) = post(&app, "/api/submit", json!({ "prompt": "" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["screen"], "clothing");
        assert_eq!(view["notice"], "Please describe the clothing change you want to make.");
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn time_travel_downloads_are_named_per_era() {
        let (app, _) = app();
        post(&app, "/api/mode", json!({ "mode": "time-travel" })).await;
        let (_, view) = post(&app, "/api/upload", upload_body("family.png", 8, 8)).await;
        assert_eq!(view["screen"], "time-travel");
        assert_eq!(view["eras"], json!(["1920s", "1980s", "modern"]));

        let (status, response) = call(&app, Method::GET, "/api/time-travel/1980s", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"family_1980s.png\""
        );
        let (status, _) = call(&app, Method::GET, "/api/time-travel/1600s", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generation_and_reset() {
        let (app, _) = app();
        let (_, view) = post(&app, "/api/mode", json!({ "mode": "generate-image" })).await;
        assert_eq!(view["screen"], "generation");

        let (_, view) = post(&app, "/api/submit", json!({ "prompt": "a red fox", "aspect_ratio": "16:9", "quality": "high" })).await;
        assert_eq!(view["screen"], "result");
        assert_eq!(view["comparison"]["clip_path"], "inset(0 0 0 0)");
        assert_eq!(view["download"], "a_red_fox_generated.jpg");

        let (status, _) = call(&app, Method::GET, "/api/result/original", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, view) = post(&app, "/api/reset", json!({})).await;
        assert_eq!(view["screen"], "upload");
        assert_eq!(view["mode"], Value::Null);
        assert_eq!(view["aspect_ratio"], "1:1");
        assert_eq!(view["quality"], "standard");
    }
}

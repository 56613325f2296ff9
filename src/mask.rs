//! Freehand red-scribble masking for object removal.
//!
//! The surface always has the source image's natural resolution. Pointer
//! positions arrive in on-screen element space and are rescaled per axis by
//! `surface / displayed` before anything is drawn.

use std::collections::VecDeque;

use image::{imageops, imageops::FilterType, DynamicImage, Pixel, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec;
use crate::error::AppError;
use crate::models::{EncodedPayload, SourceImage};

/// rgba(255, 0, 0, 0.7)
pub const MASK_COLOR: Rgba<u8> = Rgba([255, 0, 0, 179]);
pub const HISTORY_CAPACITY: usize = 20;
pub const DEFAULT_BRUSH_SIZE: f32 = 30.0;
pub const MIN_BRUSH_SIZE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// On-screen size of the element the pointer events refer to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Leave,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub display_width: f32,
    #[serde(default)]
    pub display_height: f32,
}

impl PointerEvent {
    fn position(&self) -> (Point, DisplaySize) {
        (
            Point::new(self.x, self.y),
            DisplaySize { width: self.display_width, height: self.display_height },
        )
    }
}

/// Pixel buffer the strokes are painted into. Starts fully transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSurface {
    pixels: RgbaImage,
}

impl MaskSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { pixels: RgbaImage::new(width, height) }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    pub fn clear(&mut self) {
        self.pixels.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }

    /// Paints a round-capped line from `from` to `to`. Every covered pixel is
    /// composited once, so overlapping segments build up like a canvas stroke.
    pub fn stroke_segment(&mut self, from: Point, to: Point, width: f32, color: Rgba<u8>) {
        let radius = width / 2.0;
        let (w, h) = (self.pixels.width() as f32, self.pixels.height() as f32);

        let min_x = (from.x.min(to.x) - radius).floor().max(0.0);
        let min_y = (from.y.min(to.y) - radius).floor().max(0.0);
        let max_x = (from.x.max(to.x) + radius).ceil().min(w);
        let max_y = (from.y.max(to.y) + radius).ceil().min(h);
        if min_x >= max_x || min_y >= max_y {
            return;
        }

        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let length_sq = dx * dx + dy * dy;

        for py in min_y as u32..max_y as u32 {
            for px in min_x as u32..max_x as u32 {
                let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                let t = if length_sq > 0.0 {
                    (((cx - from.x) * dx + (cy - from.y) * dy) / length_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let (nx, ny) = (from.x + t * dx - cx, from.y + t * dy - cy);
                if nx * nx + ny * ny <= radius * radius {
                    self.pixels.get_pixel_mut(px, py).blend(&color);
                }
            }
        }
    }
}

/// Bounded stack of surface snapshots; the oldest is dropped first.
#[derive(Debug, Clone)]
pub struct MaskHistory {
    snapshots: VecDeque<MaskSurface>,
    capacity: usize,
}

impl Default for MaskHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl MaskHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { snapshots: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, snapshot: MaskSurface) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<MaskSurface> {
        self.snapshots.pop_back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StrokeState {
    Idle,
    Stroking { last: Point },
}

#[derive(Debug, Clone)]
pub struct MaskEditor {
    surface: MaskSurface,
    history: MaskHistory,
    state: StrokeState,
    brush_size: f32,
}

impl MaskEditor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: MaskSurface::new(width, height),
            history: MaskHistory::default(),
            state: StrokeState::Idle,
            brush_size: DEFAULT_BRUSH_SIZE,
        }
    }

    pub fn for_source(source: &SourceImage) -> Self {
        Self::new(source.width, source.height)
    }

    pub fn surface(&self) -> &MaskSurface {
        &self.surface
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_stroking(&self) -> bool {
        matches!(self.state, StrokeState::Stroking { .. })
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = if size.is_finite() { size.max(MIN_BRUSH_SIZE) } else { DEFAULT_BRUSH_SIZE };
    }

    /// Maps an element-space point into surface pixels.
    pub fn map_to_surface(&self, point: Point, display: DisplaySize) -> Result<Point, AppError> {
        if !(display.width > 0.0 && display.height > 0.0) {
            return Err(AppError::BadRequest("display size must be positive".into()));
        }
        let scale_x = self.surface.width() as f32 / display.width;
        let scale_y = self.surface.height() as f32 / display.height;
        Ok(Point::new(point.x * scale_x, point.y * scale_y))
    }

    pub fn pointer_down(&mut self, point: Point, display: DisplaySize) -> Result<(), AppError> {
        let start = self.map_to_surface(point, display)?;
        self.history.push(self.surface.clone());
        self.state = StrokeState::Stroking { last: start };
        Ok(())
    }

    pub fn pointer_move(&mut self, point: Point, display: DisplaySize) -> Result<(), AppError> {
        let StrokeState::Stroking { last } = self.state else {
            return Ok(());
        };
        let next = self.map_to_surface(point, display)?;
        self.surface.stroke_segment(last, next, self.brush_size, MASK_COLOR);
        self.state = StrokeState::Stroking { last: next };
        Ok(())
    }

    pub fn pointer_up(&mut self) {
        self.state = StrokeState::Idle;
    }

    pub fn handle(&mut self, event: &PointerEvent) -> Result<(), AppError> {
        let (point, display) = event.position();
        match event.kind {
            PointerKind::Down => self.pointer_down(point, display),
            PointerKind::Move => self.pointer_move(point, display),
            PointerKind::Up | PointerKind::Leave => {
                self.pointer_up();
                Ok(())
            }
        }
    }

    pub fn clear(&mut self) -> Result<(), AppError> {
        if self.is_stroking() {
            return Err(AppError::BadRequest("Finish the current stroke before clearing the mask.".into()));
        }
        self.history.push(self.surface.clone());
        self.surface.clear();
        Ok(())
    }

    /// Restores the latest snapshot. With nothing left to restore the surface
    /// is wiped instead.
    pub fn undo(&mut self) {
        match self.history.pop() {
            Some(snapshot) => self.surface = snapshot,
            None => {
                debug!("mask history empty, clearing surface");
                self.surface.clear();
            }
        }
    }
}

/// Composites the mask over the source at natural resolution, downsizes with
/// the codec rule and encodes as PNG whatever the source format was.
pub fn flatten_blocking(source: &SourceImage, mask: &MaskSurface, max_dimension: u32) -> Result<EncodedPayload, AppError> {
    if (mask.width(), mask.height()) != (source.width, source.height) {
        return Err(AppError::Validation(format!(
            "mask is {}x{} but the image is {}x{}",
            mask.width(),
            mask.height(),
            source.width,
            source.height
        )));
    }

    let mut base = codec::decode(&source.bytes)?.to_rgba8();
    imageops::overlay(&mut base, mask.pixels(), 0, 0);

    let (target_w, target_h) = codec::target_dimensions(source.width, source.height, max_dimension);
    let flattened = if (target_w, target_h) == (source.width, source.height) {
        base
    } else {
        imageops::resize(&base, target_w, target_h, FilterType::Triangle)
    };

    let png = codec::encode_png(&DynamicImage::ImageRgba8(flattened))?;
    Ok(EncodedPayload::from_bytes(&png, "image/png"))
}

pub async fn flatten(source: SourceImage, mask: MaskSurface, max_dimension: u32) -> Result<EncodedPayload, AppError> {
    tokio::task::spawn_blocking(move || flatten_blocking(&source, &mask, max_dimension))
        .await
        .map_err(|e| AppError::Decode(format!("mask task failed: {e}")))?
}

//! Document rasterisation: render page 1 of a PDF to a PNG [`RasterImage`].
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the PDFium C++ library, whose calls are CPU-bound
//! and synchronous. Parsing, rendering and PNG encoding all run inside one
//! `spawn_blocking` task so Tokio worker threads never stall.
//!
//! ## Why a fixed scale instead of a pixel cap?
//!
//! Resumes are almost always Letter or A4. A fixed 4× scale turns a Letter
//! page (612×792 pt) into 2448×3168 px, sharp enough for OCR of 8 pt fonts,
//! and keeps output dimensions a pure function of the page size.

use crate::engine::{acquire_engine, EngineOptions, RasterEngine};
use crate::error::RasterError;
use crate::model::RasterImage;
use crate::pipeline::encode::encode_png;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default render scale applied to the page's point size.
pub const RENDER_SCALE: f32 = 4.0;

/// Exclusive bound: `PdfRenderConfig::set_target_size` takes `i32`, and
/// `i32::MAX as f32` rounds up to 2^31.
const MAX_TARGET_PX: f32 = i32::MAX as f32;

/// Pixel size of the rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Page size in points times `scale`, truncated to whole pixels.
    ///
    /// Zero-sized, non-finite, or results beyond the renderer's `i32`
    /// target size are rejected.
    pub fn for_page(width_pt: f32, height_pt: f32, scale: f32) -> Result<Self, RasterError> {
        let w = (width_pt * scale).floor();
        let h = (height_pt * scale).floor();
        let in_range = |px: f32| px.is_finite() && (1.0..MAX_TARGET_PX).contains(&px);
        if !(in_range(w) && in_range(h)) {
            return Err(RasterError::InvalidViewport {
                width: width_pt,
                height: height_pt,
                scale,
            });
        }
        Ok(Self {
            width: w as u32,
            height: h as u32,
        })
    }
}

/// Converts a document to an image of its first page.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, document: &[u8]) -> Result<RasterImage, RasterError>;
}

/// [`Rasterizer`] backed by the shared PDFium engine.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    options: EngineOptions,
    scale: f32,
}

impl PdfiumRasterizer {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            scale: RENDER_SCALE,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, document: &[u8]) -> Result<RasterImage, RasterError> {
        let engine = acquire_engine(&self.options).await?;
        let bytes = document.to_vec();
        let scale = self.scale;

        tokio::task::spawn_blocking(move || render_first_page(&engine, &bytes, scale))
            .await
            .map_err(|e| RasterError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Blocking implementation: parse, render page 1, encode.
fn render_first_page(
    engine: &Arc<RasterEngine>,
    bytes: &[u8],
    scale: f32,
) -> Result<RasterImage, RasterError> {
    let document = engine
        .pdfium()
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| RasterError::UnreadableDocument(format!("{:?}", e)))?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(RasterError::NoPages);
    }
    debug!("PDF loaded: {} pages, rendering page 1", pages.len());

    let page = pages
        .get(0)
        .map_err(|e| RasterError::RenderFailed(format!("{:?}", e)))?;

    let viewport = Viewport::for_page(page.width().value, page.height().value, scale)?;
    let render_config =
        PdfRenderConfig::new().set_target_size(viewport.width as i32, viewport.height as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| RasterError::RenderFailed(format!("{:?}", e)))?;
    let image = bitmap.as_image();

    if (image.width(), image.height()) != (viewport.width, viewport.height) {
        warn!(
            "Bitmap is {}x{} px, expected {}x{}",
            image.width(),
            image.height(),
            viewport.width,
            viewport.height
        );
    }

    let png = encode_png(&image)?;
    info!(
        "Rendered page 1 → {}x{} px, {} bytes PNG",
        image.width(),
        image.height(),
        png.len()
    );

    Ok(RasterImage::new(png, image.width(), image.height()))
}

//! PDF rasterisation: render every page to a PNG at a given scale.
//!
//! ## Why spawn_blocking?
//!
//! pdfium uses thread-local state internally and is not safe to call from
//! async contexts. [`Rasterizer::render_pages`] moves the whole render onto
//! tokio's blocking pool so worker threads never stall on CPU-heavy drawing.
//!
//! ## Surface lifetime
//!
//! Each page gets its own [`ScopedCanvas`], sized to the page's
//! [`Viewport`], which is released before the next page starts. Pages are
//! drawn strictly one after another.

use crate::error::Pdf2TextError;
use crate::output::DocumentInfo;
use crate::pipeline::canvas::{CanvasProvider, ScopedCanvas};
use crate::pipeline::encode;
use crate::pipeline::engine::{DocumentEngine, PageSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Intrinsic page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Pixel rectangle a page is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl Viewport {
    /// `size × scale`, floored, with each axis at least 1 px.
    pub fn new(size: PageSize, scale: f32) -> Self {
        Self {
            width: to_pixels(size.width * scale),
            height: to_pixels(size.height * scale),
            scale,
        }
    }
}

fn to_pixels(v: f32) -> u32 {
    // Float-to-int `as` saturates and maps NaN to 0.
    (v.floor() as u32).max(1)
}

/// One rasterised page.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed physical page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page_num", &self.page_num)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

impl PageImage {
    /// `data:image/png;base64,...` URL for the request body.
    pub fn data_url(&self) -> String {
        encode::data_url(encode::PNG_MIME, &self.png)
    }
}

/// Renders PDF documents page by page with injected engine and canvas.
#[derive(Clone)]
pub struct Rasterizer {
    engine: Arc<dyn DocumentEngine>,
    canvas: Arc<dyn CanvasProvider>,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer").finish_non_exhaustive()
    }
}

impl Rasterizer {
    pub fn new(engine: Arc<dyn DocumentEngine>, canvas: Arc<dyn CanvasProvider>) -> Self {
        Self { engine, canvas }
    }

    /// Render every page of `document` at `scale`.
    ///
    /// Returns an empty vector for a zero-page document; rejecting that is
    /// the caller's decision.
    pub fn render(&self, document: &[u8], scale: f32) -> Result<Vec<PageImage>, Pdf2TextError> {
        self.render_with_password(document, scale, None)
    }

    pub fn render_with_password(
        &self,
        document: &[u8],
        scale: f32,
        password: Option<&str>,
    ) -> Result<Vec<PageImage>, Pdf2TextError> {
        let canvas = self.canvas.as_ref();
        let mut images = Vec::new();

        self.engine.with_document(document, password, &mut |pages| {
            images = render_all(pages, canvas, scale)?;
            Ok(())
        })?;

        Ok(images)
    }

    /// [`Self::render_with_password`] on tokio's blocking pool.
    pub async fn render_pages(
        &self,
        document: Vec<u8>,
        scale: f32,
        password: Option<String>,
    ) -> Result<Vec<PageImage>, Pdf2TextError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            this.render_with_password(&document, scale, password.as_deref())
        })
        .await
        .map_err(|e| Pdf2TextError::Internal(format!("Render task panicked: {}", e)))?
    }

    /// Page count and page sizes, without drawing anything.
    pub fn inspect(
        &self,
        document: &[u8],
        password: Option<&str>,
    ) -> Result<DocumentInfo, Pdf2TextError> {
        let mut info = DocumentInfo::default();
        self.engine.with_document(document, password, &mut |pages| {
            let count = pages.page_count();
            let sizes = (0..count)
                .map(|i| {
                    pages.page_size(i).map_err(|detail| Pdf2TextError::Render {
                        page: i + 1,
                        detail,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            info = DocumentInfo {
                page_count: count,
                pages: sizes,
            };
            Ok(())
        })?;
        Ok(info)
    }
}

fn render_all(
    pages: &dyn PageSource,
    canvas: &dyn CanvasProvider,
    scale: f32,
) -> Result<Vec<PageImage>, Pdf2TextError> {
    let total = pages.page_count();
    info!("PDF loaded: {} pages", total);

    let mut images = Vec::with_capacity(total);
    for index in 0..total {
        images.push(render_one(pages, canvas, index, scale)?);
    }
    Ok(images)
}

fn render_one(
    pages: &dyn PageSource,
    canvas: &dyn CanvasProvider,
    index: usize,
    scale: f32,
) -> Result<PageImage, Pdf2TextError> {
    let page_num = index + 1;
    let render_err = |detail: String| Pdf2TextError::Render {
        page: page_num,
        detail,
    };

    let size = pages.page_size(index).map_err(render_err)?;
    let viewport = Viewport::new(size, scale);

    let mut surface = ScopedCanvas::acquire(canvas, viewport.width, viewport.height)
        .map_err(|e| render_err(e.to_string()))?;
    pages.draw_page(index, &viewport, &mut surface).map_err(render_err)?;

    let png = surface
        .canvas()
        .to_png()
        .map_err(|e| render_err(format!("PNG encoding failed: {e}")))?;
    let (width, height) = (surface.canvas().width(), surface.canvas().height());
    drop(surface);

    debug!("Rendered page {} → {}x{} px, {} bytes", page_num, width, height, png.len());
    Ok(PageImage {
        page_num,
        width,
        height,
        png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_scales_and_floors() {
        let v = Viewport::new(
            PageSize {
                width: 612.0,
                height: 792.0,
            },
            1.6,
        );
        assert_eq!((v.width, v.height), (979, 1267));
    }

    #[test]
    fn viewport_never_collapses_to_zero() {
        for (w, h, s) in [
            (0.0, 0.0, 1.0),
            (0.4, 0.9, 1.0),
            (100.0, 100.0, 0.0),
            (-5.0, 10.0, 1.0),
            (f32::NAN, 10.0, 1.0),
        ] {
            let v = Viewport::new(PageSize { width: w, height: h }, s);
            assert!(v.width >= 1 && v.height >= 1, "{w}x{h}@{s} → {v:?}");
        }
    }

    #[test]
    fn identity_scale_maps_points_to_pixels() {
        let v = Viewport::new(
            PageSize {
                width: 200.0,
                height: 100.5,
            },
            1.0,
        );
        assert_eq!((v.width, v.height), (200, 100));
    }

    #[test]
    fn page_image_debug_omits_pixels() {
        let img = PageImage {
            page_num: 1,
            width: 2,
            height: 3,
            png: vec![0; 1000],
        };
        let dbg = format!("{img:?}");
        assert!(dbg.contains("png_bytes: 1000"));
    }
}

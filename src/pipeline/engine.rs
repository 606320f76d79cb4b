//! Document engines: open PDF bytes and draw pages onto a canvas.
//!
//! The rasteriser only needs three things from a PDF library: how many pages
//! there are, how big each one is, and "draw page N into this surface". Those
//! are the [`PageSource`] methods. [`DocumentEngine`] opens a document and
//! lends a `PageSource` to a visitor for as long as the document is open,
//! which lets engines whose documents borrow from the library handle (as
//! pdfium's do) keep that borrow entirely inside the call.
//!
//! [`PdfiumEngine`] is the production engine. It binds pdfium on each open,
//! exactly like the rest of the pipeline runs it inside `spawn_blocking`.

use crate::error::Pdf2TextError;
use crate::pipeline::canvas::ScopedCanvas;
use crate::pipeline::render::{PageSize, Viewport};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Pages of an open document.
pub trait PageSource {
    /// Number of pages, in physical order.
    fn page_count(&self) -> usize;

    /// Intrinsic size of page `index` (0-based) in PDF points.
    fn page_size(&self, index: usize) -> Result<PageSize, String>;

    /// Draw page `index` (0-based) so it fills `viewport` on `surface`.
    ///
    /// The surface arrives sized to the viewport. Engines that produce a
    /// raster of a different size may resize it with [`ScopedCanvas::reset`].
    fn draw_page(
        &self,
        index: usize,
        viewport: &Viewport,
        surface: &mut ScopedCanvas<'_>,
    ) -> Result<(), String>;
}

/// Opens PDF byte buffers.
pub trait DocumentEngine: Send + Sync {
    /// Open `bytes` and call `visit` with its pages.
    ///
    /// A malformed buffer must fail with [`Pdf2TextError::DocumentLoad`].
    /// Errors returned by `visit` are passed through unchanged.
    fn with_document(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        visit: &mut dyn FnMut(&dyn PageSource) -> Result<(), Pdf2TextError>,
    ) -> Result<(), Pdf2TextError>;
}

/// [`DocumentEngine`] backed by pdfium via `pdfium-render`.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Use `PDFIUM_LIB_PATH` when set, otherwise the working directory and
    /// then the system loader.
    pub fn from_env() -> Self {
        let library_path = std::env::var_os(PDFIUM_LIB_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { library_path }
    }

    /// Bind to an explicit library file, or a directory containing one.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, Pdf2TextError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(library_file(path)),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| Pdf2TextError::PdfiumBindingFailed(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }
}

fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl DocumentEngine for PdfiumEngine {
    fn with_document(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        visit: &mut dyn FnMut(&dyn PageSource) -> Result<(), Pdf2TextError>,
    ) -> Result<(), Pdf2TextError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| Pdf2TextError::DocumentLoad {
                detail: format!("{e:?}"),
            })?;

        visit(&PdfiumPages {
            document: &document,
        })
    }
}

struct PdfiumPages<'a, 'doc> {
    document: &'a PdfDocument<'doc>,
}

impl PdfiumPages<'_, '_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>, String> {
        let index = u16::try_from(index).map_err(|_| format!("page index {index} exceeds pdfium's limit"))?;
        self.document.pages().get(index).map_err(|e| format!("{e:?}"))
    }
}

impl PageSource for PdfiumPages<'_, '_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize, String> {
        let page = self.page(index)?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn draw_page(
        &self,
        index: usize,
        viewport: &Viewport,
        surface: &mut ScopedCanvas<'_>,
    ) -> Result<(), String> {
        let page = self.page(index)?;
        let config = PdfRenderConfig::new()
            .set_target_size(viewport.width as i32, viewport.height as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| format!("{e:?}"))?;
        let raster = bitmap.as_image().to_rgba8();

        if (raster.width(), raster.height()) != (surface.canvas().width(), surface.canvas().height()) {
            debug!(
                "Page {}: pdfium produced {}x{}, resizing surface",
                index + 1,
                raster.width(),
                raster.height()
            );
            surface
                .reset(raster.width(), raster.height())
                .map_err(|e| e.to_string())?;
        }

        surface.canvas_mut().context().draw_image(&raster, 0, 0);
        Ok(())
    }
}

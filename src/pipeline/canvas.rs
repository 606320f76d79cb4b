//! In-memory drawing surfaces for page rasterisation.
//!
//! A [`CanvasProvider`] hands out [`Canvas`]es: plain RGBA pixel buffers with
//! a small immediate-mode [`Context2d`]. There is no display and no GPU.
//!
//! [`ScopedCanvas`] ties a surface to a scope: it calls
//! [`CanvasProvider::destroy`] exactly once when dropped, including early
//! `?` returns and unwinding. The rasteriser
//! holds one at a time, so peak surface memory is one page regardless of
//! document length.

use crate::error::CanvasError;
use crate::pipeline::encode;
use image::{imageops, Rgba, RgbaImage};

/// Default pixel budget per surface: 64 Mpx (256 MB of RGBA).
pub const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Opaque white, the paper colour new surfaces are cleared to.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Creates, resizes and releases drawing surfaces.
pub trait CanvasProvider: Send + Sync {
    /// Allocate a surface. Dimensions below 1 are raised to 1.
    fn create(&self, width: u32, height: u32) -> Result<Canvas, CanvasError>;

    /// Resize `canvas` in place, discarding its contents.
    fn reset(&self, canvas: &mut Canvas, width: u32, height: u32) -> Result<(), CanvasError>;

    /// Release the surface. The canvas is consumed, so it cannot be reused.
    fn destroy(&self, canvas: Canvas);
}

/// An RGBA raster target.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    /// A white surface. Callers outside a provider should go through
    /// [`CanvasProvider::create`] so the budget applies.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, WHITE),
        }
    }

    /// Zero-sized stand-in; owns no pixel memory.
    fn released() -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
        }
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

    /// 2D drawing context for this surface.
    pub fn context(&mut self) -> Context2d<'_> {
        Context2d {
            pixels: &mut self.pixels,
        }
    }

    /// Lossless PNG encoding of the current contents.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        encode::encode_png(&self.pixels)
    }
}

/// Immediate-mode drawing operations. Everything is clipped to the surface.
pub struct Context2d<'a> {
    pixels: &'a mut RgbaImage,
}

impl Context2d<'_> {
    /// Fill the whole surface.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for p in self.pixels.pixels_mut() {
            *p = color;
        }
    }

    /// Fill an axis-aligned rectangle.
    pub fn fill_rect(&mut self, x: i64, y: i64, width: u32, height: u32, color: Rgba<u8>) {
        let (w, h) = (i64::from(self.pixels.width()), i64::from(self.pixels.height()));
        let x0 = x.clamp(0, w);
        let y0 = y.clamp(0, h);
        let x1 = (x + i64::from(width)).clamp(0, w);
        let y1 = (y + i64::from(height)).clamp(0, h);
        for py in y0..y1 {
            for px in x0..x1 {
                self.pixels.put_pixel(px as u32, py as u32, color);
            }
        }
    }

    /// Copy `image` onto the surface with its top-left corner at (`x`, `y`).
    pub fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) {
        imageops::replace(&mut *self.pixels, image, x, y);
    }
}

/// Heap-backed [`CanvasProvider`] with a per-surface pixel budget.
#[derive(Debug, Clone, Copy)]
pub struct SoftwareCanvasProvider {
    max_pixels: u64,
}

impl Default for SoftwareCanvasProvider {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl SoftwareCanvasProvider {
    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    fn check(&self, width: u32, height: u32) -> Result<(u32, u32), CanvasError> {
        let (width, height) = (width.max(1), height.max(1));
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(CanvasError::TooLarge {
                width,
                height,
                limit: self.max_pixels,
            });
        }
        Ok((width, height))
    }
}

impl CanvasProvider for SoftwareCanvasProvider {
    fn create(&self, width: u32, height: u32) -> Result<Canvas, CanvasError> {
        let (width, height) = self.check(width, height)?;
        Ok(Canvas::new(width, height))
    }

    fn reset(&self, canvas: &mut Canvas, width: u32, height: u32) -> Result<(), CanvasError> {
        let (width, height) = self.check(width, height)?;
        *canvas = Canvas::new(width, height);
        Ok(())
    }

    fn destroy(&self, canvas: Canvas) {
        drop(canvas);
    }
}

/// A surface borrowed from a provider for the length of one scope.
pub struct ScopedCanvas<'p> {
    provider: &'p dyn CanvasProvider,
    canvas: Canvas,
}

impl<'p> ScopedCanvas<'p> {
    pub fn acquire(
        provider: &'p dyn CanvasProvider,
        width: u32,
        height: u32,
    ) -> Result<Self, CanvasError> {
        let canvas = provider.create(width, height)?;
        Ok(Self { provider, canvas })
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    /// Resize through the owning provider.
    pub fn reset(&mut self, width: u32, height: u32) -> Result<(), CanvasError> {
        self.provider.reset(&mut self.canvas, width, height)
    }
}

impl Drop for ScopedCanvas<'_> {
    fn drop(&mut self) {
        let canvas = std::mem::replace(&mut self.canvas, Canvas::released());
        self.provider.destroy(canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        inner: SoftwareCanvasProvider,
        created: AtomicUsize,
        destroyed: AtomicUsize,
        resets: AtomicUsize,
    }

    impl CanvasProvider for Counting {
        fn create(&self, width: u32, height: u32) -> Result<Canvas, CanvasError> {
            let c = self.inner.create(width, height)?;
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(c)
        }
        fn reset(&self, canvas: &mut Canvas, width: u32, height: u32) -> Result<(), CanvasError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.inner.reset(canvas, width, height)
        }
        fn destroy(&self, canvas: Canvas) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            self.inner.destroy(canvas);
        }
    }

    #[test]
    fn create_clamps_zero_dimensions() {
        let c = SoftwareCanvasProvider::default().create(0, 0).unwrap();
        assert_eq!((c.width(), c.height()), (1, 1));
    }

    #[test]
    fn new_surface_is_white() {
        let c = SoftwareCanvasProvider::default().create(3, 2).unwrap();
        assert!(c.pixels().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn pixel_budget_is_enforced() {
        let p = SoftwareCanvasProvider::with_max_pixels(100);
        assert!(p.create(10, 10).is_ok());
        assert!(matches!(
            p.create(11, 10),
            Err(CanvasError::TooLarge { width: 11, height: 10, limit: 100 })
        ));
        let mut c = p.create(5, 5).unwrap();
        assert!(p.reset(&mut c, 20, 20).is_err());
    }

    #[test]
    fn reset_resizes_and_clears() {
        let p = SoftwareCanvasProvider::default();
        let mut c = p.create(4, 4).unwrap();
        c.context().fill(Rgba([0, 0, 0, 255]));
        p.reset(&mut c, 2, 3).unwrap();
        assert_eq!((c.width(), c.height()), (2, 3));
        assert!(c.pixels().pixels().all(|px| *px == WHITE));
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut c = SoftwareCanvasProvider::default().create(4, 4).unwrap();
        let red = Rgba([255, 0, 0, 255]);
        c.context().fill_rect(-2, 2, 4, 10, red);
        assert_eq!(*c.pixels().get_pixel(0, 2), red);
        assert_eq!(*c.pixels().get_pixel(1, 3), red);
        assert_eq!(*c.pixels().get_pixel(2, 2), WHITE);
        assert_eq!(*c.pixels().get_pixel(0, 1), WHITE);
    }

    #[test]
    fn draw_image_copies_pixels() {
        let mut c = SoftwareCanvasProvider::default().create(3, 3).unwrap();
        let blue = Rgba([0, 0, 255, 255]);
        let src = RgbaImage::from_pixel(2, 2, blue);
        c.context().draw_image(&src, 1, 1);
        assert_eq!(*c.pixels().get_pixel(2, 2), blue);
        assert_eq!(*c.pixels().get_pixel(0, 0), WHITE);
    }

    #[test]
    fn png_round_trips_dimensions() {
        let c = SoftwareCanvasProvider::default().create(7, 5).unwrap();
        let png = c.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 5));
    }

    #[test]
    fn scoped_canvas_destroys_on_drop() {
        let p = Counting::default();
        {
            let mut s = ScopedCanvas::acquire(&p, 2, 2).unwrap();
            s.reset(3, 3).unwrap();
            assert_eq!(s.canvas().width(), 3);
        }
        assert_eq!(p.created.load(Ordering::SeqCst), 1);
        assert_eq!(p.resets.load(Ordering::SeqCst), 1);
        assert_eq!(p.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_canvas_destroys_on_early_return() {
        fn fails(p: &dyn CanvasProvider) -> Result<(), CanvasError> {
            let mut s = ScopedCanvas::acquire(p, 2, 2)?;
            s.reset(u32::MAX, u32::MAX)?;
            Ok(())
        }
        let p = Counting::default();
        assert!(fails(&p).is_err());
        assert_eq!(p.created.load(Ordering::SeqCst), 1);
        assert_eq!(p.destroyed.load(Ordering::SeqCst), 1);
    }
}

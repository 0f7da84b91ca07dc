use crate::assets::LayerImage;
use crate::foundation::core::Canvas;
use crate::foundation::error::{VoisyncError, VoisyncResult};
use crate::foundation::math::unpremultiply_rgba8_in_place;
use crate::layer::composite::{flatten_premul_over_bg, over};

/// A drawing primitive failed for one image.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DrawError(pub String);

/// Immediate-mode 2D drawing state of a surface.
///
/// Global alpha is sticky state: callers that change it restore it afterwards.
pub trait DrawContext {
    /// Reset every pixel to transparent.
    fn clear(&mut self);
    fn global_alpha(&self) -> f32;
    fn set_global_alpha(&mut self, alpha: f32);
    /// Draw `image` unscaled with its top-left corner at `(x, y)`.
    fn draw_image(&mut self, image: &LayerImage, x: f64, y: f64) -> Result<(), DrawError>;
}

/// A render target that can hand out a drawing context.
pub trait Surface {
    fn canvas(&self) -> Canvas;
    /// Fails when the surface cannot be drawn on at all.
    fn context(&mut self) -> VoisyncResult<&mut dyn DrawContext>;
}

/// CPU raster surface holding premultiplied RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct PixelSurface {
    canvas: Canvas,
    data: Vec<u8>,
    global_alpha: f32,
}

impl PixelSurface {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            data: vec![0; canvas.byte_len()],
            global_alpha: 1.0,
        }
    }

    /// Premultiplied RGBA8 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.canvas.width || y >= self.canvas.height {
            return None;
        }
        let i = (y as usize * self.canvas.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Straight-alpha copy of the surface.
    pub fn to_rgba_image(&self) -> VoisyncResult<image::RgbaImage> {
        let mut straight = self.data.clone();
        unpremultiply_rgba8_in_place(&mut straight);
        image::RgbaImage::from_raw(self.canvas.width, self.canvas.height, straight)
            .ok_or_else(|| VoisyncError::render("surface buffer does not match its canvas"))
    }

    /// Opaque copy of the surface composited over `bg_rgba`.
    pub fn flatten_over(&self, bg_rgba: [u8; 4]) -> VoisyncResult<image::RgbaImage> {
        let mut out = vec![0u8; self.data.len()];
        flatten_premul_over_bg(&mut out, &self.data, bg_rgba)?;
        image::RgbaImage::from_raw(self.canvas.width, self.canvas.height, out)
            .ok_or_else(|| VoisyncError::render("surface buffer does not match its canvas"))
    }
}

impl Surface for PixelSurface {
    fn canvas(&self) -> Canvas {
        self.canvas
    }

    fn context(&mut self) -> VoisyncResult<&mut dyn DrawContext> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(VoisyncError::render(format!(
                "cannot draw on a {}x{} surface",
                self.canvas.width, self.canvas.height
            )));
        }
        Ok(self)
    }
}

impl DrawContext for PixelSurface {
    fn clear(&mut self) {
        self.data.fill(0);
    }

    fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() {
            self.global_alpha = alpha.clamp(0.0, 1.0);
        }
    }

    fn draw_image(&mut self, image: &LayerImage, x: f64, y: f64) -> Result<(), DrawError> {
        if !image.is_well_formed() {
            return Err(DrawError(format!(
                "image buffer of {} bytes does not match {}x{}",
                image.rgba8_premul.len(),
                image.width,
                image.height
            )));
        }
        if !x.is_finite() || !y.is_finite() {
            return Err(DrawError(format!("non-finite draw position ({x}, {y})")));
        }

        let ox = x.round() as i64;
        let oy = y.round() as i64;
        let cw = i64::from(self.canvas.width);
        let ch = i64::from(self.canvas.height);
        let iw = i64::from(image.width);
        let ih = i64::from(image.height);

        let x0 = ox.max(0);
        let y0 = oy.max(0);
        let x1 = (ox + iw).min(cw);
        let y1 = (oy + ih).min(ch);
        if x0 >= x1 || y0 >= y1 {
            return Ok(());
        }

        let alpha = self.global_alpha;
        let src = image.rgba8_premul.as_slice();
        for dy in y0..y1 {
            let sy = dy - oy;
            for dx in x0..x1 {
                let sx = dx - ox;
                let si = ((sy * iw + sx) * 4) as usize;
                let di = ((dy * cw + dx) * 4) as usize;
                let d = [
                    self.data[di],
                    self.data[di + 1],
                    self.data[di + 2],
                    self.data[di + 3],
                ];
                let s = [src[si], src[si + 1], src[si + 2], src[si + 3]];
                self.data[di..di + 4].copy_from_slice(&over(d, s, alpha));
            }
        }
        Ok(())
    }
}

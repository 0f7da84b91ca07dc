use std::io::Cursor;
use std::str::FromStr;

use anyhow::Context as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::animation::controller::{AnimationController, find_frame};
use crate::foundation::core::{Canvas, Fps, Size, letterbox};
use crate::foundation::error::{VoisyncError, VoisyncResult};
use crate::layer::renderer::MouthBlend;
use crate::layer::surface::PixelSurface;

/// Still-image encoding of exported frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    #[default]
    Png,
    Jpeg,
    /// Lossless; quality is ignored.
    Webp,
}

impl FrameFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        })
    }
}

impl FromStr for FrameFormat {
    type Err = VoisyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(VoisyncError::validation(format!(
                "unknown frame format '{other}' (expected png, jpeg or webp)"
            ))),
        }
    }
}

/// Source region of the canvas, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for CropRect {
    type Err = VoisyncError;

    /// Parses `X,Y,W,H`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VoisyncError::validation(format!("invalid crop '{s}': {e}")))?;
        let [x, y, width, height] = parts[..] else {
            return Err(VoisyncError::validation(format!(
                "invalid crop '{s}': expected X,Y,W,H"
            )));
        };
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
    pub fps: Fps,
    pub format: FrameFormat,
    /// JPEG quality in `(0, 1]`.
    pub quality: f32,
    /// Defaults to the whole canvas.
    pub crop: Option<CropRect>,
    /// Defaults to the crop size.
    pub output_size: Option<Canvas>,
    /// Fill behind the letterboxed frame.
    pub background: [u8; 4],
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            format: FrameFormat::Png,
            quality: 1.0,
            crop: None,
            output_size: None,
            background: [0, 0, 0, 255],
        }
    }
}

/// One encoded still.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportedFrame {
    pub time: f64,
    pub duration: f64,
    pub format: FrameFormat,
    pub data: Vec<u8>,
}

/// Crop and scale settings resolved against a concrete canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FrameLayout {
    crop: CropRect,
    output: Canvas,
    dest_x: i64,
    dest_y: i64,
    dest_w: u32,
    dest_h: u32,
}

impl FrameLayout {
    fn resolve(canvas: Canvas, opts: &ExportOptions) -> VoisyncResult<Self> {
        let crop = opts.crop.unwrap_or(CropRect {
            x: 0,
            y: 0,
            width: canvas.width,
            height: canvas.height,
        });
        if crop.width == 0 || crop.height == 0 {
            return Err(VoisyncError::validation("export crop must be non-empty"));
        }
        if u64::from(crop.x) + u64::from(crop.width) > u64::from(canvas.width)
            || u64::from(crop.y) + u64::from(crop.height) > u64::from(canvas.height)
        {
            return Err(VoisyncError::validation(format!(
                "export crop {}x{}+{}+{} exceeds the {}x{} canvas",
                crop.width, crop.height, crop.x, crop.y, canvas.width, canvas.height
            )));
        }

        let output = opts.output_size.unwrap_or(Canvas {
            width: crop.width,
            height: crop.height,
        });
        if output.width == 0 || output.height == 0 {
            return Err(VoisyncError::validation("export output size must be non-zero"));
        }

        let dest = letterbox(
            Size::new(f64::from(crop.width), f64::from(crop.height)),
            output.size(),
        );
        Ok(Self {
            crop,
            output,
            dest_x: dest.x0.round() as i64,
            dest_y: dest.y0.round() as i64,
            dest_w: (dest.width().round() as u32).clamp(1, output.width),
            dest_h: (dest.height().round() as u32).clamp(1, output.height),
        })
    }

    fn compose(&self, straight: &RgbaImage, background: [u8; 4]) -> RgbaImage {
        let c = self.crop;
        let mut region = imageops::crop_imm(straight, c.x, c.y, c.width, c.height).to_image();
        if (self.dest_w, self.dest_h) != (c.width, c.height) {
            region = imageops::resize(&region, self.dest_w, self.dest_h, FilterType::Triangle);
        }
        let mut out = RgbaImage::from_pixel(self.output.width, self.output.height, Rgba(background));
        imageops::overlay(&mut out, &region, self.dest_x, self.dest_y);
        out
    }
}

fn encode_still(img: RgbaImage, format: FrameFormat, quality: f32) -> VoisyncResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        FrameFormat::Png => DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .context("encode png frame")?,
        FrameFormat::Webp => DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)
            .context("encode webp frame")?,
        FrameFormat::Jpeg => {
            let q = if quality.is_finite() {
                (quality * 100.0).round().clamp(1.0, 100.0) as u8
            } else {
                100
            };
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, q))
                .context("encode jpeg frame")?;
        }
    }
    Ok(buf)
}

impl AnimationController {
    /// Render the whole utterance at fixed `1 / fps` steps into encoded stills.
    ///
    /// Each sample shows its frame's mouth shape alone; live cross-fades are not reproduced.
    /// A sample that renders with errors is logged and left out. `on_progress` receives
    /// `(processed, total)` after every sample.
    #[tracing::instrument(
        level = "info",
        skip(self, base_layers, opts, on_progress),
        fields(fps = opts.fps.as_f64(), format = ?opts.format)
    )]
    pub fn export_frames(
        &self,
        base_layers: &[impl AsRef<str>],
        opts: &ExportOptions,
        mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> VoisyncResult<Vec<ExportedFrame>> {
        let renderer = self.renderer();
        let frames = self.frames();
        let total = self.total_duration();
        let step = opts.fps.frame_duration_secs();
        let total_frames = opts.fps.secs_to_frames_ceil(total) as usize;

        let layout = FrameLayout::resolve(renderer.canvas(), opts)?;
        let mut surface = PixelSurface::new(renderer.canvas());
        tracing::info!(
            total_frames,
            width = layout.output.width,
            height = layout.output.height,
            "export started"
        );

        let mut out = Vec::with_capacity(total_frames);
        let mut hint = None;
        for i in 0..total_frames {
            let time = i as f64 * f64::from(opts.fps.den) / f64::from(opts.fps.num);

            let found = find_frame(frames, time, hint);
            if let Some(idx) = found {
                hint = Some(idx);
                let shapes = [MouthBlend::solid(frames[idx].mouth)];
                let result = renderer.render_with_mouth_shapes(&mut surface, base_layers, &shapes)?;
                if result.success {
                    let composed = layout.compose(&surface.to_rgba_image()?, opts.background);
                    out.push(ExportedFrame {
                        time,
                        duration: step,
                        format: opts.format,
                        data: encode_still(composed, opts.format, opts.quality)?,
                    });
                } else {
                    tracing::warn!(time, errors = ?result.errors, "export frame skipped");
                }
            }

            if let Some(cb) = on_progress.as_mut() {
                cb(i + 1, total_frames);
            }
        }

        tracing::info!(exported = out.len(), "export finished");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(w: u32, h: u32) -> Canvas {
        Canvas {
            width: w,
            height: h,
        }
    }

    #[test]
    fn parse_format_and_crop() {
        assert_eq!("PNG".parse::<FrameFormat>().unwrap(), FrameFormat::Png);
        assert_eq!("jpg".parse::<FrameFormat>().unwrap(), FrameFormat::Jpeg);
        assert!("gif".parse::<FrameFormat>().is_err());

        let c: CropRect = "1, 2,30,40".parse().unwrap();
        assert_eq!((c.x, c.y, c.width, c.height), (1, 2, 30, 40));
        assert!("1,2,3".parse::<CropRect>().is_err());
        assert!("a,b,c,d".parse::<CropRect>().is_err());
    }

    #[test]
    fn layout_letterboxes_wide_source() {
        let opts = ExportOptions {
            output_size: Some(canvas(100, 100)),
            ..ExportOptions::default()
        };
        let l = FrameLayout::resolve(canvas(200, 100), &opts).unwrap();
        assert_eq!((l.dest_w, l.dest_h), (100, 50));
        assert_eq!((l.dest_x, l.dest_y), (0, 25));
    }

    #[test]
    fn layout_rejects_out_of_canvas_crop() {
        let opts = ExportOptions {
            crop: Some(CropRect {
                x: 5,
                y: 0,
                width: 10,
                height: 10,
            }),
            ..ExportOptions::default()
        };
        assert!(FrameLayout::resolve(canvas(10, 10), &opts).is_err());
    }

    #[test]
    fn compose_fills_background_outside_letterbox() {
        let opts = ExportOptions {
            output_size: Some(canvas(2, 4)),
            ..ExportOptions::default()
        };
        let l = FrameLayout::resolve(canvas(2, 2), &opts).unwrap();
        let src = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let out = l.compose(&src, [0, 0, 0, 255]);
        assert_eq!(out.dimensions(), (2, 4));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(0, 1).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(1, 2).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(1, 3).0, [0, 0, 0, 255]);
    }

    #[test]
    fn jpeg_and_png_signatures() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let png = encode_still(img.clone(), FrameFormat::Png, 1.0).unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
        let jpg = encode_still(img, FrameFormat::Jpeg, 0.8).unwrap();
        assert_eq!(&jpg[..2], &[0xFF, 0xD8]);
    }
}

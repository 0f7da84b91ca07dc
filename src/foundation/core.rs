use crate::foundation::error::{VoisyncError, VoisyncResult};

pub use kurbo::{Point, Rect, Size};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> VoisyncResult<Self> {
        if den == 0 {
            return Err(VoisyncError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(VoisyncError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Number of whole-or-partial frames needed to cover `secs`.
    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * self.as_f64()).ceil().max(0.0) as u64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 60, den: 1 }
    }
}

/// Canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    pub fn size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub fn byte_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Place a `src` sized region inside `dst`, preserving aspect ratio and centering the short side.
pub fn letterbox(src: Size, dst: Size) -> Rect {
    if src.width <= 0.0 || src.height <= 0.0 {
        return Rect::from_origin_size(Point::ORIGIN, dst);
    }
    let src_aspect = src.width / src.height;
    let dst_aspect = dst.width / dst.height;

    if src_aspect > dst_aspect {
        let h = dst.width / src_aspect;
        Rect::from_origin_size(Point::new(0.0, (dst.height - h) / 2.0), Size::new(dst.width, h))
    } else {
        let w = dst.height * src_aspect;
        Rect::from_origin_size(Point::new((dst.width - w) / 2.0, 0.0), Size::new(w, dst.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_frame_duration_and_ceil() {
        let fps = Fps::new(10, 1).unwrap();
        assert!((fps.frame_duration_secs() - 0.1).abs() < 1e-12);
        assert_eq!(fps.secs_to_frames_ceil(0.3), 3);
        assert_eq!(fps.secs_to_frames_ceil(0.31), 4);
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
    }

    #[test]
    fn letterbox_wide_source_pads_vertically() {
        let r = letterbox(Size::new(200.0, 100.0), Size::new(100.0, 100.0));
        assert_eq!(r.x0, 0.0);
        assert_eq!(r.width(), 100.0);
        assert_eq!(r.height(), 50.0);
        assert_eq!(r.y0, 25.0);
    }

    #[test]
    fn letterbox_tall_source_pads_horizontally() {
        let r = letterbox(Size::new(100.0, 200.0), Size::new(100.0, 100.0));
        assert_eq!(r.y0, 0.0);
        assert_eq!(r.height(), 100.0);
        assert_eq!(r.width(), 50.0);
        assert_eq!(r.x0, 25.0);
    }

    #[test]
    fn letterbox_same_aspect_fills() {
        let r = letterbox(Size::new(50.0, 25.0), Size::new(200.0, 100.0));
        assert_eq!(r, Rect::new(0.0, 0.0, 200.0, 100.0));
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::error::{VoisyncError, VoisyncResult};
use crate::foundation::math::premultiply_rgba8_in_place;

pub mod decode;
pub mod loader;

/// Decoded, ready-to-draw layer image.
#[derive(Clone, Debug)]
pub struct LayerImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl LayerImage {
    /// Wrap straight-alpha RGBA8 pixels, premultiplying them.
    pub fn from_straight_rgba8(width: u32, height: u32, mut rgba: Vec<u8>) -> VoisyncResult<Self> {
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(VoisyncError::validation(format!(
                "image byte length {} does not match {width}x{height}",
                rgba.len()
            )));
        }
        premultiply_rgba8_in_place(&mut rgba);
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba),
        })
    }

    /// Single-color image, mostly useful for placeholders and tests.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let px = width as usize * height as usize;
        let mut data = Vec::with_capacity(px * 4);
        for _ in 0..px {
            data.extend_from_slice(&rgba);
        }
        premultiply_rgba8_in_place(&mut data);
        Self {
            width,
            height,
            rgba8_premul: Arc::new(data),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.rgba8_premul.len() == self.width as usize * self.height as usize * 4
    }
}

/// Image file path to decoded image. Populated before rendering, read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct ImageCache {
    images: HashMap<String, LayerImage>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_path: impl Into<String>, image: LayerImage) {
        self.images.insert(file_path.into(), image);
    }

    pub fn get(&self, file_path: &str) -> Option<&LayerImage> {
        self.images.get(file_path)
    }

    pub fn contains(&self, file_path: &str) -> bool {
        self.images.contains_key(file_path)
    }

    pub fn remove(&mut self, file_path: &str) -> Option<LayerImage> {
        self.images.remove(file_path)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl FromIterator<(String, LayerImage)> for ImageCache {
    fn from_iter<T: IntoIterator<Item = (String, LayerImage)>>(iter: T) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}

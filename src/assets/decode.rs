use std::sync::Arc;

use anyhow::Context;

use crate::{VoisyncResult, assets::LayerImage, foundation::math::premultiply_rgba8_in_place};

/// Decode an encoded image (PNG, JPEG, WebP, ...) into a premultiplied [`LayerImage`].
pub fn decode_image(bytes: &[u8]) -> VoisyncResult<LayerImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(LayerImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

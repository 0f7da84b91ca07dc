use std::collections::HashSet;
use std::sync::Arc;

use crate::assets::ImageCache;
use crate::foundation::core::Canvas;
use crate::foundation::error::VoisyncResult;
use crate::layer::character::MouthLayerMapping;
use crate::layer::manifest::LayerManifest;
use crate::layer::surface::Surface;
use crate::lipsync::frame::MouthShape;

/// One layer to draw, with an alpha multiplier applied on top of the layer's own opacity.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerRequest {
    pub layer_path: String,
    pub alpha: f32,
}

impl LayerRequest {
    pub fn new(layer_path: impl Into<String>, alpha: f32) -> Self {
        Self {
            layer_path: layer_path.into(),
            alpha,
        }
    }
}

/// A mouth shape drawn into the mouth slot at the given alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouthBlend {
    pub shape: MouthShape,
    pub alpha: f32,
}

impl MouthBlend {
    pub fn solid(shape: MouthShape) -> Self {
        Self { shape, alpha: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderErrorKind {
    LayerNotFound,
    ImageNotCached,
    InvalidMouthShape,
    CanvasError,
}

/// Per-layer failure. Rendering continues past it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderError {
    #[serde(rename = "type")]
    pub kind: RenderErrorKind,
    pub details: String,
    pub layer_path: Option<String>,
}

impl RenderError {
    fn new(kind: RenderErrorKind, details: String, layer_path: &str) -> Self {
        Self {
            kind,
            details,
            layer_path: Some(layer_path.to_string()),
        }
    }
}

/// Outcome of one render call: drawn layers in draw order plus every per-layer error.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub success: bool,
    pub errors: Vec<RenderError>,
    pub rendered_layers: Vec<String>,
}

/// Draws a character's layers back-to-front onto a [`Surface`].
///
/// Cheap to clone; manifest and image cache are shared.
#[derive(Clone, Debug)]
pub struct LayerRenderer {
    manifest: Arc<LayerManifest>,
    images: Arc<ImageCache>,
    mouth_mapping: MouthLayerMapping,
    mouth_slot: String,
}

impl LayerRenderer {
    pub fn new(
        manifest: Arc<LayerManifest>,
        images: Arc<ImageCache>,
        mouth_mapping: MouthLayerMapping,
        mouth_slot: impl Into<String>,
    ) -> Self {
        Self {
            manifest,
            images,
            mouth_mapping,
            mouth_slot: mouth_slot.into(),
        }
    }

    /// Same character, different image cache.
    pub fn with_images(mut self, images: Arc<ImageCache>) -> Self {
        self.images = images;
        self
    }

    pub fn canvas(&self) -> Canvas {
        self.manifest.canvas()
    }

    pub fn manifest(&self) -> &LayerManifest {
        &self.manifest
    }

    pub fn mouth_mapping(&self) -> &MouthLayerMapping {
        &self.mouth_mapping
    }

    pub fn mouth_slot(&self) -> &str {
        &self.mouth_slot
    }

    /// Draw exactly the requested layers.
    ///
    /// Only a surface without a drawing context is an `Err`; everything else is reported in the
    /// result and skipped.
    pub fn render(
        &self,
        surface: &mut dyn Surface,
        request: &[LayerRequest],
    ) -> VoisyncResult<RenderResult> {
        self.render_collecting(surface, request, Vec::new())
    }

    /// Expand every occurrence of the mouth slot into one entry per blend; other paths draw at
    /// full alpha. Unmapped shapes contribute nothing.
    pub fn render_with_mouth_shapes(
        &self,
        surface: &mut dyn Surface,
        base_layers: &[impl AsRef<str>],
        mouth_shapes: &[MouthBlend],
    ) -> VoisyncResult<RenderResult> {
        let mut request = Vec::with_capacity(base_layers.len() + mouth_shapes.len());
        for path in base_layers.iter().map(AsRef::as_ref) {
            if path != self.mouth_slot {
                request.push(LayerRequest::new(path, 1.0));
                continue;
            }
            for blend in mouth_shapes {
                match self.mouth_mapping.get(blend.shape) {
                    Some(mouth) => request.push(LayerRequest::new(mouth, blend.alpha)),
                    None => tracing::debug!(shape = %blend.shape, "mouth shape not mapped; skipped"),
                }
            }
        }
        self.render(surface, &request)
    }

    /// Replace the mouth slot with a single shape. An unmapped shape is reported as
    /// `INVALID_MOUTH_SHAPE` for each slot occurrence.
    pub fn render_mouth(
        &self,
        surface: &mut dyn Surface,
        base_layers: &[impl AsRef<str>],
        shape: MouthShape,
    ) -> VoisyncResult<RenderResult> {
        let mut request = Vec::with_capacity(base_layers.len());
        let mut errors = Vec::new();
        for path in base_layers.iter().map(AsRef::as_ref) {
            if path != self.mouth_slot {
                request.push(LayerRequest::new(path, 1.0));
                continue;
            }
            match self.mouth_mapping.get(shape) {
                Some(mouth) => request.push(LayerRequest::new(mouth, 1.0)),
                None => errors.push(RenderError::new(
                    RenderErrorKind::InvalidMouthShape,
                    format!("Invalid mouth shape: {shape}"),
                    path,
                )),
            }
        }
        self.render_collecting(surface, &request, errors)
    }

    /// Image files needed for `layer_paths` plus every mapped mouth layer, de-duplicated.
    pub fn required_image_paths(&self, layer_paths: &[impl AsRef<str>]) -> Vec<String> {
        let mut seen_layers = HashSet::new();
        let mut seen_files = HashSet::new();
        let mut out = Vec::new();

        let all = layer_paths
            .iter()
            .map(AsRef::as_ref)
            .chain(self.mouth_mapping.layer_paths());
        for layer_path in all {
            if !seen_layers.insert(layer_path) {
                continue;
            }
            let Some(layer) = self.manifest.find(layer_path) else {
                continue;
            };
            if seen_files.insert(layer.file_path.as_str()) {
                out.push(layer.file_path.clone());
            }
        }
        out
    }

    fn render_collecting(
        &self,
        surface: &mut dyn Surface,
        request: &[LayerRequest],
        mut errors: Vec<RenderError>,
    ) -> VoisyncResult<RenderResult> {
        let ctx = surface.context()?;
        ctx.clear();

        let mut resolved = Vec::with_capacity(request.len());
        for req in request {
            match self.manifest.index_of(&req.layer_path) {
                Some(idx) => resolved.push((idx, req)),
                None => errors.push(RenderError::new(
                    RenderErrorKind::LayerNotFound,
                    format!("Layer not found: {}", req.layer_path),
                    &req.layer_path,
                )),
            }
        }

        // Back-to-front: the last manifest entry is the backmost layer.
        resolved.sort_by(|a, b| b.0.cmp(&a.0));

        let mut rendered_layers = Vec::with_capacity(resolved.len());
        for (idx, req) in resolved {
            let layer = &self.manifest.layers()[idx];
            let Some(image) = self.images.get(&layer.file_path) else {
                errors.push(RenderError::new(
                    RenderErrorKind::ImageNotCached,
                    format!("Image not found in cache: {}", layer.file_path),
                    &req.layer_path,
                ));
                continue;
            };

            let prev_alpha = ctx.global_alpha();
            ctx.set_global_alpha(layer.opacity * req.alpha);
            match ctx.draw_image(image, layer.bounds.left, layer.bounds.top) {
                Ok(()) => rendered_layers.push(req.layer_path.clone()),
                Err(e) => errors.push(RenderError::new(
                    RenderErrorKind::CanvasError,
                    format!("Failed to draw image: {e}"),
                    &req.layer_path,
                )),
            }
            ctx.set_global_alpha(prev_alpha);
        }

        Ok(RenderResult {
            success: errors.is_empty(),
            errors,
            rendered_layers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LayerImage;
    use crate::foundation::error::VoisyncError;
    use crate::layer::manifest::{Bounds, Layer};
    use crate::layer::surface::{DrawContext, DrawError};

    #[derive(Default)]
    struct Recorder {
        alpha: f32,
        draws: Vec<(u32, f32, f64, f64)>,
        clears: usize,
        fail_width: Option<u32>,
    }

    impl DrawContext for Recorder {
        fn clear(&mut self) {
            self.clears += 1;
        }
        fn global_alpha(&self) -> f32 {
            self.alpha
        }
        fn set_global_alpha(&mut self, alpha: f32) {
            self.alpha = alpha;
        }
        fn draw_image(&mut self, image: &LayerImage, x: f64, y: f64) -> Result<(), DrawError> {
            if self.fail_width == Some(image.width) {
                return Err(DrawError("boom".to_string()));
            }
            self.draws.push((image.width, self.alpha, x, y));
            Ok(())
        }
    }

    impl Surface for Recorder {
        fn canvas(&self) -> Canvas {
            Canvas {
                width: 10,
                height: 10,
            }
        }
        fn context(&mut self) -> VoisyncResult<&mut dyn DrawContext> {
            Ok(self)
        }
    }

    struct NoContext;
    impl Surface for NoContext {
        fn canvas(&self) -> Canvas {
            Canvas {
                width: 1,
                height: 1,
            }
        }
        fn context(&mut self) -> VoisyncResult<&mut dyn DrawContext> {
            Err(VoisyncError::render("no context"))
        }
    }

    fn recorder() -> Recorder {
        Recorder {
            alpha: 1.0,
            ..Recorder::default()
        }
    }

    fn layer(path: &str, file: &str, opacity: f32, left: f64) -> Layer {
        Layer {
            name: path.to_string(),
            layer_path: path.to_string(),
            file_path: file.to_string(),
            visible: true,
            opacity,
            bounds: Bounds {
                left,
                top: 1.0,
                width: 1.0,
                height: 1.0,
            },
        }
    }

    // Image width identifies the layer in draw records: layer `i` has width `i + 1`.
    fn renderer() -> LayerRenderer {
        let layers = vec![
            layer("eyes", "eyes.png", 1.0, 0.0),
            layer("mouth/closed", "closed.png", 1.0, 1.0),
            layer("mouth/a", "a.png", 0.5, 2.0),
            layer("body", "body.png", 1.0, 3.0),
        ];
        let mut images = ImageCache::new();
        for (i, l) in layers.iter().enumerate() {
            images.insert(l.file_path.clone(), LayerImage::solid(i as u32 + 1, 1, [0, 0, 0, 255]));
        }
        let manifest = LayerManifest::new(
            Canvas {
                width: 10,
                height: 10,
            },
            layers,
        )
        .unwrap();
        let mapping = MouthLayerMapping::new([
            (MouthShape::Closed, "mouth/closed".to_string()),
            (MouthShape::A, "mouth/a".to_string()),
        ]);
        LayerRenderer::new(Arc::new(manifest), Arc::new(images), mapping, "mouth/closed")
    }

    #[test]
    fn draws_back_to_front_regardless_of_request_order() {
        let r = renderer();
        let mut s = recorder();
        let res = r
            .render(
                &mut s,
                &[
                    LayerRequest::new("eyes", 1.0),
                    LayerRequest::new("body", 1.0),
                    LayerRequest::new("mouth/closed", 1.0),
                ],
            )
            .unwrap();
        assert!(res.success);
        assert_eq!(res.rendered_layers, vec!["body", "mouth/closed", "eyes"]);
        let widths: Vec<u32> = s.draws.iter().map(|d| d.0).collect();
        assert_eq!(widths, vec![4, 2, 1]);
        assert_eq!(s.clears, 1);
    }

    #[test]
    fn opacity_multiplies_request_alpha_and_state_is_restored() {
        let r = renderer();
        let mut s = recorder();
        r.render(&mut s, &[LayerRequest::new("mouth/a", 0.5)])
            .unwrap();
        assert_eq!(s.draws[0].1, 0.25);
        assert_eq!(s.draws[0].2, 2.0);
        assert_eq!(s.draws[0].3, 1.0);
        assert_eq!(s.alpha, 1.0);
    }

    #[test]
    fn draw_failure_is_canvas_error_and_rendering_continues() {
        let r = renderer();
        let mut s = Recorder {
            fail_width: Some(4),
            ..recorder()
        };
        let res = r
            .render(
                &mut s,
                &[LayerRequest::new("body", 1.0), LayerRequest::new("eyes", 1.0)],
            )
            .unwrap();
        assert!(!res.success);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].kind, RenderErrorKind::CanvasError);
        assert_eq!(res.errors[0].layer_path.as_deref(), Some("body"));
        assert_eq!(res.rendered_layers, vec!["eyes"]);
        assert_eq!(s.alpha, 1.0);
    }

    #[test]
    fn missing_context_is_fatal() {
        let r = renderer();
        assert!(r.render(&mut NoContext, &[]).is_err());
    }

    #[test]
    fn blended_mouth_drops_unmapped_shapes_silently() {
        let r = renderer();
        let mut s = recorder();
        let res = r
            .render_with_mouth_shapes(
                &mut s,
                &["eyes", "mouth/closed"],
                &[
                    MouthBlend {
                        shape: MouthShape::O,
                        alpha: 0.5,
                    },
                    MouthBlend {
                        shape: MouthShape::Closed,
                        alpha: 0.5,
                    },
                ],
            )
            .unwrap();
        assert!(res.success);
        assert_eq!(res.rendered_layers, vec!["mouth/closed", "eyes"]);
    }

    #[test]
    fn single_shape_path_reports_invalid_mouth() {
        let r = renderer();
        let mut s = recorder();
        let res = r
            .render_mouth(&mut s, &["eyes", "mouth/closed"], MouthShape::U)
            .unwrap();
        assert!(!res.success);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].kind, RenderErrorKind::InvalidMouthShape);
        assert_eq!(res.errors[0].layer_path.as_deref(), Some("mouth/closed"));
        assert_eq!(res.rendered_layers, vec!["eyes"]);

        let ok = r
            .render_mouth(&mut s, &["eyes", "mouth/closed"], MouthShape::A)
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.rendered_layers, vec!["mouth/a", "eyes"]);
    }

    #[test]
    fn error_kinds_serialize_screaming() {
        let json = serde_json::to_value(RenderError::new(
            RenderErrorKind::LayerNotFound,
            "x".to_string(),
            "p",
        ))
        .unwrap();
        assert_eq!(json["type"], "LAYER_NOT_FOUND");
        assert_eq!(json["layerPath"], "p");
    }
}

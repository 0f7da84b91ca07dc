use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::Canvas;
use crate::foundation::error::{VoisyncError, VoisyncResult};

/// Top-left placement and size of a layer image on the shared canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// One named, positioned sub-image of the decomposed character asset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub name: String,
    /// Unique key used to address the layer everywhere else.
    pub layer_path: String,
    /// Key into the image cache.
    pub file_path: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub bounds: Bounds,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

#[derive(serde::Deserialize)]
struct RawManifest {
    document: Canvas,
    #[serde(default)]
    layers: Vec<Layer>,
}

/// Canvas size plus the flat layer list of one character.
///
/// Layer order is stacking order: index 0 is frontmost, the last layer is the back.
#[derive(Clone, Debug)]
pub struct LayerManifest {
    canvas: Canvas,
    layers: Vec<Layer>,
    by_path: HashMap<String, usize>,
}

impl LayerManifest {
    /// Build a manifest, rejecting duplicate layer paths and clamping opacity into `[0, 1]`.
    pub fn new(canvas: Canvas, mut layers: Vec<Layer>) -> VoisyncResult<Self> {
        let mut by_path = HashMap::with_capacity(layers.len());
        for (idx, layer) in layers.iter_mut().enumerate() {
            if by_path.insert(layer.layer_path.clone(), idx).is_some() {
                return Err(VoisyncError::validation(format!(
                    "duplicate layerPath '{}' in manifest",
                    layer.layer_path
                )));
            }
            if !(0.0..=1.0).contains(&layer.opacity) {
                let clamped = if layer.opacity.is_finite() {
                    layer.opacity.clamp(0.0, 1.0)
                } else {
                    1.0
                };
                tracing::warn!(
                    layer = %layer.layer_path,
                    opacity = layer.opacity,
                    clamped,
                    "layer opacity out of range"
                );
                layer.opacity = clamped;
            }
        }
        Ok(Self {
            canvas,
            layers,
            by_path,
        })
    }

    pub fn from_json(s: &str) -> VoisyncResult<Self> {
        let raw: RawManifest = serde_json::from_str(s)?;
        Self::new(raw.document, raw.layers)
    }

    pub fn from_path(path: &Path) -> VoisyncResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read layer manifest '{}'", path.display()))?;
        Self::from_json(&s)
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Stacking index of `layer_path` (0 = front).
    pub fn index_of(&self, layer_path: &str) -> Option<usize> {
        self.by_path.get(layer_path).copied()
    }

    pub fn find(&self, layer_path: &str) -> Option<&Layer> {
        self.index_of(layer_path).map(|idx| &self.layers[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "document": {"width": 100, "height": 80},
        "layers": [
            {"name": "eyes", "layerPath": "!目/*普通目", "filePath": "eyes.png",
             "visible": true, "opacity": 1, "bounds": {"left": 10, "top": 5, "width": 20, "height": 10}},
            {"name": "body", "layerPath": "body", "filePath": "body.png",
             "opacity": 0.5, "bounds": {"left": 0, "top": 0, "width": 100, "height": 80}}
        ]
    }"#;

    #[test]
    fn parses_manifest_and_indexes_paths() {
        let m = LayerManifest::from_json(DOC).unwrap();
        assert_eq!(
            m.canvas(),
            Canvas {
                width: 100,
                height: 80
            }
        );
        assert_eq!(m.index_of("!目/*普通目"), Some(0));
        assert_eq!(m.index_of("body"), Some(1));
        assert_eq!(m.index_of("missing"), None);
        let body = m.find("body").unwrap();
        assert_eq!(body.opacity, 0.5);
        assert!(body.visible);
        assert_eq!(body.bounds.width, 100.0);
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let layer = Layer {
            name: "x".to_string(),
            layer_path: "x".to_string(),
            file_path: "x.png".to_string(),
            visible: true,
            opacity: 1.0,
            bounds: Bounds::default(),
        };
        let err = LayerManifest::new(
            Canvas {
                width: 1,
                height: 1,
            },
            vec![layer.clone(), layer],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate layerPath"));
    }

    #[test]
    fn opacity_is_clamped() {
        let layer = Layer {
            name: "x".to_string(),
            layer_path: "x".to_string(),
            file_path: "x.png".to_string(),
            visible: true,
            opacity: 3.0,
            bounds: Bounds::default(),
        };
        let m = LayerManifest::new(
            Canvas {
                width: 1,
                height: 1,
            },
            vec![layer],
        )
        .unwrap();
        assert_eq!(m.layers()[0].opacity, 1.0);
    }
}

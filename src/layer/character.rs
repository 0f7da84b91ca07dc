use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::assets::ImageCache;
use crate::assets::loader::{ImageLoader, load_images};
use crate::foundation::error::{VoisyncError, VoisyncResult};
use crate::layer::manifest::LayerManifest;
use crate::layer::renderer::LayerRenderer;
use crate::lipsync::frame::MouthShape;

/// Mouth shape to layer path mapping for one character.
///
/// Deserializes from an object keyed by shape name. Gaps are tolerated at render time;
/// [`MouthLayerMapping::validate`] reports them up front.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MouthLayerMapping(BTreeMap<MouthShape, String>);

impl MouthLayerMapping {
    pub fn new(entries: impl IntoIterator<Item = (MouthShape, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Layer path for `shape`; empty entries count as unmapped.
    pub fn get(&self, shape: MouthShape) -> Option<&str> {
        self.0
            .get(&shape)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }

    pub fn missing_shapes(&self) -> Vec<MouthShape> {
        MouthShape::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_none())
            .collect()
    }

    pub fn validate(&self) -> VoisyncResult<()> {
        let missing = self.missing_shapes();
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|m| m.as_str()).collect();
        Err(VoisyncError::validation(format!(
            "mouth mapping has no layer for: {}",
            names.join(", ")
        )))
    }

    /// Mapped layer paths in shape order (may contain repeats).
    pub fn layer_paths(&self) -> impl Iterator<Item = &str> {
        MouthShape::ALL.into_iter().filter_map(|m| self.get(m))
    }
}

/// Per-character configuration file.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Layer manifest path, relative to the config file.
    pub layers_path: PathBuf,
    pub base_layers: Vec<String>,
    pub mouth_mapping: MouthLayerMapping,
    /// Layer path in `base_layers` that is replaced by the current mouth shape.
    #[serde(default)]
    pub mouth_slot: Option<String>,
}

impl CharacterConfig {
    pub fn from_json(s: &str) -> VoisyncResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: &Path) -> VoisyncResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read character config '{}'", path.display()))?;
        Self::from_json(&s)
    }

    /// Explicit slot, else the layer used for the closed mouth.
    pub fn mouth_slot(&self) -> VoisyncResult<&str> {
        if let Some(slot) = self.mouth_slot.as_deref() {
            return Ok(slot);
        }
        self.mouth_mapping
            .get(MouthShape::Closed)
            .ok_or_else(|| VoisyncError::validation("character has no mouthSlot and no closed mouth"))
    }

    pub fn manifest_path(&self, config_path: &Path) -> PathBuf {
        if self.layers_path.is_absolute() {
            return self.layers_path.clone();
        }
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.layers_path)
    }

    /// Load the manifest and check that every referenced layer exists in it.
    pub fn load_manifest(&self, config_path: &Path) -> VoisyncResult<LayerManifest> {
        let manifest = LayerManifest::from_path(&self.manifest_path(config_path))?;
        let slot = self.mouth_slot()?;
        let unknown: Vec<&str> = self
            .base_layers
            .iter()
            .map(String::as_str)
            .filter(|p| *p != slot)
            .chain(self.mouth_mapping.layer_paths())
            .filter(|p| manifest.index_of(p).is_none())
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(character = %self.id, ?unknown, "layers missing from manifest");
        }
        Ok(manifest)
    }

    /// Directory that image file paths in the manifest are relative to.
    pub fn asset_root(&self, config_path: &Path) -> PathBuf {
        self.manifest_path(config_path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load the manifest, prefetch every image the character can show, and build a renderer.
    pub fn renderer(
        &self,
        config_path: &Path,
        loader: &dyn ImageLoader,
    ) -> VoisyncResult<LayerRenderer> {
        let manifest = Arc::new(self.load_manifest(config_path)?);
        let slot = self.mouth_slot()?.to_string();
        let renderer = LayerRenderer::new(
            manifest,
            Arc::new(ImageCache::new()),
            self.mouth_mapping.clone(),
            slot,
        );
        let images = load_images(loader, &renderer.required_image_paths(&self.base_layers));
        Ok(renderer.with_images(Arc::new(images)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_mapping() -> MouthLayerMapping {
        MouthLayerMapping::new(
            MouthShape::ALL
                .into_iter()
                .map(|m| (m, format!("!口/*{}", m.as_str()))),
        )
    }

    #[test]
    fn mapping_deserializes_from_shape_keys() {
        let m: MouthLayerMapping =
            serde_json::from_str(r#"{"a": "!口/*あ", "closed": "!口/*むふ", "o": ""}"#).unwrap();
        assert_eq!(m.get(MouthShape::A), Some("!口/*あ"));
        assert_eq!(m.get(MouthShape::Closed), Some("!口/*むふ"));
        assert_eq!(m.get(MouthShape::O), None);
        assert_eq!(m.missing_shapes().len(), 5);
        assert!(m.validate().is_err());
        assert!(full_mapping().validate().is_ok());
    }

    #[test]
    fn layer_paths_follow_shape_order() {
        let mapping = full_mapping();
        let paths: Vec<&str> = mapping.layer_paths().collect();
        assert_eq!(paths.len(), 7);
        assert_eq!(paths[0], "!口/*a");
        assert_eq!(paths[6], "!口/*closed");
    }

    #[test]
    fn mouth_slot_defaults_to_closed_layer() {
        let cfg = CharacterConfig::from_json(
            r#"{
                "id": "zundamon",
                "name": "ずんだもん",
                "layersPath": "layers.json",
                "baseLayers": ["!眉/*普通眉", "!口/*むふ"],
                "mouthMapping": {"a": "!口/*んあー", "closed": "!口/*むふ"}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.mouth_slot().unwrap(), "!口/*むふ");
        assert_eq!(
            cfg.manifest_path(Path::new("chars/zundamon.json")),
            PathBuf::from("chars/layers.json")
        );
    }
}

//! Scene and object-type definitions loaded from JSON files.

use crate::{collision::CollisionShape, sequence::SequenceEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

fn default_size() -> (u32, u32) {
    (16, 16)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectTypeConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub solid: bool,
    #[serde(default)]
    pub depth: i32,
    #[serde(default)]
    pub shape: CollisionShape,
    /// Mask dimensions in pixels (width, height).
    #[serde(default = "default_size")]
    pub size: (u32, u32),
    /// Explicit occupancy rows ('#' = set) for precise shapes; when absent
    /// the mask is filled from `size` (or a disk for disk shapes).
    #[serde(default)]
    pub mask_rows: Option<Vec<String>>,
    /// Event name -> flat authored action list.
    #[serde(default)]
    pub events: BTreeMap<String, Vec<SequenceEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub object: String,
    pub position: (f64, f64),
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub direction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Room dimensions in pixels (width, height).
    pub room: (i64, i64),
    #[serde(default)]
    pub seed: u64,
    pub objects: Vec<ObjectTypeConfig>,
    #[serde(default)]
    pub placements: Vec<Placement>,
}

impl SceneConfig {
    /// Load a scene description from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<SceneConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let scene: SceneConfig = serde_json::from_str(&content)?;
        Ok(scene)
    }
}

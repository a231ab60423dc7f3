use std::collections::BTreeMap;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Height (in model units) the rig is normalized to.
pub const DEFAULT_TARGET_HEIGHT: f32 = 1.6;
/// Playback rate of pose animations.
pub const DEFAULT_FPS: u32 = 30;
/// Fraction of the remaining angular gap closed on every tick.
pub const DEFAULT_BLEND_FACTOR: f32 = 0.18;
pub const DEFAULT_CAMERA_MARGIN: f32 = 1.1;

/// Semantic joint name to rig bone name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct JointMap(BTreeMap<String, String>);

impl JointMap {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn bone_name(&self, joint: &str) -> Option<&str> {
        self.0.get(joint).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(j, b)| (j.as_str(), b.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for JointMap {
    /// Mixamo style bone names.
    fn default() -> Self {
        Self::new(
            [
                ("nose", "Head"),
                ("leftShoulder", "LeftArm"),
                ("rightShoulder", "RightArm"),
                ("leftElbow", "LeftForeArm"),
                ("rightElbow", "RightForeArm"),
                ("leftWrist", "LeftHand"),
                ("rightWrist", "RightHand"),
                ("leftHip", "LeftUpLeg"),
                ("rightHip", "RightUpLeg"),
            ]
            .map(|(j, b)| (j.to_string(), b.to_string())),
        )
    }
}

/// Joints retargeted as a unit: `parent` is swung toward `child`, and `child`
/// toward `grandchild` when present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LimbChain {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub grandchild: Option<String>,
}

impl LimbChain {
    pub fn new(parent: &str, child: &str, grandchild: Option<&str>) -> Self {
        Self {
            parent: parent.to_string(),
            child: child.to_string(),
            grandchild: grandchild.map(str::to_string),
        }
    }

    /// Parent to child joint pairs, top of the chain first.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        let first = Some((self.parent.as_str(), self.child.as_str()));
        let second = self
            .grandchild
            .as_deref()
            .map(|grandchild| (self.child.as_str(), grandchild));
        first.into_iter().chain(second)
    }
}

pub fn default_chains() -> Vec<LimbChain> {
    vec![
        LimbChain::new("leftShoulder", "leftElbow", Some("leftWrist")),
        LimbChain::new("rightShoulder", "rightElbow", Some("rightWrist")),
    ]
}

/// Everything the retargeting engine can be tuned with.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RetargetConfig {
    /// Vertical extent of the rig after calibration.
    pub target_height: f32,
    pub joint_map: JointMap,
    pub chains: Vec<LimbChain>,
    pub fps: u32,
    /// Multiplier (>= 1.0) applied to the camera distance.
    pub camera_margin: f32,
    /// Start playing as soon as a new sequence is selected.
    pub autoplay: bool,
    /// Bone used as the head reference for facing detection.
    pub head_bone: String,
    /// Candidates for a bone in front of the head, first match wins.
    pub nose_bones: Vec<String>,
    pub blend_factor: f32,
    /// Dump the rig hierarchy at `debug` level whenever a rig is bound.
    pub trace_hierarchy: bool,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            target_height: DEFAULT_TARGET_HEIGHT,
            joint_map: JointMap::default(),
            chains: default_chains(),
            fps: DEFAULT_FPS,
            camera_margin: DEFAULT_CAMERA_MARGIN,
            autoplay: true,
            head_bone: "Head".to_string(),
            nose_bones: vec!["Nose".to_string(), "Face".to_string()],
            blend_factor: DEFAULT_BLEND_FACTOR,
            trace_hierarchy: false,
        }
    }
}

impl RetargetConfig {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read retarget config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse retarget config: {0}")]
    Json(#[from] serde_json::Error),
}

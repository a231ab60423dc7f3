use std::collections::HashMap;

use bevy::asset::io::Reader;
use bevy::asset::{AssetLoader, AsyncReadExt, LoadContext};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keypoints::{from_keypoint_videos, KeypointVideo};

pub struct PoseAnimAssetPlugin;

impl Plugin for PoseAnimAssetPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<PoseAnimAsset>()
            .init_asset_loader::<PoseAnimAssetLoader>()
            .init_asset_loader::<KeypointsAssetLoader>();
    }
}

/// A single sample of the source skeleton.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct PoseFrame {
    /// Frame number inside the source video, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
    /// Joint name to `[x, y, z]` coordinate.
    #[serde(default)]
    pub joints: HashMap<String, [f32; 3]>,
    /// Source video the frame was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl PoseFrame {
    /// Coordinate of a joint, ignoring non-finite samples.
    pub fn joint(&self, name: &str) -> Option<Vec3> {
        self.joints
            .get(name)
            .map(|&[x, y, z]| Vec3::new(x, y, z))
            .filter(|v| v.is_finite())
    }
}

/// An ordered pose animation. Always replaced as a whole, never appended to.
#[derive(Asset, TypePath, Serialize, Deserialize, Default, Debug, Clone)]
pub struct PoseAnimAsset {
    frames: Vec<PoseFrame>,
}

impl PoseAnimAsset {
    pub fn new(frames: Vec<PoseFrame>) -> Self {
        Self { frames }
    }

    /// Parse either a bare frame array or the `{ "animation": [...] }` envelope
    /// returned by the text-to-sign endpoint.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let payload = serde_json::from_slice::<PoseAnimPayload>(bytes)?;
        Ok(Self::new(payload.into_frames()))
    }

    pub fn frames(&self) -> &[PoseFrame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&PoseFrame> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Coordinate of `joint` in frame `index`.
    pub fn joint(&self, index: usize, joint: &str) -> Option<Vec3> {
        self.frame(index).and_then(|f| f.joint(joint))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoseAnimPayload {
    Frames(Vec<PoseFrame>),
    Envelope { animation: Vec<PoseFrame> },
}

impl PoseAnimPayload {
    fn into_frames(self) -> Vec<PoseFrame> {
        match self {
            Self::Frames(frames) => frames,
            Self::Envelope { animation } => animation,
        }
    }
}

#[derive(Default)]
pub struct PoseAnimAssetLoader;

impl AssetLoader for PoseAnimAssetLoader {
    type Asset = PoseAnimAsset;
    type Settings = ();
    type Error = PoseAnimLoaderError;

    async fn load<'a>(
        &'a self,
        reader: &'a mut Reader<'_>,
        _settings: &'a (),
        _load_context: &'a mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Ok(PoseAnimAsset::from_json_slice(&bytes)?)
    }

    fn extensions(&self) -> &[&str] {
        &["pose.json", "json"]
    }
}

/// Loads raw MediaPipe keypoint dumps and converts them to a [`PoseAnimAsset`].
#[derive(Default)]
pub struct KeypointsAssetLoader;

impl AssetLoader for KeypointsAssetLoader {
    type Asset = PoseAnimAsset;
    type Settings = ();
    type Error = PoseAnimLoaderError;

    async fn load<'a>(
        &'a self,
        reader: &'a mut Reader<'_>,
        _settings: &'a (),
        _load_context: &'a mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let videos = serde_json::from_slice::<Vec<KeypointVideo>>(&bytes)?;
        Ok(from_keypoint_videos(&videos))
    }

    fn extensions(&self) -> &[&str] {
        &["keypoints.json"]
    }
}

/// Possible errors that can be produced by the pose animation loaders.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PoseAnimLoaderError {
    /// An [Io](std::io) Error
    #[error("Could not load pose animation file: {0}")]
    Io(#[from] std::io::Error),
    /// A [Json](serde_json::Error) Error
    #[error("Could not parse pose animation: {0}")]
    Json(#[from] serde_json::Error),
}

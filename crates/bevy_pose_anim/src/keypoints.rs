//! Conversion of MediaPipe pose landmark dumps into pose animations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::pose_asset::{PoseAnimAsset, PoseFrame};

/// MediaPipe pose landmark index to joint name.
pub const LANDMARK_JOINTS: [(usize, &str); 9] = [
    (0, "nose"),
    (11, "leftShoulder"),
    (12, "rightShoulder"),
    (13, "leftElbow"),
    (14, "rightElbow"),
    (15, "leftWrist"),
    (16, "rightWrist"),
    (23, "leftHip"),
    (24, "rightHip"),
];

/// Keypoints extracted from one video.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct KeypointVideo {
    #[serde(default)]
    pub video: String,
    /// One entry per detected frame, each holding the full landmark list.
    #[serde(default)]
    pub keypoints: Vec<Vec<Landmark>>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub visibility: f32,
}

/// Concatenate the frames of every video, keeping only the landmarks listed in
/// [`LANDMARK_JOINTS`]. Frame numbers restart at zero for each video.
pub fn from_keypoint_videos(videos: &[KeypointVideo]) -> PoseAnimAsset {
    let mut frames = Vec::new();

    for video in videos {
        for (frame_index, landmarks) in video.keypoints.iter().enumerate() {
            let joints = LANDMARK_JOINTS
                .iter()
                .filter_map(|&(index, name)| {
                    landmarks
                        .get(index)
                        .map(|lm| (name.to_string(), [lm.x, lm.y, lm.z]))
                })
                .collect::<HashMap<_, _>>();

            frames.push(PoseFrame {
                frame: Some(frame_index as u32),
                joints,
                video: Some(video.video.clone()),
            });
        }
    }

    PoseAnimAsset::new(frames)
}

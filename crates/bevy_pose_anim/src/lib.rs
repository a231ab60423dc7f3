pub mod keypoints;
pub mod pose_asset;

pub mod prelude {
    pub use crate::keypoints::{from_keypoint_videos, KeypointVideo, Landmark, LANDMARK_JOINTS};
    pub use crate::pose_asset::{PoseAnimAsset, PoseAnimAssetPlugin, PoseFrame};
}

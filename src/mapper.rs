//! Animation space to model space conversion.

use bevy::prelude::*;
use bevy_pose_anim::prelude::*;

/// Shoulder distances below this are considered degenerate.
pub const SCALE_EPSILON: f32 = 1e-6;

pub const LEFT_HIP: &str = "leftHip";
pub const RIGHT_HIP: &str = "rightHip";
pub const NOSE: &str = "nose";
pub const LEFT_SHOULDER: &str = "leftShoulder";
pub const RIGHT_SHOULDER: &str = "rightShoulder";

/// Maps animation coordinates into the calibrated model space (the space the
/// rig root lives in).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    pub target_height: f32,
    /// Animation space origin, taken from the first frame.
    pub anim_root: Option<Vec3>,
    /// Animation to model unit ratio.
    pub anim_to_model: f32,
    /// Set when the shoulder distances were too small to derive a ratio.
    pub scale_fallback: bool,
}

impl CoordinateMapper {
    /// Mapper treating coordinates as normalized `0..1` image space.
    pub fn normalized(target_height: f32) -> Self {
        Self {
            target_height,
            anim_root: None,
            anim_to_model: 1.0,
            scale_fallback: false,
        }
    }

    /// Build a mapper from the first frame of a sequence and the calibrated
    /// model's shoulder positions.
    pub fn from_first_frame(
        first_frame: Option<&PoseFrame>,
        model_shoulders: Option<(Vec3, Vec3)>,
        target_height: f32,
    ) -> Self {
        let mut mapper = Self::normalized(target_height);
        let Some(frame) = first_frame else {
            return mapper;
        };

        mapper.anim_root = animation_root(frame);

        let source_distance = frame
            .joint(LEFT_SHOULDER)
            .zip(frame.joint(RIGHT_SHOULDER))
            .map(|(l, r)| l.distance(r));
        let model_distance = model_shoulders.map(|(l, r)| l.distance(r));

        match (source_distance, model_distance) {
            (Some(source), Some(model)) if source >= SCALE_EPSILON && model >= SCALE_EPSILON => {
                mapper.anim_to_model = model / source;
            }
            _ => {
                warn!(
                    "Shoulder distance unavailable (source: {source_distance:?}, model: {model_distance:?}), using unit animation scale."
                );
                mapper.scale_fallback = true;
            }
        }

        mapper
    }

    pub fn uses_fallback(&self) -> bool {
        self.anim_root.is_none()
    }

    pub fn to_local(&self, coord: Vec3) -> Vec3 {
        match self.anim_root {
            Some(root) => {
                let local = (coord - root) * self.anim_to_model;
                Vec3::new(local.x, local.y, -local.z)
            }
            None => {
                let h = self.target_height;
                Vec3::new((coord.x - 0.5) * h, (0.5 - coord.y) * h, -(coord.z - 0.5) * h)
            }
        }
    }
}

/// Midpoint of the hips, else the nose.
pub fn animation_root(frame: &PoseFrame) -> Option<Vec3> {
    match (frame.joint(LEFT_HIP), frame.joint(RIGHT_HIP)) {
        (Some(left), Some(right)) => Some((left + right) * 0.5),
        _ => frame.joint(NOSE),
    }
}

//! Rotation-only retargeting of limb chains.
//!
//! Each link of a chain swings its parent bone from the recorded bind
//! direction toward the direction implied by the current frame. Bone
//! translations are never written, moving a skinned bone away from its mesh
//! binding stretches the mesh.

use bevy::prelude::*;
use bevy_pose_anim::prelude::*;
use thiserror::Error;

use crate::avatar::RigBinding;
use crate::bind_pose::bind_direction;
use crate::config::LimbChain;
use crate::rig::RigNodes;

/// `dot(bind, desired)` at or below `-1 + ANTIPARALLEL_EPSILON` has no
/// well defined swing axis.
pub const ANTIPARALLEL_EPSILON: f32 = 1e-6;

/// Why a link was left untouched this tick.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RetargetSkip {
    #[error("joint `{0}` has no bone in the rig")]
    MissingBone(String),
    #[error("joint `{0}` is absent from the frame")]
    MissingJoint(String),
    #[error("no bind pose recorded for `{0}`")]
    MissingBindPose(String),
    #[error("direction from `{0}` to `{1}` has zero length")]
    Degenerate(String, String),
    #[error("desired direction is opposite to the bind direction")]
    Antiparallel,
    #[error("target rotation is not finite")]
    NonFinite,
}

impl RetargetSkip {
    /// A target computed from the frame but refused, as opposed to a link
    /// with nothing to drive it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Antiparallel | Self::NonFinite)
    }
}

/// Minimal rotation taking unit vector `from` onto unit vector `to`.
pub fn shortest_arc(from: Vec3, to: Vec3) -> Quat {
    Quat::from_rotation_arc(from, to)
}

/// Reject swings that are not finite or whose axis is ambiguous.
pub fn validate_swing(from: Vec3, to: Vec3, swing: Quat) -> Result<Quat, RetargetSkip> {
    if swing.is_finite() == false {
        return Err(RetargetSkip::NonFinite);
    }
    if from.dot(to) <= -1.0 + ANTIPARALLEL_EPSILON {
        return Err(RetargetSkip::Antiparallel);
    }
    Ok(swing)
}

/// Target local rotation: the bind rotation is the baseline so authored twist
/// survives, the swing is applied in the bone's bind frame.
pub fn compose_target(bind_rotation: Quat, swing: Quat) -> Quat {
    bind_rotation * swing
}

/// Move `current` toward `target` by `factor` of the remaining angle.
pub fn blend(current: Quat, target: Quat, factor: f32) -> Quat {
    current.slerp(target, factor.clamp(0.0, 1.0)).normalize()
}

/// Retarget a single parent to child link. On success returns the rotation
/// written to the parent bone.
pub fn retarget_link(
    nodes: &mut RigNodes,
    binding: &mut RigBinding,
    frame: &PoseFrame,
    parent: &str,
    child: &str,
    factor: f32,
) -> Result<Quat, RetargetSkip> {
    let parent_bone = binding
        .bones
        .get(parent)
        .ok_or_else(|| RetargetSkip::MissingBone(parent.to_string()))?;
    let child_bone = binding
        .bones
        .get(child)
        .ok_or_else(|| RetargetSkip::MissingBone(child.to_string()))?;
    let parent_coord = frame
        .joint(parent)
        .ok_or_else(|| RetargetSkip::MissingJoint(parent.to_string()))?;
    let child_coord = frame
        .joint(child)
        .ok_or_else(|| RetargetSkip::MissingJoint(child.to_string()))?;
    let bind_rotation = binding
        .bind
        .rotation(parent)
        .ok_or_else(|| RetargetSkip::MissingBindPose(parent.to_string()))?;

    let bind_dir = match binding.bind.direction(parent, child) {
        Some(direction) => direction,
        None => {
            let direction = bind_direction(nodes, parent_bone, child_bone)
                .ok_or_else(|| RetargetSkip::MissingBindPose(parent.to_string()))?;
            binding.bind.insert_direction(parent, child, direction);
            direction
        }
    };

    // Parent bone frame: current ancestors, bind rotation for the bone itself.
    let Some(local) = nodes.local_transform(parent_bone) else {
        return Err(RetargetSkip::MissingBone(parent.to_string()));
    };
    let bind_local = local.with_rotation(bind_rotation).compute_affine();
    let to_bone = (nodes.parent_world_affine(parent_bone) * bind_local).inverse();

    let parent_local = to_bone.transform_point3(binding.mapper.to_local(parent_coord));
    let child_local = to_bone.transform_point3(binding.mapper.to_local(child_coord));
    let desired = (child_local - parent_local)
        .try_normalize()
        .ok_or_else(|| RetargetSkip::Degenerate(parent.to_string(), child.to_string()))?;

    let swing = validate_swing(bind_dir, desired, shortest_arc(bind_dir, desired))?;
    let target = compose_target(bind_rotation, swing);
    if target.is_finite() == false {
        return Err(RetargetSkip::NonFinite);
    }

    let current = nodes.local_rotation(parent_bone).unwrap_or(bind_rotation);
    let rotation = blend(current, target, factor);
    if rotation.is_finite() == false {
        return Err(RetargetSkip::NonFinite);
    }

    nodes.set_local_rotation(parent_bone, rotation);
    Ok(rotation)
}

/// Retarget every link of `chain`, each independently.
pub fn retarget_chain(
    nodes: &mut RigNodes,
    binding: &mut RigBinding,
    frame: &PoseFrame,
    chain: &LimbChain,
    factor: f32,
) -> usize {
    let mut applied = 0;
    for (parent, child) in chain.links() {
        match retarget_link(nodes, binding, frame, parent, child, factor) {
            Ok(_) => applied += 1,
            Err(skip) if skip.is_rejection() => {
                debug!("Rejected `{parent}` -> `{child}`: {skip}")
            }
            Err(skip) => trace!("Skipped `{parent}` -> `{child}`: {skip}"),
        }
    }
    applied
}

/// Retarget all `chains` toward `frame`. Returns the number of links applied.
pub fn retarget_frame(
    nodes: &mut RigNodes,
    binding: &mut RigBinding,
    frame: &PoseFrame,
    chains: &[LimbChain],
    factor: f32,
) -> usize {
    chains
        .iter()
        .map(|chain| retarget_chain(nodes, binding, frame, chain, factor))
        .sum()
}

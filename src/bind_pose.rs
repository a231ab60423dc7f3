use bevy::prelude::*;
use bevy::utils::HashMap;

use crate::config::LimbChain;
use crate::rig::RigNodes;
use crate::skeleton::BoneMap;

/// Rest rotations and rest bone directions used as the retargeting baseline.
#[derive(Default, Debug, Clone)]
pub struct BindPose {
    /// Joint name to the bone's rest local rotation.
    rotations: HashMap<String, Quat>,
    /// (parent joint, child joint) to the unit direction from the parent bone
    /// to the child bone, in the parent bone's local space.
    directions: HashMap<(String, String), Vec3>,
}

impl BindPose {
    /// Record the current pose as the bind pose.
    ///
    /// Must run after the rig is back in its rest pose and the calibrated root
    /// transform has been written.
    pub fn capture(nodes: &RigNodes, bones: &BoneMap, chains: &[LimbChain]) -> Self {
        let mut bind_pose = Self::default();

        for (joint, bone) in bones.iter() {
            if let Some(rotation) = nodes.local_rotation(bone) {
                bind_pose.rotations.insert(joint.to_string(), rotation);
            }
        }

        for (parent, child) in chains.iter().flat_map(LimbChain::links) {
            let (Some(parent_bone), Some(child_bone)) = (bones.get(parent), bones.get(child))
            else {
                continue;
            };
            match bind_direction(nodes, parent_bone, child_bone) {
                Some(direction) => bind_pose.insert_direction(parent, child, direction),
                None => debug!("`{parent}` and `{child}` overlap, bind direction deferred."),
            }
        }

        bind_pose
    }

    pub fn rotation(&self, joint: &str) -> Option<Quat> {
        self.rotations.get(joint).copied()
    }

    pub fn direction(&self, parent: &str, child: &str) -> Option<Vec3> {
        self.directions
            .get(&(parent.to_string(), child.to_string()))
            .copied()
    }

    pub fn insert_direction(&mut self, parent: &str, child: &str, direction: Vec3) {
        self.directions
            .insert((parent.to_string(), child.to_string()), direction);
    }

    /// Put every mapped bone back into its bind rotation.
    pub fn restore(&self, nodes: &mut RigNodes, bones: &BoneMap) {
        for (joint, bone) in bones.iter() {
            if let Some(rotation) = self.rotation(joint) {
                nodes.set_local_rotation(bone, rotation);
            }
        }
    }
}

/// Direction from `parent_bone` to `child_bone` in the parent's local space.
pub fn bind_direction(nodes: &RigNodes, parent_bone: Entity, child_bone: Entity) -> Option<Vec3> {
    let child_world = nodes.world_translation(child_bone);
    nodes
        .world_affine(parent_bone)
        .inverse()
        .transform_point3(child_world)
        .try_normalize()
}

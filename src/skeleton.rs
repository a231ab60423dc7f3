//! Resolve semantic joint names to rig bones.

use bevy::prelude::*;
use bevy::utils::HashMap;

use crate::config::JointMap;
use crate::rig::RigNodes;

/// Maps joint name to its bone entity.
#[derive(Default, Debug, Clone)]
pub struct BoneMap {
    bones: HashMap<String, Entity>,
    /// Joints whose bone could not be found in the rig.
    unresolved: Vec<String>,
}

impl BoneMap {
    pub fn build(nodes: &RigNodes, root: Entity, joint_map: &JointMap) -> Self {
        let order = nodes.depth_first(root);
        let candidates = order
            .iter()
            .filter_map(|&e| nodes.name(e).map(|name| (e, name)))
            .collect::<Vec<_>>();

        let mut bone_map = Self::default();
        for (joint, bone_name) in joint_map.iter() {
            match match_name(&candidates, bone_name) {
                Some(entity) => {
                    bone_map.bones.insert(joint.to_string(), entity);
                }
                None => {
                    warn!("Joint `{joint}`: no bone matching `{bone_name}`, it will not be retargeted.");
                    bone_map.unresolved.push(joint.to_string());
                }
            }
        }

        bone_map
    }

    pub fn get(&self, joint: &str) -> Option<Entity> {
        self.bones.get(joint).copied()
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Entity)> {
        self.bones.iter().map(|(joint, &e)| (joint.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// Find the bone named `target` under `root`.
pub fn find_bone(nodes: &RigNodes, root: Entity, target: &str) -> Option<Entity> {
    let order = nodes.depth_first(root);
    let candidates = order
        .iter()
        .filter_map(|&e| nodes.name(e).map(|name| (e, name)))
        .collect::<Vec<_>>();
    match_name(&candidates, target)
}

/// Case-insensitive name lookup over nodes listed in traversal order.
///
/// An exact match anywhere wins, otherwise the first node whose name contains
/// `target` or is contained in it.
pub fn match_name<T: Copy>(candidates: &[(T, &str)], target: &str) -> Option<T> {
    let target = target.to_lowercase();
    if target.is_empty() {
        return None;
    }

    let lowered = candidates
        .iter()
        .filter(|(_, name)| name.is_empty() == false)
        .map(|&(node, name)| (node, name.to_lowercase()))
        .collect::<Vec<_>>();

    lowered
        .iter()
        .find(|(_, name)| *name == target)
        .or_else(|| {
            lowered
                .iter()
                .find(|(_, name)| name.contains(&target) || target.contains(name.as_str()))
        })
        .map(|&(node, _)| node)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXAMO: [(u32, &str); 8] = [
        (0, "Armature"),
        (1, "mixamorig:Hips"),
        (2, "mixamorig:Spine"),
        (3, "mixamorig:LeftArm"),
        (4, "mixamorig:LeftForeArm"),
        (5, "mixamorig:LeftHand"),
        (6, "mixamorig:LeftHandIndex1"),
        (7, "mixamorig:Head"),
    ];

    #[test]
    fn substring_match_follows_traversal_order() {
        assert_eq!(match_name(&MIXAMO, "LeftHand"), Some(5));
        assert_eq!(match_name(&MIXAMO, "leftarm"), Some(3));
        assert_eq!(match_name(&MIXAMO, "LeftForeArm"), Some(4));
        assert_eq!(match_name(&MIXAMO, "head"), Some(7));
    }

    #[test]
    fn exact_match_is_preferred() {
        let nodes = [(0, "HandleLeft"), (1, "Hand_L_helper"), (2, "hand")];
        assert_eq!(match_name(&nodes, "Hand"), Some(2));
    }

    #[test]
    fn node_name_contained_in_target() {
        let nodes = [(0, "Root"), (1, "Neck")];
        assert_eq!(match_name(&nodes, "mixamorig:Neck"), Some(1));
    }

    #[test]
    fn missing_bone_is_none() {
        assert_eq!(match_name(&MIXAMO, "RightShoulder"), None);
        assert_eq!(match_name(&MIXAMO, ""), None);
    }

    #[test]
    fn empty_names_never_match() {
        let nodes = [(0, ""), (1, "Spine")];
        assert_eq!(match_name(&nodes, "Spine"), Some(1));
        assert_eq!(match_name(&nodes, "Chest"), None);
    }
}

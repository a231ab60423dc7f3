#![allow(dead_code)]

use bevy::ecs::system::SystemState;
use bevy::prelude::*;
use bevy::render::primitives::Aabb;
use bevy::utils::HashMap;
use bevy_pose_retarget::prelude::*;

/// Height of the test character's mesh before calibration.
pub const MESH_HEIGHT: f32 = 2.0;

/// Bind rotation of the left upper arm, deliberately not identity.
pub fn left_arm_bind() -> Quat {
    Quat::from_rotation_z(-0.4) * Quat::from_rotation_x(0.3)
}

/// A Mixamo style humanoid facing +Z under an `Armature` node.
pub struct TestRig {
    pub root: Entity,
    pub armature: Entity,
    pub mesh: Entity,
    nodes: HashMap<&'static str, Entity>,
}

impl TestRig {
    /// Entity of the node named `mixamorig:{name}`.
    pub fn bone(&self, name: &str) -> Entity {
        self.nodes[name]
    }
}

fn spawn_node(
    world: &mut World,
    parent: Entity,
    name: impl Into<std::borrow::Cow<'static, str>>,
    transform: Transform,
) -> Entity {
    let node = world.spawn((Name::new(name), transform)).id();
    world.entity_mut(parent).add_child(node);
    node
}

/// Spawn the test character under `root`. `armature_rotation` rotates the
/// whole character, e.g. to author it Z-up or facing away.
pub fn build_rig(world: &mut World, root: Entity, armature_rotation: Quat) -> TestRig {
    let armature = spawn_node(
        world,
        root,
        "Armature",
        Transform::from_rotation(armature_rotation),
    );

    let mut nodes = HashMap::default();
    let mut bone = |world: &mut World, parent: Entity, name: &'static str, transform: Transform| {
        let entity = spawn_node(world, parent, format!("mixamorig:{name}"), transform);
        nodes.insert(name, entity);
        entity
    };

    let hips = bone(world, armature, "Hips", Transform::from_xyz(0.0, 1.0, 0.0));
    let spine = bone(world, hips, "Spine", Transform::from_xyz(0.0, 0.3, 0.0));
    let head = bone(world, spine, "Head", Transform::from_xyz(0.0, 0.5, 0.0));
    bone(world, head, "Nose", Transform::from_xyz(0.0, 0.05, 0.1));

    let left_arm = bone(
        world,
        spine,
        "LeftArm",
        Transform::from_xyz(0.2, 0.4, 0.0).with_rotation(left_arm_bind()),
    );
    let left_fore_arm = bone(world, left_arm, "LeftForeArm", Transform::from_xyz(0.3, 0.0, 0.0));
    bone(world, left_fore_arm, "LeftHand", Transform::from_xyz(0.25, 0.0, 0.0));

    let right_arm = bone(world, spine, "RightArm", Transform::from_xyz(-0.2, 0.4, 0.0));
    let right_fore_arm = bone(
        world,
        right_arm,
        "RightForeArm",
        Transform::from_xyz(-0.3, 0.0, 0.0),
    );
    bone(world, right_fore_arm, "RightHand", Transform::from_xyz(-0.25, 0.0, 0.0));

    bone(world, hips, "LeftUpLeg", Transform::from_xyz(0.1, 0.0, 0.0));
    bone(world, hips, "RightUpLeg", Transform::from_xyz(-0.1, 0.0, 0.0));

    let mesh = world
        .spawn((
            Name::new("Body"),
            Transform::default(),
            Handle::<Mesh>::default(),
            Aabb::from_min_max(
                Vec3::new(-0.8, 0.0, -0.15),
                Vec3::new(0.8, MESH_HEIGHT, 0.15),
            ),
        ))
        .id();
    world.entity_mut(armature).add_child(mesh);

    TestRig {
        root,
        armature,
        mesh,
        nodes,
    }
}

/// Spawn a bare rig root with the test character below it.
pub fn spawn_rig(world: &mut World, armature_rotation: Quat) -> TestRig {
    let root = world
        .spawn((Name::new("Avatar"), Transform::default()))
        .id();
    build_rig(world, root, armature_rotation)
}

/// World position of `entity`, computed the way the engine does it.
pub fn world_position(world: &mut World, entity: Entity) -> Vec3 {
    let mut state: SystemState<RigNodes> = SystemState::new(world);
    let nodes = state.get_mut(world);
    nodes.world_translation(entity)
}

/// Animation coordinates that map back onto `world_position` with a unit
/// mapper, which only negates depth.
pub fn to_anim(world_position: Vec3) -> [f32; 3] {
    [world_position.x, world_position.y, -world_position.z]
}

/// A frame whose joints sit exactly on the bones of `rig` as they are now.
pub fn frame_from_rig(world: &mut World, rig: &TestRig, joint_map: &JointMap) -> PoseFrame {
    let mut joints = std::collections::HashMap::new();
    for (joint, bone_name) in joint_map.iter() {
        let Some(&bone) = rig.nodes.get(bone_name) else {
            continue;
        };
        joints.insert(joint.to_string(), to_anim(world_position(world, bone)));
    }

    PoseFrame {
        joints,
        ..default()
    }
}

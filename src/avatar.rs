//! The playback session: a rig bound to a pose animation.

use bevy::prelude::*;
use bevy_pose_anim::prelude::*;

use crate::bind_pose::BindPose;
use crate::calibration::{calibrate, Calibration};
use crate::config::RetargetConfig;
use crate::mapper::{CoordinateMapper, LEFT_SHOULDER, RIGHT_SHOULDER};
use crate::playback::{PlaybackCommand, PosePlayer};
use crate::retarget::retarget_frame;
use crate::rig::{OriginTransform, RigNodes};
use crate::skeleton::BoneMap;

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvatarSet {
    /// Detect rig loads and swaps, bind newly ready rigs.
    TrackRig,
    /// Recalibrate when the target height changes.
    Calibrate,
    /// React to the selected animation changing.
    SwapSequence,
    Advance,
    Retarget,
}

/// Root of a retargeted rig.
#[derive(Component, Default)]
pub struct PoseAvatar;

/// The animation played on every avatar.
#[derive(Resource, Default, Debug, Clone)]
pub struct SelectedPoseAnim(pub Option<Handle<PoseAnimAsset>>);

impl SelectedPoseAnim {
    pub fn id(&self) -> Option<AssetId<PoseAnimAsset>> {
        self.0.as_ref().map(Handle::id)
    }
}

/// Present on an avatar until its rig is ready to be bound.
#[derive(Component, Default, Debug)]
pub struct RigLoading {
    /// Rest transforms have been recorded, bind on the next frame.
    settled: bool,
}

#[derive(Bundle, Default)]
pub struct PoseAvatarBundle {
    pub marker: PoseAvatar,
    pub player: PosePlayer,
    pub loading: RigLoading,
}

/// Everything derived from a loaded rig. Rebuilt as a whole whenever the rig,
/// the target height or the sequence changes.
#[derive(Component, Debug, Clone)]
pub struct RigBinding {
    pub bones: BoneMap,
    pub bind: BindPose,
    /// `None` when the rig had no mesh geometry to calibrate against.
    pub calibration: Option<Calibration>,
    pub mapper: CoordinateMapper,
    /// Sequence `mapper` was derived from.
    pub mapper_sequence: Option<AssetId<PoseAnimAsset>>,
    pub target_height: f32,
}

impl RigBinding {
    /// Reset the rig to its rest pose, calibrate it and record its bind pose.
    pub fn build(nodes: &mut RigNodes, root: Entity, config: &RetargetConfig) -> Self {
        nodes.restore_rest_pose(root);
        if config.trace_hierarchy {
            nodes.trace_hierarchy(root);
        }

        let bones = BoneMap::build(nodes, root, &config.joint_map);
        let calibration = calibrate(nodes, root, config);
        let bind = BindPose::capture(nodes, &bones, &config.chains);

        info!(
            "Bound rig {root:?}: {} bones mapped, {} unresolved.",
            bones.len(),
            bones.unresolved().len()
        );

        Self {
            bones,
            bind,
            calibration,
            mapper: CoordinateMapper::normalized(config.target_height),
            mapper_sequence: None,
            target_height: config.target_height,
        }
    }

    /// World positions of the shoulder bones after calibration.
    pub fn model_shoulders(&self, nodes: &RigNodes) -> Option<(Vec3, Vec3)> {
        let left = self.bones.get(LEFT_SHOULDER)?;
        let right = self.bones.get(RIGHT_SHOULDER)?;
        Some((nodes.world_translation(left), nodes.world_translation(right)))
    }

    /// Derive the coordinate mapper from `anim`'s first frame.
    pub fn bind_sequence(
        &mut self,
        nodes: &RigNodes,
        id: AssetId<PoseAnimAsset>,
        anim: &PoseAnimAsset,
    ) {
        self.mapper = CoordinateMapper::from_first_frame(
            anim.frame(0),
            self.model_shoulders(nodes),
            self.target_height,
        );
        self.mapper_sequence = Some(id);
    }

    pub fn restore_bind_pose(&self, nodes: &mut RigNodes) {
        self.bind.restore(nodes, &self.bones);
    }
}

/// Start over whenever the scene of an avatar is replaced.
///
/// Playback is dropped with the binding, the selected sequence is loaded
/// again by `swap_sequence` once the new rig is bound.
pub(crate) fn track_rig_swaps(
    mut commands: Commands,
    mut q_swapped: Query<
        (Entity, &mut PosePlayer),
        (With<PoseAvatar>, Changed<Handle<Scene>>, Without<RigLoading>),
    >,
    mut nodes: RigNodes,
) {
    for (entity, mut player) in q_swapped.iter_mut() {
        info!("Rig of {entity:?} replaced, rebinding.");
        player.load_sequence(None);
        if let Some(origin) = nodes.origin(entity) {
            nodes.set_root_transform(entity, origin);
        }
        commands
            .entity(entity)
            .remove::<RigBinding>()
            .insert(RigLoading::default());
    }
}

/// Bind rigs once their scene has loaded and been spawned.
///
/// The first ready frame records rest transforms, binding happens on the
/// next one so the recorded components are visible.
pub(crate) fn bind_loaded_rigs(
    mut commands: Commands,
    mut q_loading: Query<(Entity, &mut RigLoading, Option<&Handle<Scene>>), With<PoseAvatar>>,
    mut nodes: RigNodes,
    server: Res<AssetServer>,
    config: Res<RetargetConfig>,
) {
    for (entity, mut loading, scene) in q_loading.iter_mut() {
        if let Some(scene) = scene {
            if server.is_loaded_with_dependencies(scene) == false {
                continue;
            }
        }
        if nodes.has_descendants(entity) == false {
            continue;
        }

        if loading.settled == false {
            for node in nodes.depth_first(entity) {
                // Keep the authored root transform across rig swaps.
                if node == entity && nodes.origin(entity).is_some() {
                    continue;
                }
                if let Some(transform) = nodes.local_transform(node) {
                    commands
                        .entity(node)
                        .insert(OriginTransform::new(transform));
                }
            }
            loading.settled = true;
            continue;
        }

        let binding = RigBinding::build(&mut nodes, entity, &config);
        commands
            .entity(entity)
            .remove::<RigLoading>()
            .insert(binding);
    }
}

/// Rebuild bindings whose calibration no longer matches the configuration.
pub(crate) fn recalibrate(
    config: Res<RetargetConfig>,
    mut q_avatars: Query<(Entity, &mut RigBinding, &mut PosePlayer), With<PoseAvatar>>,
    mut nodes: RigNodes,
) {
    for (entity, mut binding, mut player) in q_avatars.iter_mut() {
        if binding.target_height == config.target_height {
            continue;
        }

        info!(
            "Target height changed to {}, recalibrating {entity:?}.",
            config.target_height
        );
        *binding = RigBinding::build(&mut nodes, entity, &config);
        // Mapper is rebuilt against the new calibration in `swap_sequence`.
        player.restart();
    }
}

/// Reset playback and restore the bind pose when the selected sequence
/// changes, then derive the coordinate mapper once the sequence is loaded.
pub(crate) fn swap_sequence(
    selected: Res<SelectedPoseAnim>,
    anims: Res<Assets<PoseAnimAsset>>,
    mut anim_evr: EventReader<AssetEvent<PoseAnimAsset>>,
    config: Res<RetargetConfig>,
    mut q_avatars: Query<(&mut RigBinding, &mut PosePlayer), With<PoseAvatar>>,
    mut nodes: RigNodes,
) {
    let selected_id = selected.id();
    // Read every event so none leak into the next frame.
    let modified = anim_evr.read().fold(false, |modified, event| {
        modified || matches!(event, AssetEvent::Modified { id } if Some(*id) == selected_id)
    });

    for (mut binding, mut player) in q_avatars.iter_mut() {
        if player.sequence() != selected_id || modified {
            binding.restore_bind_pose(&mut nodes);
            binding.mapper_sequence = None;
            player.load_sequence(selected_id);
            player.set_fps(config.fps);
            if config.autoplay {
                player.play();
            }
        }

        let Some(id) = player.sequence() else {
            continue;
        };
        if binding.mapper_sequence == Some(id) {
            continue;
        }
        let Some(anim) = anims.get(id) else {
            continue;
        };

        binding.bind_sequence(&nodes, id, anim);
        info!(
            "Sequence {id:?} bound: {} frames, normalized fallback: {}.",
            anim.len(),
            binding.mapper.uses_fallback()
        );
    }
}

/// Apply playback commands and advance the player of every bound avatar by
/// the frame delta. Avatars still loading their rig hold still.
pub(crate) fn advance_players(
    mut command_evr: EventReader<PlaybackCommand>,
    time: Res<Time>,
    anims: Res<Assets<PoseAnimAsset>>,
    config: Res<RetargetConfig>,
    mut q_avatars: Query<(&mut PosePlayer, &RigBinding), With<PoseAvatar>>,
    mut nodes: RigNodes,
) {
    let commands = command_evr.read().copied().collect::<Vec<_>>();

    for (mut player, binding) in q_avatars.iter_mut() {
        for &command in commands.iter() {
            player.apply(command);
            if command == PlaybackCommand::Restart {
                binding.restore_bind_pose(&mut nodes);
            }
        }

        if player.fps() != config.fps {
            player.set_fps(config.fps);
        }

        let len = player
            .sequence()
            .and_then(|id| anims.get(id))
            .map_or(0, PoseAnimAsset::len);
        player.advance(time.delta_seconds(), len);
    }
}

/// Drive the bones of every bound avatar toward the current frame.
pub(crate) fn retarget_avatars(
    anims: Res<Assets<PoseAnimAsset>>,
    config: Res<RetargetConfig>,
    mut q_avatars: Query<(&mut RigBinding, &PosePlayer), With<PoseAvatar>>,
    mut nodes: RigNodes,
) {
    for (mut binding, player) in q_avatars.iter_mut() {
        let Some(id) = player.sequence() else {
            continue;
        };
        // Wait for the mapper of this sequence.
        if binding.mapper_sequence != Some(id) {
            continue;
        }
        let Some(frame) = anims.get(id).and_then(|a| a.frame(player.frame_index())) else {
            continue;
        };

        retarget_frame(
            &mut nodes,
            &mut binding,
            frame,
            &config.chains,
            config.blend_factor,
        );
    }
}

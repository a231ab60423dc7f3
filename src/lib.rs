use bevy::prelude::*;
use bevy_pose_anim::prelude::*;

pub mod avatar;
pub mod bind_pose;
pub mod calibration;
pub mod camera;
pub mod config;
pub mod mapper;
pub mod playback;
pub mod retarget;
pub mod rig;
pub mod scene_loader;
pub mod skeleton;
pub mod ui;

pub mod prelude {
    pub use crate::avatar::{
        AvatarSet, PoseAvatar, PoseAvatarBundle, RigBinding, RigLoading, SelectedPoseAnim,
    };
    pub use crate::config::{JointMap, LimbChain, RetargetConfig};
    pub use crate::playback::{PlaybackCommand, PosePlayer};
    pub use crate::rig::{OriginTransform, RigNodes};
    pub use crate::{PoseRetargetAppPlugin, PoseRetargetPlugin};
    pub use bevy_pose_anim::prelude::*;
}

/// Retargeting systems without any windowing, rendering or UI.
pub struct PoseRetargetPlugin;

impl Plugin for PoseRetargetPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PoseAnimAssetPlugin)
            .init_resource::<config::RetargetConfig>()
            .init_resource::<avatar::SelectedPoseAnim>()
            .add_event::<playback::PlaybackCommand>()
            .register_type::<rig::OriginTransform>()
            .configure_sets(
                Update,
                (
                    avatar::AvatarSet::TrackRig,
                    avatar::AvatarSet::Calibrate,
                    avatar::AvatarSet::SwapSequence,
                    avatar::AvatarSet::Advance,
                    avatar::AvatarSet::Retarget,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    // A swap seen this frame binds after the scene spawner
                    // has replaced the old instance.
                    (avatar::bind_loaded_rigs, avatar::track_rig_swaps)
                        .chain()
                        .in_set(avatar::AvatarSet::TrackRig),
                    avatar::recalibrate.in_set(avatar::AvatarSet::Calibrate),
                    avatar::swap_sequence.in_set(avatar::AvatarSet::SwapSequence),
                    avatar::advance_players.in_set(avatar::AvatarSet::Advance),
                    avatar::retarget_avatars.in_set(avatar::AvatarSet::Retarget),
                ),
            );
    }
}

/// The interactive viewer: window, scene, camera and control panel.
pub struct PoseRetargetAppPlugin;

impl Plugin for PoseRetargetAppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            DefaultPlugins,
            PoseRetargetPlugin,
            scene_loader::SceneLoaderPlugin,
            camera::CameraPlugin,
            ui::UiPlugin,
        ));

        #[cfg(feature = "debug")]
        app.add_plugins(bevy_inspector_egui::quick::WorldInspectorPlugin::new());
    }
}

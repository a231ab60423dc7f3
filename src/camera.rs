use bevy::{
    core_pipeline::{
        bloom::BloomSettings,
        tonemapping::{DebandDither, Tonemapping},
    },
    prelude::*,
};

use crate::avatar::{AvatarSet, PoseAvatar, RigBinding};
use crate::calibration::{frame_camera, FramingSphere};
use crate::config::RetargetConfig;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Msaa::default())
            .add_systems(Startup, spawn_camera)
            .add_systems(Update, frame_avatar_camera.after(AvatarSet::Calibrate));
    }
}

/// Camera that keeps the calibrated avatar in view.
#[derive(Component, Default, Debug)]
pub struct AvatarCamera {
    /// Sphere, aspect ratio and margin of the last framing.
    framed_for: Option<(FramingSphere, f32, f32)>,
}

pub fn spawn_camera(mut commands: Commands) {
    commands
        .spawn(Camera3dBundle {
            camera: Camera {
                hdr: true,
                ..default()
            },
            deband_dither: DebandDither::Enabled,
            tonemapping: Tonemapping::AcesFitted,
            transform: Transform::from_xyz(0.0, 1.0, 4.0).looking_at(Vec3::Y * 0.8, Vec3::Y),
            ..default()
        })
        .insert((AvatarCamera::default(), BloomSettings::default()));
}

/// Re-frame the camera whenever the calibration, the viewport aspect ratio or
/// the margin changes.
pub fn frame_avatar_camera(
    mut q_camera: Query<(&mut Transform, &Projection, &mut AvatarCamera)>,
    q_avatars: Query<&RigBinding, With<PoseAvatar>>,
    config: Res<RetargetConfig>,
) {
    let Some(sphere) = q_avatars
        .iter()
        .find_map(|binding| binding.calibration.map(|c| c.sphere))
    else {
        return;
    };

    for (mut transform, projection, mut camera) in q_camera.iter_mut() {
        let Projection::Perspective(perspective) = projection else {
            continue;
        };

        let framing = (sphere, perspective.aspect_ratio, config.camera_margin);
        if camera.framed_for == Some(framing) {
            continue;
        }

        *transform = frame_camera(
            &sphere,
            perspective.fov,
            perspective.aspect_ratio,
            config.camera_margin,
        );
        camera.framed_for = Some(framing);
    }
}

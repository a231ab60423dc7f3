use bevy::color::palettes::css;
use bevy::prelude::*;
use bevy_gltf::GltfAssetLabel;

use crate::avatar::{PoseAvatarBundle, SelectedPoseAnim};

pub const DEFAULT_RIG_PATH: &str = "glb/avatar.glb";
pub const DEFAULT_ANIMATION_PATH: &str = "animations/default.pose.json";

/// Load the rig and the animation and set up the scene.
pub struct SceneLoaderPlugin;

impl Plugin for SceneLoaderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AvatarAssets>()
            .add_systems(Startup, (spawn_avatar, spawn_light, spawn_ground));
    }
}

/// Asset paths of the avatar, relative to the asset folder.
#[derive(Resource, Debug, Clone)]
pub struct AvatarAssets {
    pub rig_path: String,
    pub animation_path: String,
}

impl Default for AvatarAssets {
    fn default() -> Self {
        Self {
            rig_path: DEFAULT_RIG_PATH.to_string(),
            animation_path: DEFAULT_ANIMATION_PATH.to_string(),
        }
    }
}

fn spawn_avatar(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    assets: Res<AvatarAssets>,
    mut selected: ResMut<SelectedPoseAnim>,
) {
    // spawn the first scene in the file
    let scene = asset_server.load(GltfAssetLabel::Scene(0).from_asset(assets.rig_path.clone()));
    info!("Loading rig: {}", assets.rig_path);
    commands.spawn((
        Name::new("Avatar"),
        SceneBundle { scene, ..default() },
        PoseAvatarBundle::default(),
    ));

    info!("Loading animation: {}", assets.animation_path);
    selected.0 = Some(asset_server.load(assets.animation_path.clone()));
}

fn spawn_light(mut commands: Commands) {
    commands
        .spawn(DirectionalLightBundle {
            directional_light: DirectionalLight {
                shadows_enabled: true,
                ..default()
            },
            ..default()
        })
        .insert(Transform::from_rotation(Quat::from_euler(
            EulerRot::XYZ,
            f32::to_radians(-45.0),
            f32::to_radians(45.0),
            0.0,
        )));
}

fn spawn_ground(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let size = 10.0;
    commands.spawn((
        PbrBundle {
            mesh: meshes.add(Plane3d::default().mesh().size(size, size)),
            material: materials.add(StandardMaterial {
                base_color: css::DARK_SLATE_GRAY.into(),
                reflectance: 0.5,
                metallic: 0.5,
                ..default()
            }),
            ..default()
        },
        GroundPlane,
    ));
}

#[derive(Component)]
pub struct GroundPlane;

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy_pose_retarget::prelude::*;

mod common;
use common::*;

/// Every update advances time by half a frame at 10 fps.
const FPS: u32 = 10;
const UPDATE_DELTA: Duration = Duration::from_millis(50);

fn setup_test_app() -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, AssetPlugin::default(), PoseRetargetPlugin));
    app.insert_resource(TimeUpdateStrategy::ManualDuration(UPDATE_DELTA))
        .insert_resource(RetargetConfig {
            fps: FPS,
            ..default()
        });
    app
}

fn spawn_avatar(app: &mut App) -> TestRig {
    let world = app.world_mut();
    let root = world
        .spawn((
            Name::new("Avatar"),
            Transform::default(),
            PoseAvatarBundle::default(),
        ))
        .id();
    build_rig(world, root, Quat::IDENTITY)
}

/// Spawn an avatar and run until its rig is bound.
fn bound_avatar(app: &mut App) -> TestRig {
    let rig = spawn_avatar(app);
    // Settle frame, then bind.
    app.update();
    assert!(app.world().get::<RigBinding>(rig.root).is_none());
    app.update();
    assert!(app.world().get::<RigBinding>(rig.root).is_some());
    rig
}

fn player(app: &App, rig: &TestRig) -> PosePlayer {
    app.world().get::<PosePlayer>(rig.root).unwrap().clone()
}

fn rotation(app: &App, entity: Entity) -> Quat {
    app.world().get::<Transform>(entity).unwrap().rotation
}

/// `len` frames with the left arm hanging down.
fn arm_down_anim(app: &mut App, rig: &TestRig, len: usize) -> PoseAnimAsset {
    let config = app.world().resource::<RetargetConfig>().clone();
    let world = app.world_mut();
    let mut frame = frame_from_rig(world, rig, &config.joint_map);
    let shoulder = world_position(world, rig.bone("LeftArm"));
    frame
        .joints
        .insert("leftElbow".to_string(), to_anim(shoulder - Vec3::Y * 0.3));
    frame
        .joints
        .insert("leftWrist".to_string(), to_anim(shoulder - Vec3::Y * 0.55));

    PoseAnimAsset::new(vec![frame; len])
}

/// A single frame matching the bind pose.
fn bind_pose_anim(app: &mut App, rig: &TestRig) -> PoseAnimAsset {
    let config = app.world().resource::<RetargetConfig>().clone();
    let frame = frame_from_rig(app.world_mut(), rig, &config.joint_map);
    PoseAnimAsset::new(vec![frame])
}

fn select(app: &mut App, anim: PoseAnimAsset) -> Handle<PoseAnimAsset> {
    let handle = app
        .world_mut()
        .resource_mut::<Assets<PoseAnimAsset>>()
        .add(anim);
    app.world_mut().resource_mut::<SelectedPoseAnim>().0 = Some(handle.clone());
    handle
}

#[test]
fn rig_is_calibrated_once_loaded() {
    let mut app = setup_test_app();
    let rig = bound_avatar(&mut app);

    let binding = app.world().get::<RigBinding>(rig.root).unwrap();
    let calibration = binding.calibration.expect("rig has a mesh");
    assert!((calibration.scale() - 1.6 / MESH_HEIGHT).abs() < 1e-5);
    assert!(binding.bones.unresolved().is_empty());

    let root_transform = app.world().get::<Transform>(rig.root).unwrap();
    assert_eq!(*root_transform, calibration.root_transform);
    assert!(app.world().get::<OriginTransform>(rig.bone("LeftArm")).is_some());
}

#[test]
fn selected_sequence_autoplays_at_fixed_rate() {
    let mut app = setup_test_app();
    let rig = bound_avatar(&mut app);
    let anim = arm_down_anim(&mut app, &rig, 4);
    let handle = select(&mut app, anim);

    app.update();
    let state = player(&app, &rig);
    assert_eq!(state.sequence(), Some(handle.id()));
    assert!(state.is_playing());
    assert_eq!(state.frame_index(), 0);

    // Two updates per frame, looping over four frames.
    let mut indices = Vec::new();
    for _ in 0..8 {
        app.update();
        indices.push(player(&app, &rig).frame_index());
    }
    assert_eq!(indices, vec![1, 1, 2, 2, 3, 3, 0, 0]);

    let binding = app.world().get::<RigBinding>(rig.root).unwrap();
    assert_eq!(binding.mapper_sequence, Some(handle.id()));
    assert!(binding.mapper.uses_fallback() == false);
    assert!((binding.mapper.anim_to_model - 1.0).abs() < 1e-4);

    // The arm has been moving toward the animation.
    assert!(rotation(&app, rig.bone("LeftArm")).abs_diff_eq(left_arm_bind(), 1e-3) == false);
}

#[test]
fn sequence_swap_resets_playback_and_bind_pose() {
    let mut app = setup_test_app();
    let rig = bound_avatar(&mut app);
    let bind_anim = bind_pose_anim(&mut app, &rig);
    let anim = arm_down_anim(&mut app, &rig, 20);
    select(&mut app, anim);

    for _ in 0..7 {
        app.update();
    }
    assert!(player(&app, &rig).frame_index() > 0);
    assert!(rotation(&app, rig.bone("LeftArm")).abs_diff_eq(left_arm_bind(), 1e-3) == false);

    let handle = select(&mut app, bind_anim);
    app.update();

    let state = player(&app, &rig);
    assert_eq!(state.sequence(), Some(handle.id()));
    assert_eq!(state.frame_index(), 0);
    // Blending alone would only close part of the gap.
    assert!(rotation(&app, rig.bone("LeftArm")).abs_diff_eq(left_arm_bind(), 1e-4));
}

#[test]
fn playback_commands_are_applied() {
    let mut app = setup_test_app();
    let rig = bound_avatar(&mut app);
    let anim = arm_down_anim(&mut app, &rig, 20);
    select(&mut app, anim);

    for _ in 0..6 {
        app.update();
    }
    let paused_at = player(&app, &rig).frame_index();
    assert!(paused_at > 0);

    app.world_mut().send_event(PlaybackCommand::Pause);
    for _ in 0..4 {
        app.update();
    }
    let state = player(&app, &rig);
    assert!(state.is_playing() == false);
    assert_eq!(state.frame_index(), paused_at);

    app.world_mut().send_event(PlaybackCommand::Restart);
    app.update();
    let state = player(&app, &rig);
    assert_eq!(state.frame_index(), 0);
    assert!(state.is_playing() == false);
    // Paused on the first frame, the rig still eases toward it.
    assert!(rotation(&app, rig.bone("LeftArm")).abs_diff_eq(left_arm_bind(), 1e-3) == false);

    app.world_mut().send_event(PlaybackCommand::Toggle);
    app.update();
    assert!(player(&app, &rig).is_playing());
}

#[test]
fn modified_sequence_restarts_playback() {
    let mut app = setup_test_app();
    let rig = bound_avatar(&mut app);
    let anim = arm_down_anim(&mut app, &rig, 20);
    let handle = select(&mut app, anim);

    for _ in 0..16 {
        app.update();
    }
    assert!(player(&app, &rig).frame_index() >= 5);

    let mut assets = app.world_mut().resource_mut::<Assets<PoseAnimAsset>>();
    assert!(assets.get_mut(&handle).is_some());
    // Wait for the modified event to be flushed and read.
    app.update();
    app.update();

    assert!(player(&app, &rig).frame_index() <= 1);
}

#[test]
fn target_height_change_recalibrates() {
    let mut app = setup_test_app();
    let rig = bound_avatar(&mut app);
    let anim = arm_down_anim(&mut app, &rig, 20);
    select(&mut app, anim);
    for _ in 0..5 {
        app.update();
    }

    app.world_mut().resource_mut::<RetargetConfig>().target_height = 0.8;
    app.update();

    let binding = app.world().get::<RigBinding>(rig.root).unwrap();
    assert_eq!(binding.target_height, 0.8);
    let calibration = binding.calibration.unwrap();
    assert!((calibration.scale() - 0.8 / MESH_HEIGHT).abs() < 1e-5);

    let root_scale = app.world().get::<Transform>(rig.root).unwrap().scale;
    assert!(root_scale.abs_diff_eq(Vec3::splat(0.4), 1e-5));
    assert_eq!(player(&app, &rig).frame_index(), 0);
}

#[test]
fn rig_swap_restarts_playback_once_rebound() {
    let mut app = setup_test_app();
    let rig = bound_avatar(&mut app);
    let anim = arm_down_anim(&mut app, &rig, 20);
    let handle = select(&mut app, anim);

    for _ in 0..12 {
        app.update();
    }
    assert!(player(&app, &rig).frame_index() > 0);

    // A new scene handle marks the rig as replaced.
    app.world_mut()
        .entity_mut(rig.root)
        .insert(Handle::<Scene>::default());
    app.update();
    assert!(app.world().get::<RigBinding>(rig.root).is_none());
    assert!(app.world().get::<RigLoading>(rig.root).is_some());
    assert_eq!(player(&app, &rig).frame_index(), 0);

    // The code-built hierarchy stands in for the spawned scene.
    app.world_mut().entity_mut(rig.root).remove::<Handle<Scene>>();
    for _ in 0..4 {
        app.update();
        if app.world().get::<RigBinding>(rig.root).is_some() {
            break;
        }
        assert_eq!(player(&app, &rig).frame_index(), 0);
    }
    assert!(app.world().get::<RigBinding>(rig.root).is_some());

    let state = player(&app, &rig);
    assert_eq!(state.sequence(), Some(handle.id()));
    assert!(state.is_playing());
    assert_eq!(state.frame_index(), 0);

    // Playback picks up from the start on the new rig.
    app.update();
    assert_eq!(player(&app, &rig).frame_index(), 1);
}

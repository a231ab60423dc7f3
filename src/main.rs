use bevy::prelude::*;
use bevy_pose_retarget::config::RetargetConfig;
use bevy_pose_retarget::scene_loader::AvatarAssets;
use bevy_pose_retarget::PoseRetargetAppPlugin;

/// Usage: `bevy_pose_retarget [rig.glb] [animation.json] [config.json]`
fn main() -> AppExit {
    let args: Vec<String> = std::env::args().collect();

    let mut app = App::new();
    // Adds the log plugin, everything below can log.
    app.add_plugins(PoseRetargetAppPlugin);

    let mut assets = AvatarAssets::default();
    if let Some(rig_path) = args.get(1) {
        assets.rig_path = rig_path.clone();
    }
    if let Some(animation_path) = args.get(2) {
        assets.animation_path = animation_path.clone();
    }
    app.insert_resource(assets);

    if let Some(path) = args.get(3) {
        match RetargetConfig::from_file(path) {
            Ok(config) => {
                info!("Loaded retarget config from `{path}`.");
                app.insert_resource(config);
            }
            Err(err) => error!("{err}, using the default config."),
        }
    }

    app.run()
}

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin};
use bevy_pose_anim::prelude::*;

use crate::avatar::{PoseAvatar, SelectedPoseAnim};
use crate::config::RetargetConfig;
use crate::playback::{PlaybackCommand, PosePlayer};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin)
            .add_systems(Update, (ui, playback_hotkeys));
    }
}

pub fn playback_menu(
    ui: &mut egui::Ui,
    player: Option<&PosePlayer>,
    len: usize,
    command_evw: &mut EventWriter<PlaybackCommand>,
) {
    ui.horizontal(|ui| {
        let button_text = match player.is_some_and(PosePlayer::is_playing) {
            true => "Pause",
            false => "Play",
        };
        if ui.button(button_text).clicked() {
            command_evw.send(PlaybackCommand::Toggle);
        }
        if ui.button("Restart").clicked() {
            command_evw.send(PlaybackCommand::Restart);
        }
    });

    match player {
        Some(player) if len > 0 => {
            ui.label(format!("Frame: {} / {}", player.frame_index() + 1, len));
        }
        _ => {
            ui.label("No animation loaded.");
        }
    }
}

/// Fields are only written back on change, keeping the resource unchanged
/// on idle frames.
pub fn config_menu(ui: &mut egui::Ui, config: &mut ResMut<RetargetConfig>) {
    let mut target_height = config.target_height;
    if ui
        .add(egui::Slider::new(&mut target_height, 0.5..=3.0).text("Target Height"))
        .changed()
    {
        config.target_height = target_height;
    }

    let mut fps = config.fps;
    if ui
        .add(egui::Slider::new(&mut fps, 1..=120).text("Fps"))
        .changed()
    {
        config.fps = fps;
    }

    let mut blend_factor = config.blend_factor;
    if ui
        .add(egui::Slider::new(&mut blend_factor, 0.0..=1.0).text("Blend Factor"))
        .changed()
    {
        config.blend_factor = blend_factor;
    }

    let mut autoplay = config.autoplay;
    if ui.checkbox(&mut autoplay, "Autoplay").changed() {
        config.autoplay = autoplay;
    }
}

fn ui(
    mut contexts: EguiContexts,
    mut config: ResMut<RetargetConfig>,
    mut command_evw: EventWriter<PlaybackCommand>,
    selected: Res<SelectedPoseAnim>,
    anims: Res<Assets<PoseAnimAsset>>,
    q_players: Query<&PosePlayer, With<PoseAvatar>>,
) {
    let ctx = contexts.ctx_mut();

    let len = selected
        .id()
        .and_then(|id| anims.get(id))
        .map_or(0, PoseAnimAsset::len);

    egui::SidePanel::right("right_panel")
        .resizable(false)
        .show(ctx, |ui| {
            ui.heading("Playback");
            ui.add_space(10.0);
            playback_menu(ui, q_players.iter().next(), len, &mut command_evw);
            ui.add_space(10.0);
            ui.heading("Configurations");
            ui.add_space(10.0);
            config_menu(ui, &mut config);
        });
}

fn playback_hotkeys(
    keys: Res<ButtonInput<KeyCode>>,
    mut contexts: EguiContexts,
    mut command_evw: EventWriter<PlaybackCommand>,
) {
    if contexts.ctx_mut().wants_keyboard_input() {
        return;
    }

    if keys.just_pressed(KeyCode::Space) {
        command_evw.send(PlaybackCommand::Toggle);
    }
    if keys.just_pressed(KeyCode::KeyR) {
        command_evw.send(PlaybackCommand::Restart);
    }
}

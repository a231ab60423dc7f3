//! Fixed rate playback of pose animations, decoupled from the render clock.

use bevy::prelude::*;
use bevy_pose_anim::prelude::*;

use crate::config::DEFAULT_FPS;

/// Slack absorbing rounding when deltas add up to a whole number of ticks.
const TICK_TOLERANCE: f64 = 1e-9;

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Toggle,
    /// Jump back to the first frame and the bind pose.
    Restart,
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct PosePlayer {
    frame_index: usize,
    /// Time not yet consumed by a whole tick.
    accumulator: f64,
    is_playing: bool,
    fps: u32,
    sequence: Option<AssetId<PoseAnimAsset>>,
}

impl Default for PosePlayer {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

impl PosePlayer {
    pub fn new(fps: u32) -> Self {
        Self {
            frame_index: 0,
            accumulator: 0.0,
            is_playing: false,
            fps: fps.max(1),
            sequence: None,
        }
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps.max(1);
    }

    pub fn tick_duration(&self) -> f64 {
        1.0 / self.fps as f64
    }

    pub fn sequence(&self) -> Option<AssetId<PoseAnimAsset>> {
        self.sequence
    }

    pub fn play(&mut self) {
        self.is_playing = true;
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    pub fn toggle(&mut self) {
        self.is_playing = !self.is_playing;
    }

    /// Back to the first frame, keeping the play state.
    pub fn restart(&mut self) {
        self.frame_index = 0;
        self.accumulator = 0.0;
    }

    /// Back to `(0, 0, paused)`.
    pub fn reset(&mut self) {
        self.restart();
        self.pause();
    }

    /// Switch to another sequence, resetting playback.
    pub fn load_sequence(&mut self, sequence: Option<AssetId<PoseAnimAsset>>) {
        self.sequence = sequence;
        self.reset();
    }

    pub fn apply(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Play => self.play(),
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Toggle => self.toggle(),
            PlaybackCommand::Restart => self.restart(),
        }
    }

    /// Consume `delta` seconds, advancing one frame per whole tick and looping
    /// over `len` frames. Returns the number of frames advanced.
    pub fn advance(&mut self, delta: f32, len: usize) -> usize {
        if len == 0 {
            self.restart();
            return 0;
        }
        self.frame_index %= len;

        if self.is_playing == false {
            return 0;
        }

        let tick = self.tick_duration();
        self.accumulator += delta.max(0.0) as f64;

        let mut steps = 0;
        while self.accumulator + TICK_TOLERANCE >= tick {
            self.accumulator = (self.accumulator - tick).max(0.0);
            self.frame_index = (self.frame_index + 1) % len;
            steps += 1;
        }
        steps
    }
}

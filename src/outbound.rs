//! Shapes volume and playback intents into device requests.

use crate::protocol::VolumePayload;
use crate::types::{PlaybackCommand, VolumeCommand};

/// Media request a playback command turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    Play,
    Pause,
}

/// Build the `SET_VOLUME` payload for a volume command
///
/// Devices misbehave when a level arrives together with mute-on, so a mute
/// request carries nothing else.
pub fn volume_payload(command: &VolumeCommand) -> VolumePayload {
    if command.muted == Some(true) {
        return VolumePayload {
            level: None,
            muted: Some(true),
        };
    }

    VolumePayload {
        level: command.level,
        muted: command.muted,
    }
}

pub fn playback_action(command: PlaybackCommand) -> PlaybackAction {
    if command.play {
        PlaybackAction::Play
    } else {
        PlaybackAction::Pause
    }
}

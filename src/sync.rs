//! Maps receiver and media status payloads onto the published state model.
//!
//! Everything here is pure: the session manager decides what to do with the
//! [`SyncOutcome`] (open connections, rebind the media controller, publish).

use crate::config::MediaSessionPolicy;
use crate::error::{CastError, Result};
use crate::protocol::{MediaStatusEntry, ReceiverStatus, NS_MEDIA};
use crate::types::{PlaybackState, Volume};

/// What a receiver status report asks of the media controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaBinding {
    /// Leave the current destination alone
    Unchanged,
    /// A media session appeared on a different transport id
    Rebind(String),
    /// The bound session disappeared and the policy resets on disappearance
    Release,
}

/// Result of synchronizing one receiver status report
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    /// Volume to publish; the device is authoritative
    pub volume: Volume,
    pub binding: MediaBinding,
}

/// Synchronize a receiver status report against the current media destination
pub fn synchronize(
    status: &ReceiverStatus,
    current_destination: Option<&str>,
    policy: MediaSessionPolicy,
) -> Result<SyncOutcome> {
    let volume = extract_volume(status)?;

    let media_app = status.applications.iter().find(|app| app.supports(NS_MEDIA));

    let binding = match (media_app, current_destination) {
        (Some(app), Some(current)) if app.transport_id == current => MediaBinding::Unchanged,
        (Some(app), _) => MediaBinding::Rebind(app.transport_id.clone()),
        (None, Some(_)) if policy == MediaSessionPolicy::ResetOnDisappear => MediaBinding::Release,
        (None, _) => MediaBinding::Unchanged,
    };

    Ok(SyncOutcome { volume, binding })
}

/// Extract the volume sub-state; both fields must be present
pub fn extract_volume(status: &ReceiverStatus) -> Result<Volume> {
    let volume = status
        .volume
        .ok_or_else(|| CastError::Sync("receiver status without volume".to_string()))?;

    match (volume.level, volume.muted) {
        (Some(level), Some(muted)) => Ok(Volume { level, muted }),
        _ => Err(CastError::Sync(format!("incomplete volume in receiver status: {:?}", volume))),
    }
}

/// Playback state described by a media status list
///
/// An empty list means no media session is active.
pub fn playback_state(entries: &[MediaStatusEntry]) -> Result<PlaybackState> {
    let Some(entry) = entries.first() else {
        return Ok(PlaybackState::Inactive);
    };

    match entry.player_state.as_str() {
        "PLAYING" => Ok(PlaybackState::Playing),
        "PAUSED" => Ok(PlaybackState::Paused),
        "BUFFERING" => Ok(PlaybackState::Buffering),
        "LOADING" => Ok(PlaybackState::Busy),
        "IDLE" if entry.idle_reason.is_some() => Ok(PlaybackState::Stopped),
        "IDLE" => Ok(PlaybackState::Idle),
        other => Err(CastError::Sync(format!("unknown player state {:?}", other))),
    }
}

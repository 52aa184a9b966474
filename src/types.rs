use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized device identifier (lowercase hex, no dashes)
pub type DeviceId = String;

/// Identifier the receiver assigns to a playback item within a media session
pub type MediaSessionId = i64;

/// Discovery transport that reported a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverySource {
    Mdns,
    Upnp,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mdns => write!(f, "mdns"),
            Self::Upnp => write!(f, "upnp"),
        }
    }
}

/// Canonical identity of a physical Cast device
///
/// `id` is the deduplication key: two discovery events with the same `id`
/// refer to the same device regardless of which transport reported them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: DeviceId,
    pub friendly_name: String,
    pub discovery_source: DiscoverySource,
}

/// Volume state as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Volume {
    /// Level in the range 0.0..=1.0
    pub level: f64,
    pub muted: bool,
}

/// Playback state of the active media session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    Buffering,
    Busy,
    Idle,
    #[default]
    Inactive,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Buffering => "buffering",
            Self::Busy => "busy",
            Self::Idle => "idle",
            Self::Inactive => "inactive",
        };
        f.write_str(name)
    }
}

/// Desired volume change requested by the device framework
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl VolumeCommand {
    /// Request a specific level
    pub fn level(level: f64) -> Self {
        Self {
            level: Some(level),
            muted: None,
        }
    }

    /// Request a mute state change
    pub fn muted(muted: bool) -> Self {
        Self {
            level: None,
            muted: Some(muted),
        }
    }
}

/// Desired playback change requested by the device framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackCommand {
    pub play: bool,
}

/// Channels a registered device exposes to the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub volume: bool,
    pub playback: bool,
}

use crate::protocol::{DEFAULT_RECEIVER_ID, DEFAULT_SENDER_ID};
use std::time::Duration;

/// Default port Cast devices listen on
pub const DEFAULT_CAST_PORT: u16 = 8009;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const VOLUME_TIMEOUT: Duration = Duration::from_secs(5);
const PLAYBACK_TIMEOUT: Duration = Duration::from_secs(3);

/// What to do when a receiver report no longer lists a media session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaSessionPolicy {
    /// Keep the media controller bound to the last seen session
    #[default]
    Sticky,
    /// Unbind the media controller and publish `inactive`
    ResetOnDisappear,
}

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sender_id: String,
    pub receiver_id: String,
    pub heartbeat_interval: Duration,
    /// Wait for `GET_STATUS` replies (receiver and media)
    pub status_timeout: Duration,
    pub volume_timeout: Duration,
    pub playback_timeout: Duration,
    pub media_session_policy: MediaSessionPolicy,
    /// Advertise the playback channel when registering devices
    pub playback_capability: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sender_id: DEFAULT_SENDER_ID.to_string(),
            receiver_id: DEFAULT_RECEIVER_ID.to_string(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            status_timeout: STATUS_TIMEOUT,
            volume_timeout: VOLUME_TIMEOUT,
            playback_timeout: PLAYBACK_TIMEOUT,
            media_session_policy: MediaSessionPolicy::default(),
            playback_capability: true,
        }
    }
}

impl SessionConfig {
    pub fn with_media_session_policy(mut self, policy: MediaSessionPolicy) -> Self {
        self.media_session_policy = policy;
        self
    }
}

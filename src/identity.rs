//! Normalizes raw discovery attributes into a [`DeviceIdentity`].
//!
//! mDNS reports the device id as 32 hex digits in the `id` TXT record; UPnP
//! reports the same id as a dashed UDN (`uuid:xxxxxxxx-xxxx-...`). Both are
//! reduced to lowercase hex without dashes so a device seen by both transports
//! deduplicates to one entry.

use crate::error::{CastError, Result};
use crate::types::{DeviceIdentity, DiscoverySource};
use std::collections::HashMap;

const ATTR_ID: &str = "id";
const ATTR_FRIENDLY_NAME: &str = "fn";

/// Build a device identity from a discovery event's attributes
pub fn resolve(
    source: DiscoverySource,
    attributes: &HashMap<String, String>,
) -> Result<DeviceIdentity> {
    let raw_id = attributes
        .get(ATTR_ID)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CastError::Discovery(format!("{} event without an id attribute", source)))?;

    let id = normalize_id(raw_id);
    if id.is_empty() {
        return Err(CastError::Discovery(format!("unusable device id {:?}", raw_id)));
    }

    let friendly_name = attributes
        .get(ATTR_FRIENDLY_NAME)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("Chromecast {}", id));

    Ok(DeviceIdentity {
        id,
        friendly_name,
        discovery_source: source,
    })
}

fn normalize_id(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let bare = lower.strip_prefix("uuid:").unwrap_or(&lower);
    bare.chars().filter(|c| *c != '-').collect()
}

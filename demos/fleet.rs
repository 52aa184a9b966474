//! Admit one Cast device by address and print its state as it changes.
//!
//! ```text
//! cargo run --example fleet -- 192.168.1.40 4a1b2c3d4e5f60718293a4b5c6d7e8f9 "Living Room"
//! ```
//!
//! While running, type `+`/`-` to step the volume, `m`/`u` to mute or unmute,
//! `p` to play, `s` to pause, and `q` to quit.

use cast_fleet::{
    Capabilities, CommandHandler, DeviceFramework, DeviceHandle, DeviceIdentity, DiscoverySource,
    Fleet, PlaybackCommand, PlaybackState, Volume, VolumeCommand, DEFAULT_CAST_PORT, resolve_identity,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const VOLUME_STEP: f64 = 0.05;

struct PrintHandle {
    name: String,
}

impl DeviceHandle for PrintHandle {
    fn publish_volume_state(&self, volume: Volume) -> cast_fleet::Result<()> {
        println!(
            "[{}] volume {:.0}%{}",
            self.name,
            volume.level * 100.0,
            if volume.muted { " (muted)" } else { "" }
        );
        Ok(())
    }

    fn publish_playback_state(&self, state: PlaybackState) -> cast_fleet::Result<()> {
        println!("[{}] {}", self.name, state);
        Ok(())
    }
}

struct PrintFramework;

impl DeviceFramework for PrintFramework {
    fn register_device(
        &self,
        identity: &DeviceIdentity,
        capabilities: Capabilities,
        _commands: Arc<dyn CommandHandler>,
    ) -> cast_fleet::Result<Arc<dyn DeviceHandle>> {
        println!(
            "Registered {} ({}) via {}, playback control: {}",
            identity.friendly_name, identity.id, identity.discovery_source, capabilities.playback
        );
        Ok(Arc::new(PrintHandle {
            name: identity.friendly_name.clone(),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(host), Some(id)) = (args.next(), args.next()) else {
        eprintln!("usage: fleet <host> <device id> [friendly name]");
        std::process::exit(2);
    };
    let name = args.next().unwrap_or_default();

    let attributes: HashMap<String, String> = [("id".to_string(), id), ("fn".to_string(), name)]
        .into_iter()
        .collect();

    let identity = resolve_identity(DiscoverySource::Mdns, &attributes)?;

    let fleet = Fleet::new(Arc::new(PrintFramework));
    fleet
        .add(host.parse()?, DEFAULT_CAST_PORT, identity.clone())
        .await?;

    let Some(session) = fleet.session(&identity.id).await else {
        return Err("device was not admitted".into());
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let level = session.snapshot().volume.level;
        let result = match line.trim() {
            "+" => session.apply_volume(VolumeCommand::level((level + VOLUME_STEP).min(1.0))).await,
            "-" => session.apply_volume(VolumeCommand::level((level - VOLUME_STEP).max(0.0))).await,
            "m" => session.apply_volume(VolumeCommand::muted(true)).await,
            "u" => session.apply_volume(VolumeCommand::muted(false)).await,
            "p" => session.apply_playback(PlaybackCommand { play: true }).await,
            "s" => session.apply_playback(PlaybackCommand { play: false }).await,
            "q" => break,
            _ => continue,
        };
        if let Err(e) = result {
            eprintln!("Command failed: {}", e);
        }
    }

    fleet.shutdown().await;
    Ok(())
}

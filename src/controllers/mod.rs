//! Per-endpoint-pair controllers layered over a [`Transport`](crate::connection::Transport).

mod heartbeat;
mod media;
mod receiver;
mod virtual_connection;

pub use heartbeat::HeartbeatController;
pub use media::MediaController;
pub use receiver::ReceiverController;
pub use virtual_connection::VirtualConnection;

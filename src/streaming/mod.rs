//! Best-effort landmark streaming over a persistent channel.

pub mod publisher;
pub mod transport;

pub use publisher::{LandmarkPublisher, LinkState, PartMessage};
pub use transport::{ChannelTransport, WebSocketTransport};

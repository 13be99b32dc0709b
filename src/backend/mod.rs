/// Backend submodules for stream transport and delivery
///
/// This module breaks down the stream backend into focused components:
/// - `transport`: the `Transport`/`Connector` seams and the in-memory channel transport
/// - `connection`: WebSocket (plain and TLS) connection establishment
/// - `main_loop`: the read/decode/deliver loop running on the backend thread
mod connection;
mod main_loop;
mod transport;

// Re-export the main backend entry points
pub use connection::{create_tls_config, WsConnector, WsTransport};
pub use main_loop::run_backend;
pub use transport::{
    ChannelConnector, ChannelFeed, ChannelFrame, ChannelTransport, Connector, Endpoint, Transport,
};

//! Concrete network collaborators: the durable message store over HTTP and
//! the push channel over a WebSocket gateway.

pub mod gateway;
pub mod http;

pub use gateway::GatewayChannel;
pub use http::HttpBackend;

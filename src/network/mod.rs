pub mod backend;
pub mod connection;
pub mod messages;

pub use backend::{BackendError, BackendResult, HttpProxyBackend, ProxyBackend, TransportKind};
pub use connection::{PushChannel, PushSender, PushTransport, WsPushTransport};

//! Push-message dispatch: typed envelope, session cache, WebSocket client
//! and its REST sidecar.

pub mod client;
pub mod envelope;
pub mod registry;
pub mod rest;

pub use client::{ConnectionState, DispatchClient, Transport, WsTransport};
pub use envelope::PushMessage;
pub use registry::{Session, Update, Workflow};
pub use rest::{RestClient, StartParams};

//! Embedded editing surface
//!
//! The editor runs inside a sandboxed frame hosted by a surface bridge and is
//! reachable only through fire-and-forget messages.
//!
//! ## Protocol
//!
//! 1. Connect to `{surface_url}/{language}?theme=..&fontSize=..&...`
//!    (the URL carries the whole configuration)
//! 2. Bridge sends `{"type":"load"}` once the editor frame has loaded
//! 3. Host posts `populateCode` with the current document
//! 4. Bridge relays editor messages as `{"type":"message","origin":..,"data":..}`
//! 5. Reconfiguring closes the connection and starts again at 1
//!
//! ## Usage
//!
//! ```ignore
//! let (connector, events) = WsConnector::channel();
//! let target = SurfaceTarget::parse("ws://127.0.0.1:8791/embed")?;
//! let mut proxy = SurfaceProxy::new(connector, target, "https://onecompiler.com");
//! proxy.subscribe();
//! let id = proxy.create(SurfaceConfig::default());
//! ```

mod connection;
mod message;
mod proxy;
mod target;

pub use connection::{WsConnector, WsHandle};
pub use message::{
    parse_inbound, BridgeFrame, FileEntry, HostFrame, InboundChange, InboundError,
    OutboundMessage,
};
pub use proxy::{
    Inbound, InstanceId, SendError, SurfaceConnector, SurfaceEvent, SurfaceEventKind,
    SurfaceHandle, SurfaceProxy,
};
pub use target::{SurfaceTarget, TargetError};

#[cfg(test)]
pub(crate) use proxy::testing;

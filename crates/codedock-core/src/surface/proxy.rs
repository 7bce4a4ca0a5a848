//! Embedded surface proxy
//!
//! Owns the single live surface instance and filters everything that comes
//! back from it. Each instance gets a fresh `InstanceId`; events carry the id
//! of the instance that produced them, so anything from a replaced instance
//! (late ready signals, edits queued during teardown) is discarded here and
//! never reaches the controller.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::message::{parse_inbound, BridgeFrame, HostFrame, InboundChange, OutboundMessage};
use super::target::SurfaceTarget;
use crate::models::SurfaceConfig;

/// Identifies one surface instance; strictly increasing per proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that happened on a surface connection
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEventKind {
    /// A frame arrived from the bridge
    Frame(BridgeFrame),
    /// The connection ended
    Closed { reason: String },
}

/// A surface event tagged with the instance that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceEvent {
    pub instance: InstanceId,
    pub kind: SurfaceEventKind,
}

impl SurfaceEvent {
    pub fn new(instance: InstanceId, kind: SurfaceEventKind) -> Self {
        Self { instance, kind }
    }

    pub fn load(instance: InstanceId) -> Self {
        Self::new(instance, SurfaceEventKind::Frame(BridgeFrame::Load))
    }

    pub fn message(instance: InstanceId, origin: &str, data: serde_json::Value) -> Self {
        Self::new(
            instance,
            SurfaceEventKind::Frame(BridgeFrame::Message {
                origin: origin.to_string(),
                data,
            }),
        )
    }

    pub fn closed(instance: InstanceId, reason: impl Into<String>) -> Self {
        Self::new(
            instance,
            SurfaceEventKind::Closed {
                reason: reason.into(),
            },
        )
    }
}

/// Errors delivering a message to the surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("no surface instance is live")]
    NoInstance,

    #[error("surface connection is closed")]
    Closed,

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Outbound half of a live surface instance
///
/// Dropping the handle destroys the instance's message target.
pub trait SurfaceHandle {
    /// Queue a frame for delivery; never blocks
    fn post(&self, frame: HostFrame) -> Result<(), SendError>;
}

/// Creates surface instances
///
/// Implementations deliver the instance's events, tagged with `instance`,
/// through a channel of their own.
pub trait SurfaceConnector {
    type Handle: SurfaceHandle;

    fn connect(&mut self, target: &Url, instance: InstanceId) -> Self::Handle;
}

/// Events the proxy forwards to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The current instance finished initialization
    Ready,
    /// The current instance reported a content change
    Change(InboundChange),
    /// The current instance's connection ended
    Lost(String),
}

struct LiveInstance<H> {
    id: InstanceId,
    handle: H,
    ready: bool,
}

/// Proxy for the embedded editing surface
pub struct SurfaceProxy<C: SurfaceConnector> {
    connector: C,
    target: SurfaceTarget,
    origin: String,
    current: Option<LiveInstance<C::Handle>>,
    next_id: u64,
    subscribed: bool,
}

impl<C: SurfaceConnector> SurfaceProxy<C> {
    /// Create a proxy accepting messages only from `origin`
    pub fn new(connector: C, target: SurfaceTarget, origin: impl Into<String>) -> Self {
        Self {
            connector,
            target,
            origin: origin.into(),
            current: None,
            next_id: 1,
            subscribed: false,
        }
    }

    /// The only origin inbound messages are accepted from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Id of the live instance, if any
    pub fn current_instance(&self) -> Option<InstanceId> {
        self.current.as_ref().map(|live| live.id)
    }

    /// Whether the live instance has reported ready
    pub fn is_ready(&self) -> bool {
        self.current.as_ref().is_some_and(|live| live.ready)
    }

    /// Start accepting inbound events
    pub fn subscribe(&mut self) {
        self.subscribed = true;
    }

    /// Stop accepting inbound events
    pub fn unsubscribe(&mut self) {
        self.subscribed = false;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Replace the live instance with a new one for `config`
    ///
    /// The previous instance is destroyed before the new one is connected,
    /// so nothing can be delivered to it afterwards.
    pub fn create(&mut self, config: SurfaceConfig) -> InstanceId {
        self.destroy();

        let id = InstanceId(self.next_id);
        self.next_id += 1;

        let url = self.target.url_for(config);
        info!("Creating surface instance {} at {}", id, url);
        let handle = self.connector.connect(&url, id);

        self.current = Some(LiveInstance {
            id,
            handle,
            ready: false,
        });
        id
    }

    /// Destroy the live instance, if any
    pub fn destroy(&mut self) {
        if let Some(live) = self.current.take() {
            debug!("Destroying surface instance {}", live.id);
        }
    }

    /// Send a message to the live instance, restricted to the surface origin
    pub fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        let live = self.current.as_ref().ok_or(SendError::NoInstance)?;
        live.handle.post(HostFrame::post(&self.origin, message))
    }

    /// Demultiplex one surface event
    ///
    /// Returns `None` for everything that must not reach the controller:
    /// events while unsubscribed, events from replaced instances, duplicate
    /// ready signals, foreign origins and malformed payloads.
    pub fn accept(&mut self, event: SurfaceEvent) -> Option<Inbound> {
        if !self.subscribed {
            debug!("Dropping surface event while unsubscribed");
            return None;
        }

        let origin = self.origin.as_str();
        let Some(live) = self
            .current
            .as_mut()
            .filter(|live| live.id == event.instance)
        else {
            debug!("Dropping event from stale surface instance {}", event.instance);
            return None;
        };

        match event.kind {
            SurfaceEventKind::Closed { reason } => {
                live.ready = false;
                Some(Inbound::Lost(reason))
            }
            SurfaceEventKind::Frame(BridgeFrame::Load) => {
                if live.ready {
                    debug!("Ignoring repeated ready signal from {}", live.id);
                    return None;
                }
                live.ready = true;
                Some(Inbound::Ready)
            }
            SurfaceEventKind::Frame(BridgeFrame::Message {
                origin: sender,
                data,
            }) => {
                if sender != origin {
                    debug!("Dropping message from foreign origin {:?}", sender);
                    return None;
                }
                match parse_inbound(&data) {
                    Ok(change) => Some(Inbound::Change(change)),
                    Err(e) => {
                        debug!("Dropping malformed surface message: {}", e);
                        None
                    }
                }
            }
        }
    }
}

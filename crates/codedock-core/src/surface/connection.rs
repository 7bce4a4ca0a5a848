//! WebSocket surface connections
//!
//! Each surface instance is one WebSocket connection to the bridge. A
//! connection task forwards bridge frames, tagged with the instance id, and
//! drains the instance's outbound queue. Dropping the `WsHandle` aborts the
//! task, which closes the socket.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::message::{BridgeFrame, HostFrame};
use super::proxy::{
    InstanceId, SendError, SurfaceConnector, SurfaceEvent, SurfaceEventKind, SurfaceHandle,
};

/// Connector that opens one WebSocket per surface instance
///
/// Must be used from within a tokio runtime.
pub struct WsConnector {
    events: mpsc::UnboundedSender<SurfaceEvent>,
}

impl WsConnector {
    pub fn new(events: mpsc::UnboundedSender<SurfaceEvent>) -> Self {
        Self { events }
    }

    /// Create a connector together with the receiver for its events
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl SurfaceConnector for WsConnector {
    type Handle = WsHandle;

    fn connect(&mut self, target: &Url, instance: InstanceId) -> WsHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(connection_task(
            target.to_string(),
            instance,
            outbound_rx,
            self.events.clone(),
        ));

        WsHandle {
            outbound: outbound_tx,
            task,
        }
    }
}

/// Handle to a live WebSocket surface instance
pub struct WsHandle {
    outbound: mpsc::UnboundedSender<HostFrame>,
    task: JoinHandle<()>,
}

impl SurfaceHandle for WsHandle {
    fn post(&self, frame: HostFrame) -> Result<(), SendError> {
        self.outbound.send(frame).map_err(|_| SendError::Closed)
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run one connection until it closes, then report why
async fn connection_task(
    url: String,
    instance: InstanceId,
    mut outbound_rx: mpsc::UnboundedReceiver<HostFrame>,
    events: mpsc::UnboundedSender<SurfaceEvent>,
) {
    let reason = match drive_connection(&url, instance, &mut outbound_rx, &events).await {
        Ok(()) => "connection closed".to_string(),
        Err(e) => {
            warn!("Surface connection {} failed: {:#}", instance, e);
            format!("{:#}", e)
        }
    };

    let _ = events.send(SurfaceEvent::closed(instance, reason));
}

async fn drive_connection(
    url: &str,
    instance: InstanceId,
    outbound_rx: &mut mpsc::UnboundedReceiver<HostFrame>,
    events: &mpsc::UnboundedSender<SurfaceEvent>,
) -> Result<()> {
    debug!("Connecting surface {} to {}", instance, url);
    let (ws_stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to surface bridge {}", url))?;
    info!("Surface {} connected", instance);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let text = frame.encode().context("Failed to encode host frame")?;
                        write.send(Message::Text(text)).await?;
                    }
                    None => {
                        // Handle dropped
                        write.close().await.ok();
                        return Ok(());
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => forward(&text, instance, events),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => forward(&text, instance, events),
                        Err(_) => debug!("Ignoring non-UTF-8 frame from surface {}", instance),
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

fn forward(text: &str, instance: InstanceId, events: &mpsc::UnboundedSender<SurfaceEvent>) {
    match BridgeFrame::decode(text) {
        Ok(frame) => {
            let _ = events.send(SurfaceEvent::new(instance, SurfaceEventKind::Frame(frame)));
        }
        Err(e) => debug!("Ignoring undecodable frame from surface {}: {}", instance, e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::surface::message::OutboundMessage;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<SurfaceEvent>) -> SurfaceEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for surface event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_connection_forwards_frames_both_ways() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let bridge = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"type":"load"}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Text("garbage".to_string())).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"message","origin":"https://onecompiler.com","data":{"files":[{"name":"main.c","content":"int x;"}]}}"#
                    .to_string(),
            ))
            .await
            .unwrap();

            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("bridge did not receive a post: {:?}", other),
                }
            }
        });

        let (mut connector, mut events) = WsConnector::channel();
        let target = Url::parse(&format!("ws://{}/embed/c", addr)).unwrap();
        let handle = connector.connect(&target, InstanceId(7));

        let event = next_event(&mut events).await;
        assert_eq!(event, SurfaceEvent::load(InstanceId(7)));

        // The undecodable frame is skipped
        let event = next_event(&mut events).await;
        match event.kind {
            SurfaceEventKind::Frame(BridgeFrame::Message { origin, .. }) => {
                assert_eq!(origin, "https://onecompiler.com");
            }
            other => panic!("Expected message frame, got {:?}", other),
        }

        handle
            .post(HostFrame::post(
                "https://onecompiler.com",
                OutboundMessage::TriggerRun,
            ))
            .unwrap();

        let text = timeout(Duration::from_secs(5), bridge)
            .await
            .unwrap()
            .unwrap();
        let frame: HostFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(
            frame,
            HostFrame::post("https://onecompiler.com", OutboundMessage::TriggerRun)
        );
    }

    #[tokio::test]
    async fn test_connection_failure_reports_closed() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let (mut connector, mut events) = WsConnector::channel();
        let target = Url::parse(&format!("ws://{}/embed/java", addr)).unwrap();
        let _handle = connector.connect(&target, InstanceId(3));

        let event = next_event(&mut events).await;
        assert_eq!(event.instance, InstanceId(3));
        match event.kind {
            SurfaceEventKind::Closed { reason } => {
                assert!(reason.contains("Failed to connect"), "reason: {}", reason);
            }
            other => panic!("Expected Closed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_handle_rejects_posts() {
        let (mut connector, _events) = WsConnector::channel();
        let target = Url::parse("ws://127.0.0.1:9/embed/java").unwrap();
        let handle = connector.connect(&target, InstanceId(1));
        let outbound = handle.outbound.clone();

        drop(handle);
        // The task is aborted, so its receiver goes away
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(outbound.send(HostFrame::post("x", OutboundMessage::TriggerRun)).is_err());
    }
}

//! Editor session task
//!
//! A session is one tokio task that owns the controller. It serializes user
//! commands, surface events and the ready timer, so nothing can interleave
//! with an operation in progress (including a format call waiting on the
//! external formatter).

use std::future::pending;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::actions::{Action, Dispatcher};
use crate::config::Config;
use crate::controller::{ControllerEvent, SyncController, SyncPhase};
use crate::format::{CommandFormatter, Formatter};
use crate::storage::{CodeStore, FileCodeStore};
use crate::surface::{
    InstanceId, SurfaceConnector, SurfaceEvent, SurfaceProxy, SurfaceTarget, WsConnector,
};

/// Commands sent to the session task
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Run a user action
    Dispatch(Action),
    /// Shut the surface down and stop the task
    Shutdown,
}

/// Handle to control a running session
pub struct SessionHandle {
    /// Send commands to the session task
    pub command_tx: mpsc::Sender<SessionCommand>,
    /// Receive controller events
    pub event_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    /// Watch the synchronization phase
    pub phase_rx: watch::Receiver<SyncPhase>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn phase(&self) -> SyncPhase {
        *self.phase_rx.borrow()
    }

    /// Queue an action for the session task
    pub async fn dispatch(&self, action: Action) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Dispatch(action))
            .await
            .context("Editor session has stopped")
    }

    /// Stop the session and wait for it to finish
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone; joining still reports a panic
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;
        self.task.await.context("Editor session task failed")
    }
}

/// Start a session for `config` against the real surface bridge
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(config: &Config) -> Result<SessionHandle> {
    let target = SurfaceTarget::from_url(config.surface_base_url()?)?;
    let origin = config.resolved_surface_origin()?;
    info!("Starting editor session against {} (origin {})", target.base(), origin);

    let (connector, surface_rx) = WsConnector::channel();
    let proxy = SurfaceProxy::new(connector, target, origin);
    let store = FileCodeStore::from_config(config);
    let controller = SyncController::new(proxy, store, config.surface_config());

    let formatter = CommandFormatter::from_command_line(&config.formatter);
    let dispatcher = Dispatcher::new(formatter, config.export_dir());

    spawn_with(controller, dispatcher, surface_rx, config.ready_timeout())
}

/// Start a session around an already-built controller
pub fn spawn_with<C, S, F>(
    mut controller: SyncController<C, S>,
    dispatcher: Dispatcher<F>,
    surface_rx: mpsc::UnboundedReceiver<SurfaceEvent>,
    ready_timeout: Option<Duration>,
) -> Result<SessionHandle>
where
    C: SurfaceConnector + Send + 'static,
    C::Handle: Send,
    S: CodeStore + Send + 'static,
    F: Formatter + Send + Sync + 'static,
{
    let event_rx = controller
        .take_events()
        .context("Controller events were already taken")?;
    let phase_rx = controller.subscribe_phase();
    let (command_tx, command_rx) = mpsc::channel(16);

    let task = tokio::spawn(session_loop(
        controller,
        dispatcher,
        command_rx,
        surface_rx,
        ready_timeout,
    ));

    Ok(SessionHandle {
        command_tx,
        event_rx,
        phase_rx,
        task,
    })
}

async fn session_loop<C, S, F>(
    mut controller: SyncController<C, S>,
    dispatcher: Dispatcher<F>,
    mut command_rx: mpsc::Receiver<SessionCommand>,
    mut surface_rx: mpsc::UnboundedReceiver<SurfaceEvent>,
    ready_timeout: Option<Duration>,
) where
    C: SurfaceConnector,
    S: CodeStore,
    F: Formatter,
{
    controller.start();

    // Ready timer for the instance currently waiting; the deadline is
    // cleared once it has fired for that instance
    let mut armed: Option<(InstanceId, Option<Instant>)> = None;

    loop {
        if let Some(timeout) = ready_timeout {
            let waiting = controller.waiting_instance();
            if waiting != armed.map(|(id, _)| id) {
                armed = waiting.map(|id| (id, Some(Instant::now() + timeout)));
            }
        }

        let deadline = armed.and_then(|(_, at)| at);

        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Dispatch(action)) => {
                        debug!("Dispatching {}", action);
                        dispatcher.dispatch(&mut controller, action).await;
                    }
                    Some(SessionCommand::Shutdown) | None => {
                        info!("Editor session shutting down");
                        break;
                    }
                }
            }

            event = surface_rx.recv() => {
                match event {
                    Some(event) => controller.handle_surface_event(event),
                    None => break,
                }
            }

            _ = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => pending::<()>().await,
                }
            } => {
                if let Some((id, at)) = armed.as_mut() {
                    *at = None;
                    controller.on_ready_timeout(*id);
                }
            }
        }
    }

    controller.shutdown();
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::time::timeout;

    use super::*;
    use crate::controller::Notice;
    use crate::format::{FormatError, Parser};
    use crate::models::SurfaceConfig;
    use crate::storage::MemoryCodeStore;
    use crate::surface::testing::RecordingConnector;
    use crate::surface::OutboundMessage;

    const ORIGIN: &str = "https://onecompiler.com";

    struct Identity;

    impl Formatter for Identity {
        async fn format(&self, code: &str, _parser: Parser) -> Result<String, FormatError> {
            Ok(code.to_string())
        }
    }

    fn spawn_test(
        store: MemoryCodeStore,
        ready_timeout: Option<Duration>,
        export_dir: &TempDir,
    ) -> (
        SessionHandle,
        RecordingConnector,
        mpsc::UnboundedSender<SurfaceEvent>,
    ) {
        let connector = RecordingConnector::default();
        let target = SurfaceTarget::parse("ws://127.0.0.1:8791/embed").unwrap();
        let proxy = SurfaceProxy::new(connector.clone(), target, ORIGIN);
        let controller = SyncController::new(proxy, store, SurfaceConfig::default());
        let dispatcher = Dispatcher::new(Identity, export_dir.path());
        let (surface_tx, surface_rx) = mpsc::unbounded_channel();

        let handle = spawn_with(controller, dispatcher, surface_rx, ready_timeout).unwrap();
        (handle, connector, surface_tx)
    }

    async fn wait_for(
        handle: &mut SessionHandle,
        mut pred: impl FnMut(&ControllerEvent) -> bool,
    ) -> ControllerEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                let event = handle.event_rx.recv().await.expect("session stopped");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for controller event")
    }

    #[tokio::test]
    async fn test_session_syncs_and_runs() {
        let dir = TempDir::new().unwrap();
        let (mut handle, connector, surface_tx) =
            spawn_test(MemoryCodeStore::with_code("class Main {}"), None, &dir);

        wait_for(&mut handle, |e| {
            *e == ControllerEvent::PhaseChanged(SyncPhase::WaitingForSurface)
        })
        .await;
        let id = connector.connects()[0].0;

        surface_tx.send(SurfaceEvent::load(id)).unwrap();
        wait_for(&mut handle, |e| *e == ControllerEvent::PhaseChanged(SyncPhase::Synced)).await;
        assert_eq!(handle.phase(), SyncPhase::Synced);

        surface_tx
            .send(SurfaceEvent::message(
                id,
                ORIGIN,
                json!({"files": [{"name": "Main.java", "content": "class Main { }"}]}),
            ))
            .unwrap();
        wait_for(&mut handle, |e| matches!(e, ControllerEvent::CodeChanged { .. })).await;

        handle.dispatch(Action::Run).await.unwrap();
        wait_for(&mut handle, |e| *e == ControllerEvent::RunTriggered).await;

        assert_eq!(
            connector.messages(),
            vec![
                OutboundMessage::populate(
                    crate::models::Language::Java,
                    "main.java",
                    "class Main {}"
                ),
                OutboundMessage::TriggerRun,
            ]
        );

        handle.shutdown().await.unwrap();
        assert_eq!(connector.destroyed(), vec![id]);
    }

    #[tokio::test]
    async fn test_ready_timeout_reports_once() {
        let dir = TempDir::new().unwrap();
        let (mut handle, connector, _surface_tx) = spawn_test(
            MemoryCodeStore::new(),
            Some(Duration::from_millis(50)),
            &dir,
        );

        let event = wait_for(&mut handle, |e| matches!(e, ControllerEvent::Notice(_))).await;
        assert_eq!(
            event,
            ControllerEvent::Notice(Notice::warning("Editor did not finish loading"))
        );

        // No retry and no second report
        tokio::time::sleep(Duration::from_millis(200)).await;
        while let Ok(event) = handle.event_rx.try_recv() {
            assert!(!matches!(event, ControllerEvent::Notice(_)), "{:?}", event);
        }
        assert_eq!(connector.connects().len(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reload_rearms_timeout() {
        let dir = TempDir::new().unwrap();
        let (mut handle, connector, _surface_tx) = spawn_test(
            MemoryCodeStore::new(),
            Some(Duration::from_millis(50)),
            &dir,
        );

        wait_for(&mut handle, |e| matches!(e, ControllerEvent::Notice(_))).await;
        handle.dispatch(Action::Reload).await.unwrap();
        wait_for(&mut handle, |e| matches!(e, ControllerEvent::Notice(_))).await;

        assert_eq!(connector.connects().len(), 2);
        handle.shutdown().await.unwrap();
    }
}

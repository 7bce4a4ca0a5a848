//! Sync controller
//!
//! Owns the authoritative editor state and keeps the embedded surface in
//! step with it. The surface can only be reached through fire-and-forget
//! messages and reloads from scratch whenever its configuration changes,
//! so the controller moves through a small state machine:
//!
//! ```text
//! Uninitialized --start--> WaitingForSurface --ready--> Synced
//!                                  ^                      |
//!                                  +--- Reconfiguring <---+
//! ```
//!
//! Populate messages are only ever sent from `Synced` (or on the transition
//! into it), and inbound changes are only folded in while `Synced`. Changes
//! that arrive from the surface are never echoed back to it.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::export::ExportSnapshot;
use crate::format::{Formatter, Parser};
use crate::models::{EditorState, Language, SurfaceConfig, Theme};
use crate::storage::{CodeStore, StorageError};
use crate::surface::{
    Inbound, InboundChange, InstanceId, OutboundMessage, SurfaceConnector, SurfaceEvent,
    SurfaceProxy,
};

/// Synchronization phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not started (or shut down)
    Uninitialized,
    /// A surface instance exists but has not reported ready
    WaitingForSurface,
    /// The surface is ready and mirrors `code`
    Synced,
    /// The configuration changed; the surface is being replaced
    Reconfiguring,
}

impl SyncPhase {
    pub fn label(self) -> &'static str {
        match self {
            SyncPhase::Uninitialized => "offline",
            SyncPhase::WaitingForSurface => "loading",
            SyncPhase::Synced => "ready",
            SyncPhase::Reconfiguring => "reloading",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A user-visible report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// The synchronization phase changed
    PhaseChanged(SyncPhase),
    /// Language, theme or font size changed
    ConfigChanged(SurfaceConfig),
    /// The code or its document name changed
    CodeChanged { code: String, document_name: String },
    /// Something worth telling the user
    Notice(Notice),
    /// A run request reached the surface
    RunTriggered,
    /// An artifact was written to disk
    Exported { path: PathBuf },
}

/// The synchronization state machine
pub struct SyncController<C: SurfaceConnector, S: CodeStore> {
    proxy: SurfaceProxy<C>,
    store: S,
    state: EditorState,
    phase: watch::Sender<SyncPhase>,
    phase_rx: watch::Receiver<SyncPhase>,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ControllerEvent>>,
    /// Instance for which no ready-timeout notice should be reported
    timeout_reported: Option<InstanceId>,
    /// Set after an implicit persist failed, until a write succeeds again
    storage_warned: bool,
}

impl<C: SurfaceConnector, S: CodeStore> SyncController<C, S> {
    pub fn new(proxy: SurfaceProxy<C>, store: S, config: SurfaceConfig) -> Self {
        let (phase, phase_rx) = watch::channel(SyncPhase::Uninitialized);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            proxy,
            store,
            state: EditorState::new(config),
            phase,
            phase_rx,
            event_tx,
            event_rx: Some(event_rx),
            timeout_reported: None,
            storage_warned: false,
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ControllerEvent>> {
        self.event_rx.take()
    }

    /// Watch phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase_rx.clone()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase_rx.borrow()
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn code(&self) -> &str {
        &self.state.code
    }

    pub fn proxy(&self) -> &SurfaceProxy<C> {
        &self.proxy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Copy of everything an export needs
    pub fn snapshot(&self) -> ExportSnapshot {
        ExportSnapshot::from_state(&self.state)
    }

    /// Instance still waiting for its ready signal, if a timeout applies to it
    pub fn waiting_instance(&self) -> Option<InstanceId> {
        if self.phase() != SyncPhase::WaitingForSurface {
            return None;
        }
        self.proxy
            .current_instance()
            .filter(|id| self.timeout_reported != Some(*id))
    }

    /// Report a notice to whoever listens for controller events
    pub fn report(&self, notice: Notice) {
        self.emit(ControllerEvent::Notice(notice));
    }

    pub(crate) fn emit(&self, event: ControllerEvent) {
        let _ = self.event_tx.send(event);
    }

    // ==================== Lifecycle ====================

    /// Seed the code from the store and create the first surface instance
    pub fn start(&mut self) {
        if self.phase() != SyncPhase::Uninitialized {
            debug!("Controller already started");
            return;
        }

        match self.store.load() {
            Ok(Some(code)) => {
                info!("Loaded {} bytes of saved code", code.len());
                self.state.code = code;
            }
            Ok(None) => debug!("No saved code"),
            Err(e) => {
                warn!("Failed to load saved code: {}", e);
                self.report(storage_notice("Could not load saved code", &e));
            }
        }
        self.emit_code_changed();

        self.proxy.subscribe();
        self.create_surface();
    }

    /// Release the inbound subscription and destroy the surface
    pub fn shutdown(&mut self) {
        self.proxy.unsubscribe();
        self.proxy.destroy();
        self.state.surface_ready = false;
        self.set_phase(SyncPhase::Uninitialized);
    }

    /// Recreate the surface with the current configuration
    pub fn reload(&mut self) {
        if self.phase() == SyncPhase::Uninitialized {
            debug!("Ignoring reload before start");
            return;
        }
        self.reconfigure();
    }

    // ==================== Configuration ====================

    /// Switch language; returns whether the surface was reloaded
    pub fn set_language(&mut self, language: Language) -> bool {
        if language == self.state.language {
            return false;
        }
        self.state.language = language;
        self.state.document_name = language.default_document_name();
        self.emit_code_changed();
        self.apply_config_change()
    }

    /// Switch theme; returns whether the surface was reloaded
    pub fn set_theme(&mut self, theme: Theme) -> bool {
        if theme == self.state.theme {
            return false;
        }
        self.state.theme = theme;
        self.report(Notice::info(format!("Switched to {} mode", theme)));
        self.apply_config_change()
    }

    pub fn toggle_theme(&mut self) -> bool {
        self.set_theme(self.state.theme.toggled())
    }

    /// Change the font size by `delta`, clamping to the valid range
    ///
    /// Returns whether the surface was reloaded; a change that clamps back
    /// to the current size does nothing.
    pub fn set_font_size(&mut self, delta: i32) -> bool {
        let size = self.state.font_size.offset(delta);
        if size == self.state.font_size {
            return false;
        }
        self.state.font_size = size;
        self.apply_config_change()
    }

    pub fn increase_font_size(&mut self) -> bool {
        let size = self.state.font_size.increased();
        self.set_font_size(size.get() as i32 - self.state.font_size.get() as i32)
    }

    pub fn decrease_font_size(&mut self) -> bool {
        let size = self.state.font_size.decreased();
        self.set_font_size(size.get() as i32 - self.state.font_size.get() as i32)
    }

    fn apply_config_change(&mut self) -> bool {
        self.emit(ControllerEvent::ConfigChanged(self.state.surface_config()));
        if self.phase() == SyncPhase::Uninitialized {
            // Picked up by the first instance on start
            return false;
        }
        self.reconfigure();
        true
    }

    fn reconfigure(&mut self) {
        self.state.surface_ready = false;
        self.set_phase(SyncPhase::Reconfiguring);
        self.create_surface();
    }

    fn create_surface(&mut self) -> InstanceId {
        let id = self.proxy.create(self.state.surface_config());
        self.state.surface_ready = false;
        self.timeout_reported = None;
        self.set_phase(SyncPhase::WaitingForSurface);
        id
    }

    // ==================== Surface events ====================

    /// Feed one raw surface event through the proxy's filters
    pub fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match self.proxy.accept(event) {
            Some(Inbound::Ready) => self.on_surface_ready(),
            Some(Inbound::Change(change)) => self.on_inbound_change(change),
            Some(Inbound::Lost(reason)) => self.on_surface_lost(&reason),
            None => {}
        }
    }

    /// The current instance finished initialization
    pub fn on_surface_ready(&mut self) {
        if self.phase() != SyncPhase::WaitingForSurface {
            debug!("Ignoring ready signal in phase {:?}", self.phase());
            return;
        }
        self.state.surface_ready = true;
        self.set_phase(SyncPhase::Synced);
        self.push_populate();
    }

    /// The surface reported new content
    pub fn on_inbound_change(&mut self, change: InboundChange) {
        if self.phase() != SyncPhase::Synced {
            debug!("Ignoring inbound change in phase {:?}", self.phase());
            return;
        }

        let renamed = change
            .document_name
            .filter(|name| *name != self.state.document_name);
        if change.content == self.state.code && renamed.is_none() {
            return;
        }

        self.state.code = change.content;
        if let Some(name) = renamed {
            self.state.document_name = name;
        }
        self.persist();
        self.emit_code_changed();
    }

    /// The current instance's connection ended
    pub fn on_surface_lost(&mut self, reason: &str) {
        if self.phase() == SyncPhase::Uninitialized {
            return;
        }
        warn!("Surface connection lost: {}", reason);
        self.state.surface_ready = false;
        self.timeout_reported = self.proxy.current_instance();
        self.set_phase(SyncPhase::WaitingForSurface);
        self.report(Notice::warning(format!("Editor connection lost: {}", reason)));
    }

    /// The ready timer for `instance` expired
    ///
    /// Reports at most once per instance and never retries on its own.
    pub fn on_ready_timeout(&mut self, instance: InstanceId) {
        if self.waiting_instance() != Some(instance) {
            return;
        }
        warn!("Surface {} did not report ready in time", instance);
        self.timeout_reported = Some(instance);
        self.report(Notice::warning("Editor did not finish loading"));
    }

    // ==================== Commands ====================

    /// Explicitly persist the current code
    pub fn save(&mut self) {
        match self.store.save(&self.state.code) {
            Ok(()) => {
                self.storage_warned = false;
                self.report(Notice::success("Code saved successfully!"));
            }
            Err(e) => {
                warn!("Failed to save code: {}", e);
                self.report(storage_notice("Failed to save code", &e));
            }
        }
    }

    /// Clear the code and the persisted entry
    pub fn reset(&mut self) {
        self.state.code.clear();
        match self.store.clear() {
            Ok(()) => self.storage_warned = false,
            Err(e) => {
                warn!("Failed to clear saved code: {}", e);
                self.report(storage_notice("Could not clear saved code", &e));
            }
        }
        if self.phase() == SyncPhase::Synced {
            self.push_populate();
        }
        self.emit_code_changed();
        self.report(Notice::warning("Code editor reset!"));
    }

    /// Pretty-print the code with `formatter`
    ///
    /// On failure the code is left untouched.
    pub async fn format<F: Formatter>(&mut self, formatter: &F) {
        if self.state.code.trim().is_empty() {
            debug!("Nothing to format");
            return;
        }

        let parser = Parser::for_language(self.state.language);
        let code = self.state.code.clone();
        match formatter.format(&code, parser).await {
            Ok(formatted) => {
                self.state.code = formatted;
                self.persist();
                if self.phase() == SyncPhase::Synced {
                    self.push_populate();
                }
                self.emit_code_changed();
                self.report(Notice::success("Code formatted successfully!"));
            }
            Err(e) => {
                warn!("Formatting failed: {}", e);
                self.report(Notice::error("Formatting failed."));
            }
        }
    }

    /// Ask the surface to run the current document
    pub fn run(&mut self) {
        if self.phase() != SyncPhase::Synced {
            self.report(Notice::info("Editor is still loading"));
            return;
        }
        match self.proxy.send(OutboundMessage::TriggerRun) {
            Ok(()) => self.emit(ControllerEvent::RunTriggered),
            Err(e) => {
                warn!("Failed to trigger run: {}", e);
                self.report(Notice::warning(format!("Could not reach the editor: {}", e)));
            }
        }
    }

    // ==================== Internals ====================

    fn set_phase(&mut self, phase: SyncPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!("Sync phase {:?} -> {:?}", previous, phase);
            self.emit(ControllerEvent::PhaseChanged(phase));
        }
    }

    fn push_populate(&self) {
        let message = OutboundMessage::populate(
            self.state.language,
            &self.state.document_name,
            &self.state.code,
        );
        if let Err(e) = self.proxy.send(message) {
            warn!("Failed to populate surface: {}", e);
        }
    }

    /// Implicit persist after a code mutation; warns once per failure streak
    fn persist(&mut self) {
        match self.store.save(&self.state.code) {
            Ok(()) => self.storage_warned = false,
            Err(e) => {
                warn!("Failed to persist code: {}", e);
                if !self.storage_warned {
                    self.storage_warned = true;
                    self.report(storage_notice("Changes are not being saved", &e));
                }
            }
        }
    }

    fn emit_code_changed(&self) {
        self.emit(ControllerEvent::CodeChanged {
            code: self.state.code.clone(),
            document_name: self.state.document_name.clone(),
        });
    }
}

fn storage_notice(context: &str, error: &StorageError) -> Notice {
    let message = match error.recovery_suggestion() {
        Some(hint) => format!("{}: {} {}", context, error, hint),
        None => format!("{}: {}", context, error),
    };
    if error.is_recoverable() {
        Notice::warning(message)
    } else {
        Notice::error(message)
    }
}

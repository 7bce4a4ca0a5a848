//! codedock core library
//!
//! This crate hosts an embedded, sandboxed code-editing surface and keeps a
//! local, persisted copy of the user's code in sync with it.
//!
//! # Architecture
//!
//! - **Surface proxy**: the editor lives behind a surface bridge and is
//!   reachable only through fire-and-forget messages
//! - **Sync controller**: the single source of truth for code, language,
//!   theme, font size and document name
//!
//! Every configuration change replaces the surface instance; the controller
//! re-populates it once the new instance reports ready.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut session = spawn_session(&config)?;
//!
//! session.dispatch(Action::Run).await?;
//! while let Some(event) = session.event_rx.recv().await {
//!     // render ControllerEvent
//! }
//! ```
//!
//! # Modules
//!
//! - `controller`: the synchronization state machine
//! - `surface`: surface proxy, bridge protocol and WebSocket connections
//! - `session`: tokio task owning a controller
//! - `actions`: user commands and their dispatcher
//! - `storage`: persistence of the code
//! - `export`: file and image export
//! - `format`: external pretty-printer
//! - `config`: application configuration

pub mod actions;
pub mod config;
pub mod controller;
pub mod export;
pub mod format;
pub mod models;
pub mod session;
pub mod storage;
pub mod surface;

pub use actions::{Action, Dispatcher};
pub use config::Config;
pub use controller::{ControllerEvent, Notice, NoticeLevel, SyncController, SyncPhase};
pub use export::{Artifact, ExportError, ExportSnapshot};
pub use format::{CommandFormatter, FormatError, Formatter, Parser};
pub use models::{EditorState, FontSize, Language, SurfaceConfig, Theme};
pub use session::{spawn_session, SessionCommand, SessionHandle};
pub use storage::{CodeStore, FileCodeStore, MemoryCodeStore, StorageError};

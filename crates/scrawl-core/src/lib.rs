//! Scrawl Core Library
//!
//! Platform-agnostic state and logic for the Scrawl drawing surface:
//! elements, the undo/redo history, hit-testing, the gesture state machine,
//! the content cache, session persistence and the collaboration bus.

pub mod collab;
pub mod config;
pub mod content;
pub mod editor;
pub mod element;
pub mod history;
pub mod hit;
pub mod input;
pub mod interaction;
pub mod notice;
pub mod session;
pub mod storage;
pub mod time;
pub mod tools;

pub use collab::{ChannelHub, CollabError, Envelope, EventBus, Transport, TransportError};
pub use config::EditorConfig;
pub use content::{ContentCache, ContentId};
pub use editor::{CollabStores, Editor};
pub use element::{Element, ElementId, GeometryError, HexColor};
pub use history::{History, HistoryConfig, Snapshot};
pub use input::{Key, KeyEvent, Modifiers, PointerEvent};
pub use interaction::{Action, Interaction};
pub use notice::Notice;
pub use session::{DocumentId, Session, SessionError};
pub use storage::{KeyValueStore, StorageError};
pub use tools::ToolKind;

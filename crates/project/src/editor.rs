use std::sync::Arc;

use thiserror::Error;

use crate::events::{EventEmitter, Subscription};
use crate::location::DocumentLocation;

/// Handle to a notebook document that is open in an editor.
/// 編輯器中已開啟的筆記本文件。
pub trait NotebookDocument: Send + Sync {
    fn location(&self) -> &DocumentLocation;
}

/// Shared document handle delivered with open/close events.
pub type DocumentHandle = Arc<dyn NotebookDocument>;

/// Callback registered for editor lifecycle events.
pub type EditorListener = Box<dyn Fn(&DocumentHandle) + Send + Sync>;

/// Failure reported by an editor provider when opening a document.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("document not found: {0}")]
    NotFound(DocumentLocation),
}

/// Host-side editor lifecycle the view tracker plugs into.
/// 檢視追蹤器所依附的宿主編輯器生命週期。
pub trait EditorProvider: Send + Sync {
    fn on_did_open_editor(&self, listener: EditorListener) -> Subscription;

    fn on_did_close_editor(&self, listener: EditorListener) -> Subscription;

    /// Requests an editor for `location`.
    fn open(&self, location: &DocumentLocation) -> Result<(), EditorError>;
}

/// Plain document handle carrying only its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleDocument {
    location: DocumentLocation,
}

impl SimpleDocument {
    pub fn new(location: DocumentLocation) -> Self {
        Self { location }
    }

    pub fn handle(location: DocumentLocation) -> DocumentHandle {
        Arc::new(Self::new(location))
    }
}

impl NotebookDocument for SimpleDocument {
    fn location(&self) -> &DocumentLocation {
        &self.location
    }
}

/// Open/close event pair for providers built on [`EventEmitter`].
/// 以 [`EventEmitter`] 實作的開啟/關閉事件組。
#[derive(Debug, Default)]
pub struct EditorEvents {
    opened: EventEmitter<DocumentHandle>,
    closed: EventEmitter<DocumentHandle>,
}

impl EditorEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_opened(&self, listener: EditorListener) -> Subscription {
        self.opened.subscribe(move |document| listener(document))
    }

    pub fn subscribe_closed(&self, listener: EditorListener) -> Subscription {
        self.closed.subscribe(move |document| listener(document))
    }

    pub fn fire_opened(&self, document: &DocumentHandle) {
        self.opened.fire(document);
    }

    pub fn fire_closed(&self, document: &DocumentHandle) {
        self.closed.fire(document);
    }

    pub fn listener_count(&self) -> usize {
        self.opened.listener_count() + self.closed.listener_count()
    }
}

//! Notebook view tracking for workspaces: remembers which notebook editors were
//! open and reopens them when the workspace is activated again.
//! 工作區筆記本檢視追蹤：記錄開啟中的筆記本編輯器，並於工作區再次啟動時重新開啟。

mod util;

pub mod disposable;
pub mod editor;
pub mod events;
pub mod location;
pub mod memento;
pub mod tracker;
pub mod workspace;

pub use disposable::{Disposable, DisposableRegistry};
pub use editor::{
    DocumentHandle, EditorError, EditorEvents, EditorListener, EditorProvider, NotebookDocument,
    SimpleDocument,
};
pub use events::{EventEmitter, Listener, Subscription};
pub use location::{DocumentLocation, LocationError};
pub use memento::{InMemoryMemento, Memento, MementoError, MementoExt};
pub use tracker::{ActivationReport, TrackedDocuments, TrackerOptions, ViewTracker, MEMENTO_KEY};
pub use workspace::{FileMemento, MementoStore, WorkspaceId};

//! Remembers which notebook editors were open in a workspace and reopens them
//! on the next activation.
//! 記錄工作區中開啟的筆記本編輯器，並於下次啟動時重新開啟。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::disposable::DisposableRegistry;
use crate::editor::{DocumentHandle, EditorProvider, NotebookDocument};
use crate::location::DocumentLocation;
use crate::memento::{Memento, MementoError, MementoExt};

/// Memento key holding the list of open notebook identifiers.
pub const MEMENTO_KEY: &str = "nativeEditorViewTracking";

/// Tunables for [`ViewTracker`].
/// [`ViewTracker`] 的設定值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerOptions {
    pub memento_key: String,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            memento_key: MEMENTO_KEY.to_string(),
        }
    }
}

/// Persisted list of open document identifiers inside a workspace memento.
/// 工作區狀態中保存的已開啟文件清單。
///
/// Each operation is a separate read-modify-write; concurrent writers race
/// and the last write wins.
#[derive(Clone)]
pub struct TrackedDocuments {
    memento: Arc<dyn Memento>,
    key: Arc<str>,
}

impl TrackedDocuments {
    pub fn new(memento: Arc<dyn Memento>, key: impl Into<Arc<str>>) -> Self {
        Self {
            memento,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored identifiers in insertion order; absent or unreadable → empty.
    pub fn list(&self) -> Vec<String> {
        self.memento.get_or(&self.key, Vec::new())
    }

    /// Appends `identifier` unless already present. Returns whether it was added.
    pub fn insert(&self, identifier: &str) -> Result<bool, MementoError> {
        let mut list = self.list();
        if list.iter().any(|entry| entry == identifier) {
            return Ok(false);
        }
        list.push(identifier.to_string());
        self.memento.put(&self.key, &list)?;
        Ok(true)
    }

    /// Drops every occurrence of `identifier`. Returns whether anything was removed.
    pub fn remove(&self, identifier: &str) -> Result<bool, MementoError> {
        let mut list = self.list();
        let before = list.len();
        list.retain(|entry| entry != identifier);
        if list.len() == before {
            return Ok(false);
        }
        self.memento.put(&self.key, &list)?;
        Ok(true)
    }

    /// Deletes the key entirely.
    pub fn clear(&self) -> Result<(), MementoError> {
        self.memento.remove(&self.key)
    }

    fn record_opened(&self, document: &dyn NotebookDocument) {
        let identifier = document.location().to_string();
        match self.insert(&identifier) {
            Ok(true) => debug!(document = %identifier, "tracking notebook editor"),
            Ok(false) => {}
            Err(err) => {
                warn!(document = %identifier, error = %err, "failed to track notebook editor")
            }
        }
    }

    fn record_closed(&self, document: &dyn NotebookDocument) {
        let identifier = document.location().to_string();
        match self.remove(&identifier) {
            Ok(true) => debug!(document = %identifier, "stopped tracking notebook editor"),
            Ok(false) => {}
            Err(err) => {
                warn!(document = %identifier, error = %err, "failed to untrack notebook editor")
            }
        }
    }
}

/// Outcome of [`ViewTracker::activate`], for diagnostics only.
/// 啟動還原的結果，僅供除錯使用。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Locations the provider accepted.
    pub restored: Vec<DocumentLocation>,
    /// Locations the provider failed to open, with the reason.
    pub failed: Vec<(DocumentLocation, String)>,
    /// Stored identifiers that could not be parsed back into a location.
    pub skipped: Vec<String>,
}

impl ActivationReport {
    pub fn attempted(&self) -> usize {
        self.restored.len() + self.failed.len()
    }
}

/// Keeps the workspace memento in sync with open notebook editors and
/// restores them on activation.
/// 讓工作區狀態與已開啟的筆記本編輯器保持一致，並於啟動時還原。
pub struct ViewTracker {
    provider: Arc<dyn EditorProvider>,
    documents: TrackedDocuments,
}

impl ViewTracker {
    /// Subscribes to the provider's open/close events; both subscriptions are
    /// handed to `disposables` for cleanup at shutdown.
    pub fn new(
        provider: Arc<dyn EditorProvider>,
        memento: Arc<dyn Memento>,
        disposables: &mut DisposableRegistry,
    ) -> Self {
        Self::with_options(provider, memento, disposables, TrackerOptions::default())
    }

    pub fn with_options(
        provider: Arc<dyn EditorProvider>,
        memento: Arc<dyn Memento>,
        disposables: &mut DisposableRegistry,
        options: TrackerOptions,
    ) -> Self {
        let documents = TrackedDocuments::new(memento, options.memento_key);

        let on_open = documents.clone();
        disposables.push(provider.on_did_open_editor(Box::new(move |document: &DocumentHandle| {
            on_open.record_opened(document.as_ref())
        })));
        let on_close = documents.clone();
        disposables.push(provider.on_did_close_editor(Box::new(move |document: &DocumentHandle| {
            on_close.record_closed(document.as_ref())
        })));

        Self {
            provider,
            documents,
        }
    }

    /// Reopens every remembered notebook once, draining the stored list first so a
    /// second activation does not reopen the same set. Failures never abort the loop.
    /// 重新開啟所有記錄的筆記本；先清空儲存清單，單一失敗不影響其餘項目。
    pub fn activate(&self) -> ActivationReport {
        let mut seen = HashSet::new();
        let pending: Vec<String> = self
            .documents
            .list()
            .into_iter()
            .filter(|identifier| seen.insert(identifier.clone()))
            .collect();

        if let Err(err) = self.documents.clear() {
            warn!(error = %err, "failed to clear tracked notebook list");
        }

        let mut report = ActivationReport::default();
        for identifier in pending {
            let location = match DocumentLocation::parse(&identifier) {
                Ok(location) => location,
                Err(err) => {
                    debug!(
                        document = %identifier,
                        error = %err,
                        "skipping malformed notebook identifier"
                    );
                    report.skipped.push(identifier);
                    continue;
                }
            };
            match self.provider.open(&location) {
                Ok(()) => report.restored.push(location),
                Err(err) => {
                    debug!(document = %location, error = %err, "ignoring notebook reopen failure");
                    report.failed.push((location, err.to_string()));
                }
            }
        }

        debug!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "notebook editors restored"
        );
        report
    }

    pub fn on_document_opened(&self, document: &dyn NotebookDocument) {
        self.documents.record_opened(document);
    }

    pub fn on_document_closed(&self, document: &dyn NotebookDocument) {
        self.documents.record_closed(document);
    }

    /// Identifiers currently persisted for reopening.
    pub fn tracked(&self) -> Vec<String> {
        self.documents.list()
    }

    pub fn documents(&self) -> &TrackedDocuments {
        &self.documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{EditorError, EditorEvents, EditorListener, SimpleDocument};
    use crate::events::Subscription;
    use crate::memento::InMemoryMemento;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Memento whose writes can be switched to fail while reads keep working.
    #[derive(Default)]
    struct FlakyMemento {
        inner: InMemoryMemento,
        reject_writes: AtomicBool,
    }

    impl FlakyMemento {
        fn reject_writes(&self, reject: bool) {
            self.reject_writes.store(reject, Ordering::SeqCst);
        }
    }

    impl Memento for FlakyMemento {
        fn get(&self, key: &str) -> Option<Value> {
            self.inner.get(key)
        }

        fn update(&self, key: &str, value: Option<Value>) -> Result<(), MementoError> {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(MementoError::Unavailable("writes rejected".to_string()));
            }
            self.inner.update(key, value)
        }

        fn keys(&self) -> Vec<String> {
            self.inner.keys()
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        events: EditorEvents,
        opened: Mutex<Vec<String>>,
        failing: Vec<String>,
    }

    impl EditorProvider for FakeProvider {
        fn on_did_open_editor(&self, listener: EditorListener) -> Subscription {
            self.events.subscribe_opened(listener)
        }

        fn on_did_close_editor(&self, listener: EditorListener) -> Subscription {
            self.events.subscribe_closed(listener)
        }

        fn open(&self, location: &DocumentLocation) -> Result<(), EditorError> {
            let identifier = location.to_string();
            self.opened.lock().unwrap().push(identifier.clone());
            if self.failing.contains(&identifier) {
                return Err(EditorError::NotFound(location.clone()));
            }
            Ok(())
        }
    }

    fn document(identifier: &str) -> DocumentHandle {
        SimpleDocument::handle(DocumentLocation::parse(identifier).unwrap())
    }

    fn setup(
        provider: FakeProvider,
    ) -> (
        Arc<FakeProvider>,
        Arc<InMemoryMemento>,
        ViewTracker,
        DisposableRegistry,
    ) {
        let provider = Arc::new(provider);
        let memento = Arc::new(InMemoryMemento::new());
        let mut disposables = DisposableRegistry::new();
        let tracker = ViewTracker::new(provider.clone(), memento.clone(), &mut disposables);
        (provider, memento, tracker, disposables)
    }

    #[test]
    fn open_events_are_recorded_once() {
        let (provider, memento, tracker, _disposables) = setup(FakeProvider::default());
        provider.events.fire_opened(&document("fileA.ipynb"));
        provider.events.fire_opened(&document("fileA.ipynb"));
        provider.events.fire_opened(&document("fileB.ipynb"));

        assert_eq!(tracker.tracked(), vec!["fileA.ipynb", "fileB.ipynb"]);
        assert_eq!(memento.get(MEMENTO_KEY), Some(json!(["fileA.ipynb", "fileB.ipynb"])));
    }

    #[test]
    fn close_of_unknown_document_is_a_no_op() {
        let (provider, memento, tracker, _disposables) = setup(FakeProvider::default());
        provider.events.fire_closed(&document("ghost.ipynb"));
        assert!(memento.get(MEMENTO_KEY).is_none());

        tracker.on_document_opened(document("fileA.ipynb").as_ref());
        tracker.on_document_closed(document("ghost.ipynb").as_ref());
        assert_eq!(tracker.tracked(), vec!["fileA.ipynb"]);
    }

    #[test]
    fn close_removes_duplicates_too() {
        let (provider, memento, tracker, _disposables) = setup(FakeProvider::default());
        memento
            .update(MEMENTO_KEY, Some(json!(["a.ipynb", "b.ipynb", "a.ipynb"])))
            .unwrap();
        provider.events.fire_closed(&document("a.ipynb"));
        assert_eq!(tracker.tracked(), vec!["b.ipynb"]);
    }

    #[test]
    fn activation_reopens_distinct_entries_and_drains_the_key() {
        let (provider, memento, tracker, _disposables) = setup(FakeProvider::default());
        memento
            .update(
                MEMENTO_KEY,
                Some(json!(["fileA.ipynb", "fileB.ipynb", "fileA.ipynb"])),
            )
            .unwrap();

        let report = tracker.activate();
        assert_eq!(*provider.opened.lock().unwrap(), vec!["fileA.ipynb", "fileB.ipynb"]);
        assert_eq!(report.restored.len(), 2);
        assert!(memento.get(MEMENTO_KEY).is_none());

        let second = tracker.activate();
        assert_eq!(second.attempted(), 0);
        assert_eq!(provider.opened.lock().unwrap().len(), 2);
    }

    #[test]
    fn failures_and_malformed_entries_do_not_block_the_rest() {
        let provider = FakeProvider {
            failing: vec!["broken.ipynb".to_string()],
            ..FakeProvider::default()
        };
        let (provider, memento, tracker, _disposables) = setup(provider);
        memento
            .update(
                MEMENTO_KEY,
                Some(json!(["broken.ipynb", "", "http://[bad", "good.ipynb"])),
            )
            .unwrap();

        let report = tracker.activate();
        assert_eq!(*provider.opened.lock().unwrap(), vec!["broken.ipynb", "good.ipynb"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.skipped, vec!["".to_string(), "http://[bad".to_string()]);
        assert_eq!(report.restored, vec![DocumentLocation::parse("good.ipynb").unwrap()]);
        assert!(memento.get(MEMENTO_KEY).is_none());
    }

    #[test]
    fn unreadable_list_activates_as_empty() {
        let (provider, memento, tracker, _disposables) = setup(FakeProvider::default());
        memento.update(MEMENTO_KEY, Some(json!("not-a-list"))).unwrap();
        let report = tracker.activate();
        assert_eq!(report, ActivationReport::default());
        assert!(provider.opened.lock().unwrap().is_empty());
        assert!(memento.get(MEMENTO_KEY).is_none());
    }

    #[test]
    fn custom_key_is_respected() {
        let provider = Arc::new(FakeProvider::default());
        let memento = Arc::new(InMemoryMemento::new());
        let mut disposables = DisposableRegistry::new();
        let options = TrackerOptions {
            memento_key: "custom".to_string(),
        };
        let tracker =
            ViewTracker::with_options(provider.clone(), memento.clone(), &mut disposables, options);

        provider.events.fire_opened(&document("x.ipynb"));
        assert_eq!(tracker.documents().key(), "custom");
        assert_eq!(memento.get("custom"), Some(json!(["x.ipynb"])));
        assert!(memento.get(MEMENTO_KEY).is_none());
    }

    #[test]
    fn disposing_stops_tracking() {
        let (provider, memento, _tracker, mut disposables) = setup(FakeProvider::default());
        assert_eq!(disposables.len(), 2);
        assert_eq!(provider.events.listener_count(), 2);

        disposables.dispose();
        assert_eq!(provider.events.listener_count(), 0);
        provider.events.fire_opened(&document("late.ipynb"));
        assert!(memento.get(MEMENTO_KEY).is_none());
    }

    #[test]
    fn storage_failures_in_event_handlers_are_contained() {
        let provider = Arc::new(FakeProvider::default());
        let memento = Arc::new(FlakyMemento::default());
        let mut disposables = DisposableRegistry::new();
        let tracker = ViewTracker::new(provider.clone(), memento.clone(), &mut disposables);

        provider.events.fire_opened(&document("kept.ipynb"));
        memento.reject_writes(true);

        provider.events.fire_opened(&document("lost.ipynb"));
        provider.events.fire_closed(&document("kept.ipynb"));
        tracker.on_document_opened(document("lost.ipynb").as_ref());
        assert_eq!(tracker.tracked(), vec!["kept.ipynb"]);
        assert!(tracker.documents().insert("lost.ipynb").is_err());

        memento.reject_writes(false);
        provider.events.fire_opened(&document("lost.ipynb"));
        assert_eq!(tracker.tracked(), vec!["kept.ipynb", "lost.ipynb"]);
    }

    #[test]
    fn failed_clear_still_reopens_every_entry() {
        let provider = Arc::new(FakeProvider::default());
        let memento = Arc::new(FlakyMemento::default());
        let mut disposables = DisposableRegistry::new();
        let tracker = ViewTracker::new(provider.clone(), memento.clone(), &mut disposables);
        memento
            .update(MEMENTO_KEY, Some(json!(["a.ipynb", "b.ipynb", "a.ipynb"])))
            .unwrap();
        memento.reject_writes(true);

        let report = tracker.activate();
        assert_eq!(*provider.opened.lock().unwrap(), vec!["a.ipynb", "b.ipynb"]);
        assert_eq!(report.restored.len(), 2);
        assert_eq!(
            memento.get(MEMENTO_KEY),
            Some(json!(["a.ipynb", "b.ipynb", "a.ipynb"]))
        );
    }
}

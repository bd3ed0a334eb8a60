use crate::api::{ApiClient, ApiResult, RemoteOperationFailed, WorkspaceApi};
use crate::models::{File, FileId};
use crate::state::store::WorkspaceStore;
use crate::util::now_ms;
use leptos::logging::warn;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use wasm_bindgen::JsCast;

/// What the editor header shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    /// A debounce window is open for the open file.
    Pending,
    Saving,
    Saved,
    Failed(String),
}

/// A save captured when its debounce window opened.
///
/// The file id and content are fixed at capture time, so switching files
/// before the deadline can never redirect the save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSave {
    pub file_id: FileId,
    pub content: String,
    pub due_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SaveTrigger {
    Debounce,
    Explicit,
}

/// Saves of one file that have been sent but not answered yet.
#[derive(Clone, Debug, Default)]
struct InFlight {
    count: usize,
    /// Content of the most recently sent save.
    latest: String,
}

/// Debounced autosave for the editor buffer.
///
/// Time is passed in explicitly (`now_ms`); [`AutosaveTimers`] supplies the
/// browser clock and timeouts.
#[derive(Clone)]
pub struct AutosaveCoordinator<A: WorkspaceApi = ApiClient> {
    store: WorkspaceStore<A>,
    debounce_ms: i64,

    /// Edit buffer of the open file. Never cleared by a failed save.
    buffer: RwSignal<String>,

    /// Save status per file; the header shows the open file's entry.
    statuses: RwSignal<HashMap<FileId, SaveStatus>>,
    in_flight_total: RwSignal<usize>,

    /// Per-file pending saves; a new edit replaces the entry for its file.
    pending: Arc<Mutex<HashMap<FileId, PendingSave>>>,
    in_flight: Arc<Mutex<HashMap<FileId, InFlight>>>,
    /// Content whose save failed, kept until the file is edited or saved.
    unsaved: Arc<Mutex<HashMap<FileId, String>>>,
}

impl<A: WorkspaceApi> AutosaveCoordinator<A> {
    pub fn new(store: WorkspaceStore<A>, debounce_ms: i64) -> Self {
        Self {
            store,
            debounce_ms: debounce_ms.max(0),
            buffer: RwSignal::new(String::new()),
            statuses: RwSignal::new(HashMap::new()),
            in_flight_total: RwSignal::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            unsaved: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &WorkspaceStore<A> {
        &self.store
    }

    pub fn debounce_ms(&self) -> i64 {
        self.debounce_ms
    }

    pub fn buffer(&self) -> ReadSignal<String> {
        self.buffer.read_only()
    }

    /// Status of whichever file is open.
    pub fn status(&self) -> Signal<SaveStatus> {
        let current = self.store.current_file();
        let statuses = self.statuses;
        Signal::derive(move || {
            current
                .with(|f| f.as_ref().map(|f| f.id))
                .and_then(|id| statuses.with(|m| m.get(&id).cloned()))
                .unwrap_or(SaveStatus::Idle)
        })
    }

    pub fn status_of(&self, file_id: FileId) -> SaveStatus {
        self.statuses
            .with_untracked(|m| m.get(&file_id).cloned())
            .unwrap_or(SaveStatus::Idle)
    }

    fn set_status(&self, file_id: FileId, status: SaveStatus) {
        self.statuses.update(|m| {
            m.insert(file_id, status);
        });
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight_total.get() > 0
    }

    fn open_file_id(&self) -> Option<FileId> {
        self.store
            .current_file()
            .with_untracked(|f| f.as_ref().map(|f| f.id))
    }

    fn in_flight_for(&self, file_id: FileId) -> Option<InFlight> {
        self.in_flight
            .lock()
            .ok()
            .and_then(|map| map.get(&file_id).cloned())
    }

    /// What the server will hold for `file_id` once in-flight saves land: the
    /// latest sent content, else the last confirmed content.
    fn expected_content(&self, file_id: FileId) -> Option<String> {
        if let Some(sent) = self.in_flight_for(file_id) {
            return Some(sent.latest);
        }
        self.store.file(file_id).map(|f| f.content).or_else(|| {
            self.store.current_file().with_untracked(|c| {
                c.as_ref()
                    .filter(|c| c.id == file_id)
                    .map(|c| c.content.clone())
            })
        })
    }

    pub fn pending_for(&self, file_id: FileId) -> Option<PendingSave> {
        self.pending
            .lock()
            .ok()
            .and_then(|map| map.get(&file_id).cloned())
    }

    pub fn pending_saves(&self) -> Vec<PendingSave> {
        let mut out: Vec<PendingSave> = self
            .pending
            .lock()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|p| (p.due_ms, p.file_id));
        out
    }

    fn drop_pending(&self, file_id: FileId) -> Option<PendingSave> {
        self.pending
            .lock()
            .ok()
            .and_then(|mut map| map.remove(&file_id))
    }

    fn unsaved_for(&self, file_id: FileId) -> Option<String> {
        self.unsaved
            .lock()
            .ok()
            .and_then(|map| map.get(&file_id).cloned())
    }

    fn set_unsaved(&self, file_id: FileId, content: Option<String>) {
        if let Ok(mut map) = self.unsaved.lock() {
            match content {
                Some(c) => map.insert(file_id, c),
                None => map.remove(&file_id),
            };
        }
    }

    /// Milliseconds until the pending save of `file_id` is due, if it has one.
    pub fn delay_until_due(&self, file_id: FileId, now_ms: i64) -> Option<i64> {
        self.pending_for(file_id)
            .map(|p| (p.due_ms - now_ms).max(0))
    }

    /// Select `file` and load it into the buffer.
    ///
    /// Saves pending for other files stay scheduled under their own ids. If the
    /// file being opened still has unsaved edits (pending, or kept after a
    /// failed save), those are shown instead of the persisted content.
    pub fn open_file(&self, file: Option<File>) {
        let content = match &file {
            Some(f) => self
                .pending_for(f.id)
                .map(|p| p.content)
                .or_else(|| self.unsaved_for(f.id))
                .unwrap_or_else(|| f.content.clone()),
            None => String::new(),
        };

        self.store.set_current_file(file);
        self.buffer.set(content);
    }

    /// Record an edit to the open file.
    ///
    /// Returns the (re)scheduled save, or `None` when nothing needs saving
    /// (no open file, or the text matches what the server will hold).
    pub fn content_changed(&self, text: &str, now_ms: i64) -> Option<PendingSave> {
        let file_id = self.open_file_id()?;
        self.buffer.set(text.to_string());
        self.set_unsaved(file_id, None);
        let sending = self.in_flight_for(file_id).is_some();

        if self.expected_content(file_id).as_deref() == Some(text) {
            self.drop_pending(file_id);
            if !sending {
                self.set_status(file_id, SaveStatus::Idle);
            }
            return None;
        }

        let save = PendingSave {
            file_id,
            content: text.to_string(),
            due_ms: now_ms + self.debounce_ms,
        };
        if let Ok(mut map) = self.pending.lock() {
            map.insert(file_id, save.clone());
        }
        if !sending {
            self.set_status(file_id, SaveStatus::Pending);
        }
        Some(save)
    }

    /// Remove and return every pending save whose window has closed.
    pub fn take_due(&self, now_ms: i64) -> Vec<PendingSave> {
        let mut due: Vec<PendingSave> = match self.pending.lock() {
            Ok(mut map) => {
                let ids: Vec<FileId> = map
                    .values()
                    .filter(|p| p.due_ms <= now_ms)
                    .map(|p| p.file_id)
                    .collect();
                ids.into_iter().filter_map(|id| map.remove(&id)).collect()
            }
            Err(_) => Vec::new(),
        };
        due.sort_by_key(|p| (p.due_ms, p.file_id));
        due
    }

    /// Issue the saves whose debounce window has elapsed.
    ///
    /// Failures are logged and reflected in the file's status; they are not
    /// retried. Returns how many update requests were sent.
    pub async fn flush_due(&self, now_ms: i64) -> usize {
        let mut sent = 0;
        for save in self.take_due(now_ms) {
            if self.send_pending(save).await {
                sent += 1;
            }
        }
        sent
    }

    /// Issue the pending save of `file_id` whatever its deadline.
    ///
    /// Used when that file's timer fires. Returns whether a request was sent.
    pub async fn flush_file(&self, file_id: FileId) -> bool {
        match self.drop_pending(file_id) {
            Some(save) => self.send_pending(save).await,
            None => false,
        }
    }

    async fn send_pending(&self, save: PendingSave) -> bool {
        matches!(
            self.save_captured(save.file_id, save.content, SaveTrigger::Debounce)
                .await,
            Ok(Some(_)) | Err(_)
        )
    }

    /// Save the open file's buffer right away.
    ///
    /// Any debounce pending for the same file is superseded. Returns `Ok(None)`
    /// when no file is open.
    pub async fn save_now(&self) -> ApiResult<Option<File>> {
        let Some(file_id) = self.open_file_id() else {
            return Ok(None);
        };
        self.drop_pending(file_id);
        let content = self.buffer.get_untracked();
        self.save_captured(file_id, content, SaveTrigger::Explicit)
            .await
    }

    async fn save_captured(
        &self,
        file_id: FileId,
        content: String,
        trigger: SaveTrigger,
    ) -> ApiResult<Option<File>> {
        // An explicit save (or an earlier debounce) may already carry it.
        if trigger == SaveTrigger::Debounce
            && self.expected_content(file_id).as_deref() == Some(content.as_str())
        {
            return Ok(None);
        }

        self.begin_send(file_id, &content);
        self.set_status(file_id, SaveStatus::Saving);

        let result = self.store.update_file(file_id, None, Some(&content)).await;

        let still_sending = self.end_send(file_id);

        match result {
            Ok(file) => {
                self.store.refresh_current_file(&file);
                self.set_unsaved(file_id, None);
                if !still_sending {
                    let next = if self.pending_for(file_id).is_some() {
                        SaveStatus::Pending
                    } else {
                        SaveStatus::Saved
                    };
                    self.set_status(file_id, next);
                }
                Ok(Some(file))
            }
            Err(e) => {
                match trigger {
                    SaveTrigger::Debounce => warn!("autosave failed for file {file_id}: {e}"),
                    SaveTrigger::Explicit => warn!("save failed for file {file_id}: {e}"),
                }
                self.set_status(file_id, SaveStatus::Failed(e.message.clone()));
                if self.pending_for(file_id).is_none() {
                    self.set_unsaved(file_id, Some(content));
                }
                Err(e)
            }
        }
    }

    fn begin_send(&self, file_id: FileId, content: &str) {
        if let Ok(mut map) = self.in_flight.lock() {
            let entry = map.entry(file_id).or_default();
            entry.count += 1;
            entry.latest = content.to_string();
        }
        self.in_flight_total.update(|n| *n += 1);
    }

    /// Returns whether other saves of the file are still outstanding.
    fn end_send(&self, file_id: FileId) -> bool {
        self.in_flight_total.update(|n| *n = n.saturating_sub(1));
        let Ok(mut map) = self.in_flight.lock() else {
            return false;
        };
        let Some(entry) = map.get_mut(&file_id) else {
            return false;
        };
        entry.count = entry.count.saturating_sub(1);
        if entry.count == 0 {
            map.remove(&file_id);
            false
        } else {
            true
        }
    }

    /// Delete a file and forget any save still pending for it.
    pub async fn delete_file(&self, file_id: FileId) -> ApiResult<()> {
        self.store.delete_file(file_id).await?;
        self.drop_pending(file_id);
        self.set_unsaved(file_id, None);
        self.statuses.update(|m| {
            m.remove(&file_id);
        });
        if self.open_file_id() == Some(file_id) {
            self.open_file(None);
        }
        Ok(())
    }
}

/// Browser driver: one `setTimeout` per file with a pending save.
///
/// A new edit clears the file's previous timeout before arming a new one. When
/// a timeout fires it sends that file's pending save.
#[derive(Clone)]
pub struct AutosaveTimers<A: WorkspaceApi = ApiClient> {
    coordinator: AutosaveCoordinator<A>,
    /// File id -> (arm sequence, timeout handle).
    handles: Arc<Mutex<HashMap<FileId, (u64, i32)>>>,
    next_seq: Arc<AtomicU64>,
}

impl<A: WorkspaceApi> AutosaveTimers<A> {
    pub fn new(coordinator: AutosaveCoordinator<A>) -> Self {
        Self {
            coordinator,
            handles: Arc::new(Mutex::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn coordinator(&self) -> &AutosaveCoordinator<A> {
        &self.coordinator
    }

    /// Called by the editor on each input.
    pub fn content_changed(&self, text: &str) {
        let now = now_ms();
        match self.coordinator.content_changed(text, now) {
            Some(save) => self.schedule(save.file_id, save.due_ms - now),
            None => {
                if let Some(id) = self.coordinator.open_file_id() {
                    self.cancel(id);
                }
            }
        }
    }

    /// Explicit save from the toolbar or keyboard shortcut.
    pub fn save(&self) {
        if let Some(id) = self.coordinator.open_file_id() {
            self.cancel(id);
        }
        let c = self.coordinator.clone();
        spawn_local(async move {
            let _ = c.save_now().await;
        });
    }

    /// Delete a file. On failure the file keeps its pending save, so its
    /// timer is re-armed and `on_error` runs.
    pub fn delete_file(
        &self,
        file_id: FileId,
        on_error: impl FnOnce(RemoteOperationFailed) + 'static,
    ) {
        self.cancel(file_id);
        let timers = self.clone();
        spawn_local(async move {
            if let Err(e) = timers.coordinator.delete_file(file_id).await {
                timers.rearm(file_id);
                on_error(e);
            }
        });
    }

    fn rearm(&self, file_id: FileId) {
        if let Some(delay) = self.coordinator.delay_until_due(file_id, now_ms()) {
            self.schedule(file_id, delay);
        }
    }

    fn schedule(&self, file_id: FileId, delay_ms: i64) {
        self.cancel(file_id);

        let Some(win) = web_sys::window() else {
            return;
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let timers = self.clone();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            timers.forget(file_id, seq);
            let c = timers.coordinator.clone();
            spawn_local(async move {
                c.flush_file(file_id).await;
            });
        });

        let delay = delay_ms.clamp(0, i32::MAX as i64) as i32;
        let Ok(tid) = win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            delay,
        ) else {
            return;
        };

        if let Ok(mut map) = self.handles.lock() {
            map.insert(file_id, (seq, tid));
        }
    }

    /// Drop the handle of a timer that has fired, unless it was replaced.
    fn forget(&self, file_id: FileId, seq: u64) {
        if let Ok(mut map) = self.handles.lock() {
            if map.get(&file_id).is_some_and(|(s, _)| *s == seq) {
                map.remove(&file_id);
            }
        }
    }

    fn cancel(&self, file_id: FileId) {
        let handle = self
            .handles
            .lock()
            .ok()
            .and_then(|mut map| map.remove(&file_id));
        if let (Some((_, tid)), Some(win)) = (handle, web_sys::window()) {
            win.clear_timeout_with_handle(tid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{Call, FakeApi};
    use futures::executor::block_on;

    const WINDOW: i64 = 2000;

    fn setup() -> (FakeApi, AutosaveCoordinator<FakeApi>) {
        let api = FakeApi::new();
        api.seed_file(1, "Scene 1", "once upon", None);
        api.seed_file(2, "Scene 2", "meanwhile", None);
        let store = WorkspaceStore::new(api.clone());
        block_on(store.load()).expect("load");
        api.clear_calls();
        let coordinator = AutosaveCoordinator::new(store, WINDOW);
        (api, coordinator)
    }

    fn open(c: &AutosaveCoordinator<FakeApi>, id: FileId) {
        c.open_file(c.store().file(id));
    }

    #[test]
    fn test_open_file_loads_buffer() {
        let (api, c) = setup();
        open(&c, 1);
        assert_eq!(c.buffer().get_untracked(), "once upon");
        assert_eq!(c.status().get_untracked(), SaveStatus::Idle);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_rapid_edits_coalesce_into_one_save() {
        let (api, c) = setup();
        open(&c, 1);

        c.content_changed("once upon a", 0);
        c.content_changed("once upon a ti", 500);
        let last = c.content_changed("once upon a time", 1000).expect("scheduled");
        assert_eq!(last.due_ms, 3000);

        assert_eq!(block_on(c.flush_due(2000)), 0);
        assert_eq!(block_on(c.flush_due(2999)), 0);
        assert!(api.calls().is_empty());

        assert_eq!(block_on(c.flush_due(3000)), 1);
        assert_eq!(
            api.content_updates(),
            vec![(1, "once upon a time".to_string())]
        );
        assert_eq!(c.status().get_untracked(), SaveStatus::Saved);

        // Nothing left for later ticks.
        assert_eq!(block_on(c.flush_due(10_000)), 0);
        assert_eq!(api.calls().len(), 1);
    }

    #[test]
    fn test_debounce_save_sends_content_only() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("edited", 0);
        block_on(c.flush_due(WINDOW));

        match api.calls().as_slice() {
            [Call::UpdateFile(1, req)] => {
                assert!(req.name.is_none());
                assert_eq!(req.content.as_deref(), Some("edited"));
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[test]
    fn test_unchanged_content_schedules_nothing() {
        let (api, c) = setup();
        open(&c, 1);

        assert!(c.content_changed("once upon", 0).is_none());
        c.content_changed("once upon!", 100);
        // Typing back to the persisted text cancels the pending save.
        assert!(c.content_changed("once upon", 200).is_none());
        assert!(c.pending_saves().is_empty());
        assert_eq!(c.status().get_untracked(), SaveStatus::Idle);

        block_on(c.flush_due(10_000));
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_no_open_file_ignores_changes() {
        let (api, c) = setup();
        assert!(c.content_changed("orphan text", 0).is_none());
        assert!(block_on(c.save_now()).expect("no-op").is_none());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_switching_files_keeps_captured_identity() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("A draft", 0);

        open(&c, 2);
        assert_eq!(c.buffer().get_untracked(), "meanwhile");
        c.content_changed("B draft", 600);

        block_on(c.flush_due(WINDOW));
        block_on(c.flush_due(WINDOW + 600));

        let updates = api.content_updates();
        assert_eq!(
            updates,
            vec![(1, "A draft".to_string()), (2, "B draft".to_string())]
        );
        assert!(!updates.contains(&(2, "A draft".to_string())));
        assert_eq!(c.store().file(1).map(|f| f.content).as_deref(), Some("A draft"));
        // The open file's selection follows its own save only.
        let selected = c.store().current_file().get_untracked().expect("open");
        assert_eq!(selected.id, 2);
        assert_eq!(selected.content, "B draft");
    }

    #[test]
    fn test_reopening_file_shows_unsaved_edits() {
        let (_api, c) = setup();
        open(&c, 1);
        c.content_changed("A draft", 0);
        open(&c, 2);
        open(&c, 1);
        assert_eq!(c.buffer().get_untracked(), "A draft");
        assert_eq!(c.status().get_untracked(), SaveStatus::Pending);
    }

    #[test]
    fn test_explicit_save_supersedes_pending_debounce() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("explicit", 0);

        let saved = block_on(c.save_now()).expect("save").expect("file open");
        assert_eq!(saved.content, "explicit");
        assert!(c.pending_for(1).is_none());

        assert_eq!(block_on(c.flush_due(WINDOW)), 0);
        assert_eq!(api.content_updates(), vec![(1, "explicit".to_string())]);
        assert_eq!(c.status().get_untracked(), SaveStatus::Saved);
    }

    #[test]
    fn test_late_timer_after_explicit_save_is_noop() {
        let (api, c) = setup();
        open(&c, 1);
        let pending = c.content_changed("same text", 0).expect("scheduled");

        block_on(c.save_now()).expect("save");
        // Simulate a timer whose captured save survived the explicit save.
        c.pending.lock().expect("lock").insert(1, pending);

        assert_eq!(block_on(c.flush_due(WINDOW)), 0);
        assert_eq!(api.content_updates().len(), 1);
    }

    #[test]
    fn test_explicit_save_issues_even_without_changes() {
        let (api, c) = setup();
        open(&c, 1);
        block_on(c.save_now()).expect("save");
        assert_eq!(api.content_updates(), vec![(1, "once upon".to_string())]);
    }

    #[test]
    fn test_failed_autosave_keeps_buffer_and_does_not_retry() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("precious words", 0);
        api.fail_next(1, "disk full");

        assert_eq!(block_on(c.flush_due(WINDOW)), 1);
        assert_eq!(
            c.status().get_untracked(),
            SaveStatus::Failed("disk full".to_string())
        );
        assert!(!c.is_saving());
        assert_eq!(c.buffer().get_untracked(), "precious words");
        assert_eq!(c.store().file(1).map(|f| f.content).as_deref(), Some("once upon"));

        block_on(c.flush_due(WINDOW * 10));
        assert_eq!(api.calls().len(), 1);

        // The next edit re-arms the window with the kept buffer.
        c.content_changed("precious words.", WINDOW * 10);
        block_on(c.flush_due(WINDOW * 11));
        assert_eq!(
            api.content_updates().last(),
            Some(&(1, "precious words.".to_string()))
        );
        assert_eq!(c.status().get_untracked(), SaveStatus::Saved);
    }

    #[test]
    fn test_failed_explicit_save_returns_error_and_keeps_buffer() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("draft", 0);
        api.fail_next(1, "offline");

        let err = block_on(c.save_now()).expect_err("save fails");
        assert_eq!(err.message, "offline");
        assert_eq!(c.buffer().get_untracked(), "draft");
        assert_eq!(
            c.status().get_untracked(),
            SaveStatus::Failed("offline".to_string())
        );

        block_on(c.flush_due(WINDOW * 5));
        assert_eq!(api.calls().len(), 1);
    }

    #[test]
    fn test_delete_open_file_drops_pending_and_selection() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("doomed", 0);

        block_on(c.delete_file(1)).expect("delete");
        assert!(c.pending_for(1).is_none());
        assert!(c.store().current_file().get_untracked().is_none());
        assert_eq!(c.buffer().get_untracked(), "");

        block_on(c.flush_due(WINDOW));
        assert_eq!(api.calls(), vec![Call::DeleteFile(1)]);
    }

    #[test]
    fn test_failed_delete_keeps_file_and_pending_save() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("kept", 0);
        api.fail_next(1, "locked");

        let err = block_on(c.delete_file(1)).expect_err("delete fails");
        assert_eq!(err.message, "locked");
        assert!(c.store().file(1).is_some());
        assert!(c.pending_for(1).is_some());
        assert_eq!(c.buffer().get_untracked(), "kept");
        // The timer driver re-arms from this after the failed delete.
        assert_eq!(c.delay_until_due(1, 500), Some(WINDOW - 500));
        assert_eq!(c.delay_until_due(1, WINDOW * 3), Some(0));
    }

    #[test]
    fn test_reverting_while_save_in_flight_saves_latest_text() {
        let (api, c) = setup();
        api.yield_in_updates();
        open(&c, 1);
        c.content_changed("once upon!", 0);

        let (sent, rescheduled) = block_on(async {
            futures::join!(c.flush_due(WINDOW), async {
                c.content_changed("once upon", WINDOW + 100)
            })
        });
        assert_eq!(sent, 1);
        let rescheduled = rescheduled.expect("revert during a save must be rescheduled");
        assert_eq!(rescheduled.content, "once upon");
        assert_eq!(c.status().get_untracked(), SaveStatus::Pending);

        assert_eq!(block_on(c.flush_due(rescheduled.due_ms)), 1);
        assert_eq!(
            api.server_file(1).map(|f| f.content).as_deref(),
            Some("once upon")
        );
        assert_eq!(c.buffer().get_untracked(), "once upon");
        assert_eq!(c.status().get_untracked(), SaveStatus::Saved);
        assert!(c.pending_saves().is_empty());
    }

    #[test]
    fn test_typing_the_in_flight_text_needs_no_second_save() {
        let (api, c) = setup();
        api.yield_in_updates();
        open(&c, 1);
        c.content_changed("draft", 0);

        let (_, rescheduled) = block_on(async {
            futures::join!(c.flush_due(WINDOW), async {
                c.content_changed("draft!", WINDOW + 10);
                c.content_changed("draft", WINDOW + 20)
            })
        });
        assert!(rescheduled.is_none());
        assert!(c.pending_saves().is_empty());
        assert_eq!(api.content_updates(), vec![(1, "draft".to_string())]);
        assert_eq!(c.status().get_untracked(), SaveStatus::Saved);
    }

    #[test]
    fn test_flush_file_ignores_deadline() {
        let (api, c) = setup();
        open(&c, 1);
        let pending = c.content_changed("timer fired early", 0).expect("scheduled");

        assert_eq!(block_on(c.flush_due(pending.due_ms - 1)), 0);
        assert!(block_on(c.flush_file(1)));
        assert_eq!(
            api.content_updates(),
            vec![(1, "timer fired early".to_string())]
        );
        assert!(!block_on(c.flush_file(1)));
    }

    #[test]
    fn test_background_save_status_stays_with_its_file() {
        let (api, c) = setup();
        open(&c, 1);
        c.content_changed("A draft", 0);
        open(&c, 2);
        api.fail_next(1, "disk full");

        block_on(c.flush_due(WINDOW));
        assert_eq!(c.status_of(1), SaveStatus::Failed("disk full".to_string()));
        assert_eq!(c.status().get_untracked(), SaveStatus::Idle);
        assert_eq!(c.buffer().get_untracked(), "meanwhile");

        // The failed text comes back with the file.
        open(&c, 1);
        assert_eq!(c.buffer().get_untracked(), "A draft");
        assert_eq!(
            c.status().get_untracked(),
            SaveStatus::Failed("disk full".to_string())
        );
    }

    #[test]
    fn test_take_due_orders_by_deadline() {
        let (_api, c) = setup();
        open(&c, 2);
        c.content_changed("b", 100);
        open(&c, 1);
        c.content_changed("a", 50);

        let due: Vec<FileId> = c.take_due(5000).into_iter().map(|p| p.file_id).collect();
        assert_eq!(due, vec![1, 2]);
        assert!(c.pending_saves().is_empty());
    }
}

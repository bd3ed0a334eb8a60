pub(crate) mod autosave;
pub(crate) mod store;
pub(crate) mod story;

pub use autosave::{AutosaveCoordinator, AutosaveTimers, PendingSave, SaveStatus};
pub use store::WorkspaceStore;
pub use story::StoryStore;

use crate::api::{ApiClient, EnvConfig};
use crate::models::{FileId, FolderId};
use leptos::prelude::*;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvConfig,

    /// Files, folders and the current selection.
    pub store: WorkspaceStore,

    /// Editor buffer + debounced saves, driven by browser timeouts.
    pub autosave: AutosaveTimers,

    /// Timeline milestones and story-graph links of files.
    pub story: StoryStore,

    /// Explorer UI state.
    pub expanded_folders: RwSignal<Vec<FolderId>>,
    pub target_folder_id: RwSignal<Option<FolderId>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(EnvConfig::new())
    }

    pub fn with_config(config: EnvConfig) -> Self {
        let api = ApiClient::from_config(&config);
        let store = WorkspaceStore::new(api.clone());
        let coordinator = AutosaveCoordinator::new(store.clone(), config.autosave_ms);

        Self {
            config,
            store,
            autosave: AutosaveTimers::new(coordinator),
            story: StoryStore::new(api),
            expanded_folders: RwSignal::new(vec![]),
            target_folder_id: RwSignal::new(None),
        }
    }

    pub fn coordinator(&self) -> &AutosaveCoordinator {
        self.autosave.coordinator()
    }

    pub fn is_expanded(&self, folder_id: FolderId) -> bool {
        self.expanded_folders.with(|ids| ids.contains(&folder_id))
    }

    pub fn toggle_folder(&self, folder_id: FolderId) {
        self.expanded_folders.update(|ids| {
            if let Some(pos) = ids.iter().position(|id| *id == folder_id) {
                ids.remove(pos);
            } else {
                ids.push(folder_id);
            }
        });
    }

    pub fn is_selected(&self, file_id: FileId) -> bool {
        self.store
            .current_file()
            .with(|f| f.as_ref().is_some_and(|f| f.id == file_id))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppContext(pub AppState);

use crate::api::{
    require_name, ApiClient, ApiResult, CreateFileRequest, CreateFolderRequest, UpdateFileRequest,
    UpdateFolderRequest, WorkspaceApi,
};
use crate::models::{File, FileId, Folder, FolderId};
use crate::tree::TreeSnapshot;
use leptos::logging::warn;
use leptos::prelude::*;

/// Authoritative in-memory copy of the workspace tree.
///
/// Every write goes through a method here, and every method that changes
/// remote state waits for the server before touching the snapshot
/// (confirm-then-apply, never apply-then-rollback). Readers get read-only
/// signals.
///
/// Mutations are not serialized against each other: when two responses for the
/// same id race, whichever is applied last wins.
#[derive(Clone)]
pub struct WorkspaceStore<A: WorkspaceApi = ApiClient> {
    api: A,

    tree: RwSignal<TreeSnapshot>,
    current_file: RwSignal<Option<File>>,
    is_loading: RwSignal<bool>,
    error: RwSignal<Option<String>>,

    /// Load guard: only the latest `load()` may commit its response.
    load_request_id: RwSignal<u64>,
}

impl<A: WorkspaceApi> WorkspaceStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            tree: RwSignal::new(TreeSnapshot::default()),
            current_file: RwSignal::new(None),
            is_loading: RwSignal::new(false),
            error: RwSignal::new(None),
            load_request_id: RwSignal::new(0),
        }
    }

    pub fn tree(&self) -> ReadSignal<TreeSnapshot> {
        self.tree.read_only()
    }

    pub fn current_file(&self) -> ReadSignal<Option<File>> {
        self.current_file.read_only()
    }

    pub fn is_loading(&self) -> ReadSignal<bool> {
        self.is_loading.read_only()
    }

    pub fn error(&self) -> ReadSignal<Option<String>> {
        self.error.read_only()
    }

    pub fn clear_error(&self) {
        self.error.set(None);
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        self.tree.get_untracked()
    }

    pub fn files(&self) -> Vec<File> {
        self.tree.with(|t| t.files.clone())
    }

    pub fn folders(&self) -> Vec<Folder> {
        self.tree.with(|t| t.folders.clone())
    }

    pub fn file(&self, id: FileId) -> Option<File> {
        self.tree.with_untracked(|t| t.file(id).cloned())
    }

    pub fn folder(&self, id: FolderId) -> Option<Folder> {
        self.tree.with_untracked(|t| t.folder(id).cloned())
    }

    pub fn child_files(&self, folder_id: Option<FolderId>) -> Vec<File> {
        self.tree.with(|t| t.child_files(folder_id))
    }

    pub fn child_folders(&self, folder_id: Option<FolderId>) -> Vec<Folder> {
        self.tree.with(|t| t.child_folders(folder_id))
    }

    pub fn orphan_files(&self) -> Vec<File> {
        self.tree.with(|t| t.orphan_files())
    }

    pub fn orphan_folders(&self) -> Vec<Folder> {
        self.tree.with(|t| t.orphan_folders())
    }

    pub fn folder_path(&self, folder_id: FolderId) -> Vec<Folder> {
        self.tree.with(|t| t.folder_path(folder_id))
    }

    /// Fetch files and folders together and swap both in with a single write.
    ///
    /// Either fetch failing leaves the previous snapshot in place. A response
    /// that arrives after a newer `load()` was started is dropped.
    pub async fn load(&self) -> ApiResult<()> {
        let request_id = self.load_request_id.get_untracked().wrapping_add(1);
        self.load_request_id.set(request_id);
        self.is_loading.set(true);

        let result =
            futures::future::try_join(self.api.list_files(), self.api.list_folders()).await;

        if self.load_request_id.get_untracked() != request_id {
            return result.map(|_| ());
        }
        self.is_loading.set(false);

        match result {
            Ok((files, folders)) => {
                self.tree.set(TreeSnapshot::new(files, folders));
                self.error.set(None);
                Ok(())
            }
            Err(e) => {
                warn!("failed to load workspace: {e}");
                self.error.set(Some(e.message.clone()));
                Err(e)
            }
        }
    }

    pub async fn create_file(
        &self,
        name: &str,
        content: &str,
        folder_id: Option<FolderId>,
    ) -> ApiResult<File> {
        require_name(name, "File")?;

        let req = CreateFileRequest {
            name: name.to_string(),
            content: content.to_string(),
            folder_id,
        };
        let created = self.api.create_file(&req).await.inspect_err(|e| {
            warn!("failed to create file: {e}");
        })?;

        // A load that finished while the create was in flight may already hold it.
        self.tree.update(|t| upsert_by_id(&mut t.files, created.clone(), |f| f.id));
        Ok(created)
    }

    pub async fn create_folder(&self, name: &str, parent_id: Option<FolderId>) -> ApiResult<Folder> {
        require_name(name, "Folder")?;

        let req = CreateFolderRequest {
            name: name.to_string(),
            parent_id,
        };
        let created = self.api.create_folder(&req).await.inspect_err(|e| {
            warn!("failed to create folder: {e}");
        })?;

        self.tree.update(|t| upsert_by_id(&mut t.folders, created.clone(), |f| f.id));
        Ok(created)
    }

    /// Rename and/or replace the content of a file.
    ///
    /// The selection is not touched; call [`Self::refresh_current_file`] with
    /// the returned file when it may be the open one.
    pub async fn update_file(
        &self,
        id: FileId,
        name: Option<&str>,
        content: Option<&str>,
    ) -> ApiResult<File> {
        if let Some(name) = name {
            require_name(name, "File")?;
        }

        let req = UpdateFileRequest {
            name: name.map(str::to_string),
            content: content.map(str::to_string),
        };
        let updated = self.api.update_file(id, &req).await.inspect_err(|e| {
            warn!("failed to update file {id}: {e}");
        })?;

        self.tree.update(|t| replace_by_id(&mut t.files, id, &updated, |f| f.id));
        Ok(updated)
    }

    pub async fn rename_file(&self, id: FileId, name: &str) -> ApiResult<File> {
        self.update_file(id, Some(name), None).await
    }

    pub async fn rename_folder(&self, id: FolderId, name: &str) -> ApiResult<Folder> {
        require_name(name, "Folder")?;

        let req = UpdateFolderRequest {
            name: name.to_string(),
        };
        let updated = self.api.update_folder(id, &req).await.inspect_err(|e| {
            warn!("failed to rename folder {id}: {e}");
        })?;

        self.tree.update(|t| replace_by_id(&mut t.folders, id, &updated, |f| f.id));
        Ok(updated)
    }

    pub async fn delete_file(&self, id: FileId) -> ApiResult<()> {
        self.api.delete_file(id).await.inspect_err(|e| {
            warn!("failed to delete file {id}: {e}");
        })?;

        self.tree.update(|t| t.files.retain(|f| f.id != id));
        Ok(())
    }

    /// Remove a folder. Its files and subfolders stay and become orphans.
    pub async fn delete_folder(&self, id: FolderId) -> ApiResult<()> {
        self.api.delete_folder(id).await.inspect_err(|e| {
            warn!("failed to delete folder {id}: {e}");
        })?;

        self.tree.update(|t| t.folders.retain(|f| f.id != id));
        Ok(())
    }

    pub fn set_current_file(&self, file: Option<File>) {
        self.current_file.set(file);
    }

    /// Replace the selection with `file` if it is the selected one.
    pub fn refresh_current_file(&self, file: &File) -> bool {
        let is_current = self
            .current_file
            .with_untracked(|c| c.as_ref().is_some_and(|c| c.id == file.id));
        if is_current {
            self.current_file.set(Some(file.clone()));
        }
        is_current
    }
}

fn replace_by_id<T: Clone>(items: &mut [T], id: i64, value: &T, key: impl Fn(&T) -> i64) {
    if let Some(slot) = items.iter_mut().find(|x| key(x) == id) {
        *slot = value.clone();
    }
}

fn upsert_by_id<T>(items: &mut Vec<T>, value: T, key: impl Fn(&T) -> i64) {
    let id = key(&value);
    match items.iter_mut().find(|x| key(x) == id) {
        Some(slot) => *slot = value,
        None => items.push(value),
    }
}

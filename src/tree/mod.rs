//! Read-only derivations over a workspace snapshot.
//!
//! Nothing here caches: every call walks the collections it is handed, so the
//! result always reflects the snapshot as it is right now.

use crate::models::{File, FileId, Folder, FolderId};
use std::collections::HashSet;

/// Files and folders as one value, so both collections are replaced together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub files: Vec<File>,
    pub folders: Vec<Folder>,
}

impl TreeSnapshot {
    pub fn new(files: Vec<File>, folders: Vec<Folder>) -> Self {
        Self { files, folders }
    }

    pub fn file(&self, id: FileId) -> Option<&File> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn folder(&self, id: FolderId) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn has_folder(&self, id: FolderId) -> bool {
        self.folders.iter().any(|f| f.id == id)
    }

    pub fn child_files(&self, folder_id: Option<FolderId>) -> Vec<File> {
        child_files(&self.files, folder_id)
    }

    pub fn child_folders(&self, folder_id: Option<FolderId>) -> Vec<Folder> {
        child_folders(&self.folders, folder_id)
    }

    /// Files whose `folder_id` points at a folder that is not in the snapshot.
    pub fn orphan_files(&self) -> Vec<File> {
        self.files
            .iter()
            .filter(|f| f.folder_id.is_some_and(|id| !self.has_folder(id)))
            .cloned()
            .collect()
    }

    /// Folders whose `parent_id` points at a folder that is not in the snapshot.
    pub fn orphan_folders(&self) -> Vec<Folder> {
        self.folders
            .iter()
            .filter(|f| f.parent_id.is_some_and(|id| !self.has_folder(id)))
            .cloned()
            .collect()
    }

    /// Breadcrumb from the outermost ancestor down to `folder_id`.
    ///
    /// The walk stops at a dangling parent or at the first repeated id, so a
    /// malformed server response cannot loop forever.
    pub fn folder_path(&self, folder_id: FolderId) -> Vec<Folder> {
        let mut path: Vec<Folder> = Vec::new();
        let mut seen: HashSet<FolderId> = HashSet::new();
        let mut next = Some(folder_id);

        while let Some(id) = next {
            if !seen.insert(id) {
                break;
            }
            let Some(folder) = self.folder(id) else {
                break;
            };
            next = folder.parent_id;
            path.push(folder.clone());
        }

        path.reverse();
        path
    }
}

/// Files directly inside `folder_id` (`None` = tree root), in store order.
pub fn child_files(files: &[File], folder_id: Option<FolderId>) -> Vec<File> {
    files
        .iter()
        .filter(|f| f.folder_id == folder_id)
        .cloned()
        .collect()
}

/// Folders directly inside `folder_id` (`None` = tree root), in store order.
pub fn child_folders(folders: &[Folder], folder_id: Option<FolderId>) -> Vec<Folder> {
    folders
        .iter()
        .filter(|f| f.parent_id == folder_id)
        .cloned()
        .collect()
}

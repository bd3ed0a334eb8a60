use serde::{Deserialize, Serialize};

pub type FileId = i64;
pub type FolderId = i64;

/// A document in the workspace tree.
///
/// `content` is the editor's serialized document and is treated as opaque text.
/// Timestamps are kept as the server sends them (ISO-8601 strings).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct File {
    pub id: FileId,
    pub name: String,

    #[serde(default)]
    pub content: String,

    /// Owning folder; `None` places the file at the tree root.
    #[serde(default)]
    pub folder_id: Option<FolderId>,

    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_edited_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,

    /// Owning folder; `None` for root-level folders.
    #[serde(default)]
    pub parent_id: Option<FolderId>,

    #[serde(default)]
    pub created_at: String,
}

/// A milestone pinned to a file on the timeline view.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TimelineEntry {
    pub id: i64,
    pub file_id: FileId,
    pub milestone_name: String,
    pub timestamp: String,
}

/// Story graph node. `node_metadata` is a JSON document stored as a string.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GraphNode {
    pub id: i64,
    pub file_id: FileId,
    pub node_name: String,
    #[serde(default)]
    pub node_metadata: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GraphEdge {
    pub id: i64,
    pub from_node: i64,
    pub to_node: i64,
}

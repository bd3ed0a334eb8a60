use super::{
    ApiResult, CreateFileRequest, CreateFolderRequest, CreateGraphEdgeRequest,
    CreateGraphNodeRequest, CreateTimelineEntryRequest, RemoteOperationFailed, StoryApi,
    UpdateFileRequest, UpdateFolderRequest, WorkspaceApi,
};
use crate::models::{File, FileId, Folder, FolderId, GraphEdge, GraphNode, TimelineEntry};
use std::cell::RefCell;
use std::rc::Rc;
use std::task::Poll;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ListFiles,
    CreateFile(CreateFileRequest),
    UpdateFile(FileId, UpdateFileRequest),
    DeleteFile(FileId),
    ListFolders,
    CreateFolder(CreateFolderRequest),
    UpdateFolder(FolderId, UpdateFolderRequest),
    DeleteFolder(FolderId),
    ListTimeline,
    CreateTimelineEntry(CreateTimelineEntryRequest),
    ListGraphNodes,
    CreateGraphNode(CreateGraphNodeRequest),
    ListGraphEdges,
    CreateGraphEdge(CreateGraphEdgeRequest),
}

#[derive(Default)]
struct Inner {
    files: Vec<File>,
    folders: Vec<Folder>,
    next_file_id: FileId,
    next_folder_id: FolderId,
    calls: Vec<Call>,
    /// Fail the next N calls with this detail message.
    fail: Option<(usize, String)>,
    tick: u64,
    /// `update_file` returns to the executor once before answering.
    yield_in_updates: bool,
    timeline: Vec<TimelineEntry>,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    next_story_id: i64,
}

/// Server stand-in: keeps its own authoritative copy and records every call.
///
/// Updating or deleting an unknown id succeeds, so tests can exercise the
/// "remote ok, no local match" path.
#[derive(Clone, Default)]
pub(crate) struct FakeApi {
    inner: Rc<RefCell<Inner>>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        {
            let mut s = api.inner.borrow_mut();
            s.next_file_id = 1;
            s.next_folder_id = 1;
        }
        api
    }

    pub fn with_next_ids(self, file_id: FileId, folder_id: FolderId) -> Self {
        {
            let mut s = self.inner.borrow_mut();
            s.next_file_id = file_id;
            s.next_folder_id = folder_id;
        }
        self
    }

    pub fn seed_file(&self, id: FileId, name: &str, content: &str, folder_id: Option<FolderId>) {
        let mut s = self.inner.borrow_mut();
        s.files.push(file(id, name, content, folder_id));
        s.next_file_id = s.next_file_id.max(id + 1);
    }

    pub fn seed_folder(&self, id: FolderId, name: &str, parent_id: Option<FolderId>) {
        let mut s = self.inner.borrow_mut();
        s.folders.push(folder(id, name, parent_id));
        s.next_folder_id = s.next_folder_id.max(id + 1);
    }

    pub fn fail_next(&self, n: usize, detail: &str) {
        self.inner.borrow_mut().fail = Some((n, detail.to_string()));
    }

    /// Make every `update_file` suspend once, so other work can run while
    /// the save is in flight.
    pub fn yield_in_updates(&self) {
        self.inner.borrow_mut().yield_in_updates = true;
    }

    pub fn seed_graph_node(&self, id: i64, file_id: FileId, name: &str) {
        let mut s = self.inner.borrow_mut();
        s.nodes.push(GraphNode {
            id,
            file_id,
            node_name: name.to_string(),
            node_metadata: Some("{}".to_string()),
        });
        s.next_story_id = s.next_story_id.max(id + 1);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    /// Content updates in call order as `(file id, content)`.
    pub fn content_updates(&self) -> Vec<(FileId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UpdateFile(id, UpdateFileRequest { content: Some(c), .. }) => Some((id, c)),
                _ => None,
            })
            .collect()
    }

    pub fn server_file(&self, id: FileId) -> Option<File> {
        self.inner.borrow().files.iter().find(|f| f.id == id).cloned()
    }

    fn next_story_id(&self) -> i64 {
        let mut s = self.inner.borrow_mut();
        s.next_story_id += 1;
        s.next_story_id
    }

    fn enter(&self, call: Call) -> ApiResult<()> {
        let mut s = self.inner.borrow_mut();
        s.calls.push(call);
        s.tick += 1;
        if let Some((n, detail)) = s.fail.take() {
            if n > 1 {
                s.fail = Some((n - 1, detail.clone()));
            }
            let body = serde_json::json!({ "detail": detail }).to_string();
            return Err(RemoteOperationFailed::http(400, &body));
        }
        Ok(())
    }
}

pub(crate) fn file(id: FileId, name: &str, content: &str, folder_id: Option<FolderId>) -> File {
    File {
        id,
        name: name.to_string(),
        content: content.to_string(),
        folder_id,
        created_at: "2024-03-01T10:00:00".to_string(),
        last_edited_at: "2024-03-01T10:00:00".to_string(),
    }
}

pub(crate) fn folder(id: FolderId, name: &str, parent_id: Option<FolderId>) -> Folder {
    Folder {
        id,
        name: name.to_string(),
        parent_id,
        created_at: "2024-03-01T10:00:00".to_string(),
    }
}

impl WorkspaceApi for FakeApi {
    async fn list_files(&self) -> ApiResult<Vec<File>> {
        self.enter(Call::ListFiles)?;
        Ok(self.inner.borrow().files.clone())
    }

    async fn create_file(&self, req: &CreateFileRequest) -> ApiResult<File> {
        self.enter(Call::CreateFile(req.clone()))?;
        let mut s = self.inner.borrow_mut();
        let id = s.next_file_id;
        s.next_file_id += 1;
        let f = file(id, &req.name, &req.content, req.folder_id);
        s.files.push(f.clone());
        Ok(f)
    }

    async fn update_file(&self, id: FileId, req: &UpdateFileRequest) -> ApiResult<File> {
        self.enter(Call::UpdateFile(id, req.clone()))?;
        if self.inner.borrow().yield_in_updates {
            yield_once().await;
        }
        let mut s = self.inner.borrow_mut();
        let stamp = format!("2024-03-01T11:00:{:02}", s.tick % 60);
        let Some(f) = s.files.iter_mut().find(|f| f.id == id) else {
            let mut f = file(id, req.name.as_deref().unwrap_or("untitled"), "", None);
            if let Some(c) = &req.content {
                f.content = c.clone();
            }
            return Ok(f);
        };
        if let Some(name) = &req.name {
            f.name = name.clone();
        }
        if let Some(content) = &req.content {
            f.content = content.clone();
        }
        f.last_edited_at = stamp;
        Ok(f.clone())
    }

    async fn delete_file(&self, id: FileId) -> ApiResult<()> {
        self.enter(Call::DeleteFile(id))?;
        self.inner.borrow_mut().files.retain(|f| f.id != id);
        Ok(())
    }

    async fn list_folders(&self) -> ApiResult<Vec<Folder>> {
        self.enter(Call::ListFolders)?;
        Ok(self.inner.borrow().folders.clone())
    }

    async fn create_folder(&self, req: &CreateFolderRequest) -> ApiResult<Folder> {
        self.enter(Call::CreateFolder(req.clone()))?;
        let mut s = self.inner.borrow_mut();
        let id = s.next_folder_id;
        s.next_folder_id += 1;
        let f = folder(id, &req.name, req.parent_id);
        s.folders.push(f.clone());
        Ok(f)
    }

    async fn update_folder(&self, id: FolderId, req: &UpdateFolderRequest) -> ApiResult<Folder> {
        self.enter(Call::UpdateFolder(id, req.clone()))?;
        let mut s = self.inner.borrow_mut();
        let Some(f) = s.folders.iter_mut().find(|f| f.id == id) else {
            return Ok(folder(id, &req.name, None));
        };
        f.name = req.name.clone();
        Ok(f.clone())
    }

    async fn delete_folder(&self, id: FolderId) -> ApiResult<()> {
        self.enter(Call::DeleteFolder(id))?;
        self.inner.borrow_mut().folders.retain(|f| f.id != id);
        Ok(())
    }
}

impl StoryApi for FakeApi {
    async fn list_timeline(&self) -> ApiResult<Vec<TimelineEntry>> {
        self.enter(Call::ListTimeline)?;
        Ok(self.inner.borrow().timeline.clone())
    }

    async fn create_timeline_entry(
        &self,
        req: &CreateTimelineEntryRequest,
    ) -> ApiResult<TimelineEntry> {
        self.enter(Call::CreateTimelineEntry(req.clone()))?;
        let entry = TimelineEntry {
            id: self.next_story_id(),
            file_id: req.file_id,
            milestone_name: req.milestone_name.clone(),
            timestamp: req.timestamp.clone(),
        };
        self.inner.borrow_mut().timeline.push(entry.clone());
        Ok(entry)
    }

    async fn list_graph_nodes(&self) -> ApiResult<Vec<GraphNode>> {
        self.enter(Call::ListGraphNodes)?;
        Ok(self.inner.borrow().nodes.clone())
    }

    async fn create_graph_node(&self, req: &CreateGraphNodeRequest) -> ApiResult<GraphNode> {
        self.enter(Call::CreateGraphNode(req.clone()))?;
        let node = GraphNode {
            id: self.next_story_id(),
            file_id: req.file_id,
            node_name: req.node_name.clone(),
            node_metadata: Some(req.node_metadata.clone()),
        };
        self.inner.borrow_mut().nodes.push(node.clone());
        Ok(node)
    }

    async fn list_graph_edges(&self) -> ApiResult<Vec<GraphEdge>> {
        self.enter(Call::ListGraphEdges)?;
        Ok(self.inner.borrow().edges.clone())
    }

    async fn create_graph_edge(&self, req: &CreateGraphEdgeRequest) -> ApiResult<GraphEdge> {
        self.enter(Call::CreateGraphEdge(req.clone()))?;
        let edge = GraphEdge {
            id: self.next_story_id(),
            from_node: req.from_node,
            to_node: req.to_node,
        };
        self.inner.borrow_mut().edges.push(edge.clone());
        Ok(edge)
    }
}

/// Pending once (waking itself), then ready.
async fn yield_once() {
    let mut yielded = false;
    futures::future::poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

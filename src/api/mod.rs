use crate::models::{File, FileId, Folder, FolderId, GraphEdge, GraphNode, TimelineEntry};
use crate::util::is_blank;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[cfg(test)]
pub(crate) mod fake;

/// Where a remote operation broke down. Only used for logging; callers see a
/// single error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Http,
    Parse,
    InvalidInput,
}

/// The one error the workspace core raises.
///
/// `message` is what the user should see: the server's `detail` field when it
/// sent one, otherwise a generic message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteOperationFailed {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

pub(crate) const GENERIC_FAILURE: &str = "Request failed";

impl RemoteOperationFailed {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: FailureKind::Network,
            status: None,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: FailureKind::Parse,
            status: None,
            message: e.to_string(),
        }
    }

    pub(crate) fn http(status: u16, body: &str) -> Self {
        Self {
            kind: FailureKind::Http,
            status: Some(status),
            message: detail_message(body).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidInput,
            status: None,
            message: message.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, RemoteOperationFailed>;

/// Pull the `detail` field out of an error body.
///
/// String details are returned verbatim; structured ones (validation error
/// lists) are rendered as compact JSON.
pub(crate) fn detail_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    match v.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn require_name(name: &str, what: &str) -> ApiResult<()> {
    if is_blank(name) {
        return Err(RemoteOperationFailed::invalid(format!(
            "{what} name must not be empty"
        )));
    }
    Ok(())
}

pub(crate) const DEFAULT_API_URL: &str = "http://localhost:8000";
pub(crate) const DEFAULT_AUTOSAVE_MS: i64 = 2000;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_url: String,
    pub autosave_ms: i64,
}

impl EnvConfig {
    pub fn new() -> Self {
        let mut cfg = Self {
            api_url: DEFAULT_API_URL.to_string(),
            autosave_ms: DEFAULT_AUTOSAVE_MS,
        };

        #[cfg(target_arch = "wasm32")]
        cfg.apply_window_env();

        cfg
    }

    /// Read overrides from `window.ENV`.
    ///
    /// Both `API_URL` (documented) and `api_url` (legacy) are accepted.
    #[cfg(target_arch = "wasm32")]
    fn apply_window_env(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(env) = window.get("ENV") else {
            return;
        };
        if env.is_undefined() || !env.is_object() {
            return;
        }

        let get = |key: &str| js_sys::Reflect::get(&env, &key.into()).ok();

        if let Some(url) = get("API_URL")
            .and_then(|v| v.as_string())
            .or_else(|| get("api_url").and_then(|v| v.as_string()))
        {
            self.api_url = url;
        }

        if let Some(ms) = get("AUTOSAVE_MS").and_then(|v| v.as_f64()) {
            if ms >= 0.0 {
                self.autosave_ms = ms as i64;
            }
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateFileRequest {
    pub name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<FolderId>,
}

/// Partial file update. Absent fields are left unchanged by the server.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateFileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FolderId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UpdateFolderRequest {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateTimelineEntryRequest {
    pub file_id: FileId,
    pub milestone_name: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateGraphNodeRequest {
    pub file_id: FileId,
    pub node_name: String,
    pub node_metadata: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateGraphEdgeRequest {
    pub from_node: i64,
    pub to_node: i64,
}

/// Remote persistence for the workspace tree.
///
/// Implementations perform I/O only and never touch local state.
#[allow(async_fn_in_trait)]
pub trait WorkspaceApi: Clone + 'static {
    async fn list_files(&self) -> ApiResult<Vec<File>>;
    async fn create_file(&self, req: &CreateFileRequest) -> ApiResult<File>;
    async fn update_file(&self, id: FileId, req: &UpdateFileRequest) -> ApiResult<File>;
    async fn delete_file(&self, id: FileId) -> ApiResult<()>;

    async fn list_folders(&self) -> ApiResult<Vec<Folder>>;
    async fn create_folder(&self, req: &CreateFolderRequest) -> ApiResult<Folder>;
    async fn update_folder(&self, id: FolderId, req: &UpdateFolderRequest) -> ApiResult<Folder>;
    async fn delete_folder(&self, id: FolderId) -> ApiResult<()>;
}

/// Timeline milestones and the story graph hanging off files.
#[allow(async_fn_in_trait)]
pub trait StoryApi: Clone + 'static {
    async fn list_timeline(&self) -> ApiResult<Vec<TimelineEntry>>;
    async fn create_timeline_entry(
        &self,
        req: &CreateTimelineEntryRequest,
    ) -> ApiResult<TimelineEntry>;

    async fn list_graph_nodes(&self) -> ApiResult<Vec<GraphNode>>;
    async fn create_graph_node(&self, req: &CreateGraphNodeRequest) -> ApiResult<GraphNode>;

    async fn list_graph_edges(&self) -> ApiResult<Vec<GraphEdge>>;
    async fn create_graph_edge(&self, req: &CreateGraphEdgeRequest) -> ApiResult<GraphEdge>;
}

#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &EnvConfig) -> Self {
        Self::new(cfg.api_url.clone())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<reqwest::Response> {
        let client = reqwest::Client::new();
        let mut req = client.request(method, self.url(path));
        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(RemoteOperationFailed::network)?;

        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            Err(RemoteOperationFailed::http(status, &body))
        }
    }

    async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<T> {
        let res = self.send(method, path, body).await?;
        res.json().await.map_err(RemoteOperationFailed::parse)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request::<T, ()>(reqwest::Method::GET, path, None).await
    }

    /// DELETE endpoints answer without a body; nothing is decoded.
    async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send::<()>(reqwest::Method::DELETE, path, None)
            .await
            .map(|_| ())
    }
}

pub(crate) fn timeline_entry_request(
    file_id: FileId,
    milestone_name: &str,
    timestamp: Option<String>,
) -> CreateTimelineEntryRequest {
    CreateTimelineEntryRequest {
        file_id,
        milestone_name: milestone_name.to_string(),
        timestamp: timestamp.unwrap_or_else(crate::util::now_rfc3339),
    }
}

/// Nodes without metadata are stored with an empty JSON object.
pub(crate) fn graph_node_request(
    file_id: FileId,
    node_name: &str,
    metadata: Option<String>,
) -> CreateGraphNodeRequest {
    CreateGraphNodeRequest {
        file_id,
        node_name: node_name.to_string(),
        node_metadata: metadata.unwrap_or_else(|| "{}".to_string()),
    }
}

impl WorkspaceApi for ApiClient {
    async fn list_files(&self) -> ApiResult<Vec<File>> {
        self.get("/files").await
    }

    async fn create_file(&self, req: &CreateFileRequest) -> ApiResult<File> {
        require_name(&req.name, "File")?;
        self.request(reqwest::Method::POST, "/files", Some(req)).await
    }

    async fn update_file(&self, id: FileId, req: &UpdateFileRequest) -> ApiResult<File> {
        if let Some(name) = &req.name {
            require_name(name, "File")?;
        }
        self.request(reqwest::Method::PUT, &format!("/files/{id}"), Some(req))
            .await
    }

    async fn delete_file(&self, id: FileId) -> ApiResult<()> {
        self.delete(&format!("/files/{id}")).await
    }

    async fn list_folders(&self) -> ApiResult<Vec<Folder>> {
        self.get("/folders").await
    }

    async fn create_folder(&self, req: &CreateFolderRequest) -> ApiResult<Folder> {
        require_name(&req.name, "Folder")?;
        self.request(reqwest::Method::POST, "/folders", Some(req))
            .await
    }

    async fn update_folder(&self, id: FolderId, req: &UpdateFolderRequest) -> ApiResult<Folder> {
        require_name(&req.name, "Folder")?;
        self.request(reqwest::Method::PUT, &format!("/folders/{id}"), Some(req))
            .await
    }

    async fn delete_folder(&self, id: FolderId) -> ApiResult<()> {
        self.delete(&format!("/folders/{id}")).await
    }
}

impl StoryApi for ApiClient {
    async fn list_timeline(&self) -> ApiResult<Vec<TimelineEntry>> {
        self.get("/timeline").await
    }

    async fn create_timeline_entry(
        &self,
        req: &CreateTimelineEntryRequest,
    ) -> ApiResult<TimelineEntry> {
        require_name(&req.milestone_name, "Milestone")?;
        self.request(reqwest::Method::POST, "/timeline", Some(req))
            .await
    }

    async fn list_graph_nodes(&self) -> ApiResult<Vec<GraphNode>> {
        self.get("/graph/nodes").await
    }

    async fn create_graph_node(&self, req: &CreateGraphNodeRequest) -> ApiResult<GraphNode> {
        require_name(&req.node_name, "Node")?;
        self.request(reqwest::Method::POST, "/graph/nodes", Some(req))
            .await
    }

    async fn list_graph_edges(&self) -> ApiResult<Vec<GraphEdge>> {
        self.get("/graph/edges").await
    }

    async fn create_graph_edge(&self, req: &CreateGraphEdgeRequest) -> ApiResult<GraphEdge> {
        self.request(reqwest::Method::POST, "/graph/edges", Some(req))
            .await
    }
}

use crate::api::{
    graph_node_request, require_name, timeline_entry_request, ApiClient, ApiResult,
    CreateGraphEdgeRequest, StoryApi,
};
use crate::models::{FileId, GraphEdge, GraphNode, TimelineEntry};
use leptos::logging::warn;
use leptos::prelude::*;

/// Timeline milestones and story-graph nodes attached to files.
///
/// Same confirm-then-apply rule as the workspace store: local collections only
/// change once the server has answered.
#[derive(Clone)]
pub struct StoryStore<A: StoryApi = ApiClient> {
    api: A,

    timeline: RwSignal<Vec<TimelineEntry>>,
    nodes: RwSignal<Vec<GraphNode>>,
    edges: RwSignal<Vec<GraphEdge>>,
    error: RwSignal<Option<String>>,
}

impl<A: StoryApi> StoryStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            timeline: RwSignal::new(vec![]),
            nodes: RwSignal::new(vec![]),
            edges: RwSignal::new(vec![]),
            error: RwSignal::new(None),
        }
    }

    pub fn error(&self) -> ReadSignal<Option<String>> {
        self.error.read_only()
    }

    pub fn nodes(&self) -> Vec<GraphNode> {
        self.nodes.get()
    }

    pub fn edges(&self) -> Vec<GraphEdge> {
        self.edges.get()
    }

    pub async fn load(&self) -> ApiResult<()> {
        let result = futures::future::try_join3(
            self.api.list_timeline(),
            self.api.list_graph_nodes(),
            self.api.list_graph_edges(),
        )
        .await;

        match result {
            Ok((timeline, nodes, edges)) => {
                self.timeline.set(timeline);
                self.nodes.set(nodes);
                self.edges.set(edges);
                self.error.set(None);
                Ok(())
            }
            Err(e) => {
                warn!("failed to load story data: {e}");
                self.error.set(Some(e.message.clone()));
                Err(e)
            }
        }
    }

    /// Milestones of `file_id`, oldest first.
    pub fn milestones_for(&self, file_id: FileId) -> Vec<TimelineEntry> {
        let mut out: Vec<TimelineEntry> = self.timeline.with(|t| {
            t.iter()
                .filter(|e| e.file_id == file_id)
                .cloned()
                .collect()
        });
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        out
    }

    pub fn node_for_file(&self, file_id: FileId) -> Option<GraphNode> {
        self.nodes
            .with(|n| n.iter().find(|n| n.file_id == file_id).cloned())
    }

    /// Nodes joined to `node_id` by an edge in either direction.
    pub fn linked_nodes(&self, node_id: i64) -> Vec<GraphNode> {
        let neighbours: Vec<i64> = self.edges.with(|edges| {
            edges
                .iter()
                .filter_map(|e| match (e.from_node, e.to_node) {
                    (from, to) if from == node_id => Some(to),
                    (from, to) if to == node_id => Some(from),
                    _ => None,
                })
                .collect()
        });
        self.nodes.with(|nodes| {
            nodes
                .iter()
                .filter(|n| neighbours.contains(&n.id))
                .cloned()
                .collect()
        })
    }

    /// `timestamp` defaults to now.
    pub async fn add_milestone(
        &self,
        file_id: FileId,
        name: &str,
        timestamp: Option<String>,
    ) -> ApiResult<TimelineEntry> {
        require_name(name, "Milestone")?;

        let req = timeline_entry_request(file_id, name.trim(), timestamp);
        let entry = self
            .api
            .create_timeline_entry(&req)
            .await
            .inspect_err(|e| warn!("failed to add milestone: {e}"))?;

        self.timeline.update(|t| t.push(entry.clone()));
        Ok(entry)
    }

    /// Metadata defaults to `{}`.
    pub async fn add_node(
        &self,
        file_id: FileId,
        name: &str,
        metadata: Option<String>,
    ) -> ApiResult<GraphNode> {
        require_name(name, "Node")?;

        let req = graph_node_request(file_id, name.trim(), metadata);
        let node = self
            .api
            .create_graph_node(&req)
            .await
            .inspect_err(|e| warn!("failed to add graph node: {e}"))?;

        self.nodes.update(|n| n.push(node.clone()));
        Ok(node)
    }

    pub async fn link(&self, from_node: i64, to_node: i64) -> ApiResult<GraphEdge> {
        let req = CreateGraphEdgeRequest { from_node, to_node };
        let edge = self
            .api
            .create_graph_edge(&req)
            .await
            .inspect_err(|e| warn!("failed to link nodes {from_node} -> {to_node}: {e}"))?;

        self.edges.update(|e| e.push(edge.clone()));
        Ok(edge)
    }
}

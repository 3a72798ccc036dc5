use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ExplorationId, NodeId, RecordId, VisitId};

/// One published page. Every field but `id` has a permissive default so that
/// partially written or older records still load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: RecordId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub preview_text: String,
    #[serde(default)]
    pub packed_content: String,
    #[serde(default = "anonymous")]
    pub author_name: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub exploration_id: Option<ExplorationId>,
    #[serde(default)]
    pub screenshot_ref: Option<String>,
}

impl PageRecord {
    /// Title for display, falling back to the URL.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// A record about to be inserted; the store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPageRecord {
    pub url: String,
    pub title: String,
    pub preview_text: String,
    pub packed_content: String,
    pub author_name: String,
    pub model_id: String,
    pub timestamp: i64,
}

impl NewPageRecord {
    pub fn into_record(self, id: RecordId) -> PageRecord {
        PageRecord {
            id,
            url: self.url,
            title: self.title,
            preview_text: self.preview_text,
            packed_content: self.packed_content,
            author_name: self.author_name,
            model_id: self.model_id,
            timestamp: self.timestamp,
            exploration_id: None,
            screenshot_ref: None,
        }
    }
}

/// A page in the local browsing history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: VisitId,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub title: String,
    /// Empty when only the address is worth keeping; reopening then
    /// generates the page again.
    #[serde(default)]
    pub packed_content: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub record_id: Option<RecordId>,
    #[serde(default)]
    pub exploration_id: Option<ExplorationId>,
}

impl Visit {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.address
        } else {
            &self.title
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewVisit {
    pub address: String,
    pub title: String,
    pub packed_content: String,
    pub model_id: String,
    pub timestamp: i64,
    pub record_id: Option<RecordId>,
    pub exploration_id: Option<ExplorationId>,
}

impl NewVisit {
    pub fn into_visit(self, id: VisitId) -> Visit {
        Visit {
            id,
            address: self.address,
            title: self.title,
            packed_content: self.packed_content,
            model_id: self.model_id,
            timestamp: self.timestamp,
            record_id: self.record_id,
            exploration_id: self.exploration_id,
        }
    }
}

/// One step in a lineage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent_node_id: Option<NodeId>,
    #[serde(default)]
    pub record_id: Option<RecordId>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub diff_size: usize,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub screenshot_ref: Option<String>,
    #[serde(default)]
    pub tonal_modifier: Option<String>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_node_id.is_none()
    }
}

/// One lineage: a root navigation and every link-follow beneath it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationTree {
    pub exploration_id: ExplorationId,
    #[serde(default)]
    pub root_url: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default = "anonymous")]
    pub author_name: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub tonal_modifier: Option<String>,
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, Node>,
}

impl ExplorationTree {
    pub fn root(&self) -> Option<&Node> {
        self.nodes.values().find(|n| n.is_root())
    }

    /// Linear scan for the node linking `record_id`.
    pub fn node_for_record(&self, record_id: &RecordId) -> Option<&Node> {
        self.nodes
            .values()
            .find(|n| n.record_id.as_ref() == Some(record_id))
    }

    /// Nodes ordered by creation time, ties broken by id.
    pub fn nodes_chronological(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    /// Latest node timestamp, or `created_at` for an empty tree.
    pub fn last_activity(&self) -> i64 {
        self.nodes
            .values()
            .map(|n| n.timestamp)
            .max()
            .unwrap_or(self.created_at)
    }

    /// Checks the single-root and parent-precedes-child invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        let roots = self.nodes.values().filter(|n| n.is_root()).count();
        if roots != 1 {
            return Err(format!("expected exactly one root, found {roots}"));
        }
        for node in self.nodes.values() {
            if let Some(parent_id) = &node.parent_node_id {
                let parent = self
                    .nodes
                    .get(parent_id)
                    .ok_or_else(|| format!("node {} has dangling parent {parent_id}", node.id))?;
                if parent.timestamp > node.timestamp {
                    return Err(format!("node {} is older than its parent {parent_id}", node.id));
                }
            }
        }
        Ok(())
    }
}

/// A lineage about to be created; the store assigns its id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewExploration {
    pub root_url: String,
    pub author_id: Option<String>,
    pub author_name: String,
    pub created_at: i64,
    pub tonal_modifier: Option<String>,
    pub root: Node,
}

fn anonymous() -> String {
    "Anonymous".to_string()
}

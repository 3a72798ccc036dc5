//! Exploration trees: persisted lineages (explicit mode) and trees inferred
//! from a flat list of records (virtual mode), plus feed deduplication.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, instrument, warn};

use altnet_content::{compute_content_delta, extract_new_concepts};
use altnet_core::address::{is_path_prefix, is_related, normalize};
use altnet_core::{
    ExplorationId, ExplorationTree, NewExploration, Node, NodeId, PageRecord, RecordId, Store, StoreError,
};

/// The page a link-follow came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ParentLink {
    pub exploration_id: ExplorationId,
    pub record_id: RecordId,
    pub packed_content: String,
}

/// One published navigation to attach to a lineage.
#[derive(Clone, Debug)]
pub struct LineageStep<'a> {
    pub record_id: &'a RecordId,
    pub url: &'a str,
    pub title: &'a str,
    pub packed_content: &'a str,
    pub parent: Option<&'a ParentLink>,
    pub tonal_modifier: Option<&'a str>,
    pub author_name: &'a str,
    pub author_id: Option<&'a str>,
    pub timestamp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// A new tree was created with this node as its root.
    Root,
    /// Appended under the node of the parent record.
    Child,
    /// Appended under the root because the parent record had no node yet.
    OrphanChild,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineageOutcome {
    pub exploration_id: ExplorationId,
    pub node_id: NodeId,
    pub kind: StepKind,
}

/// Where the session's current lineage stands.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LineageState {
    #[default]
    None,
    RootCreated { exploration_id: ExplorationId },
    Extended { exploration_id: ExplorationId, depth: usize },
}

impl LineageState {
    pub fn exploration_id(&self) -> Option<&ExplorationId> {
        match self {
            Self::None => None,
            Self::RootCreated { exploration_id } | Self::Extended { exploration_id, .. } => Some(exploration_id),
        }
    }

    pub fn advance(&self, outcome: &LineageOutcome) -> Self {
        match outcome.kind {
            StepKind::Root => Self::RootCreated { exploration_id: outcome.exploration_id.clone() },
            StepKind::Child | StepKind::OrphanChild => {
                let depth = match self {
                    Self::Extended { exploration_id, depth } if *exploration_id == outcome.exploration_id => {
                        depth + 1
                    }
                    _ => 1,
                };
                Self::Extended { exploration_id: outcome.exploration_id.clone(), depth }
            }
        }
    }
}

/// Persist one navigation into its lineage and backfill the record's
/// exploration id.
///
/// With a parent, the parent's tree is extended; a parent record with no node
/// yet attaches the child to the root. Without a parent, or when the parent's
/// tree is missing, a new tree is created.
#[instrument(skip(store, step), fields(record_id = %step.record_id, url = step.url))]
pub async fn record_navigation(store: &dyn Store, step: LineageStep<'_>) -> Result<LineageOutcome, StoreError> {
    if let Some(parent) = step.parent {
        match store.get_tree(&parent.exploration_id).await? {
            Some(tree) => {
                if let Some(outcome) = extend_tree(store, &tree, parent, &step).await? {
                    return Ok(outcome);
                }
                warn!(exploration_id = %parent.exploration_id, "exploration has no nodes, starting a new lineage");
            }
            None => {
                warn!(exploration_id = %parent.exploration_id, "exploration not found, starting a new lineage");
            }
        }
    }
    create_root(store, &step).await
}

async fn extend_tree(
    store: &dyn Store,
    tree: &ExplorationTree,
    parent: &ParentLink,
    step: &LineageStep<'_>,
) -> Result<Option<LineageOutcome>, StoreError> {
    let (anchor, kind) = match tree.node_for_record(&parent.record_id) {
        Some(node) => (node, StepKind::Child),
        None => match tree.root() {
            Some(root) => {
                warn!(
                    exploration_id = %tree.exploration_id,
                    parent_record = %parent.record_id,
                    "parent node not found, attaching to root"
                );
                (root, StepKind::OrphanChild)
            }
            None => return Ok(None),
        },
    };

    let node = Node {
        id: NodeId::new(),
        url: step.url.to_string(),
        title: step.title.to_string(),
        parent_node_id: Some(anchor.id.clone()),
        record_id: Some(step.record_id.clone()),
        timestamp: step.timestamp.max(anchor.timestamp),
        diff_size: compute_content_delta(&parent.packed_content, step.packed_content),
        concepts: extract_new_concepts(&parent.packed_content, step.packed_content),
        screenshot_ref: None,
        tonal_modifier: step.tonal_modifier.map(str::to_string),
    };
    let node_id = store.append_node(&tree.exploration_id, node).await?;
    assign_record(store, step.record_id, &tree.exploration_id).await?;
    debug!(exploration_id = %tree.exploration_id, node_id = %node_id, "lineage extended");

    Ok(Some(LineageOutcome { exploration_id: tree.exploration_id.clone(), node_id, kind }))
}

async fn create_root(store: &dyn Store, step: &LineageStep<'_>) -> Result<LineageOutcome, StoreError> {
    let root = Node {
        id: NodeId::new(),
        url: step.url.to_string(),
        title: step.title.to_string(),
        parent_node_id: None,
        record_id: Some(step.record_id.clone()),
        timestamp: step.timestamp,
        diff_size: 0,
        concepts: Vec::new(),
        screenshot_ref: None,
        tonal_modifier: step.tonal_modifier.map(str::to_string),
    };
    let node_id = root.id.clone();
    let exploration_id = store
        .create_tree(NewExploration {
            root_url: step.url.to_string(),
            author_id: step.author_id.map(str::to_string),
            author_name: step.author_name.to_string(),
            created_at: step.timestamp,
            tonal_modifier: step.tonal_modifier.map(str::to_string),
            root,
        })
        .await?;
    assign_record(store, step.record_id, &exploration_id).await?;
    debug!(exploration_id = %exploration_id, "lineage created");

    Ok(LineageOutcome { exploration_id, node_id, kind: StepKind::Root })
}

async fn assign_record(
    store: &dyn Store,
    record_id: &RecordId,
    exploration_id: &ExplorationId,
) -> Result<(), StoreError> {
    if !store.set_record_exploration(record_id, exploration_id).await? {
        warn!(record_id = %record_id, exploration_id = %exploration_id, "record already in a lineage, kept");
    }
    Ok(())
}

// ── Virtual mode ────────────────────────────────────────────────────────────

fn newest_first(a: &&PageRecord, b: &&PageRecord) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id))
}

/// Infer trees from a flat record set.
///
/// Records sharing an exploration id form one tree; the rest are grouped by
/// URL lineage. Trees come back most recently active first.
pub fn virtual_reconstruct(records: &[PageRecord]) -> Vec<ExplorationTree> {
    let mut seen = HashSet::new();
    let unique: Vec<&PageRecord> = records.iter().filter(|r| seen.insert(&r.id)).collect();

    let mut explicit: Vec<(ExplorationId, Vec<&PageRecord>)> = Vec::new();
    let mut explicit_index: HashMap<&ExplorationId, usize> = HashMap::new();
    let mut loose = Vec::new();
    for record in &unique {
        match &record.exploration_id {
            Some(id) => match explicit_index.get(id) {
                Some(&i) => explicit[i].1.push(record),
                None => {
                    explicit_index.insert(id, explicit.len());
                    explicit.push((id.clone(), vec![record]));
                }
            },
            None => loose.push(*record),
        }
    }

    let mut trees: Vec<ExplorationTree> = explicit
        .into_iter()
        .map(|(id, group)| build_tree(group, Some(id)))
        .collect();
    trees.extend(url_components(&loose).into_iter().map(|group| build_tree(group, None)));

    trees.sort_by(|a, b| {
        b.last_activity()
            .cmp(&a.last_activity())
            .then_with(|| a.exploration_id.cmp(&b.exploration_id))
    });
    trees
}

/// Connected components of the URL lineage relation, in first-seen order.
fn url_components<'a>(records: &[&'a PageRecord]) -> Vec<Vec<&'a PageRecord>> {
    let urls: Vec<String> = records.iter().map(|r| normalize(&r.url)).collect();
    let mut parent: Vec<usize> = (0..records.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            if is_related(&urls[i], &urls[j]) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut order: Vec<usize> = Vec::new();
    let mut groups: HashMap<usize, Vec<&'a PageRecord>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        let root = find(&mut parent, i);
        groups
            .entry(root)
            .or_insert_with(|| {
                order.push(root);
                Vec::new()
            })
            .push(*record);
    }
    order.into_iter().filter_map(|root| groups.remove(&root)).collect()
}

/// Build one tree. A record hangs off the other record whose URL is its
/// longest segment prefix (earliest on ties), wherever that record sits in
/// time. The earliest record without such a prefix is the root; other
/// prefixless records attach to it.
fn build_tree(mut group: Vec<&PageRecord>, id: Option<ExplorationId>) -> ExplorationTree {
    group.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    let urls: Vec<String> = group.iter().map(|r| normalize(&r.url)).collect();

    let prefix_parent: Vec<Option<usize>> = (0..group.len())
        .map(|i| {
            let mut best: Option<usize> = None;
            // Group is in time order, so the first longest match is the earliest.
            for j in (0..group.len()).filter(|&j| j != i) {
                if is_path_prefix(&urls[j], &urls[i]) && best.is_none_or(|b| urls[j].len() > urls[b].len()) {
                    best = Some(j);
                }
            }
            best
        })
        .collect();
    let root = prefix_parent.iter().position(Option::is_none).unwrap_or(0);

    let mut nodes = BTreeMap::new();
    for (i, record) in group.iter().enumerate() {
        let parent = match prefix_parent[i] {
            Some(j) => Some(group[j]),
            None if i != root => Some(group[root]),
            None => None,
        };
        let node = virtual_node(record, &urls[i], parent);
        nodes.insert(node.id.clone(), node);
    }

    let (root_url, author_name, created_at) = match group.get(root) {
        Some(record) => (urls[root].clone(), record.author_name.clone(), record.timestamp),
        None => (String::new(), "Anonymous".to_string(), 0),
    };
    ExplorationTree {
        exploration_id: id.unwrap_or_else(|| ExplorationId::virtual_for_url(&root_url)),
        root_url,
        author_id: None,
        author_name,
        created_at,
        tonal_modifier: None,
        nodes,
    }
}

fn virtual_node(record: &PageRecord, url: &str, parent: Option<&PageRecord>) -> Node {
    let (diff_size, concepts) = match parent {
        Some(p) => (
            compute_content_delta(&p.packed_content, &record.packed_content),
            extract_new_concepts(&p.packed_content, &record.packed_content),
        ),
        None => (0, Vec::new()),
    };
    Node {
        id: NodeId::for_record(&record.id),
        url: url.to_string(),
        title: record.display_title().to_string(),
        parent_node_id: parent.map(|p| NodeId::for_record(&p.id)),
        record_id: Some(record.id.clone()),
        timestamp: record.timestamp,
        diff_size,
        concepts,
        screenshot_ref: record.screenshot_ref.clone(),
        tonal_modifier: None,
    }
}

/// Keep only the newest record of each lineage.
///
/// Scanning newest first, a record is dropped when an accepted record shares
/// its exploration id or has a related URL.
pub fn deduplicate(records: &[PageRecord]) -> Vec<PageRecord> {
    let mut ordered: Vec<&PageRecord> = records.iter().collect();
    ordered.sort_by(newest_first);

    let mut explorations: HashSet<&ExplorationId> = HashSet::new();
    let mut urls: Vec<String> = Vec::new();
    let mut accepted = Vec::new();
    for record in ordered {
        if record.exploration_id.as_ref().is_some_and(|e| explorations.contains(e)) {
            continue;
        }
        let url = normalize(&record.url);
        if urls.iter().any(|seen| is_related(seen, &url)) {
            continue;
        }
        if let Some(e) = &record.exploration_id {
            explorations.insert(e);
        }
        if !url.is_empty() {
            urls.push(url);
        }
        accepted.push(record.clone());
    }
    accepted
}

/// Cache key for a card's scrubber: its exploration id, else `url:<url>`.
pub fn scrubber_key(card: &PageRecord) -> String {
    match &card.exploration_id {
        Some(id) => id.to_string(),
        None => ExplorationId::virtual_for_url(&normalize(&card.url)).to_string(),
    }
}

/// The tree shown on one feed card.
///
/// The persisted tree wins when it has nodes; otherwise the records related
/// to the card by URL or exploration id form a virtual tree, which for a
/// lone card is a single node.
pub fn scrubber_tree(card: &PageRecord, explicit: Option<ExplorationTree>, all: &[PageRecord]) -> ExplorationTree {
    if let Some(tree) = explicit.filter(|t| !t.nodes.is_empty()) {
        return tree;
    }

    let card_url = normalize(&card.url);
    let mut related: Vec<&PageRecord> = all
        .iter()
        .filter(|r| {
            is_related(&normalize(&r.url), &card_url)
                || (card.exploration_id.is_some() && r.exploration_id == card.exploration_id)
        })
        .collect();
    let mut seen = HashSet::new();
    related.retain(|r| seen.insert(&r.id));
    if !seen.contains(&card.id) {
        related.push(card);
    }

    let id = card
        .exploration_id
        .clone()
        .unwrap_or_else(|| ExplorationId::virtual_for_url(&card_url));
    build_tree(related, Some(id))
}

use std::collections::BTreeMap;

use rusqlite::{params, OptionalExtension};
use tracing::instrument;

use altnet_core::{ExplorationId, ExplorationTree, NewExploration, Node, NodeId, RecordId};

use crate::database::Database;
use crate::error::DbError;
use crate::row_helpers::{get, get_opt, parse_json};

const NODES: &str = "exploration_nodes";

fn map_node(row: &rusqlite::Row<'_>) -> Result<Node, DbError> {
    let concepts: String = get(row, 7, NODES, "concepts")?;
    let diff_size: i64 = get(row, 6, NODES, "diff_size")?;
    Ok(Node {
        id: NodeId::from_raw(get::<String>(row, 0, NODES, "id")?),
        url: get(row, 1, NODES, "url")?,
        title: get(row, 2, NODES, "title")?,
        parent_node_id: get_opt::<String>(row, 3, NODES, "parent_node_id")?.map(NodeId::from_raw),
        record_id: get_opt::<String>(row, 4, NODES, "record_id")?.map(RecordId::from_raw),
        timestamp: get(row, 5, NODES, "timestamp")?,
        diff_size: usize::try_from(diff_size).unwrap_or(0),
        concepts: parse_json(&concepts, NODES, "concepts")?,
        screenshot_ref: get_opt(row, 8, NODES, "screenshot_ref")?,
        tonal_modifier: get_opt(row, 9, NODES, "tonal_modifier")?,
    })
}

fn insert_node(conn: &rusqlite::Connection, exploration_id: &ExplorationId, node: &Node) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO exploration_nodes
            (exploration_id, id, url, title, parent_node_id, record_id, timestamp, diff_size, concepts, screenshot_ref, tonal_modifier)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            exploration_id.as_str(),
            node.id.as_str(),
            node.url,
            node.title,
            node.parent_node_id.as_ref().map(NodeId::as_str),
            node.record_id.as_ref().map(RecordId::as_str),
            node.timestamp,
            node.diff_size as i64,
            serde_json::to_string(&node.concepts)?,
            node.screenshot_ref,
            node.tonal_modifier,
        ],
    )?;
    Ok(())
}

/// Exploration trees and their append-only node sets.
pub struct ExplorationRepo {
    db: Database,
}

impl ExplorationRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a tree together with its root node.
    #[instrument(skip(self, tree), fields(root_url = %tree.root_url))]
    pub fn create(&self, tree: &NewExploration) -> Result<ExplorationId, DbError> {
        let id = ExplorationId::new();
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO explorations (id, root_url, author_id, author_name, created_at, tonal_modifier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    tree.root_url,
                    tree.author_id,
                    tree.author_name,
                    tree.created_at,
                    tree.tonal_modifier,
                ],
            )?;
            insert_node(&tx, &id, &tree.root)?;
            tx.commit()?;
            Ok(())
        })?;
        Ok(id)
    }

    #[instrument(skip(self), fields(exploration_id = %id))]
    pub fn get(&self, id: &ExplorationId) -> Result<Option<ExplorationTree>, DbError> {
        self.db.with_conn(|conn| {
            let header = conn
                .query_row(
                    "SELECT root_url, author_id, author_name, created_at, tonal_modifier
                     FROM explorations WHERE id = ?1",
                    [id.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, Option<String>>(4)?,
                        ))
                    },
                )
                .optional()?;
            let Some((root_url, author_id, author_name, created_at, tonal_modifier)) = header else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT id, url, title, parent_node_id, record_id, timestamp, diff_size, concepts, screenshot_ref, tonal_modifier
                 FROM exploration_nodes WHERE exploration_id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            let mut nodes = BTreeMap::new();
            while let Some(row) = rows.next()? {
                let node = map_node(row)?;
                nodes.insert(node.id.clone(), node);
            }

            Ok(Some(ExplorationTree {
                exploration_id: id.clone(),
                root_url,
                author_id,
                author_name,
                created_at,
                tonal_modifier,
                nodes,
            }))
        })
    }

    #[instrument(skip(self, node), fields(exploration_id = %id, node_id = %node.id))]
    pub fn append_node(&self, id: &ExplorationId, node: &Node) -> Result<NodeId, DbError> {
        self.db.with_conn(|conn| {
            let known = conn
                .query_row("SELECT 1 FROM explorations WHERE id = ?1", [id.as_str()], |_| Ok(()))
                .optional()?;
            if known.is_none() {
                return Err(DbError::NotFound(format!("exploration {id}")));
            }
            insert_node(conn, id, node)
        })?;
        Ok(node.id.clone())
    }

    #[instrument(skip(self, screenshot_ref), fields(exploration_id = %id, node_id = %node_id))]
    pub fn set_node_screenshot(&self, id: &ExplorationId, node_id: &NodeId, screenshot_ref: &str) -> Result<(), DbError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE exploration_nodes SET screenshot_ref = ?1 WHERE exploration_id = ?2 AND id = ?3",
                params![screenshot_ref, id.as_str(), node_id.as_str()],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("node {node_id} in exploration {id}")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, ts: i64) -> Node {
        Node {
            id: NodeId::from_raw(id),
            url: format!("url/{id}"),
            title: id.to_uppercase(),
            parent_node_id: parent.map(NodeId::from_raw),
            record_id: Some(RecordId::from_raw(format!("rec_{id}"))),
            timestamp: ts,
            diff_size: 7,
            concepts: vec!["Alpha".into(), "Beta".into()],
            screenshot_ref: None,
            tonal_modifier: Some("hushed and golden".into()),
        }
    }

    fn new_tree(root: Node) -> NewExploration {
        NewExploration {
            root_url: root.url.clone(),
            author_id: None,
            author_name: "Anonymous".into(),
            created_at: root.timestamp,
            tonal_modifier: root.tonal_modifier.clone(),
            root,
        }
    }

    #[test]
    fn create_get_append() {
        let repo = ExplorationRepo::new(Database::in_memory().unwrap());
        let id = repo.create(&new_tree(node("n1", None, 1))).unwrap();
        repo.append_node(&id, &node("n2", Some("n1"), 2)).unwrap();

        let tree = repo.get(&id).unwrap().unwrap();
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.root().unwrap().id.as_str(), "n1");
        let child = &tree.nodes[&NodeId::from_raw("n2")];
        assert_eq!(child.parent_node_id.as_ref().unwrap().as_str(), "n1");
        assert_eq!(child.concepts, vec!["Alpha", "Beta"]);
        assert_eq!(child.diff_size, 7);
        assert_eq!(tree.tonal_modifier.as_deref(), Some("hushed and golden"));
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn missing_tree_is_none() {
        let repo = ExplorationRepo::new(Database::in_memory().unwrap());
        assert!(repo.get(&ExplorationId::from_raw("expl_none")).unwrap().is_none());
    }

    #[test]
    fn append_to_missing_tree_fails() {
        let repo = ExplorationRepo::new(Database::in_memory().unwrap());
        let err = repo
            .append_node(&ExplorationId::from_raw("expl_none"), &node("n1", None, 1))
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn node_screenshot_backfill() {
        let repo = ExplorationRepo::new(Database::in_memory().unwrap());
        let id = repo.create(&new_tree(node("n1", None, 1))).unwrap();
        repo.set_node_screenshot(&id, &NodeId::from_raw("n1"), "shot.png").unwrap();
        let tree = repo.get(&id).unwrap().unwrap();
        assert_eq!(tree.root().unwrap().screenshot_ref.as_deref(), Some("shot.png"));
        assert!(repo
            .set_node_screenshot(&id, &NodeId::from_raw("nx"), "x")
            .is_err());
    }

    #[test]
    fn corrupt_concepts_surface_as_corrupt_row() {
        let db = Database::in_memory().unwrap();
        let repo = ExplorationRepo::new(db.clone());
        let id = repo.create(&new_tree(node("n1", None, 1))).unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE exploration_nodes SET concepts = 'oops'", [])?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            repo.get(&id),
            Err(DbError::CorruptRow { column: "concepts", .. })
        ));
    }
}

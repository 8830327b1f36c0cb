//! Activity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the activity category tree.
//! - Materialize ancestor and descendant context so loaded nodes carry
//!   their parent chain and children.
//!
//! # Invariants
//! - Tree walks never hard-code a depth bound; recursive CTEs with UNION
//!   terminate even on adversarial parent links in stored data.
//! - Deleting an activity cascades to its descendants and membership
//!   links through the schema.

use crate::mapper::{DomainGraph, MapperRegistry, RowGraph};
use crate::model::entities::{ActivityId, ActivityRef};
use crate::repo::{
    depth_from_i64, flush_row_graph, parse_uuid, row_exists, RepoError, RepoResult,
};
use crate::rows::{link_child_activity, ActivityRow, ActivityRowRef};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

/// Repository interface for activity tree CRUD.
pub trait ActivityRepository {
    /// Loads one activity with its tree context; absence is `Ok(None)`.
    fn get(&self, id: ActivityId, graph: &mut DomainGraph) -> RepoResult<Option<ActivityRef>>;
    /// Lists activities ordered by `name ASC, id ASC`.
    fn get_all(
        &self,
        offset: u32,
        limit: Option<u32>,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<ActivityRef>>;
    fn create(&self, activity: &ActivityRef) -> RepoResult<()>;
    fn update(&self, activity: &ActivityRef) -> RepoResult<()>;
    fn delete(&self, id: ActivityId) -> RepoResult<()>;
}

/// SQLite-backed activity repository.
pub struct SqliteActivityRepository<'conn> {
    conn: &'conn Connection,
    mapper: MapperRegistry,
}

impl<'conn> SqliteActivityRepository<'conn> {
    pub fn new(conn: &'conn Connection, mapper: MapperRegistry) -> Self {
        Self { conn, mapper }
    }

    /// Resolves the root ancestor of `id`, or `None` when `id` is absent.
    ///
    /// Falls back to `id` itself when the stored parent chain never
    /// reaches a NULL parent (corrupt cyclic data).
    fn root_ancestor(&self, id: ActivityId) -> RepoResult<Option<ActivityId>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE chain(id, parent_id) AS (
                SELECT id, parent_id FROM activity WHERE id = ?1
                UNION
                SELECT a.id, a.parent_id
                FROM activity a
                JOIN chain c ON a.id = c.parent_id
            )
            SELECT id, parent_id FROM chain;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;

        let mut seen_any = false;
        let mut root = None;
        while let Some(row) = rows.next()? {
            seen_any = true;
            let parent_id: Option<String> = row.get("parent_id")?;
            if parent_id.is_none() {
                let node_id: String = row.get("id")?;
                root = Some(parse_uuid(&node_id, "activity.id")?);
            }
        }

        if !seen_any {
            return Ok(None);
        }
        Ok(Some(root.unwrap_or(id)))
    }

    /// Loads the subtree under `root` as linked row nodes keyed by id.
    fn load_tree(&self, root: ActivityId) -> RepoResult<HashMap<Uuid, ActivityRowRef>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE tree(id) AS (
                SELECT id FROM activity WHERE id = ?1
                UNION
                SELECT a.id FROM activity a JOIN tree t ON a.parent_id = t.id
            )
            SELECT a.id, a.name, a.depth, a.parent_id
            FROM activity a
            JOIN tree t ON t.id = a.id
            ORDER BY a.name ASC, a.id ASC;",
        )?;
        let mut rows = stmt.query([root.to_string()])?;

        let mut nodes: HashMap<Uuid, ActivityRowRef> = HashMap::new();
        let mut order: Vec<Uuid> = Vec::new();
        while let Some(row) = rows.next()? {
            let node = parse_activity_row(row)?;
            let id = node.borrow().id;
            nodes.insert(id, node);
            order.push(id);
        }

        link_loaded_activities(&nodes, &order);
        Ok(nodes)
    }

    fn save(&self, activity: &ActivityRef) -> RepoResult<()> {
        let mut rows = RowGraph::new();
        self.mapper.activity().from_domain(activity, &mut rows);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        flush_row_graph(&tx, &rows)?;
        tx.commit()?;
        Ok(())
    }
}

impl ActivityRepository for SqliteActivityRepository<'_> {
    fn get(&self, id: ActivityId, graph: &mut DomainGraph) -> RepoResult<Option<ActivityRef>> {
        let Some(root) = self.root_ancestor(id)? else {
            return Ok(None);
        };

        let nodes = self.load_tree(root)?;
        let Some(row) = nodes.get(&id) else {
            return Ok(None);
        };
        Ok(Some(self.mapper.activity().to_domain(row, graph)))
    }

    fn get_all(
        &self,
        offset: u32,
        limit: Option<u32>,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<ActivityRef>> {
        // The category taxonomy is small by nature; load the forest once so
        // every page entry carries fully linked tree context.
        let mut stmt = self.conn.prepare(
            "SELECT id, name, depth, parent_id
             FROM activity
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;

        let mut nodes: HashMap<Uuid, ActivityRowRef> = HashMap::new();
        let mut order: Vec<Uuid> = Vec::new();
        while let Some(row) = rows.next()? {
            let node = parse_activity_row(row)?;
            let id = node.borrow().id;
            nodes.insert(id, node);
            order.push(id);
        }
        link_loaded_activities(&nodes, &order);

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(order.len());
        let end = match limit {
            Some(limit) => start.saturating_add(limit as usize).min(order.len()),
            None => order.len(),
        };

        let mut out = Vec::with_capacity(end - start);
        for id in &order[start..end] {
            out.push(self.mapper.activity().to_domain(&nodes[id], graph));
        }
        Ok(out)
    }

    fn create(&self, activity: &ActivityRef) -> RepoResult<()> {
        let id = activity.borrow().id;
        if row_exists(self.conn, "activity", id)? {
            return Err(RepoError::ObjectAlreadyExists(id));
        }
        self.save(activity)
    }

    fn update(&self, activity: &ActivityRef) -> RepoResult<()> {
        let id = activity.borrow().id;
        if !row_exists(self.conn, "activity", id)? {
            return Err(RepoError::ObjectDoesNotExist(id));
        }
        self.save(activity)
    }

    fn delete(&self, id: ActivityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM activity WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::ObjectDoesNotExist(id));
        }
        Ok(())
    }
}

fn parse_activity_row(row: &rusqlite::Row<'_>) -> RepoResult<ActivityRowRef> {
    let id: String = row.get("id")?;
    let id = parse_uuid(&id, "activity.id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "activity.parent_id"))
        .transpose()?;
    let depth = depth_from_i64(row.get("depth")?, "activity.depth")?;
    let name: String = row.get("name")?;
    Ok(ActivityRow::new(id, name, depth, parent_id))
}

/// Wires parent/children handles among loaded rows, preserving `order`
/// for deterministic child sequences.
fn link_loaded_activities(nodes: &HashMap<Uuid, ActivityRowRef>, order: &[Uuid]) {
    for id in order {
        let child = &nodes[id];
        let parent_id = child.borrow().parent_id;
        if let Some(parent_id) = parent_id {
            if let Some(parent) = nodes.get(&parent_id) {
                if !Rc::ptr_eq(parent, child) {
                    link_child_activity(parent, child);
                }
            }
        }
    }
}
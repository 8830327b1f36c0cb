//! Organization repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Serve identifier lookup, filtered listing, radius, bounding-box and
//!   activity-subtree queries over organizations.
//! - Keep SQL and relation-loading depth inside the repository boundary.
//!
//! # Invariants
//! - Every multi-result operation loads building + phones + activities for
//!   each matched organization before mapping.
//! - Result ordering is deterministic: `name ASC, id ASC`.
//! - The radius predicate is geodesic; the degree window is only an
//!   index-friendly prefilter and never excludes a matching row.

use crate::mapper::{DomainGraph, MapperRegistry, RowGraph};
use crate::model::entities::{ActivityId, BuildingId, OrganizationId, OrganizationRef};
use crate::model::geo::{bounding_window, GeoPoint};
use crate::repo::{
    escape_like, load_phones_and_activities, parse_uuid, row_exists, sql_placeholders,
    flush_row_graph, RepoError, RepoResult,
};
use crate::rows::{link_organization, BuildingRow, BuildingRowRef, OrganizationRow,
    OrganizationRowRef, StoredPoint};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use uuid::Uuid;

const ORG_SELECT_SQL: &str = "SELECT o.id, o.name, o.building_id FROM organization o";
const ORG_ORDER_SQL: &str = " ORDER BY o.name ASC, o.id ASC";

/// Enumerated filters for organization listing; all provided filters
/// conjoin. The repository accepts any non-negative offset/limit; range
/// policy belongs to the boundary layer.
#[derive(Debug, Clone, Default)]
pub struct OrganizationQuery {
    /// Case-insensitive substring match on the organization name.
    pub name_contains: Option<String>,
    pub building_id: Option<BuildingId>,
    /// Direct membership in this activity (not its subtree).
    pub activity_id: Option<ActivityId>,
    pub offset: u32,
    pub limit: Option<u32>,
}

/// Repository interface for organization lookup, search and CRUD.
pub trait OrganizationRepository {
    /// Loads one organization; absence is `Ok(None)`.
    fn get(
        &self,
        id: OrganizationId,
        graph: &mut DomainGraph,
    ) -> RepoResult<Option<OrganizationRef>>;
    /// Lists organizations matching all provided filters.
    fn get_all(
        &self,
        query: &OrganizationQuery,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>>;
    /// Lists organizations whose building lies within `radius_meters`
    /// geodesic distance of `center`.
    fn get_all_in_radius(
        &self,
        center: GeoPoint,
        radius_meters: f64,
        query: &OrganizationQuery,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>>;
    /// Lists organizations whose building lies within the axis-aligned
    /// degree rectangle `south_west`..`north_east`.
    fn get_all_in_bbox(
        &self,
        south_west: GeoPoint,
        north_east: GeoPoint,
        query: &OrganizationQuery,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>>;
    /// Lists organizations linked to the root activity or any of its
    /// descendants.
    fn get_all_by_activity_subtree(
        &self,
        root_activity_id: ActivityId,
        offset: u32,
        limit: Option<u32>,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>>;
    /// Persists a new organization aggregate.
    fn create(&self, org: &OrganizationRef) -> RepoResult<()>;
    /// Re-persists an existing organization aggregate.
    fn update(&self, org: &OrganizationRef) -> RepoResult<()>;
    /// Deletes by id; phones and membership links cascade.
    fn delete(&self, id: OrganizationId) -> RepoResult<()>;
}

/// SQLite-backed organization repository.
pub struct SqliteOrganizationRepository<'conn> {
    conn: &'conn Connection,
    mapper: MapperRegistry,
}

impl<'conn> SqliteOrganizationRepository<'conn> {
    pub fn new(conn: &'conn Connection, mapper: MapperRegistry) -> Self {
        Self { conn, mapper }
    }

    fn run_query(
        &self,
        sql: &str,
        binds: Vec<Value>,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>> {
        let scalars = query_org_scalars(self.conn, sql, binds)?;
        let rows = load_organization_rows(self.conn, scalars)?;

        // One mapped domain object per consumed row; shared buildings and
        // activities resolve through the caller's visited map.
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.mapper.organization_to_domain(&row, graph));
        }
        Ok(out)
    }

    fn save(&self, org: &OrganizationRef) -> RepoResult<()> {
        let mut rows = RowGraph::new();
        self.mapper.organization_from_domain(org, &mut rows);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        flush_row_graph(&tx, &rows)?;
        tx.commit()?;
        Ok(())
    }
}

impl OrganizationRepository for SqliteOrganizationRepository<'_> {
    fn get(
        &self,
        id: OrganizationId,
        graph: &mut DomainGraph,
    ) -> RepoResult<Option<OrganizationRef>> {
        let sql = format!("{ORG_SELECT_SQL} WHERE o.id = ?1;");
        let binds = vec![Value::Text(id.to_string())];
        let mut mapped = self.run_query(&sql, binds, graph)?;
        Ok(mapped.pop())
    }

    fn get_all(
        &self,
        query: &OrganizationQuery,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>> {
        let mut sql = format!("{ORG_SELECT_SQL} WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();

        push_filters(&mut sql, &mut binds, query);
        sql.push_str(ORG_ORDER_SQL);
        push_pagination(&mut sql, &mut binds, query.offset, query.limit);
        sql.push(';');

        self.run_query(&sql, binds, graph)
    }

    fn get_all_in_radius(
        &self,
        center: GeoPoint,
        radius_meters: f64,
        query: &OrganizationQuery,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>> {
        let (sw, ne) = bounding_window(center, radius_meters);

        let mut sql = format!(
            "{ORG_SELECT_SQL}
             JOIN building b ON b.id = o.building_id
             WHERE b.latitude BETWEEN ? AND ?
               AND b.longitude BETWEEN ? AND ?
               AND geo_distance_m(?, ?, b.latitude, b.longitude) <= ?"
        );
        let mut binds: Vec<Value> = vec![
            Value::Real(sw.latitude),
            Value::Real(ne.latitude),
            Value::Real(sw.longitude),
            Value::Real(ne.longitude),
            Value::Real(center.latitude),
            Value::Real(center.longitude),
            Value::Real(radius_meters),
        ];

        push_filters(&mut sql, &mut binds, query);
        sql.push_str(ORG_ORDER_SQL);
        push_pagination(&mut sql, &mut binds, query.offset, query.limit);
        sql.push(';');

        self.run_query(&sql, binds, graph)
    }

    fn get_all_in_bbox(
        &self,
        south_west: GeoPoint,
        north_east: GeoPoint,
        query: &OrganizationQuery,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>> {
        let mut sql = format!(
            "{ORG_SELECT_SQL}
             JOIN building b ON b.id = o.building_id
             WHERE b.latitude BETWEEN ? AND ?
               AND b.longitude BETWEEN ? AND ?"
        );
        let mut binds: Vec<Value> = vec![
            Value::Real(south_west.latitude),
            Value::Real(north_east.latitude),
            Value::Real(south_west.longitude),
            Value::Real(north_east.longitude),
        ];

        push_filters(&mut sql, &mut binds, query);
        sql.push_str(ORG_ORDER_SQL);
        push_pagination(&mut sql, &mut binds, query.offset, query.limit);
        sql.push(';');

        self.run_query(&sql, binds, graph)
    }

    fn get_all_by_activity_subtree(
        &self,
        root_activity_id: ActivityId,
        offset: u32,
        limit: Option<u32>,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<OrganizationRef>> {
        // UNION (not UNION ALL) keeps the walk terminating even on
        // adversarial parent links that form a cycle in stored data.
        let mut sql = String::from(
            "WITH RECURSIVE activity_tree(id) AS (
                SELECT id FROM activity WHERE id = ?
                UNION
                SELECT a.id
                FROM activity a
                JOIN activity_tree t ON a.parent_id = t.id
            )
            SELECT DISTINCT o.id, o.name, o.building_id
            FROM organization o
            JOIN organization_activity oa ON oa.organization_id = o.id
            JOIN activity_tree t ON t.id = oa.activity_id",
        );
        let mut binds: Vec<Value> = vec![Value::Text(root_activity_id.to_string())];

        sql.push_str(ORG_ORDER_SQL);
        push_pagination(&mut sql, &mut binds, offset, limit);
        sql.push(';');

        self.run_query(&sql, binds, graph)
    }

    fn create(&self, org: &OrganizationRef) -> RepoResult<()> {
        let id = org.borrow().id;
        if row_exists(self.conn, "organization", id)? {
            return Err(RepoError::ObjectAlreadyExists(id));
        }
        self.save(org)
    }

    fn update(&self, org: &OrganizationRef) -> RepoResult<()> {
        let id = org.borrow().id;
        if !row_exists(self.conn, "organization", id)? {
            return Err(RepoError::ObjectDoesNotExist(id));
        }
        self.save(org)
    }

    fn delete(&self, id: OrganizationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM organization WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::ObjectDoesNotExist(id));
        }
        Ok(())
    }
}

fn push_filters(sql: &mut String, binds: &mut Vec<Value>, query: &OrganizationQuery) {
    if let Some(name) = &query.name_contains {
        sql.push_str(" AND o.name LIKE ? ESCAPE '\\'");
        binds.push(Value::Text(format!("%{}%", escape_like(name))));
    }
    if let Some(building_id) = query.building_id {
        sql.push_str(" AND o.building_id = ?");
        binds.push(Value::Text(building_id.to_string()));
    }
    if let Some(activity_id) = query.activity_id {
        sql.push_str(
            " AND EXISTS (
                SELECT 1 FROM organization_activity oa_f
                WHERE oa_f.organization_id = o.id AND oa_f.activity_id = ?
            )",
        );
        binds.push(Value::Text(activity_id.to_string()));
    }
}

fn push_pagination(sql: &mut String, binds: &mut Vec<Value>, offset: u32, limit: Option<u32>) {
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            binds.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        binds.push(Value::Integer(i64::from(offset)));
    }
}

struct OrgScalars {
    id: Uuid,
    name: String,
    building_id: Uuid,
}

fn query_org_scalars(
    conn: &Connection,
    sql: &str,
    binds: Vec<Value>,
) -> RepoResult<Vec<OrgScalars>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        let id: String = row.get("id")?;
        let building_id: String = row.get("building_id")?;
        out.push(OrgScalars {
            id: parse_uuid(&id, "organization.id")?,
            name: row.get("name")?,
            building_id: parse_uuid(&building_id, "organization.building_id")?,
        });
    }

    Ok(out)
}

/// Builds the row graph for a page of organization scalars: buildings
/// linked both ways, phones and activity memberships attached.
fn load_organization_rows(
    conn: &Connection,
    scalars: Vec<OrgScalars>,
) -> RepoResult<Vec<OrganizationRowRef>> {
    if scalars.is_empty() {
        return Ok(Vec::new());
    }

    let mut building_ids: Vec<Uuid> = Vec::new();
    for scalar in &scalars {
        if !building_ids.contains(&scalar.building_id) {
            building_ids.push(scalar.building_id);
        }
    }
    let buildings = load_building_rows_by_id(conn, &building_ids)?;

    let mut org_rows: Vec<OrganizationRowRef> = Vec::with_capacity(scalars.len());
    for scalar in scalars {
        let org = OrganizationRow::new(scalar.id, scalar.name, Some(scalar.building_id));
        if let Some(building) = buildings.get(&scalar.building_id) {
            link_organization(building, &org);
        }
        org_rows.push(org);
    }

    load_phones_and_activities(conn, &org_rows)?;
    Ok(org_rows)
}

fn load_building_rows_by_id(
    conn: &Connection,
    ids: &[Uuid],
) -> RepoResult<HashMap<Uuid, BuildingRowRef>> {
    let mut out: HashMap<Uuid, BuildingRowRef> = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }

    let placeholders = sql_placeholders(ids.len());
    let binds: Vec<Value> = ids.iter().map(|id| Value::Text(id.to_string())).collect();

    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, latitude, longitude
         FROM building
         WHERE id IN ({placeholders});"
    ))?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    while let Some(row) = rows.next()? {
        let id: String = row.get("id")?;
        let id = parse_uuid(&id, "building.id")?;
        let location = StoredPoint {
            x: row.get("longitude")?,
            y: row.get("latitude")?,
        };
        let name: String = row.get("name")?;
        out.insert(id, BuildingRow::new(id, name, location));
    }

    Ok(out)
}

//! Building repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over buildings with their organization aggregates.
//!
//! # Invariants
//! - Loading a building materializes its organizations with phones and
//!   activity memberships, back-references wired both ways.
//! - Deleting a building cascades to organizations, phones and membership
//!   links through the schema.

use crate::mapper::{DomainGraph, MapperRegistry, RowGraph};
use crate::model::entities::{BuildingId, BuildingRef};
use crate::repo::{
    flush_row_graph, load_phones_and_activities, parse_uuid, row_exists, sql_placeholders,
    RepoError, RepoResult,
};
use crate::rows::{link_organization, BuildingRow, BuildingRowRef, OrganizationRow, StoredPoint};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

/// Repository interface for building CRUD.
pub trait BuildingRepository {
    /// Loads one building aggregate; absence is `Ok(None)`.
    fn get(&self, id: BuildingId, graph: &mut DomainGraph) -> RepoResult<Option<BuildingRef>>;
    /// Lists buildings ordered by `name ASC, id ASC`.
    fn get_all(
        &self,
        offset: u32,
        limit: Option<u32>,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<BuildingRef>>;
    fn create(&self, building: &BuildingRef) -> RepoResult<()>;
    fn update(&self, building: &BuildingRef) -> RepoResult<()>;
    fn delete(&self, id: BuildingId) -> RepoResult<()>;
}

/// SQLite-backed building repository.
pub struct SqliteBuildingRepository<'conn> {
    conn: &'conn Connection,
    mapper: MapperRegistry,
}

impl<'conn> SqliteBuildingRepository<'conn> {
    pub fn new(conn: &'conn Connection, mapper: MapperRegistry) -> Self {
        Self { conn, mapper }
    }

    fn load_rows(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<BuildingRowRef>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;

        let mut building_rows: Vec<BuildingRowRef> = Vec::new();
        let mut by_id: HashMap<Uuid, BuildingRowRef> = HashMap::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get("id")?;
            let id = parse_uuid(&id, "building.id")?;
            let location = StoredPoint {
                x: row.get("longitude")?,
                y: row.get("latitude")?,
            };
            let name: String = row.get("name")?;
            let building = BuildingRow::new(id, name, location);
            by_id.insert(id, Rc::clone(&building));
            building_rows.push(building);
        }

        if building_rows.is_empty() {
            return Ok(building_rows);
        }

        let placeholders = sql_placeholders(building_rows.len());
        let binds: Vec<Value> = building_rows
            .iter()
            .map(|b| Value::Text(b.borrow().id.to_string()))
            .collect();

        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, building_id
             FROM organization
             WHERE building_id IN ({placeholders})
             ORDER BY name ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut org_rows = Vec::new();
        while let Some(row) = rows.next()? {
            let org_id: String = row.get("id")?;
            let org_id = parse_uuid(&org_id, "organization.id")?;
            let building_id: String = row.get("building_id")?;
            let building_id = parse_uuid(&building_id, "organization.building_id")?;
            let name: String = row.get("name")?;

            let org = OrganizationRow::new(org_id, name, Some(building_id));
            if let Some(building) = by_id.get(&building_id) {
                link_organization(building, &org);
            }
            org_rows.push(org);
        }

        load_phones_and_activities(self.conn, &org_rows)?;
        Ok(building_rows)
    }

    fn save(&self, building: &BuildingRef) -> RepoResult<()> {
        let mut rows = RowGraph::new();
        self.mapper.building_from_domain(building, &mut rows);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        flush_row_graph(&tx, &rows)?;
        tx.commit()?;
        Ok(())
    }
}

impl BuildingRepository for SqliteBuildingRepository<'_> {
    fn get(&self, id: BuildingId, graph: &mut DomainGraph) -> RepoResult<Option<BuildingRef>> {
        let rows = self.load_rows(
            "SELECT id, name, latitude, longitude FROM building WHERE id = ?1;",
            vec![Value::Text(id.to_string())],
        )?;
        Ok(rows
            .first()
            .map(|row| self.mapper.building_to_domain(row, graph)))
    }

    fn get_all(
        &self,
        offset: u32,
        limit: Option<u32>,
        graph: &mut DomainGraph,
    ) -> RepoResult<Vec<BuildingRef>> {
        let mut sql = String::from(
            "SELECT id, name, latitude, longitude FROM building ORDER BY name ASC, id ASC",
        );
        let mut binds: Vec<Value> = Vec::new();
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
        sql.push(';');

        let rows = self.load_rows(&sql, binds)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.mapper.building_to_domain(&row, graph));
        }
        Ok(out)
    }

    fn create(&self, building: &BuildingRef) -> RepoResult<()> {
        let id = building.borrow().id;
        if row_exists(self.conn, "building", id)? {
            return Err(RepoError::ObjectAlreadyExists(id));
        }
        self.save(building)
    }

    fn update(&self, building: &BuildingRef) -> RepoResult<()> {
        let id = building.borrow().id;
        if !row_exists(self.conn, "building", id)? {
            return Err(RepoError::ObjectDoesNotExist(id));
        }
        self.save(building)
    }

    fn delete(&self, id: BuildingId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM building WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::ObjectDoesNotExist(id));
        }
        Ok(())
    }
}

//! Repository layer: filtered, spatial and hierarchical queries plus CRUD
//! over the directory schema.
//!
//! # Responsibility
//! - Translate query parameters into SQL, stream matching rows and feed
//!   them through the mapper one at a time.
//! - Load one consistent relation depth (building + phones + activities)
//!   so mapping never triggers further lookups.
//!
//! # Invariants
//! - Absence on single-get is `Ok(None)`, never an error.
//! - `create` on a present id fails `ObjectAlreadyExists`; `update` and
//!   `delete` on a missing id fail `ObjectDoesNotExist`.
//! - Unexpected storage faults propagate unchanged; nothing retries.

use crate::db::DbError;
use crate::mapper::{RowGraph, RowNode};
use crate::rows::{ActivityRowRef, BuildingRowRef, OrganizationRowRef};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

pub mod activity_repo;
pub mod building_repo;
pub mod organization_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error kinds shared by all entity repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// `create` found a persisted row with the same id.
    ObjectAlreadyExists(Uuid),
    /// `update`/`delete` target id is not persisted.
    ObjectDoesNotExist(Uuid),
    /// Persisted data cannot be converted to a valid row image.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ObjectAlreadyExists(id) => write!(f, "object with id {id} already exists"),
            Self::ObjectDoesNotExist(id) => write!(f, "object with id {id} does not exist"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::ObjectAlreadyExists(_) => None,
            Self::ObjectDoesNotExist(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn depth_from_i64(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid depth `{value}` in {column}")))
}

/// Builds `?,?,...,?` for an `IN` list of `n` values.
pub(crate) fn sql_placeholders(n: usize) -> String {
    let mut out = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out
}

/// Escapes `%`, `_` and the escape character itself for a LIKE pattern
/// used with `ESCAPE '\'`.
pub(crate) fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn row_exists(conn: &Connection, table: &'static str, id: Uuid) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Loads phones and activity memberships for the given organization rows,
/// in deterministic order, deduplicating shared activity nodes.
pub(crate) fn load_phones_and_activities(
    conn: &Connection,
    org_rows: &[OrganizationRowRef],
) -> RepoResult<()> {
    if org_rows.is_empty() {
        return Ok(());
    }

    let mut by_id: HashMap<Uuid, OrganizationRowRef> = HashMap::new();
    let mut id_binds: Vec<Value> = Vec::with_capacity(org_rows.len());
    for org in org_rows {
        let id = org.borrow().id;
        by_id.insert(id, Rc::clone(org));
        id_binds.push(Value::Text(id.to_string()));
    }
    let placeholders = sql_placeholders(id_binds.len());

    let mut stmt = conn.prepare(&format!(
        "SELECT id, number, organization_id
         FROM phone
         WHERE organization_id IN ({placeholders})
         ORDER BY number ASC, id ASC;"
    ))?;
    let mut rows = stmt.query(params_from_iter(id_binds.clone()))?;
    while let Some(row) = rows.next()? {
        let phone_id: String = row.get("id")?;
        let org_id: String = row.get("organization_id")?;
        let org_id = parse_uuid(&org_id, "phone.organization_id")?;
        if let Some(org) = by_id.get(&org_id) {
            org.borrow_mut().phones.push(crate::rows::PhoneRow {
                id: parse_uuid(&phone_id, "phone.id")?,
                number: row.get("number")?,
                organization_id: Some(org_id),
            });
        }
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT a.id, a.name, a.depth, a.parent_id, oa.organization_id
         FROM activity a
         JOIN organization_activity oa ON oa.activity_id = a.id
         WHERE oa.organization_id IN ({placeholders})
         ORDER BY a.name ASC, a.id ASC;"
    ))?;
    let mut rows = stmt.query(params_from_iter(id_binds))?;
    let mut activity_rows: HashMap<Uuid, ActivityRowRef> = HashMap::new();
    while let Some(row) = rows.next()? {
        let activity_id: String = row.get("id")?;
        let activity_id = parse_uuid(&activity_id, "activity.id")?;
        let org_id: String = row.get("organization_id")?;
        let org_id = parse_uuid(&org_id, "organization_activity.organization_id")?;

        let activity = match activity_rows.get(&activity_id) {
            Some(existing) => Rc::clone(existing),
            None => {
                let parent_id = row
                    .get::<_, Option<String>>("parent_id")?
                    .map(|value| parse_uuid(&value, "activity.parent_id"))
                    .transpose()?;
                let depth = depth_from_i64(row.get("depth")?, "activity.depth")?;
                let name: String = row.get("name")?;
                let created = crate::rows::ActivityRow::new(activity_id, name, depth, parent_id);
                activity_rows.insert(activity_id, Rc::clone(&created));
                created
            }
        };

        if let Some(org) = by_id.get(&org_id) {
            org.borrow_mut().activities.push(activity);
        }
    }

    Ok(())
}

/// Persists every row node produced by one `from_domain` translation.
///
/// Insert order respects foreign keys: buildings, then activities by
/// ascending depth, then organizations, then owned phone rows and
/// membership links (replace-all per organization).
pub(crate) fn flush_row_graph(tx: &Transaction<'_>, rows: &RowGraph) -> RepoResult<()> {
    let mut buildings: Vec<BuildingRowRef> = Vec::new();
    let mut activities: Vec<ActivityRowRef> = Vec::new();
    let mut organizations: Vec<OrganizationRowRef> = Vec::new();

    for node in rows.nodes() {
        match node {
            RowNode::Building(row) => buildings.push(Rc::clone(row)),
            RowNode::Activity(row) => activities.push(Rc::clone(row)),
            RowNode::Organization(row) => organizations.push(Rc::clone(row)),
        }
    }

    activities.sort_by_key(|row| row.borrow().depth);

    for building in &buildings {
        let row = building.borrow();
        tx.execute(
            "INSERT INTO building (id, name, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                latitude = excluded.latitude,
                longitude = excluded.longitude;",
            params![
                row.id.to_string(),
                row.name.as_str(),
                row.location.y,
                row.location.x,
            ],
        )?;
    }

    for activity in &activities {
        let row = activity.borrow();
        tx.execute(
            "INSERT INTO activity (id, name, depth, parent_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                depth = excluded.depth,
                parent_id = excluded.parent_id;",
            params![
                row.id.to_string(),
                row.name.as_str(),
                i64::from(row.depth),
                row.parent_id.map(|value| value.to_string()),
            ],
        )?;
    }

    for org in &organizations {
        let row = org.borrow();
        let org_id = row.id.to_string();
        tx.execute(
            "INSERT INTO organization (id, name, building_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                building_id = excluded.building_id;",
            params![
                org_id,
                row.name.as_str(),
                row.building_id.map(|value| value.to_string()),
            ],
        )?;

        tx.execute("DELETE FROM phone WHERE organization_id = ?1;", [&org_id])?;
        for phone in &row.phones {
            tx.execute(
                "INSERT INTO phone (id, number, organization_id)
                 VALUES (?1, ?2, ?3);",
                params![phone.id.to_string(), phone.number.as_str(), org_id],
            )?;
        }

        tx.execute(
            "DELETE FROM organization_activity WHERE organization_id = ?1;",
            [&org_id],
        )?;
        for activity in &row.activities {
            tx.execute(
                "INSERT OR IGNORE INTO organization_activity (organization_id, activity_id)
                 VALUES (?1, ?2);",
                params![org_id, activity.borrow().id.to_string()],
            )?;
        }
    }

    Ok(())
}

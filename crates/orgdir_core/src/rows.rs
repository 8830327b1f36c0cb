//! Persisted-row images consumed and produced by the mapper.
//!
//! # Responsibility
//! - Mirror the relational schema as in-memory nodes, one per table row.
//! - Carry both raw foreign-key ids and navigable relation handles so the
//!   mapper can translate whatever subset of the graph was loaded.
//!
//! # Invariants
//! - Owner-side collections are strong (`Rc`), back-references are `Weak`;
//!   the row graph for one translation call is owned by its visited map.
//! - `StoredPoint` keeps the persistence coordinate order: `x` is
//!   longitude, `y` is latitude.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Shared handle to a building row node.
pub type BuildingRowRef = Rc<RefCell<BuildingRow>>;
/// Shared handle to an organization row node.
pub type OrganizationRowRef = Rc<RefCell<OrganizationRow>>;
/// Shared handle to an activity row node.
pub type ActivityRowRef = Rc<RefCell<ActivityRow>>;

/// Geographic point as persisted: `x` = longitude, `y` = latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredPoint {
    pub x: f64,
    pub y: f64,
}

/// Image of one `building` row.
#[derive(Debug)]
pub struct BuildingRow {
    pub id: Uuid,
    pub name: String,
    pub location: StoredPoint,
    pub organizations: Vec<OrganizationRowRef>,
}

impl BuildingRow {
    pub fn new(id: Uuid, name: impl Into<String>, location: StoredPoint) -> BuildingRowRef {
        Rc::new(RefCell::new(Self {
            id,
            name: name.into(),
            location,
            organizations: Vec::new(),
        }))
    }
}

/// Image of one `organization` row.
#[derive(Debug)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub name: String,
    pub building_id: Option<Uuid>,
    pub building: Weak<RefCell<BuildingRow>>,
    pub phones: Vec<PhoneRow>,
    pub activities: Vec<ActivityRowRef>,
}

impl OrganizationRow {
    pub fn new(id: Uuid, name: impl Into<String>, building_id: Option<Uuid>) -> OrganizationRowRef {
        Rc::new(RefCell::new(Self {
            id,
            name: name.into(),
            building_id,
            building: Weak::new(),
            phones: Vec::new(),
            activities: Vec::new(),
        }))
    }
}

/// Image of one `phone` row. Phones never participate in cycles, so they
/// stay plain values inside their owning organization row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneRow {
    pub id: Uuid,
    pub number: String,
    pub organization_id: Option<Uuid>,
}

/// Image of one `activity` row.
#[derive(Debug)]
pub struct ActivityRow {
    pub id: Uuid,
    pub name: String,
    pub depth: u32,
    pub parent_id: Option<Uuid>,
    pub parent: Weak<RefCell<ActivityRow>>,
    pub children: Vec<ActivityRowRef>,
}

impl ActivityRow {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        depth: u32,
        parent_id: Option<Uuid>,
    ) -> ActivityRowRef {
        Rc::new(RefCell::new(Self {
            id,
            name: name.into(),
            depth,
            parent_id,
            parent: Weak::new(),
            children: Vec::new(),
        }))
    }
}

/// Wires an organization row under a building row, both directions.
pub fn link_organization(building: &BuildingRowRef, org: &OrganizationRowRef) {
    {
        let mut org_mut = org.borrow_mut();
        org_mut.building = Rc::downgrade(building);
        org_mut.building_id = Some(building.borrow().id);
    }
    building.borrow_mut().organizations.push(Rc::clone(org));
}

/// Wires a child activity row under a parent activity row, both directions.
pub fn link_child_activity(parent: &ActivityRowRef, child: &ActivityRowRef) {
    {
        let mut child_mut = child.borrow_mut();
        child_mut.parent = Rc::downgrade(parent);
        child_mut.parent_id = Some(parent.borrow().id);
    }
    parent.borrow_mut().children.push(Rc::clone(child));
}

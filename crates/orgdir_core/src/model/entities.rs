//! Directory domain entities.
//!
//! # Responsibility
//! - Define the in-memory graph of buildings, organizations, phones and
//!   activity categories.
//! - Enforce the activity depth invariant, the only structural rule owned
//!   by the domain layer.
//!
//! # Invariants
//! - Ownership edges are strong (`Rc`): building -> organizations,
//!   activity -> children, organization -> activities (shared membership).
//! - Back-references are non-owning (`Weak`): organization -> building,
//!   activity -> parent. The raw id mirror next to each back-reference
//!   keeps the relation readable when the owner is not materialized.
//! - `Activity::add_child` rejects attachments past depth
//!   [`MAX_ACTIVITY_DEPTH`] and leaves the tree unchanged on rejection.

use crate::model::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Stable identifier for a building.
pub type BuildingId = Uuid;
/// Stable identifier for an organization.
pub type OrganizationId = Uuid;
/// Stable identifier for an activity category.
pub type ActivityId = Uuid;

/// Shared handle to a building node.
pub type BuildingRef = Rc<RefCell<Building>>;
/// Shared handle to an organization node.
pub type OrganizationRef = Rc<RefCell<Organization>>;
/// Shared handle to an activity node.
pub type ActivityRef = Rc<RefCell<Activity>>;

/// Maximum depth of the activity category tree.
pub const MAX_ACTIVITY_DEPTH: u32 = 3;

/// Structural violations raised by domain mutators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Attaching the child would place it deeper than [`MAX_ACTIVITY_DEPTH`].
    MaxDepthExceeded { attempted_depth: u32 },
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxDepthExceeded { attempted_depth } => write!(
                f,
                "activity depth {attempted_depth} exceeds maximum {MAX_ACTIVITY_DEPTH}"
            ),
        }
    }
}

impl Error for DomainError {}

/// Immutable phone number value object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub number: String,
}

impl Phone {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
        }
    }
}

/// A building hosting zero or more organizations.
#[derive(Debug)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
    pub location: GeoPoint,
    /// Owned list; every member points back at this building.
    pub organizations: Vec<OrganizationRef>,
}

impl Building {
    /// Creates a building with a generated stable id.
    pub fn new(name: impl Into<String>, location: GeoPoint) -> BuildingRef {
        Self::with_id(Uuid::new_v4(), name, location)
    }

    /// Creates a building with a caller-provided stable id.
    pub fn with_id(id: BuildingId, name: impl Into<String>, location: GeoPoint) -> BuildingRef {
        Rc::new(RefCell::new(Self {
            id,
            name: name.into(),
            location,
            organizations: Vec::new(),
        }))
    }

    /// Appends `org` to the owned list and wires its back-reference.
    ///
    /// Does not deduplicate; callers must avoid inserting the same
    /// organization twice.
    pub fn add_organization(building: &BuildingRef, org: &OrganizationRef) {
        {
            let mut org_mut = org.borrow_mut();
            org_mut.building = Rc::downgrade(building);
            org_mut.building_id = Some(building.borrow().id);
        }
        building.borrow_mut().organizations.push(Rc::clone(org));
    }
}

/// An organization located in a building.
#[derive(Debug)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub phones: Vec<Phone>,
    /// Non-owning back-reference; the building owns the relationship.
    pub building: Weak<RefCell<Building>>,
    pub building_id: Option<BuildingId>,
    /// Membership set, deduplicated by activity id.
    pub activities: Vec<ActivityRef>,
}

impl Organization {
    /// Creates an organization with a generated stable id and no relations.
    pub fn new(name: impl Into<String>) -> OrganizationRef {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Creates an organization with a caller-provided stable id.
    pub fn with_id(id: OrganizationId, name: impl Into<String>) -> OrganizationRef {
        Rc::new(RefCell::new(Self {
            id,
            name: name.into(),
            phones: Vec::new(),
            building: Weak::new(),
            building_id: None,
            activities: Vec::new(),
        }))
    }

    /// Upgrades the building back-reference, if the owner is alive.
    pub fn building(&self) -> Option<BuildingRef> {
        self.building.upgrade()
    }

    pub fn add_phone(&mut self, phone: Phone) {
        self.phones.push(phone);
    }

    /// Adds an activity membership; a second add of the same id is a no-op.
    pub fn add_activity(&mut self, activity: &ActivityRef) {
        let id = activity.borrow().id;
        if self.activities.iter().any(|a| a.borrow().id == id) {
            return;
        }
        self.activities.push(Rc::clone(activity));
    }
}

/// A node of the activity category tree.
#[derive(Debug)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    /// 1 for roots; children are parent depth + 1, capped at
    /// [`MAX_ACTIVITY_DEPTH`].
    pub depth: u32,
    /// Non-owning back-reference to the parent category.
    pub parent: Weak<RefCell<Activity>>,
    pub parent_id: Option<ActivityId>,
    pub children: Vec<ActivityRef>,
}

impl Activity {
    /// Creates a root activity (depth 1) with a generated stable id.
    pub fn new(name: impl Into<String>) -> ActivityRef {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Creates a root activity (depth 1) with a caller-provided stable id.
    pub fn with_id(id: ActivityId, name: impl Into<String>) -> ActivityRef {
        Rc::new(RefCell::new(Self {
            id,
            name: name.into(),
            depth: 1,
            parent: Weak::new(),
            parent_id: None,
            children: Vec::new(),
        }))
    }

    /// Upgrades the parent back-reference, if the owner is alive.
    pub fn parent(&self) -> Option<ActivityRef> {
        self.parent.upgrade()
    }

    /// Attaches `child` under `parent`, recomputing its depth.
    ///
    /// Fails with [`DomainError::MaxDepthExceeded`] when the recomputed
    /// depth passes [`MAX_ACTIVITY_DEPTH`]; neither node is modified in
    /// that case.
    pub fn add_child(parent: &ActivityRef, child: &ActivityRef) -> Result<(), DomainError> {
        let attempted_depth = parent.borrow().depth + 1;
        if attempted_depth > MAX_ACTIVITY_DEPTH {
            return Err(DomainError::MaxDepthExceeded { attempted_depth });
        }

        {
            let mut child_mut = child.borrow_mut();
            child_mut.parent = Rc::downgrade(parent);
            child_mut.parent_id = Some(parent.borrow().id);
            child_mut.depth = attempted_depth;
        }
        parent.borrow_mut().children.push(Rc::clone(child));
        Ok(())
    }
}

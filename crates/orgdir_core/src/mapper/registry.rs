//! Per-kind translators between row nodes and domain nodes.
//!
//! # Responsibility
//! - Translate each entity kind in both directions, scalar fields first,
//!   relations after registration in the visited map.
//! - Resolve the Organization/Building mutual dependency inside one
//!   registry value, constructed in a single step.
//!
//! # Invariants
//! - Translators never touch storage; they map exactly the node graph
//!   they are handed.
//! - Translators never validate business rules: persisted depth values
//!   are trusted on load.

use crate::mapper::{DomainGraph, DomainNode, RowGraph, RowNode};
use crate::model::entities::{
    Activity, ActivityRef, Building, BuildingRef, Organization, OrganizationRef, Phone,
};
use crate::model::geo::GeoPoint;
use crate::rows::{
    ActivityRow, ActivityRowRef, BuildingRow, BuildingRowRef, OrganizationRow,
    OrganizationRowRef, PhoneRow, StoredPoint,
};
use std::rc::Rc;
use uuid::Uuid;

/// Translator for phone values. Phones carry no references, so no visited
/// map is involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhoneMapper;

impl PhoneMapper {
    pub fn to_domain(&self, row: &PhoneRow) -> Phone {
        Phone {
            number: row.number.clone(),
        }
    }

    /// Produces a fresh row for the value; the owning organization id is
    /// filled in by the organization translator.
    pub fn from_domain(&self, phone: &Phone) -> PhoneRow {
        PhoneRow {
            id: Uuid::new_v4(),
            number: phone.number.clone(),
            organization_id: None,
        }
    }
}

/// Translator for the self-referential activity tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActivityMapper;

impl ActivityMapper {
    pub fn to_domain(&self, row: &ActivityRowRef, graph: &mut DomainGraph) -> ActivityRef {
        let (id, name, depth, parent_id) = {
            let row_ref = row.borrow();
            (row_ref.id, row_ref.name.clone(), row_ref.depth, row_ref.parent_id)
        };

        if let Some(existing) = graph.activity(id) {
            return existing;
        }

        let activity = Activity::with_id(id, name);
        {
            let mut node = activity.borrow_mut();
            node.depth = depth;
            node.parent_id = parent_id;
        }
        graph.register(id, DomainNode::Activity(Rc::clone(&activity)));

        let parent_row = row.borrow().parent.upgrade();
        if let Some(parent_row) = parent_row {
            let parent = self.to_domain(&parent_row, graph);
            activity.borrow_mut().parent = Rc::downgrade(&parent);
        }

        let child_rows: Vec<ActivityRowRef> = row.borrow().children.clone();
        for child_row in child_rows {
            let child = self.to_domain(&child_row, graph);
            activity.borrow_mut().children.push(child);
        }

        activity
    }

    pub fn from_domain(&self, activity: &ActivityRef, rows: &mut RowGraph) -> ActivityRowRef {
        let (id, name, depth, parent_id) = {
            let node = activity.borrow();
            (node.id, node.name.clone(), node.depth, node.parent_id)
        };

        if let Some(existing) = rows.activity(id) {
            return existing;
        }

        let row = ActivityRow::new(id, name, depth, parent_id);
        rows.register(id, RowNode::Activity(Rc::clone(&row)));

        let parent = activity.borrow().parent.upgrade();
        if let Some(parent) = parent {
            let parent_row = self.from_domain(&parent, rows);
            let mut row_mut = row.borrow_mut();
            row_mut.parent = Rc::downgrade(&parent_row);
            row_mut.parent_id = Some(parent_row.borrow().id);
        }

        let children: Vec<ActivityRef> = activity.borrow().children.clone();
        for child in children {
            let child_row = self.from_domain(&child, rows);
            row.borrow_mut().children.push(child_row);
        }

        row
    }
}

/// Composite translator owning the per-kind mappers.
///
/// The Organization and Building translations call into each other through
/// `self`, so their mutual dependency exists from construction on; there
/// is no late-bound slot to wire afterwards.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapperRegistry {
    phone: PhoneMapper,
    activity: ActivityMapper,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phone(&self) -> &PhoneMapper {
        &self.phone
    }

    pub fn activity(&self) -> &ActivityMapper {
        &self.activity
    }

    pub fn organization_to_domain(
        &self,
        row: &OrganizationRowRef,
        graph: &mut DomainGraph,
    ) -> OrganizationRef {
        let (id, name, building_id) = {
            let row_ref = row.borrow();
            (row_ref.id, row_ref.name.clone(), row_ref.building_id)
        };

        if let Some(existing) = graph.organization(id) {
            return existing;
        }

        let org = Organization::with_id(id, name);
        org.borrow_mut().building_id = building_id;
        graph.register(id, DomainNode::Organization(Rc::clone(&org)));

        let phone_rows: Vec<PhoneRow> = row.borrow().phones.clone();
        for phone_row in phone_rows {
            let phone = self.phone.to_domain(&phone_row);
            org.borrow_mut().phones.push(phone);
        }

        let building_row = row.borrow().building.upgrade();
        if let Some(building_row) = building_row {
            let building = self.building_to_domain(&building_row, graph);
            org.borrow_mut().building = Rc::downgrade(&building);
        }

        let activity_rows: Vec<ActivityRowRef> = row.borrow().activities.clone();
        for activity_row in activity_rows {
            let activity = self.activity.to_domain(&activity_row, graph);
            org.borrow_mut().activities.push(activity);
        }

        org
    }

    pub fn organization_from_domain(
        &self,
        org: &OrganizationRef,
        rows: &mut RowGraph,
    ) -> OrganizationRowRef {
        let (id, name, building_id) = {
            let node = org.borrow();
            (node.id, node.name.clone(), node.building_id)
        };

        if let Some(existing) = rows.organization(id) {
            return existing;
        }

        let row = OrganizationRow::new(id, name, building_id);
        rows.register(id, RowNode::Organization(Rc::clone(&row)));

        let phones: Vec<Phone> = org.borrow().phones.clone();
        for phone in phones {
            let mut phone_row = self.phone.from_domain(&phone);
            phone_row.organization_id = Some(id);
            row.borrow_mut().phones.push(phone_row);
        }

        let building = org.borrow().building.upgrade();
        if let Some(building) = building {
            let building_row = self.building_from_domain(&building, rows);
            let mut row_mut = row.borrow_mut();
            row_mut.building = Rc::downgrade(&building_row);
            row_mut.building_id = Some(building_row.borrow().id);
        }

        let activities: Vec<ActivityRef> = org.borrow().activities.clone();
        for activity in activities {
            let activity_row = self.activity.from_domain(&activity, rows);
            row.borrow_mut().activities.push(activity_row);
        }

        row
    }

    pub fn building_to_domain(
        &self,
        row: &BuildingRowRef,
        graph: &mut DomainGraph,
    ) -> BuildingRef {
        let (id, name, location) = {
            let row_ref = row.borrow();
            (row_ref.id, row_ref.name.clone(), row_ref.location)
        };

        if let Some(existing) = graph.building(id) {
            return existing;
        }

        // Persistence order is (x, y) = (longitude, latitude).
        let location = GeoPoint::new(location.y, location.x);
        let building = Building::with_id(id, name, location);
        graph.register(id, DomainNode::Building(Rc::clone(&building)));

        let org_rows: Vec<OrganizationRowRef> = row.borrow().organizations.clone();
        for org_row in org_rows {
            let org = self.organization_to_domain(&org_row, graph);
            building.borrow_mut().organizations.push(org);
        }

        building
    }

    pub fn building_from_domain(
        &self,
        building: &BuildingRef,
        rows: &mut RowGraph,
    ) -> BuildingRowRef {
        let (id, name, location) = {
            let node = building.borrow();
            (node.id, node.name.clone(), node.location)
        };

        if let Some(existing) = rows.building(id) {
            return existing;
        }

        let stored = StoredPoint {
            x: location.longitude,
            y: location.latitude,
        };
        let row = BuildingRow::new(id, name, stored);
        rows.register(id, RowNode::Building(Rc::clone(&row)));

        let orgs: Vec<OrganizationRef> = building.borrow().organizations.clone();
        for org in orgs {
            let org_row = self.organization_from_domain(&org, rows);
            row.borrow_mut().organizations.push(org_row);
        }

        row
    }
}

//! Bidirectional row/domain translation with cycle-safe identity tracking.
//!
//! # Responsibility
//! - Define the visited maps that deduplicate shared references and break
//!   cycles during one translation call.
//! - Host the per-kind translators (see [`registry`]).
//!
//! # Invariants
//! - A visited map is scoped to one top-level translation call and shared
//!   across the whole call tree, regardless of entity kind.
//! - Nodes are registered before their relations are translated, so an
//!   edge looping back finds the partially built node and returns it.
//! - The visited map holds strong handles: it owns every node produced by
//!   the call, and back-references stay resolvable exactly as long as the
//!   caller keeps the map alive.

use crate::model::entities::{ActivityRef, BuildingRef, OrganizationRef};
use crate::rows::{ActivityRowRef, BuildingRowRef, OrganizationRowRef};
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

pub mod registry;

pub use registry::{ActivityMapper, MapperRegistry, PhoneMapper};

/// One translated domain node, any kind.
#[derive(Debug, Clone)]
pub enum DomainNode {
    Building(BuildingRef),
    Organization(OrganizationRef),
    Activity(ActivityRef),
}

/// Visited map for row-to-domain translation.
///
/// Keyed by entity id; owns the translated nodes. Dropping the graph frees
/// the whole object graph, since entity back-references are weak.
#[derive(Debug, Default)]
pub struct DomainGraph {
    nodes: HashMap<Uuid, DomainNode>,
}

impl DomainGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn building(&self, id: Uuid) -> Option<BuildingRef> {
        match self.nodes.get(&id) {
            Some(DomainNode::Building(node)) => Some(Rc::clone(node)),
            _ => None,
        }
    }

    pub fn organization(&self, id: Uuid) -> Option<OrganizationRef> {
        match self.nodes.get(&id) {
            Some(DomainNode::Organization(node)) => Some(Rc::clone(node)),
            _ => None,
        }
    }

    pub fn activity(&self, id: Uuid) -> Option<ActivityRef> {
        match self.nodes.get(&id) {
            Some(DomainNode::Activity(node)) => Some(Rc::clone(node)),
            _ => None,
        }
    }

    pub(crate) fn register(&mut self, id: Uuid, node: DomainNode) {
        self.nodes.insert(id, node);
    }
}

/// One produced row node, any kind. Phone rows live inside their owning
/// organization row and are not tracked individually.
#[derive(Debug, Clone)]
pub enum RowNode {
    Building(BuildingRowRef),
    Organization(OrganizationRowRef),
    Activity(ActivityRowRef),
}

/// Visited map for domain-to-row translation; the inverse of
/// [`DomainGraph`], owning the produced row nodes.
#[derive(Debug, Default)]
pub struct RowGraph {
    nodes: HashMap<Uuid, RowNode>,
}

impl RowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn building(&self, id: Uuid) -> Option<BuildingRowRef> {
        match self.nodes.get(&id) {
            Some(RowNode::Building(node)) => Some(Rc::clone(node)),
            _ => None,
        }
    }

    pub fn organization(&self, id: Uuid) -> Option<OrganizationRowRef> {
        match self.nodes.get(&id) {
            Some(RowNode::Organization(node)) => Some(Rc::clone(node)),
            _ => None,
        }
    }

    pub fn activity(&self, id: Uuid) -> Option<ActivityRowRef> {
        match self.nodes.get(&id) {
            Some(RowNode::Activity(node)) => Some(Rc::clone(node)),
            _ => None,
        }
    }

    /// Iterates every tracked row node in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &RowNode> {
        self.nodes.values()
    }

    pub(crate) fn register(&mut self, id: Uuid, node: RowNode) {
        self.nodes.insert(id, node);
    }
}

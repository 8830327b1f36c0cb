//! Organization use-case service.
//!
//! # Responsibility
//! - Provide stable search/lookup entry points for presentation callers.
//! - Validate listing filters once at this boundary; repositories accept
//!   whatever they are handed.
//!
//! # Invariants
//! - `limit` defaults to [`DEFAULT_LIMIT`] and must stay within
//!   `1..=MAX_LIMIT`.
//! - Service APIs never bypass repository error contracts.

use crate::mapper::DomainGraph;
use crate::model::entities::{ActivityId, BuildingId, OrganizationId, OrganizationRef};
use crate::model::geo::GeoPoint;
use crate::repo::organization_repo::{OrganizationQuery, OrganizationRepository};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Page size applied when the caller does not pass one.
pub const DEFAULT_LIMIT: u32 = 10;
/// Largest page size accepted at this boundary.
pub const MAX_LIMIT: u32 = 50;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the organization service.
#[derive(Debug)]
pub enum ServiceError {
    /// Requested page size is outside `1..=MAX_LIMIT`.
    InvalidLimit(u32),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLimit(limit) => {
                write!(f, "limit {limit} is outside the accepted range 1..={MAX_LIMIT}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLimit(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Listing filters as they arrive from the boundary, before validation.
#[derive(Debug, Clone, Default)]
pub struct OrganizationFilters {
    /// Case-insensitive substring match on the organization name.
    pub name: Option<String>,
    pub building_id: Option<BuildingId>,
    pub activity_id: Option<ActivityId>,
    pub offset: u32,
    /// `None` means [`DEFAULT_LIMIT`].
    pub limit: Option<u32>,
}

impl OrganizationFilters {
    /// Validates the filters into a repository query.
    fn to_query(&self) -> ServiceResult<OrganizationQuery> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ServiceError::InvalidLimit(limit));
        }

        Ok(OrganizationQuery {
            name_contains: self.name.clone(),
            building_id: self.building_id,
            activity_id: self.activity_id,
            offset: self.offset,
            limit: Some(limit),
        })
    }
}

/// Use-case service wrapper for organization search and lookup.
pub struct OrganizationService<R: OrganizationRepository> {
    repo: R,
}

impl<R: OrganizationRepository> OrganizationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Gets one organization by id; absence is `Ok(None)`.
    pub fn get(
        &self,
        id: OrganizationId,
        graph: &mut DomainGraph,
    ) -> ServiceResult<Option<OrganizationRef>> {
        Ok(self.repo.get(id, graph)?)
    }

    /// Lists organizations matching all provided filters.
    pub fn get_all(
        &self,
        filters: &OrganizationFilters,
        graph: &mut DomainGraph,
    ) -> ServiceResult<Vec<OrganizationRef>> {
        let query = filters.to_query()?;
        Ok(self.repo.get_all(&query, graph)?)
    }

    /// Lists organizations within `radius_meters` of the given point.
    pub fn get_all_in_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
        filters: &OrganizationFilters,
        graph: &mut DomainGraph,
    ) -> ServiceResult<Vec<OrganizationRef>> {
        let query = filters.to_query()?;
        let center = GeoPoint::new(latitude, longitude);
        Ok(self
            .repo
            .get_all_in_radius(center, radius_meters, &query, graph)?)
    }

    /// Lists organizations within the given degree rectangle.
    pub fn get_all_in_bbox(
        &self,
        sw_latitude: f64,
        sw_longitude: f64,
        ne_latitude: f64,
        ne_longitude: f64,
        filters: &OrganizationFilters,
        graph: &mut DomainGraph,
    ) -> ServiceResult<Vec<OrganizationRef>> {
        let query = filters.to_query()?;
        let south_west = GeoPoint::new(sw_latitude, sw_longitude);
        let north_east = GeoPoint::new(ne_latitude, ne_longitude);
        Ok(self
            .repo
            .get_all_in_bbox(south_west, north_east, &query, graph)?)
    }

    /// Lists organizations linked to the root activity or any descendant.
    pub fn get_all_by_activity_subtree(
        &self,
        root_activity_id: ActivityId,
        filters: &OrganizationFilters,
        graph: &mut DomainGraph,
    ) -> ServiceResult<Vec<OrganizationRef>> {
        let query = filters.to_query()?;
        Ok(self.repo.get_all_by_activity_subtree(
            root_activity_id,
            query.offset,
            query.limit,
            graph,
        )?)
    }
}

//! Core domain, mapping and query logic for the organization directory.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod repo;
pub mod rows;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging};
pub use mapper::{DomainGraph, MapperRegistry, RowGraph};
pub use model::entities::{
    Activity, ActivityId, ActivityRef, Building, BuildingId, BuildingRef, DomainError,
    Organization, OrganizationId, OrganizationRef, Phone, MAX_ACTIVITY_DEPTH,
};
pub use model::geo::{geodesic_distance_m, GeoPoint};
pub use repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
pub use repo::building_repo::{BuildingRepository, SqliteBuildingRepository};
pub use repo::organization_repo::{
    OrganizationQuery, OrganizationRepository, SqliteOrganizationRepository,
};
pub use repo::{RepoError, RepoResult};
pub use service::organization_service::{
    OrganizationFilters, OrganizationService, ServiceError, DEFAULT_LIMIT, MAX_LIMIT,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

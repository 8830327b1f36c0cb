use orgdir_core::db::open_db_in_memory;
use orgdir_core::{
    Activity, ActivityRepository, Building, BuildingRepository, DomainGraph, GeoPoint,
    MapperRegistry, Organization, OrganizationRepository, Phone, RepoError,
    SqliteActivityRepository, SqliteBuildingRepository, SqliteOrganizationRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn create_with_existing_id_fails() {
    let conn = open_db_in_memory().unwrap();
    let mapper = MapperRegistry::new();
    let repo = SqliteBuildingRepository::new(&conn, mapper);

    let building = Building::new("Tower", GeoPoint::new(55.75, 37.62));
    repo.create(&building).unwrap();

    let err = repo.create(&building).unwrap_err();
    assert!(matches!(err, RepoError::ObjectAlreadyExists(id) if id == building.borrow().id));
}

#[test]
fn update_missing_fails_and_get_missing_is_none() {
    let conn = open_db_in_memory().unwrap();
    let mapper = MapperRegistry::new();
    let building_repo = SqliteBuildingRepository::new(&conn, mapper);
    let org_repo = SqliteOrganizationRepository::new(&conn, mapper);
    let activity_repo = SqliteActivityRepository::new(&conn, mapper);

    let building = Building::new("Ghost", GeoPoint::new(0.0, 0.0));
    let err = building_repo.update(&building).unwrap_err();
    assert!(matches!(err, RepoError::ObjectDoesNotExist(id) if id == building.borrow().id));

    let org = Organization::new("Ghost Org");
    let err = org_repo.update(&org).unwrap_err();
    assert!(matches!(err, RepoError::ObjectDoesNotExist(id) if id == org.borrow().id));

    let activity = Activity::new("Ghost Activity");
    let err = activity_repo.update(&activity).unwrap_err();
    assert!(matches!(err, RepoError::ObjectDoesNotExist(id) if id == activity.borrow().id));

    let missing = Uuid::new_v4();
    let mut graph = DomainGraph::new();
    assert!(building_repo.get(missing, &mut graph).unwrap().is_none());
    assert!(org_repo.get(missing, &mut graph).unwrap().is_none());
    assert!(activity_repo.get(missing, &mut graph).unwrap().is_none());
}

#[test]
fn delete_missing_fails() {
    let conn = open_db_in_memory().unwrap();
    let mapper = MapperRegistry::new();
    let building_repo = SqliteBuildingRepository::new(&conn, mapper);
    let org_repo = SqliteOrganizationRepository::new(&conn, mapper);
    let activity_repo = SqliteActivityRepository::new(&conn, mapper);

    let missing = Uuid::new_v4();
    assert!(matches!(
        building_repo.delete(missing).unwrap_err(),
        RepoError::ObjectDoesNotExist(id) if id == missing
    ));
    assert!(matches!(
        org_repo.delete(missing).unwrap_err(),
        RepoError::ObjectDoesNotExist(id) if id == missing
    ));
    assert!(matches!(
        activity_repo.delete(missing).unwrap_err(),
        RepoError::ObjectDoesNotExist(id) if id == missing
    ));
}

#[test]
fn update_persists_changed_fields() {
    let conn = open_db_in_memory().unwrap();
    let mapper = MapperRegistry::new();
    let building_repo = SqliteBuildingRepository::new(&conn, mapper);
    let org_repo = SqliteOrganizationRepository::new(&conn, mapper);

    let building = Building::new("Old Name", GeoPoint::new(55.75, 37.62));
    let org = Organization::new("Shop");
    org.borrow_mut().add_phone(Phone::new("+7 495 000-00-01"));
    Building::add_organization(&building, &org);
    building_repo.create(&building).unwrap();

    org.borrow_mut().name = "Shop Renamed".to_string();
    org.borrow_mut().add_phone(Phone::new("+7 495 000-00-02"));
    org_repo.update(&org).unwrap();

    let mut graph = DomainGraph::new();
    let loaded = org_repo.get(org.borrow().id, &mut graph).unwrap().unwrap();
    assert_eq!(loaded.borrow().name, "Shop Renamed");
    assert_eq!(loaded.borrow().phones.len(), 2);
}

#[test]
fn deleting_building_cascades_to_organizations_phones_and_links() {
    let conn = open_db_in_memory().unwrap();
    let mapper = MapperRegistry::new();
    let building_repo = SqliteBuildingRepository::new(&conn, mapper);
    let activity_repo = SqliteActivityRepository::new(&conn, mapper);

    let retail = Activity::new("Retail");
    activity_repo.create(&retail).unwrap();

    let building = Building::new("Doomed", GeoPoint::new(55.75, 37.62));
    let org = Organization::new("Tenant");
    org.borrow_mut().add_phone(Phone::new("+7 495 123-45-67"));
    org.borrow_mut().add_activity(&retail);
    Building::add_organization(&building, &org);
    building_repo.create(&building).unwrap();

    assert_eq!(count(&conn, "organization"), 1);
    assert_eq!(count(&conn, "phone"), 1);
    assert_eq!(count(&conn, "organization_activity"), 1);

    building_repo.delete(building.borrow().id).unwrap();

    assert_eq!(count(&conn, "building"), 0);
    assert_eq!(count(&conn, "organization"), 0);
    assert_eq!(count(&conn, "phone"), 0);
    assert_eq!(count(&conn, "organization_activity"), 0);
    // The activity taxonomy survives tenant removal.
    assert_eq!(count(&conn, "activity"), 1);
}

#[test]
fn deleting_activity_cascades_to_descendants_and_links() {
    let conn = open_db_in_memory().unwrap();
    let mapper = MapperRegistry::new();
    let building_repo = SqliteBuildingRepository::new(&conn, mapper);
    let activity_repo = SqliteActivityRepository::new(&conn, mapper);

    let root = Activity::new("Root");
    let child = Activity::new("Child");
    let grandchild = Activity::new("Grandchild");
    Activity::add_child(&root, &child).unwrap();
    Activity::add_child(&child, &grandchild).unwrap();
    activity_repo.create(&root).unwrap();

    let building = Building::new("Host", GeoPoint::new(55.75, 37.62));
    let org = Organization::new("Member");
    org.borrow_mut().add_activity(&grandchild);
    Building::add_organization(&building, &org);
    building_repo.create(&building).unwrap();

    assert_eq!(count(&conn, "activity"), 3);
    assert_eq!(count(&conn, "organization_activity"), 1);

    activity_repo.delete(root.borrow().id).unwrap();

    assert_eq!(count(&conn, "activity"), 0);
    assert_eq!(count(&conn, "organization_activity"), 0);
    // Organizations themselves are untouched by category removal.
    assert_eq!(count(&conn, "organization"), 1);
}

#[test]
fn organization_delete_removes_owned_rows() {
    let conn = open_db_in_memory().unwrap();
    let mapper = MapperRegistry::new();
    let building_repo = SqliteBuildingRepository::new(&conn, mapper);
    let org_repo = SqliteOrganizationRepository::new(&conn, mapper);

    let building = Building::new("Host", GeoPoint::new(55.75, 37.62));
    let org = Organization::new("Leaver");
    org.borrow_mut().add_phone(Phone::new("+7 495 999-99-99"));
    Building::add_organization(&building, &org);
    building_repo.create(&building).unwrap();

    org_repo.delete(org.borrow().id).unwrap();

    assert_eq!(count(&conn, "organization"), 0);
    assert_eq!(count(&conn, "phone"), 0);
    assert_eq!(count(&conn, "building"), 1);
}

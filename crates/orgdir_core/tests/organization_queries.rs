use orgdir_core::db::open_db_in_memory;
use orgdir_core::{
    Activity, ActivityId, ActivityRepository, Building, BuildingId, BuildingRepository,
    DomainGraph, GeoPoint, MapperRegistry, Organization, OrganizationFilters, OrganizationId,
    OrganizationQuery, OrganizationRepository, OrganizationService, Phone, ServiceError,
    SqliteActivityRepository, SqliteBuildingRepository, SqliteOrganizationRepository,
};
use rusqlite::Connection;
use std::rc::Rc;

const MOSCOW_CENTER: GeoPoint = GeoPoint {
    latitude: 55.7558,
    longitude: 37.6173,
};
const MOSCOW_NORTH: GeoPoint = GeoPoint {
    latitude: 55.8000,
    longitude: 37.6200,
};
const KAZAN: GeoPoint = GeoPoint {
    latitude: 55.7963,
    longitude: 49.1088,
};

struct Fixture {
    food_id: ActivityId,
    dairy_id: ActivityId,
    milk_id: ActivityId,
    services_id: ActivityId,
    moscow_center_id: BuildingId,
    pizza_id: OrganizationId,
    tech_id: OrganizationId,
    grocery_id: OrganizationId,
    kazan_dairy_id: OrganizationId,
}

/// Seeds: Moscow center building with "Pizza Place" (food) and "Tech Corp"
/// (it), a second Moscow building ~5 km north with "Grocery 24" (dairy),
/// and a Kazan building with "Kazan Dairy Plant" linked only to the milk
/// grandchild activity.
fn seed(conn: &Connection) -> Fixture {
    let mapper = MapperRegistry::new();
    let activity_repo = SqliteActivityRepository::new(conn, mapper);
    let building_repo = SqliteBuildingRepository::new(conn, mapper);

    let food = Activity::new("Food");
    let dairy = Activity::new("Dairy");
    let milk = Activity::new("Milk");
    Activity::add_child(&food, &dairy).unwrap();
    Activity::add_child(&dairy, &milk).unwrap();

    let services = Activity::new("Services");
    let it = Activity::new("IT");
    Activity::add_child(&services, &it).unwrap();

    activity_repo.create(&food).unwrap();
    activity_repo.create(&services).unwrap();

    let moscow_center = Building::new("Moscow Central Plaza", MOSCOW_CENTER);
    let pizza = Organization::new("Pizza Place");
    pizza.borrow_mut().add_phone(Phone::new("+7 495 111-22-33"));
    pizza.borrow_mut().add_activity(&food);
    Building::add_organization(&moscow_center, &pizza);
    let tech = Organization::new("Tech Corp");
    tech.borrow_mut().add_activity(&it);
    Building::add_organization(&moscow_center, &tech);

    let moscow_north = Building::new("Moscow North Point", MOSCOW_NORTH);
    let grocery = Organization::new("Grocery 24");
    grocery.borrow_mut().add_activity(&dairy);
    Building::add_organization(&moscow_north, &grocery);

    let kazan = Building::new("Kazan Trade House", KAZAN);
    let kazan_dairy = Organization::new("Kazan Dairy Plant");
    kazan_dairy.borrow_mut().add_activity(&milk);
    Building::add_organization(&kazan, &kazan_dairy);

    building_repo.create(&moscow_center).unwrap();
    building_repo.create(&moscow_north).unwrap();
    building_repo.create(&kazan).unwrap();

    let fixture = Fixture {
        food_id: food.borrow().id,
        dairy_id: dairy.borrow().id,
        milk_id: milk.borrow().id,
        services_id: services.borrow().id,
        moscow_center_id: moscow_center.borrow().id,
        pizza_id: pizza.borrow().id,
        tech_id: tech.borrow().id,
        grocery_id: grocery.borrow().id,
        kazan_dairy_id: kazan_dairy.borrow().id,
    };
    fixture
}

fn names(orgs: &[orgdir_core::OrganizationRef]) -> Vec<String> {
    orgs.iter().map(|org| org.borrow().name.clone()).collect()
}

#[test]
fn get_loads_full_relation_depth() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let org = repo.get(fixture.pizza_id, &mut graph).unwrap().unwrap();

    let org_ref = org.borrow();
    assert_eq!(org_ref.name, "Pizza Place");
    assert_eq!(org_ref.phones.len(), 1);
    assert_eq!(org_ref.phones[0].number, "+7 495 111-22-33");
    assert_eq!(org_ref.activities.len(), 1);
    assert_eq!(org_ref.activities[0].borrow().id, fixture.food_id);

    let building = org_ref
        .building()
        .expect("building must stay reachable through the query graph");
    assert_eq!(building.borrow().name, "Moscow Central Plaza");
    assert_eq!(building.borrow().location, MOSCOW_CENTER);
}

#[test]
fn name_filter_is_case_insensitive_substring() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let query = OrganizationQuery {
        name_contains: Some("pizza".to_string()),
        ..OrganizationQuery::default()
    };
    let orgs = repo.get_all(&query, &mut graph).unwrap();
    assert_eq!(names(&orgs), vec!["Pizza Place"]);

    let query = OrganizationQuery {
        name_contains: Some("DAIRY".to_string()),
        ..OrganizationQuery::default()
    };
    let orgs = repo.get_all(&query, &mut graph).unwrap();
    assert_eq!(names(&orgs), vec!["Kazan Dairy Plant"]);
}

#[test]
fn filters_conjoin() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let query = OrganizationQuery {
        name_contains: Some("corp".to_string()),
        building_id: Some(fixture.moscow_center_id),
        ..OrganizationQuery::default()
    };
    let orgs = repo.get_all(&query, &mut graph).unwrap();
    assert_eq!(names(&orgs), vec!["Tech Corp"]);
    assert_eq!(orgs[0].borrow().id, fixture.tech_id);

    let query = OrganizationQuery {
        name_contains: Some("corp".to_string()),
        building_id: Some(fixture.moscow_center_id),
        activity_id: Some(fixture.food_id),
        ..OrganizationQuery::default()
    };
    let orgs = repo.get_all(&query, &mut graph).unwrap();
    assert!(orgs.is_empty());
}

#[test]
fn activity_filter_matches_direct_membership_only() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let query = OrganizationQuery {
        activity_id: Some(fixture.dairy_id),
        ..OrganizationQuery::default()
    };
    let orgs = repo.get_all(&query, &mut graph).unwrap();
    // "Kazan Dairy Plant" is linked to the milk child, not to dairy itself.
    assert_eq!(names(&orgs), vec!["Grocery 24"]);
    assert_eq!(orgs[0].borrow().id, fixture.grocery_id);
}

#[test]
fn pagination_is_deterministic_by_name() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let first_page = repo
        .get_all(
            &OrganizationQuery {
                limit: Some(2),
                ..OrganizationQuery::default()
            },
            &mut graph,
        )
        .unwrap();
    let second_page = repo
        .get_all(
            &OrganizationQuery {
                offset: 2,
                limit: Some(2),
                ..OrganizationQuery::default()
            },
            &mut graph,
        )
        .unwrap();

    assert_eq!(names(&first_page), vec!["Grocery 24", "Kazan Dairy Plant"]);
    assert_eq!(names(&second_page), vec!["Pizza Place", "Tech Corp"]);
}

#[test]
fn organizations_in_one_call_share_building_instances() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let query = OrganizationQuery {
        building_id: Some(fixture.moscow_center_id),
        ..OrganizationQuery::default()
    };
    let orgs = repo.get_all(&query, &mut graph).unwrap();
    assert_eq!(orgs.len(), 2);

    let first = orgs[0].borrow().building().unwrap();
    let second = orgs[1].borrow().building().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn radius_search_is_geodesic() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let query = OrganizationQuery::default();

    // Organizations at the center itself are within any radius.
    let orgs = repo
        .get_all_in_radius(MOSCOW_CENTER, 1.0, &query, &mut graph)
        .unwrap();
    assert_eq!(names(&orgs), vec!["Pizza Place", "Tech Corp"]);

    // ~5 km away stays excluded at 1 km.
    let orgs = repo
        .get_all_in_radius(MOSCOW_CENTER, 1_000.0, &query, &mut graph)
        .unwrap();
    assert_eq!(names(&orgs), vec!["Pizza Place", "Tech Corp"]);

    // 10 km picks up the northern building, Kazan stays out.
    let orgs = repo
        .get_all_in_radius(MOSCOW_CENTER, 10_000.0, &query, &mut graph)
        .unwrap();
    assert_eq!(
        names(&orgs),
        vec!["Grocery 24", "Pizza Place", "Tech Corp"]
    );
}

#[test]
fn bbox_search_covers_moscow_but_not_kazan() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let orgs = repo
        .get_all_in_bbox(
            GeoPoint::new(55.5, 37.3),
            GeoPoint::new(56.0, 38.0),
            &OrganizationQuery::default(),
            &mut graph,
        )
        .unwrap();
    assert_eq!(
        names(&orgs),
        vec!["Grocery 24", "Pizza Place", "Tech Corp"]
    );
}

#[test]
fn subtree_search_includes_descendant_memberships() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let orgs = repo
        .get_all_by_activity_subtree(fixture.food_id, 0, None, &mut graph)
        .unwrap();
    // Direct food member, dairy child member, and the milk grandchild
    // member all fall under the food root.
    assert_eq!(
        names(&orgs),
        vec!["Grocery 24", "Kazan Dairy Plant", "Pizza Place"]
    );

    let orgs = repo
        .get_all_by_activity_subtree(fixture.services_id, 0, None, &mut graph)
        .unwrap();
    assert_eq!(names(&orgs), vec!["Tech Corp"]);

    let orgs = repo
        .get_all_by_activity_subtree(fixture.milk_id, 0, None, &mut graph)
        .unwrap();
    assert_eq!(names(&orgs), vec!["Kazan Dairy Plant"]);
}

#[test]
fn subtree_search_paginates() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let orgs = repo
        .get_all_by_activity_subtree(fixture.food_id, 1, Some(1), &mut graph)
        .unwrap();
    assert_eq!(names(&orgs), vec!["Kazan Dairy Plant"]);
}

#[test]
fn service_applies_default_limit_and_delegates() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = OrganizationService::new(SqliteOrganizationRepository::new(
        &conn,
        MapperRegistry::new(),
    ));

    let mut graph = DomainGraph::new();
    let orgs = service
        .get_all(&OrganizationFilters::default(), &mut graph)
        .unwrap();
    assert_eq!(orgs.len(), 4);

    let err = service
        .get_all(
            &OrganizationFilters {
                limit: Some(0),
                ..OrganizationFilters::default()
            },
            &mut graph,
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidLimit(0)));

    let found = service.get(fixture.pizza_id, &mut graph).unwrap();
    assert!(found.is_some());

    let in_radius = service
        .get_all_in_radius(
            MOSCOW_CENTER.latitude,
            MOSCOW_CENTER.longitude,
            1_000.0,
            &OrganizationFilters::default(),
            &mut graph,
        )
        .unwrap();
    assert_eq!(names(&in_radius), vec!["Pizza Place", "Tech Corp"]);
}

#[test]
fn loaded_activities_carry_parent_ids_without_extra_lookups() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let repo = SqliteOrganizationRepository::new(&conn, MapperRegistry::new());

    let mut graph = DomainGraph::new();
    let org = repo
        .get(fixture.kazan_dairy_id, &mut graph)
        .unwrap()
        .unwrap();

    let org_ref = org.borrow();
    let milk = org_ref.activities[0].borrow();
    assert_eq!(milk.id, fixture.milk_id);
    assert_eq!(milk.depth, 3);
    assert_eq!(milk.parent_id, Some(fixture.dairy_id));
    // Relation loading stops at membership depth; the parent object itself
    // was not materialized.
    assert!(milk.parent().is_none());
}

//! Directory maintenance CLI.
//!
//! # Responsibility
//! - Seed a directory database with the built-in demo data set through the
//!   core repositories.
//! - Keep output deterministic so runs are comparable.

use clap::{Parser, Subcommand};
use log::info;
use orgdir_core::config::ENV_DB_PATH;
use orgdir_core::db::open_db;
use orgdir_core::{
    Activity, ActivityRef, ActivityRepository, AppConfig, Building, BuildingRef,
    BuildingRepository, GeoPoint, MapperRegistry, Organization, Phone, SqliteActivityRepository,
    SqliteBuildingRepository,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "orgdir", about = "Organization directory maintenance tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Populate the database with the built-in demo data set.
    Seed {
        /// Database file path; defaults to ORGDIR_DB_PATH.
        #[arg(long)]
        db: Option<PathBuf>,
        /// Remove existing directory rows first.
        #[arg(long)]
        clear: bool,
        /// Print the summary as JSON instead of plain text.
        #[arg(long)]
        summary_json: bool,
    },
}

#[derive(Debug, Default, Serialize)]
struct SeedSummary {
    buildings: i64,
    organizations: i64,
    phones: i64,
    activities: i64,
    activity_links: i64,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let env_config = AppConfig::from_env();

    if let Ok(config) = &env_config {
        if let Some(log_dir) = &config.log_dir {
            orgdir_core::init_logging(&config.log_level, &log_dir.to_string_lossy())?;
        }
    }

    match cli.command {
        Command::Seed {
            db,
            clear,
            summary_json,
        } => {
            let db_path = match db.or_else(|| env_config.ok().map(|config| config.db_path)) {
                Some(path) => path,
                None => return Err(format!("no database path: pass --db or set {ENV_DB_PATH}")),
            };
            seed(&db_path, clear, summary_json)
        }
    }
}

fn seed(db_path: &PathBuf, clear: bool, summary_json: bool) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;

    if clear {
        // Buildings and activity roots cascade to every dependent row.
        conn.execute_batch("DELETE FROM building; DELETE FROM activity;")
            .map_err(|err| err.to_string())?;
    }

    let mapper = MapperRegistry::new();
    let activity_repo = SqliteActivityRepository::new(&conn, mapper);
    let building_repo = SqliteBuildingRepository::new(&conn, mapper);

    let taxonomy = build_taxonomy().map_err(|err| err.to_string())?;
    for root in &taxonomy.roots {
        activity_repo.create(root).map_err(|err| err.to_string())?;
    }

    for building in build_directory(&taxonomy) {
        building_repo
            .create(&building)
            .map_err(|err| err.to_string())?;
    }

    let summary = SeedSummary {
        buildings: count_rows(&conn, "building")?,
        organizations: count_rows(&conn, "organization")?,
        phones: count_rows(&conn, "phone")?,
        activities: count_rows(&conn, "activity")?,
        activity_links: count_rows(&conn, "organization_activity")?,
    };

    info!(
        "event=seed module=cli status=ok buildings={} organizations={} activities={}",
        summary.buildings, summary.organizations, summary.activities
    );

    if summary_json {
        let rendered = serde_json::to_string_pretty(&summary).map_err(|err| err.to_string())?;
        println!("{rendered}");
    } else {
        println!("seeded {}", db_path.display());
        println!("  buildings:      {}", summary.buildings);
        println!("  organizations:  {}", summary.organizations);
        println!("  phones:         {}", summary.phones);
        println!("  activities:     {}", summary.activities);
        println!("  activity links: {}", summary.activity_links);
    }

    Ok(())
}

struct Taxonomy {
    roots: Vec<ActivityRef>,
    food: ActivityRef,
    dairy: ActivityRef,
    milk: ActivityRef,
    services: ActivityRef,
    it: ActivityRef,
}

fn build_taxonomy() -> Result<Taxonomy, orgdir_core::DomainError> {
    let food = Activity::new("Food");
    let meat = Activity::new("Meat");
    let dairy = Activity::new("Dairy");
    let milk = Activity::new("Milk");
    Activity::add_child(&food, &meat)?;
    Activity::add_child(&food, &dairy)?;
    Activity::add_child(&dairy, &milk)?;

    let services = Activity::new("Services");
    let it = Activity::new("IT");
    let hosting = Activity::new("Hosting");
    Activity::add_child(&services, &it)?;
    Activity::add_child(&it, &hosting)?;

    Ok(Taxonomy {
        roots: vec![food.clone(), services.clone()],
        food,
        dairy,
        milk,
        services,
        it,
    })
}

fn build_directory(taxonomy: &Taxonomy) -> Vec<BuildingRef> {
    let moscow_plaza = Building::new("Moscow Central Plaza", GeoPoint::new(55.7558, 37.6173));
    let pizza = Organization::new("Pizza Place");
    pizza.borrow_mut().add_phone(Phone::new("+7 495 111-22-33"));
    pizza.borrow_mut().add_phone(Phone::new("+7 495 111-22-34"));
    pizza.borrow_mut().add_activity(&taxonomy.food);
    Building::add_organization(&moscow_plaza, &pizza);

    let tech = Organization::new("Tech Corp");
    tech.borrow_mut().add_phone(Phone::new("+7 495 555-10-01"));
    tech.borrow_mut().add_activity(&taxonomy.it);
    Building::add_organization(&moscow_plaza, &tech);

    let moscow_north = Building::new("Moscow North Point", GeoPoint::new(55.8000, 37.6200));
    let grocery = Organization::new("Grocery 24");
    grocery.borrow_mut().add_phone(Phone::new("+7 495 777-00-77"));
    grocery.borrow_mut().add_activity(&taxonomy.food);
    grocery.borrow_mut().add_activity(&taxonomy.dairy);
    Building::add_organization(&moscow_north, &grocery);

    let spb_nevsky = Building::new("Nevsky Business House", GeoPoint::new(59.9343, 30.3351));
    let consulting = Organization::new("Neva Consulting");
    consulting
        .borrow_mut()
        .add_phone(Phone::new("+7 812 300-40-50"));
    consulting.borrow_mut().add_activity(&taxonomy.services);
    Building::add_organization(&spb_nevsky, &consulting);

    let nsk_center = Building::new("Novosibirsk Trade Center", GeoPoint::new(55.0084, 82.9357));
    let dairy_shop = Organization::new("Siberia Dairy");
    dairy_shop
        .borrow_mut()
        .add_phone(Phone::new("+7 383 200-30-40"));
    dairy_shop.borrow_mut().add_activity(&taxonomy.milk);
    Building::add_organization(&nsk_center, &dairy_shop);

    vec![moscow_plaza, moscow_north, spb_nevsky, nsk_center]
}

fn count_rows(conn: &rusqlite::Connection, table: &str) -> Result<i64, String> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .map_err(|err| err.to_string())
}

//! Tests d'intégration PostgreSQL
//!
//! Ces tests nécessitent une base PostgreSQL (13+) disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! # Avec PostgreSQL local
//! cargo test --test postgres_integration -- --ignored
//!
//! # Avec Docker
//! docker run -d --name postgres-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgres:16
//! PGPASSWORD=test cargo test --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use deadpool_postgres::{Config, Pool, Runtime};
use geojson::Geometry;
use serde_json::{json, Value};
use shpfeed::{MemorySource, Properties};
use sketch_import::{
    CommitChoice, FixedPrompter, IdentityMapper, ImportPipeline, ImportStatus, PgStore,
    SketchStore,
};
use tokio_postgres::NoTls;

const SCHEMA: &str = "sketch_import_test";

/// Configuration de test
fn test_config() -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(std::env::var("PGHOST").unwrap_or_else(|_| "localhost".into()));
    cfg.port = Some(
        std::env::var("PGPORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
    );
    cfg.dbname = Some(std::env::var("PGDATABASE").unwrap_or_else(|_| "sketches_test".into()));
    cfg.user = Some(std::env::var("PGUSER").unwrap_or_else(|_| "postgres".into()));
    cfg.password = std::env::var("PGPASSWORD").ok();
    cfg
}

/// Crée un pool de connexions de test
async fn create_test_pool() -> Result<Pool> {
    let cfg = test_config();
    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
    Ok(pool)
}

/// Recrée le schéma de test avec une classe et ses attributs
async fn setup_test_store() -> Result<(Pool, PgStore)> {
    let pool = create_test_pool().await?;
    {
        let client = pool.get().await?;
        client
            .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", SCHEMA))
            .await?;
    }

    let store = PgStore::new(pool.clone(), SCHEMA);
    store.ensure_schema().await?;

    let client = pool.get().await?;
    client
        .batch_execute(&format!(
            r#"
            INSERT INTO {schema}.sketch_classes (id, name) VALUES
                ('zones', 'Zones'),
                ('folders', 'Folder');

            INSERT INTO {schema}.form_attributes (id, sketch_class_id, export_id, choices) VALUES
                ('attr-area', 'zones', 'AREA', NULL),
                ('attr-kind', 'zones', 'KIND', '["reef", "kelp"]');
            "#,
            schema = SCHEMA
        ))
        .await?;

    Ok((pool, store))
}

fn feature(lon: f64, lat: f64, properties: Value) -> (Geometry, Properties) {
    (
        Geometry::new(geojson::Value::Point(vec![lon, lat])),
        properties.as_object().cloned().unwrap_or_default(),
    )
}

/// Test de création du schéma (idempotent)
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_schema_creation() {
    let (pool, store) = setup_test_store().await.expect("Failed to setup schema");
    store.ensure_schema().await.expect("Second ensure_schema failed");

    let client = pool.get().await.expect("Failed to get client");
    let tables = client
        .query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = $1",
            &[&SCHEMA],
        )
        .await
        .expect("Failed to query tables");

    let table_names: Vec<String> = tables.iter().map(|r| r.get(0)).collect();
    for table in ["sketch_classes", "form_attributes", "sketches", "large_geometries"] {
        assert!(table_names.contains(&table.to_string()), "missing {}", table);
    }
}

/// Les attributs supprimés ne sont pas chargés
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_deleted_attributes_are_hidden() {
    let (pool, store) = setup_test_store().await.expect("Failed to setup schema");
    let client = pool.get().await.expect("Failed to get client");
    client
        .execute(
            &format!(
                "INSERT INTO {}.form_attributes (id, sketch_class_id, export_id, deleted_at)
                 VALUES ('attr-old', 'zones', 'OLD', $1)",
                SCHEMA
            ),
            &[&(SystemTime::UNIX_EPOCH + Duration::from_secs(86_400))],
        )
        .await
        .expect("Failed to insert");

    let attributes = store.find_form_attributes("zones").await.unwrap();
    let mut export_ids: Vec<_> = attributes.iter().map(|a| a.export_id.as_str()).collect();
    export_ids.sort();
    assert_eq!(export_ids, ["AREA", "KIND"]);

    let kind = attributes.iter().find(|a| a.export_id == "KIND").unwrap();
    assert_eq!(kind.choices, json!(["reef", "kelp"]));

    assert!(store.find_sketch_class("missing").await.unwrap().is_none());
}

/// Import complet: dossier, géométrie volumineuse puis sketch
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_full_import() {
    let (pool, store) = setup_test_store().await.expect("Failed to setup schema");
    let pipeline = ImportPipeline::new(Arc::new(store));

    let mut source = MemorySource::new(vec![
        feature(
            -119.7,
            34.4,
            json!({"SKETCH_CLASS_ID": "zones", "NAME": "A", "AREA": 1.5, "FOLDER": {"name": "North", "type": "folders"}}),
        ),
        feature(
            -119.8,
            34.5,
            json!({"SKETCH_CLASS_ID": "zones", "NAME": "B", "KIND": "reef", "FOLDER": {"name": "North", "type": "folders"}}),
        ),
    ]);

    // Pas de .prj: la projection est acceptée par le prompter
    let dir = tempfile::tempdir().unwrap();
    let report = pipeline
        .run(
            &dir.path().join("zones.shp"),
            &mut source,
            "project-1",
            "user-1",
            &IdentityMapper,
            &FixedPrompter::new(true, CommitChoice::All),
        )
        .await
        .expect("Import failed");

    assert_eq!(report.status, ImportStatus::Committed);
    assert_eq!(report.committed.len(), 2);

    let client = pool.get().await.expect("Failed to get client");
    let folders: i64 = client
        .query_one(
            &format!("SELECT count(*) FROM {}.sketches WHERE is_collection", SCHEMA),
            &[],
        )
        .await
        .unwrap()
        .get(0);
    assert_eq!(folders, 1);

    let rows = client
        .query(
            &format!(
                "SELECT s.name, s.parent_id, s.attributes, s.deleted_at, g.type, s.geometry
                 FROM {schema}.sketches s
                 JOIN {schema}.large_geometries g ON g.id = s.preprocessed_geometry_id
                 ORDER BY s.name",
                schema = SCHEMA
            ),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let attributes: Value = rows[0].get(2);
    assert_eq!(attributes, json!({"attr-area": 1.5}));
    let deleted_at: SystemTime = rows[0].get(3);
    assert_eq!(deleted_at, SystemTime::UNIX_EPOCH);
    let kind: String = rows[0].get(4);
    assert_eq!(kind, "preprocessed");
    let geometry: Value = rows[0].get(5);
    assert_eq!(geometry["geometryType"], "esriGeometryPoint");
    assert_eq!(geometry["spatialReference"]["wkid"], 102100);

    let parents: Vec<Option<String>> = rows.iter().map(|r| r.get(1)).collect();
    assert!(parents[0].is_some());
    assert_eq!(parents[0], parents[1]);
}

/// Suppression d'une géométrie (compensation)
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_delete_large_geometry() {
    let (_pool, store) = setup_test_store().await.expect("Failed to setup schema");
    let id = store
        .create_large_geometry(&sketch_import::model::LargeGeometry {
            kind: "preprocessed".into(),
            geometry: json!({}),
        })
        .await
        .unwrap();

    store.delete_large_geometry(&id).await.unwrap();
    assert!(store.delete_large_geometry(&id).await.is_err());
}

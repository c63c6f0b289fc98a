//! Stockage PostgreSQL
//!
//! Tables (dans le schéma configuré):
//! - `sketch_classes (id, name)`
//! - `form_attributes (id, sketch_class_id, export_id, choices, deleted_at)`
//! - `sketches (...)`, une ligne par dossier ou sketch
//! - `large_geometries (id, type, geometry)`

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use serde_json::Value;
use tracing::{debug, info};

use super::SketchStore;
use crate::model::{not_deleted, FormAttribute, LargeGeometry, NewSketch, SketchClassRow};

/// Stockage PostgreSQL au-dessus d'un pool deadpool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: Pool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }

    /// Schéma PostgreSQL utilisé
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Crée le schéma et les tables s'ils n'existent pas
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get connection from pool")?;

        let sql = format!(
            r#"
            CREATE SCHEMA IF NOT EXISTS {schema};

            CREATE TABLE IF NOT EXISTS {schema}.sketch_classes (
                id TEXT PRIMARY KEY,
                name TEXT
            );

            CREATE TABLE IF NOT EXISTS {schema}.form_attributes (
                id TEXT PRIMARY KEY,
                sketch_class_id TEXT NOT NULL REFERENCES {schema}.sketch_classes(id),
                export_id TEXT NOT NULL,
                choices JSONB,
                deleted_at TIMESTAMPTZ NOT NULL DEFAULT to_timestamp(0)
            );

            CREATE TABLE IF NOT EXISTS {schema}.large_geometries (
                id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text,
                type TEXT NOT NULL,
                geometry JSONB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS {schema}.sketches (
                id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text,
                name TEXT,
                sketch_class_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                in_message BOOLEAN NOT NULL DEFAULT FALSE,
                deleted_at TIMESTAMPTZ NOT NULL DEFAULT to_timestamp(0),
                is_collection BOOLEAN NOT NULL DEFAULT FALSE,
                parent_id TEXT,
                static_geometry BOOLEAN,
                geometry JSONB,
                geometry_original JSONB,
                preprocessed_geometry_id TEXT,
                attributes JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                created_at TIMESTAMPTZ DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_form_attributes_class
                ON {schema}.form_attributes(sketch_class_id);
            "#,
            schema = self.schema
        );

        client
            .batch_execute(&sql)
            .await
            .context("Failed to create sketch tables")?;

        info!(schema = %self.schema, "Sketch schema ready");
        Ok(())
    }
}

#[async_trait]
impl SketchStore for PgStore {
    async fn find_sketch_class(&self, id: &str) -> Result<Option<SketchClassRow>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT id, name FROM {}.sketch_classes WHERE id = $1", self.schema),
                &[&id],
            )
            .await
            .context("Failed to load sketch class")?;

        Ok(row.map(|row| SketchClassRow {
            id: row.get("id"),
            name: row.get::<_, Option<String>>("name").unwrap_or_default(),
        }))
    }

    async fn find_form_attributes(&self, sketch_class_id: &str) -> Result<Vec<FormAttribute>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT id, sketch_class_id, export_id, choices FROM {}.form_attributes
                     WHERE sketch_class_id = $1 AND deleted_at = $2",
                    self.schema
                ),
                &[&sketch_class_id, &not_deleted()],
            )
            .await
            .context("Failed to load form attributes")?;

        debug!(sketch_class_id, count = rows.len(), "Loaded form attributes");

        Ok(rows
            .into_iter()
            .map(|row| FormAttribute {
                id: row.get("id"),
                sketch_class_id: row.get("sketch_class_id"),
                export_id: row.get("export_id"),
                choices: row.get::<_, Option<Value>>("choices").unwrap_or(Value::Null),
            })
            .collect())
    }

    async fn create_sketch(&self, sketch: &NewSketch) -> Result<String> {
        let client = self.pool.get().await?;
        let attributes = Value::Object(sketch.attributes.clone());
        let row = client
            .query_one(
                &format!(
                    r#"
                    INSERT INTO {}.sketches (
                        name, sketch_class_id, project_id, user_id, in_message, deleted_at,
                        is_collection, parent_id, static_geometry, geometry, geometry_original,
                        preprocessed_geometry_id, attributes
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                    RETURNING id
                    "#,
                    self.schema
                ),
                &[
                    &sketch.name,
                    &sketch.sketch_class_id,
                    &sketch.project_id,
                    &sketch.user_id,
                    &sketch.in_message,
                    &sketch.deleted_at,
                    &sketch.is_collection,
                    &sketch.parent_id,
                    &sketch.static_geometry,
                    &sketch.geometry,
                    &sketch.geometry_original,
                    &sketch.preprocessed_geometry_id,
                    &attributes,
                ],
            )
            .await
            .context("Failed to insert sketch")?;

        Ok(row.get("id"))
    }

    async fn create_large_geometry(&self, geometry: &LargeGeometry) -> Result<String> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {}.large_geometries (type, geometry) VALUES ($1, $2) RETURNING id",
                    self.schema
                ),
                &[&geometry.kind, &geometry.geometry],
            )
            .await
            .context("Failed to insert large geometry")?;

        Ok(row.get("id"))
    }

    async fn delete_large_geometry(&self, id: &str) -> Result<()> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                &format!("DELETE FROM {}.large_geometries WHERE id = $1", self.schema),
                &[&id],
            )
            .await
            .context("Failed to delete large geometry")?;

        if deleted == 0 {
            anyhow::bail!("Large geometry {} not found", id);
        }
        Ok(())
    }
}

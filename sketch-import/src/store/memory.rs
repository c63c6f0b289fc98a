//! Stockage en mémoire

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::SketchStore;
use crate::model::{not_deleted, FormAttribute, LargeGeometry, NewSketch, SketchClassRow};

#[derive(Debug, Default)]
struct Inner {
    classes: BTreeMap<String, SketchClassRow>,
    attributes: Vec<(FormAttribute, SystemTime)>,
    sketches: Vec<(String, NewSketch)>,
    geometries: Vec<(String, LargeGeometry)>,
    /// Journal des écritures, dans l'ordre
    writes: Vec<String>,
    fail_sketch_writes: bool,
    fail_geometry_deletes: bool,
}

/// Stockage en mémoire, thread-safe
///
/// Utilisé par les tests; chaque écriture est journalisée pour vérifier
/// l'ordre des opérations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Enregistre une classe de sketch
    pub fn add_class(&self, id: &str, name: &str) -> Result<()> {
        self.lock()?.classes.insert(
            id.to_string(),
            SketchClassRow {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Enregistre un attribut actif pour une classe
    pub fn add_attribute(&self, id: &str, sketch_class_id: &str, export_id: &str) -> Result<()> {
        self.insert_attribute(id, sketch_class_id, export_id, not_deleted())
    }

    /// Enregistre un attribut supprimé (ignoré par `find_form_attributes`)
    pub fn add_deleted_attribute(
        &self,
        id: &str,
        sketch_class_id: &str,
        export_id: &str,
        deleted_at: SystemTime,
    ) -> Result<()> {
        self.insert_attribute(id, sketch_class_id, export_id, deleted_at)
    }

    fn insert_attribute(
        &self,
        id: &str,
        sketch_class_id: &str,
        export_id: &str,
        deleted_at: SystemTime,
    ) -> Result<()> {
        let attribute = FormAttribute {
            id: id.to_string(),
            sketch_class_id: sketch_class_id.to_string(),
            export_id: export_id.to_string(),
            choices: Value::Null,
        };
        self.lock()?.attributes.push((attribute, deleted_at));
        Ok(())
    }

    /// Fait échouer les écritures de sketch suivantes
    pub fn fail_sketch_writes(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_sketch_writes = fail;
        Ok(())
    }

    /// Fait échouer les suppressions de géométrie suivantes
    pub fn fail_geometry_deletes(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_geometry_deletes = fail;
        Ok(())
    }

    /// Sketches créés (identifiant, contenu), dans l'ordre
    pub fn sketches(&self) -> Vec<(String, NewSketch)> {
        self.lock().map(|i| i.sketches.clone()).unwrap_or_default()
    }

    /// Géométries volumineuses présentes, dans l'ordre
    pub fn large_geometries(&self) -> Vec<(String, LargeGeometry)> {
        self.lock().map(|i| i.geometries.clone()).unwrap_or_default()
    }

    /// Journal des écritures (`sketch:<id>`, `geometry:<id>`, `delete:<id>`)
    pub fn writes(&self) -> Vec<String> {
        self.lock().map(|i| i.writes.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SketchStore for MemoryStore {
    async fn find_sketch_class(&self, id: &str) -> Result<Option<SketchClassRow>> {
        Ok(self.lock()?.classes.get(id).cloned())
    }

    async fn find_form_attributes(&self, sketch_class_id: &str) -> Result<Vec<FormAttribute>> {
        Ok(self
            .lock()?
            .attributes
            .iter()
            .filter(|(attr, deleted_at)| {
                attr.sketch_class_id == sketch_class_id && *deleted_at == not_deleted()
            })
            .map(|(attr, _)| attr.clone())
            .collect())
    }

    async fn create_sketch(&self, sketch: &NewSketch) -> Result<String> {
        let mut inner = self.lock()?;
        if inner.fail_sketch_writes {
            anyhow::bail!("sketch write rejected");
        }
        let id = Uuid::new_v4().to_string();
        inner.sketches.push((id.clone(), sketch.clone()));
        inner.writes.push(format!("sketch:{}", id));
        Ok(id)
    }

    async fn create_large_geometry(&self, geometry: &LargeGeometry) -> Result<String> {
        let mut inner = self.lock()?;
        let id = Uuid::new_v4().to_string();
        inner.geometries.push((id.clone(), geometry.clone()));
        inner.writes.push(format!("geometry:{}", id));
        Ok(id)
    }

    async fn delete_large_geometry(&self, id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.fail_geometry_deletes {
            anyhow::bail!("geometry delete rejected");
        }
        let before = inner.geometries.len();
        inner.geometries.retain(|(gid, _)| gid != id);
        if inner.geometries.len() == before {
            anyhow::bail!("large geometry {} not found", id);
        }
        inner.writes.push(format!("delete:{}", id));
        Ok(())
    }
}

//! Stockage des sketches
//!
//! Le pipeline n'accède à la persistance qu'à travers `SketchStore`:
//! PostgreSQL en production, mémoire pour les tests.

pub mod memory;
pub mod pool;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{FormAttribute, LargeGeometry, NewSketch, SketchClassRow};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Service de persistance des classes, attributs, sketches et géométries
#[async_trait]
pub trait SketchStore: Send + Sync {
    /// Classe de sketch par identifiant
    async fn find_sketch_class(&self, id: &str) -> Result<Option<SketchClassRow>>;

    /// Attributs non supprimés d'une classe
    async fn find_form_attributes(&self, sketch_class_id: &str) -> Result<Vec<FormAttribute>>;

    /// Crée un sketch et retourne l'identifiant généré
    async fn create_sketch(&self, sketch: &NewSketch) -> Result<String>;

    /// Crée une géométrie volumineuse et retourne l'identifiant généré
    async fn create_large_geometry(&self, geometry: &LargeGeometry) -> Result<String>;

    /// Supprime une géométrie volumineuse (compensation d'un commit raté)
    async fn delete_large_geometry(&self, id: &str) -> Result<()>;
}

//! Modèle de données: classes de sketch, attributs, dossiers et sketches à créer

use std::collections::HashMap;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::geometry::EsriEnvelope;

pub use shpfeed::Properties;

/// Propriété portant l'identifiant de la classe de sketch
pub const CLASS_ID_FIELD: &str = "SKETCH_CLASS_ID";

/// Propriété portant le nom du sketch
pub const NAME_FIELD: &str = "NAME";

/// Propriété portant le dossier parent `{name, type}`
pub const FOLDER_FIELD: &str = "FOLDER";

/// Type de géométrie volumineuse stockée hors ligne
pub const PREPROCESSED_GEOMETRY: &str = "preprocessed";

/// Marqueur "non supprimé" (epoch)
pub fn not_deleted() -> SystemTime {
    SystemTime::UNIX_EPOCH
}

/// Définition d'attribut de formulaire
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormAttribute {
    pub id: String,
    pub sketch_class_id: String,
    /// Identifiant d'export (clé dans les attributs source)
    pub export_id: String,
    /// Choix possibles (opaque)
    pub choices: Value,
}

/// Ligne brute d'une classe de sketch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchClassRow {
    pub id: String,
    pub name: String,
}

/// Classe de sketch avec ses attributs indexés par identifiant d'export
#[derive(Debug, Clone)]
pub struct SketchClass {
    pub id: String,
    pub name: String,
    pub attributes: HashMap<String, FormAttribute>,
}

impl SketchClass {
    /// Construit la classe et indexe ses attributs par `export_id`
    pub fn new(row: SketchClassRow, attributes: Vec<FormAttribute>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            attributes: attributes
                .into_iter()
                .map(|attr| (attr.export_id.clone(), attr))
                .collect(),
        }
    }

    /// Attribut correspondant à un identifiant d'export
    pub fn attribute(&self, export_id: &str) -> Option<&FormAttribute> {
        self.attributes.get(export_id)
    }
}

/// Dossier (sketch de type collection)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub sketch_class_id: String,
}

/// Identifiant de classe sous forme de chaîne: chaîne non vide ou entier
pub fn class_id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn deserialize_class_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = <Value as serde::Deserialize>::deserialize(deserializer)?;
    class_id_from_value(&value).ok_or_else(|| {
        serde::de::Error::custom(format!("expected a string or integer class id, got {}", value))
    })
}

/// Descripteur de dossier porté par les attributs (`FOLDER`)
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct FolderRef {
    pub name: String,
    /// Identifiant de la classe du dossier
    #[serde(rename = "type", deserialize_with = "deserialize_class_id")]
    pub sketch_class_id: String,
}

/// Sketch à créer (dossier ou sketch géométrique)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSketch {
    pub name: Option<String>,
    pub sketch_class_id: String,
    pub project_id: String,
    pub user_id: String,
    pub in_message: bool,
    #[serde(skip)]
    pub deleted_at: SystemTime,
    pub is_collection: bool,
    pub parent_id: Option<String>,
    pub static_geometry: Option<bool>,
    pub geometry: Option<Value>,
    pub geometry_original: Option<Value>,
    pub preprocessed_geometry_id: Option<String>,
    pub attributes: Map<String, Value>,
}

impl NewSketch {
    /// Dossier vide, non supprimé
    pub fn folder(name: &str, sketch_class_id: &str, project_id: &str, user_id: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            sketch_class_id: sketch_class_id.to_string(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            in_message: false,
            deleted_at: not_deleted(),
            is_collection: true,
            parent_id: None,
            static_geometry: None,
            geometry: None,
            geometry_original: None,
            preprocessed_geometry_id: None,
            attributes: Map::new(),
        }
    }
}

/// Sketch construit depuis une feature, en attente de commit
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub name: Option<String>,
    pub sketch_class_id: String,
    pub project_id: String,
    pub user_id: String,
    /// Enveloppe Esri (EPSG:3857)
    pub geometry: EsriEnvelope,
    /// Géométrie avant conversion (GeoJSON, EPSG:4326)
    pub geometry_original: geojson::Geometry,
    pub parent_id: Option<String>,
    pub is_collection: bool,
    pub static_geometry: bool,
    pub in_message: bool,
    pub deleted_at: SystemTime,
    /// Valeurs indexées par identifiant d'attribut
    pub attributes: Map<String, Value>,
}

impl PendingRecord {
    /// Prépare l'écriture du sketch, qui référence sa géométrie stockée hors ligne
    pub fn to_new_sketch(&self, preprocessed_geometry_id: &str) -> serde_json::Result<NewSketch> {
        Ok(NewSketch {
            name: self.name.clone(),
            sketch_class_id: self.sketch_class_id.clone(),
            project_id: self.project_id.clone(),
            user_id: self.user_id.clone(),
            in_message: self.in_message,
            deleted_at: self.deleted_at,
            is_collection: self.is_collection,
            parent_id: self.parent_id.clone(),
            static_geometry: Some(self.static_geometry),
            geometry: Some(serde_json::to_value(&self.geometry)?),
            geometry_original: Some(serde_json::to_value(&self.geometry_original)?),
            preprocessed_geometry_id: Some(preprocessed_geometry_id.to_string()),
            attributes: self.attributes.clone(),
        })
    }

    /// Géométrie volumineuse à écrire avant le sketch
    pub fn large_geometry(&self) -> serde_json::Result<LargeGeometry> {
        Ok(LargeGeometry {
            kind: PREPROCESSED_GEOMETRY.to_string(),
            geometry: serde_json::to_value(&self.geometry)?,
        })
    }
}

/// Géométrie volumineuse stockée indépendamment du sketch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LargeGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Value,
}

//! Configuration du mapping des attributs
//!
//! Forme déclarative (JSON) de la fonction de mapping:
//!
//! ```json
//! {
//!   "sketch_class_id": "5c1a...",
//!   "name_field": "SITE_NAME",
//!   "folder": { "field": "REGION", "type": "5c1b..." },
//!   "fields": [ { "source": "AREA_HA", "target": "area", "required": true } ],
//!   "filters": [ { "field": "STATUS", "equals": "active" } ],
//!   "keep_unmapped": false
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mapping::FeatureMapper;
use crate::model::{Properties, CLASS_ID_FIELD, FOLDER_FIELD, NAME_FIELD};

/// Configuration principale
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MappingConfig {
    /// Classe de sketch appliquée à toutes les features
    #[serde(default)]
    pub sketch_class_id: Option<String>,

    /// Attribut source portant l'identifiant de classe (si pas de constante)
    #[serde(default)]
    pub class_field: Option<String>,

    /// Attribut source portant le nom du sketch
    #[serde(default)]
    pub name_field: Option<String>,

    /// Dossier parent calculé depuis un attribut
    #[serde(default)]
    pub folder: Option<FolderMapping>,

    /// Mapping des champs source vers les identifiants d'export
    #[serde(default)]
    pub fields: Vec<FieldMapping>,

    /// Conditions d'acceptation (une seule non respectée rejette la feature)
    #[serde(default)]
    pub filters: Vec<Filter>,

    /// Copier aussi les attributs non mappés
    #[serde(default)]
    pub keep_unmapped: bool,
}

/// Dossier parent
#[derive(Debug, Deserialize, Serialize)]
pub struct FolderMapping {
    /// Attribut source donnant le nom du dossier
    pub field: String,

    /// Classe de sketch du dossier
    #[serde(rename = "type")]
    pub sketch_class_id: String,
}

/// Mapping d'un champ
#[derive(Debug, Deserialize, Serialize)]
pub struct FieldMapping {
    /// Nom du champ source (.dbf)
    pub source: String,

    /// Identifiant d'export cible
    pub target: String,

    /// Erreur si le champ est absent ou vide
    #[serde(default)]
    pub required: bool,
}

/// Condition d'acceptation d'une feature
#[derive(Debug, Deserialize, Serialize)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

impl MappingConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read mapping file: {}", path.display()))?;

        Self::from_json(&content)
    }

    /// Charge une configuration depuis du JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse mapping JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sketch_class_id.is_some() && self.class_field.is_some() {
            anyhow::bail!("Use either sketch_class_id or class_field, not both");
        }
        Ok(())
    }

    /// Applique le mapping; `None` si un filtre rejette la feature
    pub fn apply(&self, mut properties: Properties) -> Result<Option<Properties>> {
        let accepted = self
            .filters
            .iter()
            .all(|filter| properties.get(&filter.field) == Some(&filter.equals));
        if !accepted {
            return Ok(None);
        }

        let mut out = Properties::new();

        if let Some(class_id) = &self.sketch_class_id {
            out.insert(CLASS_ID_FIELD.to_string(), Value::String(class_id.clone()));
        } else if let Some(field) = &self.class_field {
            let value = take_present(&mut properties, field)
                .with_context(|| format!("Missing class field {}", field))?;
            out.insert(CLASS_ID_FIELD.to_string(), value);
        }

        if let Some(field) = &self.name_field {
            if let Some(value) = properties.remove(field) {
                out.insert(NAME_FIELD.to_string(), value);
            }
        }

        if let Some(folder) = &self.folder {
            match take_present(&mut properties, &folder.field) {
                Some(Value::String(name)) if !name.trim().is_empty() => {
                    out.insert(
                        FOLDER_FIELD.to_string(),
                        json!({"name": name.trim(), "type": folder.sketch_class_id}),
                    );
                }
                Some(Value::String(_)) | None => {}
                Some(other) => {
                    out.insert(
                        FOLDER_FIELD.to_string(),
                        json!({"name": other.to_string(), "type": folder.sketch_class_id}),
                    );
                }
            }
        }

        for field in &self.fields {
            match take_present(&mut properties, &field.source) {
                Some(value) => {
                    out.insert(field.target.clone(), value);
                }
                None if field.required => {
                    anyhow::bail!("Missing required field {}", field.source);
                }
                None => {}
            }
        }

        if self.keep_unmapped {
            for (key, value) in properties {
                out.entry(key).or_insert(value);
            }
        }

        Ok(Some(out))
    }
}

/// Retire un attribut s'il est présent et non nul
fn take_present(properties: &mut Properties, field: &str) -> Option<Value> {
    match properties.remove(field) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

#[async_trait]
impl FeatureMapper for MappingConfig {
    async fn map(&self, _geometry: &Geometry, properties: Properties) -> Result<Option<Properties>> {
        self.apply(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    const CONFIG: &str = r#"{
        "sketch_class_id": "c1",
        "name_field": "SITE",
        "folder": { "field": "REGION", "type": "folders" },
        "fields": [
            { "source": "AREA_HA", "target": "AREA", "required": true },
            { "source": "NOTES", "target": "NOTES" }
        ],
        "filters": [ { "field": "STATUS", "equals": "active" } ]
    }"#;

    #[test]
    fn test_apply_full_mapping() {
        let config = MappingConfig::from_json(CONFIG).unwrap();
        let out = config
            .apply(props(json!({
                "SITE": "Reef A",
                "REGION": " North ",
                "AREA_HA": 12.5,
                "STATUS": "active",
                "OTHER": 1
            })))
            .unwrap()
            .unwrap();

        assert_eq!(
            Value::Object(out),
            json!({
                "SKETCH_CLASS_ID": "c1",
                "NAME": "Reef A",
                "FOLDER": {"name": "North", "type": "folders"},
                "AREA": 12.5
            })
        );
    }

    #[test]
    fn test_filter_rejects() {
        let config = MappingConfig::from_json(CONFIG).unwrap();
        let out = config
            .apply(props(json!({"STATUS": "retired", "AREA_HA": 1})))
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_required_field_missing() {
        let config = MappingConfig::from_json(CONFIG).unwrap();
        let err = config
            .apply(props(json!({"STATUS": "active", "AREA_HA": null})))
            .unwrap_err();
        assert!(err.to_string().contains("AREA_HA"));
    }

    #[test]
    fn test_keep_unmapped_and_class_field() {
        let config = MappingConfig::from_json(
            r#"{ "class_field": "KIND", "keep_unmapped": true }"#,
        )
        .unwrap();
        let out = config
            .apply(props(json!({"KIND": "c9", "DEPTH": 4})))
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(out), json!({"SKETCH_CLASS_ID": "c9", "DEPTH": 4}));
    }

    #[test]
    fn test_conflicting_class_sources() {
        let result = MappingConfig::from_json(r#"{ "sketch_class_id": "c1", "class_field": "KIND" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, CONFIG).unwrap();

        let config = MappingConfig::load(&path).unwrap();
        assert_eq!(config.fields.len(), 2);
        assert!(MappingConfig::load(&dir.path().join("missing.json")).is_err());
    }
}

//! Construction des sketches en attente à partir des features converties

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::cache::ReferenceCache;
use crate::error::ImportError;
use crate::geometry::EsriEnvelope;
use crate::model::{
    class_id_from_value, not_deleted, FolderRef, PendingRecord, Properties, SketchClass, CLASS_ID_FIELD, FOLDER_FIELD,
    NAME_FIELD,
};

/// Contrôle de compatibilité entre une géométrie et sa classe cible
///
/// Point d'extension: aucune règle n'est appliquée par défaut.
pub trait GeometryRule: Send + Sync {
    fn check(&self, geometry_type: &str, class: &SketchClass) -> Result<(), ImportError>;
}

/// Accepte toutes les géométries
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyGeometry;

impl GeometryRule for AcceptAnyGeometry {
    fn check(&self, _geometry_type: &str, _class: &SketchClass) -> Result<(), ImportError> {
        Ok(())
    }
}

/// Construit des `PendingRecord`
pub struct RecordBuilder {
    cache: Arc<ReferenceCache>,
    rule: Box<dyn GeometryRule>,
    static_geometry: bool,
}

impl RecordBuilder {
    pub fn new(cache: Arc<ReferenceCache>) -> Self {
        Self {
            cache,
            rule: Box::new(AcceptAnyGeometry),
            static_geometry: true,
        }
    }

    /// Remplace le contrôle de compatibilité géométrie/classe
    pub fn with_rule(mut self, rule: impl GeometryRule + 'static) -> Self {
        self.rule = Box::new(rule);
        self
    }

    /// Valeur de `static_geometry` pour les sketches construits (défaut: vrai)
    pub fn with_static_geometry(mut self, static_geometry: bool) -> Self {
        self.static_geometry = static_geometry;
        self
    }

    /// Construit le sketch en attente
    ///
    /// Résout la classe, résout ou crée le dossier (`FOLDER`, retiré des
    /// attributs ensuite) et ne garde que les attributs connus de la classe.
    pub async fn build(
        &self,
        geometry: EsriEnvelope,
        geometry_original: &geojson::Geometry,
        mut properties: Properties,
        project_id: &str,
        user_id: &str,
    ) -> Result<PendingRecord, ImportError> {
        let class_id = class_id(&properties)?;
        let class = self.cache.resolve_class(&class_id).await?;
        self.rule.check(&geometry.geometry_type, &class)?;

        let parent_id = match properties.remove(FOLDER_FIELD) {
            Some(Value::Null) | None => None,
            Some(value) => {
                let folder: FolderRef = serde_json::from_value(value)
                    .map_err(|e| ImportError::invalid_field(FOLDER_FIELD, e.to_string()))?;
                let folder = self
                    .cache
                    .resolve_or_create_folder(
                        &folder.name,
                        &folder.sketch_class_id,
                        project_id,
                        user_id,
                    )
                    .await?;
                Some(folder.id)
            }
        };

        let name = match properties.get(NAME_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        let attributes = map_attributes(&class, properties);
        trace!(
            sketch_class_id = %class.id,
            attributes = attributes.len(),
            parent = ?parent_id,
            "Built pending sketch"
        );

        Ok(PendingRecord {
            name,
            sketch_class_id: class.id.clone(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            geometry,
            geometry_original: geometry_original.clone(),
            parent_id,
            is_collection: false,
            static_geometry: self.static_geometry,
            in_message: false,
            deleted_at: not_deleted(),
            attributes,
        })
    }
}

/// Identifiant de classe (chaîne ou entier)
fn class_id(properties: &Properties) -> Result<String, ImportError> {
    match properties.get(CLASS_ID_FIELD) {
        None | Some(Value::Null) => Err(ImportError::MissingField(CLASS_ID_FIELD.to_string())),
        Some(value) => class_id_from_value(value).ok_or_else(|| {
            ImportError::invalid_field(
                CLASS_ID_FIELD,
                format!("expected a string or integer id, got {}", value),
            )
        }),
    }
}

/// Garde les valeurs dont la clé est un `export_id` de la classe,
/// indexées par l'identifiant de l'attribut
fn map_attributes(class: &SketchClass, properties: Properties) -> Map<String, Value> {
    properties
        .into_iter()
        .filter_map(|(key, value)| class.attribute(&key).map(|attr| (attr.id.clone(), value)))
        .collect()
}

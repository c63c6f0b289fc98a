//! Conversion GeoJSON (EPSG:4326) → enveloppe Esri JSON (EPSG:3857)
//!
//! Une conversion traite exactement une feature: l'identité synthétique
//! (`OBJECTID = 1`, `FID = 1`) est donc constante.

pub mod esri;

use geojson::Value as GeoValue;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::model::Properties;
use crate::reproject::{SmartReprojector, WebMercator, TARGET_EPSG};

pub use esri::{EsriEnvelope, EsriFeature, EsriGeometry, FieldDescriptor, SpatialReference};

/// Préfixe des types de géométrie Esri
const GEOMETRY_TYPE_PREFIX: &str = "esriGeometry";

/// Erreurs de conversion d'une géométrie
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Type GeoJSON sans équivalent Esri
    #[error("Unsupported geometry type: {0}")]
    UnsupportedType(String),

    /// Position invalide (trop courte, non finie, hors domaine)
    #[error("Malformed coordinates: {0}")]
    MalformedCoordinates(String),

    /// Échec de la reprojection
    #[error("Reprojection failed: {0}")]
    Reprojection(String),
}

/// Convertit une géométrie source en enveloppe d'échange
pub struct GeometryConverter {
    reprojector: SmartReprojector,
}

impl Default for GeometryConverter {
    fn default() -> Self {
        Self {
            reprojector: SmartReprojector::Lite(WebMercator),
        }
    }
}

impl GeometryConverter {
    /// Convertisseur 4326 → 3857 en Rust pur
    pub fn new() -> Self {
        Self::default()
    }

    /// Convertisseur utilisant un reprojector particulier
    pub fn with_reprojector(reprojector: SmartReprojector) -> Self {
        Self { reprojector }
    }

    /// Convertit une géométrie et ses attributs en enveloppe Esri
    pub fn convert(
        &self,
        geometry: &geojson::Geometry,
        properties: &Properties,
    ) -> Result<EsriEnvelope, ConversionError> {
        let geometry_type = esri_geometry_type(&geometry.value)?;
        check_positions(&geometry.value)?;

        let source = geo::Geometry::<f64>::try_from(geometry.value.clone())
            .map_err(|e| ConversionError::MalformedCoordinates(e.to_string()))?;
        let projected = self
            .reprojector
            .transform_geometry(&source)
            .map_err(|e| ConversionError::Reprojection(format!("{e:#}")))?;

        let esri_geometry = EsriGeometry::from_geo(&projected, TARGET_EPSG)
            .ok_or_else(|| ConversionError::UnsupportedType(geojson_type(&geometry.value).into()))?;

        let mut attributes = properties.clone();
        attributes.insert("OBJECTID".to_string(), Value::from(1));
        attributes.insert("FID".to_string(), Value::from(1));

        trace!(geometry_type = %geometry_type, "Converted geometry");

        Ok(EsriEnvelope {
            features: vec![EsriFeature {
                geometry: esri_geometry,
                attributes,
            }],
            fields: vec![FieldDescriptor::fid()],
            geometry_type,
            spatial_reference: SpatialReference::web_mercator(),
        })
    }
}

/// Nom du type GeoJSON
pub fn geojson_type(value: &GeoValue) -> &'static str {
    match value {
        GeoValue::Point(_) => "Point",
        GeoValue::MultiPoint(_) => "MultiPoint",
        GeoValue::LineString(_) => "LineString",
        GeoValue::MultiLineString(_) => "MultiLineString",
        GeoValue::Polygon(_) => "Polygon",
        GeoValue::MultiPolygon(_) => "MultiPolygon",
        GeoValue::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Type Esri: préfixe `esriGeometry` + type GeoJSON sans `Multi`
pub fn esri_geometry_type(value: &GeoValue) -> Result<String, ConversionError> {
    let name = geojson_type(value);
    if matches!(value, GeoValue::GeometryCollection(_)) {
        return Err(ConversionError::UnsupportedType(name.to_string()));
    }
    Ok(format!(
        "{}{}",
        GEOMETRY_TYPE_PREFIX,
        name.trim_start_matches("Multi")
    ))
}

/// Positions minimales d'une ligne et d'un anneau (fermé)
const MIN_LINE_POSITIONS: usize = 2;
const MIN_RING_POSITIONS: usize = 4;

/// Vérifie la structure et chaque position avant conversion
fn check_positions(value: &GeoValue) -> Result<(), ConversionError> {
    match value {
        GeoValue::Point(p) => check_position(p),
        GeoValue::MultiPoint(ps) => {
            not_empty(ps, "MultiPoint")?;
            ps.iter().try_for_each(|p| check_position(p))
        }
        GeoValue::LineString(line) => check_line(line),
        GeoValue::MultiLineString(lines) => {
            not_empty(lines, "MultiLineString")?;
            lines.iter().try_for_each(|line| check_line(line))
        }
        GeoValue::Polygon(rings) => check_polygon(rings),
        GeoValue::MultiPolygon(polys) => {
            not_empty(polys, "MultiPolygon")?;
            polys.iter().try_for_each(|rings| check_polygon(rings))
        }
        GeoValue::GeometryCollection(_) => {
            Err(ConversionError::UnsupportedType("GeometryCollection".to_string()))
        }
    }
}

fn not_empty<T>(items: &[T], what: &str) -> Result<(), ConversionError> {
    if items.is_empty() {
        return Err(ConversionError::MalformedCoordinates(format!("empty {what}")));
    }
    Ok(())
}

fn check_line(line: &[Vec<f64>]) -> Result<(), ConversionError> {
    if line.len() < MIN_LINE_POSITIONS {
        return Err(ConversionError::MalformedCoordinates(format!(
            "line has {} position(s), expected at least {MIN_LINE_POSITIONS}",
            line.len()
        )));
    }
    line.iter().try_for_each(|p| check_position(p))
}

fn check_polygon(rings: &[Vec<Vec<f64>>]) -> Result<(), ConversionError> {
    not_empty(rings, "Polygon")?;
    for ring in rings {
        if ring.len() < MIN_RING_POSITIONS {
            return Err(ConversionError::MalformedCoordinates(format!(
                "ring has {} position(s), expected at least {MIN_RING_POSITIONS}",
                ring.len()
            )));
        }
        ring.iter().try_for_each(|p| check_position(p))?;
    }
    Ok(())
}

fn check_position(position: &[f64]) -> Result<(), ConversionError> {
    let [lon, lat, ..] = position else {
        return Err(ConversionError::MalformedCoordinates(format!(
            "position has {} ordinate(s), expected at least 2",
            position.len()
        )));
    };
    if !lon.is_finite() || !lat.is_finite() {
        return Err(ConversionError::MalformedCoordinates(format!(
            "non-finite position [{lon}, {lat}]"
        )));
    }
    if lat.abs() > 90.0 {
        return Err(ConversionError::MalformedCoordinates(format!(
            "latitude {lat} out of range"
        )));
    }
    Ok(())
}

//! Types Esri JSON (FeatureSet à une feature)

use geo::orient::{Direction, Orient};
use geo::{Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// WKID Esri de Web Mercator (alias historique de 3857)
pub const WEB_MERCATOR_WKID: u32 = 102100;

/// Référence spatiale Esri
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    #[serde(rename = "latestWkid", skip_serializing_if = "Option::is_none", default)]
    pub latest_wkid: Option<u32>,
    pub wkid: u32,
}

impl SpatialReference {
    /// Référence portée par chaque géométrie
    pub fn wkid(wkid: u32) -> Self {
        Self {
            latest_wkid: None,
            wkid,
        }
    }

    /// Référence de l'enveloppe: `{latestWkid: 3857, wkid: 102100}`
    pub fn web_mercator() -> Self {
        Self {
            latest_wkid: Some(3857),
            wkid: WEB_MERCATOR_WKID,
        }
    }
}

/// Géométrie Esri JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EsriGeometry {
    Point {
        x: f64,
        y: f64,
        #[serde(rename = "spatialReference")]
        spatial_reference: SpatialReference,
    },
    MultiPoint {
        points: Vec<[f64; 2]>,
        #[serde(rename = "spatialReference")]
        spatial_reference: SpatialReference,
    },
    Polyline {
        paths: Vec<Vec<[f64; 2]>>,
        #[serde(rename = "spatialReference")]
        spatial_reference: SpatialReference,
    },
    Polygon {
        rings: Vec<Vec<[f64; 2]>>,
        #[serde(rename = "spatialReference")]
        spatial_reference: SpatialReference,
    },
}

impl EsriGeometry {
    /// Construit la géométrie Esri depuis une géométrie déjà reprojetée
    ///
    /// Les anneaux extérieurs sont orientés dans le sens horaire, les trous
    /// dans le sens trigonométrique; les anneaux des multipolygones sont
    /// mis à plat.
    pub fn from_geo(geom: &Geometry, wkid: u32) -> Option<Self> {
        let spatial_reference = SpatialReference::wkid(wkid);
        let geometry = match geom {
            Geometry::Point(p) => Self::Point {
                x: p.x(),
                y: p.y(),
                spatial_reference,
            },
            Geometry::MultiPoint(mp) => Self::MultiPoint {
                points: mp.iter().map(|p| [p.x(), p.y()]).collect(),
                spatial_reference,
            },
            Geometry::LineString(ls) => Self::Polyline {
                paths: vec![path(ls)],
                spatial_reference,
            },
            Geometry::MultiLineString(mls) => Self::Polyline {
                paths: mls.iter().map(path).collect(),
                spatial_reference,
            },
            Geometry::Polygon(poly) => Self::Polygon {
                rings: rings(poly),
                spatial_reference,
            },
            Geometry::MultiPolygon(mp) => Self::Polygon {
                rings: mp.iter().flat_map(rings).collect(),
                spatial_reference,
            },
            _ => return None,
        };
        Some(geometry)
    }
}

fn path(ls: &LineString) -> Vec<[f64; 2]> {
    ls.coords().map(|c| [c.x, c.y]).collect()
}

fn rings(poly: &Polygon) -> Vec<Vec<[f64; 2]>> {
    let oriented = poly.orient(Direction::Reversed);
    std::iter::once(oriented.exterior())
        .chain(oriented.interiors())
        .map(path)
        .collect()
}

/// Feature Esri: géométrie + attributs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsriFeature {
    pub geometry: EsriGeometry,
    pub attributes: Map<String, Value>,
}

/// Description d'un champ de la FeatureSet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub alias: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
}

impl FieldDescriptor {
    /// Champ identifiant `FID`
    pub fn fid() -> Self {
        Self {
            alias: "FID".to_string(),
            field_type: "esriFieldTypeOID".to_string(),
            name: "FID".to_string(),
        }
    }
}

/// Enveloppe d'échange: une FeatureSet Esri contenant une seule feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsriEnvelope {
    pub features: Vec<EsriFeature>,
    pub fields: Vec<FieldDescriptor>,
    #[serde(rename = "geometryType")]
    pub geometry_type: String,
    #[serde(rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

impl EsriEnvelope {
    /// Géométrie de l'unique feature
    pub fn geometry(&self) -> Option<&EsriGeometry> {
        self.features.first().map(|f| &f.geometry)
    }
}

//! Types de données pour le crate shpfeed

use geojson::Geometry;
use serde_json::{Map, Value};

/// Attributs d'une feature (clé -> valeur JSON)
pub type Properties = Map<String, Value>;

/// Une feature lue depuis la source: géométrie GeoJSON et attributs
#[derive(Debug, Clone)]
pub struct Feature {
    /// Position de la feature dans la source (à partir de 0)
    pub index: usize,

    /// Géométrie, dans la projection du fichier source
    pub geometry: Geometry,

    /// Attributs issus du .dbf
    pub properties: Properties,
}

impl Feature {
    pub fn new(index: usize, geometry: Geometry, properties: Properties) -> Self {
        Self {
            index,
            geometry,
            properties,
        }
    }
}

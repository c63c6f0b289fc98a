//! Reprojection des géométries source (EPSG:4326) vers la cible (EPSG:3857)
//!
//! Web Mercator est calculé en Rust pur; la feature `reproject` ajoute un
//! repli sur PROJ pour les autres couples de projections.

mod ellipsoid;
pub mod mercator;
#[cfg(feature = "reproject")]
mod proj;

use anyhow::{bail, Result};
use geo::{Coord, CoordsIter, Geometry, MapCoords};

pub use ellipsoid::WGS84;
#[cfg(feature = "reproject")]
pub use self::proj::ProjReprojector;

/// EPSG des géométries lues dans le shapefile
pub const SOURCE_EPSG: u32 = 4326;

/// EPSG des géométries produites
pub const TARGET_EPSG: u32 = 3857;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Reprojection WGS84 → Web Mercator en Rust pur
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Transforme un point (lon, lat) en degrés
    pub fn transform_point(&self, lon: f64, lat: f64) -> (f64, f64) {
        mercator::geographic_to_web_mercator(Geographic::from_degrees(lon, lat))
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Geometry {
        geom.map_coords(|c| {
            let (x, y) = self.transform_point(c.x, c.y);
            Coord { x, y }
        })
    }
}

/// Reprojection intelligente
///
/// Web Mercator pur Rust en priorité, PROJ si la feature est activée.
pub enum SmartReprojector {
    /// Pas de reprojection (source == cible)
    Identity,
    /// WGS84 → Web Mercator (pur Rust)
    Lite(WebMercator),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(ProjReprojector),
}

impl SmartReprojector {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        if (source_epsg, target_epsg) == (SOURCE_EPSG, TARGET_EPSG) {
            return Ok(Self::Lite(WebMercator));
        }

        #[cfg(feature = "reproject")]
        {
            let proj = ProjReprojector::new(source_epsg, target_epsg)?;
            return Ok(Self::Proj(proj));
        }

        #[cfg(not(feature = "reproject"))]
        bail!(
            "Reprojection EPSG:{} → EPSG:{} non supportée sans PROJ.\n\
             Seul EPSG:4326 → EPSG:3857 est disponible en Rust pur.\n\
             Pour d'autres projections, compilez avec: cargo build --features reproject",
            source_epsg,
            target_epsg
        );
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite(lite) => {
                let out = lite.transform_geometry(geom);
                if all_finite(&out) {
                    Ok(out)
                } else {
                    bail!("Reprojection produced non-finite coordinates")
                }
            }
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity (pas de reprojection)",
            Self::Lite(_) => "web mercator (pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}

fn all_finite(geom: &Geometry) -> bool {
    geom.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

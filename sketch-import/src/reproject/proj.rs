//! Reprojection via PROJ (feature `reproject`)

use anyhow::{anyhow, Context, Result};
use geo::{Coord, Geometry, MapCoords};
use proj::Proj;

/// Reprojection entre deux codes EPSG quelconques
pub struct ProjReprojector {
    proj: Proj,
    pair: (u32, u32),
}

impl ProjReprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let proj = Proj::new_known_crs(
            &format!("EPSG:{}", source_epsg),
            &format!("EPSG:{}", target_epsg),
            None,
        )
        .with_context(|| format!("PROJ cannot build EPSG:{} → EPSG:{}", source_epsg, target_epsg))?;

        Ok(Self {
            proj,
            pair: (source_epsg, target_epsg),
        })
    }

    /// Couple (source, cible)
    pub fn epsg_pair(&self) -> (u32, u32) {
        self.pair
    }

    /// Transforme chaque coordonnée; la première position rejetée par PROJ
    /// fait échouer toute la géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        geom.try_map_coords(|c| {
            let (x, y) = self
                .proj
                .convert((c.x, c.y))
                .map_err(|e| anyhow!("[{}, {}]: {}", c.x, c.y, e))?;
            Ok(Coord { x, y })
        })
    }
}

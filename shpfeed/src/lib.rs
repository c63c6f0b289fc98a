//! # shpfeed
//!
//! Source de features paresseuse au-dessus des shapefiles ESRI.
//!
//! ## Features
//!
//! - Lecture séquentielle (.shp + .dbf) dans une tâche bloquante dédiée
//! - Géométries exposées en GeoJSON (`geojson::Geometry`)
//! - Attributs dBase convertis en valeurs JSON
//! - Localisation du fichier de projection (.prj)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shpfeed::{FeatureSource, ShapefileSource};
//! use std::path::Path;
//!
//! let mut source = ShapefileSource::open(Path::new("zones.shp"))?;
//! while let Some(feature) = source.next_feature().await? {
//!     println!("{}: {:?}", feature.index, feature.properties);
//! }
//! ```

pub mod error;
pub mod source;
pub mod types;
pub mod value;

pub use error::ShpError;
pub use source::{FeatureSource, MemorySource, ShapefileSource};
pub use types::{Feature, Properties};

use std::path::{Path, PathBuf};

/// Chemin du fichier de projection associé (même nom, extension `.prj`)
pub fn projection_path(path: &Path) -> PathBuf {
    path.with_extension("prj")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_path() {
        assert_eq!(
            projection_path(Path::new("data/zones.shp")),
            PathBuf::from("data/zones.prj")
        );
        assert_eq!(
            projection_path(Path::new("/tmp/my.layer.shp")),
            PathBuf::from("/tmp/my.layer.prj")
        );
        assert_eq!(projection_path(Path::new("zones")), PathBuf::from("zones.prj"));
    }
}

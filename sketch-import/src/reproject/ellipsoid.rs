//! Constantes d'ellipsoïde

/// Ellipsoïde WGS84
pub struct WGS84;

impl WGS84 {
    /// Demi-grand axe en mètres, rayon de la sphère Web Mercator
    pub const A: f64 = 6378137.0;
}

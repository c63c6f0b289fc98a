//! Projection Web Mercator (EPSG:3857)
//!
//! Aussi connu sous le nom de Pseudo-Mercator ou Spherical Mercator.
//! Les coordonnées Esri `wkid: 102100` sont identiques.

use super::ellipsoid::WGS84;
use super::Geographic;

/// Latitude limite de la projection (carré de 2πR de côté)
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Convertit coordonnées géographiques vers Web Mercator (EPSG:3857)
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    // Web Mercator utilise un modèle sphérique avec le rayon équatorial
    let r = WGS84::A;

    // Limiter la latitude pour éviter l'infini
    let lat = geo
        .lat
        .clamp(-MAX_LATITUDE.to_radians(), MAX_LATITUDE.to_radians());

    // X = R * longitude
    let x = r * geo.lon;

    // Y = R * ln(tan(π/4 + lat/2))
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin() {
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(0.0, 0.0));
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn test_antimeridian_extent() {
        // 180°E = demi-circonférence équatoriale
        let (x, _) = geographic_to_web_mercator(Geographic::from_degrees(180.0, 0.0));
        assert!((x - 20037508.342789244).abs() < 1e-6, "x={}", x);

        // La latitude limite donne un carré
        let (_, y) = geographic_to_web_mercator(Geographic::from_degrees(0.0, MAX_LATITUDE));
        assert!((y - 20037508.342789244).abs() < 1e-3, "y={}", y);
    }

    #[test]
    fn test_pole_is_clamped() {
        let (_, y) = geographic_to_web_mercator(Geographic::from_degrees(0.0, 90.0));
        assert!(y.is_finite());
    }

    #[test]
    fn test_santa_barbara() {
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(-119.7, 34.4));
        assert!((x - -13324943.048).abs() < 0.01, "x={}", x);
        assert!((y - 4082639.550).abs() < 0.01, "y={}", y);
    }
}

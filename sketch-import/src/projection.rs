//! Vérification de la projection d'un shapefile via son fichier `.prj`

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

/// EPSG attendu pour les géométries source
pub const EXPECTED_EPSG: u32 = 4326;

/// Résultat de la vérification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionStatus {
    /// Le `.prj` décrit EPSG:4326
    Verified,
    /// Le `.prj` décrit une autre référence spatiale
    Mismatch(u32),
    /// Le `.prj` existe mais la référence n'a pas pu être identifiée
    Unidentified,
    /// Pas de `.prj` lisible
    Missing,
}

impl ProjectionStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl fmt::Display for ProjectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => write!(f, "EPSG:{}", EXPECTED_EPSG),
            Self::Mismatch(epsg) => write!(f, "EPSG:{}", epsg),
            Self::Unidentified => write!(f, "unidentified spatial reference"),
            Self::Missing => write!(f, "no .prj file"),
        }
    }
}

/// Vérifie la projection déclarée à côté du fichier principal
///
/// Un `.prj` absent ou illisible n'est pas une erreur: la projection est
/// simplement inconnue.
pub fn check_projection(path: &Path) -> ProjectionStatus {
    let prj_path = shpfeed::projection_path(path);
    let bytes = match std::fs::read(&prj_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %prj_path.display(), error = %e, "No readable .prj file");
            return ProjectionStatus::Missing;
        }
    };

    let wkt = String::from_utf8_lossy(&bytes);
    let status = match parse_srid(&wkt) {
        Some(EXPECTED_EPSG) => ProjectionStatus::Verified,
        Some(epsg) => ProjectionStatus::Mismatch(epsg),
        None => ProjectionStatus::Unidentified,
    };

    if !status.is_verified() {
        warn!(path = %prj_path.display(), status = %status, "Projection is not EPSG:4326");
    }
    status
}

fn authority_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:AUTHORITY|ID)\s*\[\s*"EPSG"\s*,\s*"?(\d+)"?"#)
            .expect("valid authority regex")
    })
}

fn wgs84_datum_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)DATUM\s*\[\s*"(?:D_)?(?:WGS_1984|WGS 1984|WGS84|WGS 84|World Geodetic System 1984)""#)
            .expect("valid datum regex")
    })
}

/// Identifie le code EPSG d'une définition WKT
///
/// L'autorité du CRS le plus externe est prioritaire. À défaut, un CRS
/// géographique sur le datum WGS 84 est reconnu comme 4326 (cas des `.prj`
/// ESRI, qui ne portent pas d'autorité).
pub fn parse_srid(wkt: &str) -> Option<u32> {
    let wkt = wkt.trim_start_matches('\u{feff}').trim();

    let outer = authority_regex()
        .captures_iter(wkt)
        .filter(|caps| caps.get(0).is_some_and(|m| depth_at(wkt, m.start()) == 1))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .last();
    if outer.is_some() {
        return outer;
    }

    let keyword = wkt
        .split(|c: char| c == '[' || c == '(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();
    let geographic = matches!(keyword.as_str(), "GEOGCS" | "GEOGCRS" | "GEODCRS" | "GEOGRAPHICCRS");

    if geographic && wgs84_datum_regex().is_match(wkt) {
        return Some(EXPECTED_EPSG);
    }
    None
}

/// Profondeur d'imbrication des crochets à une position donnée
fn depth_at(wkt: &str, pos: usize) -> i32 {
    let mut depth = 0;
    let mut in_quotes = false;
    for c in wkt[..pos].chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' | '(' if !in_quotes => depth += 1,
            ']' | ')' if !in_quotes => depth -= 1,
            _ => {}
        }
    }
    depth
}

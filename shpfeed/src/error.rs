//! Types d'erreurs pour le crate shpfeed

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un shapefile
#[derive(Debug, Error)]
pub enum ShpError {
    /// Erreur d'I/O lors de l'ouverture ou de la lecture
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fichier .shp/.dbf illisible ou corrompu
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// Forme sans équivalent GeoJSON (NullShape, Multipatch...)
    #[error("Unsupported shape at feature {index}: {reason}")]
    UnsupportedShape { index: usize, reason: String },

    /// La tâche de lecture s'est arrêtée de manière inattendue
    #[error("Reader task stopped: {0}")]
    ReaderStopped(String),
}

impl ShpError {
    /// Crée une erreur de forme non supportée
    pub fn unsupported_shape(index: usize, reason: impl Into<String>) -> Self {
        Self::UnsupportedShape {
            index,
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur ne concerne qu'une feature (la lecture peut continuer)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnsupportedShape { .. })
    }

    /// Index de la feature concernée, si l'erreur est locale à une feature
    pub fn feature_index(&self) -> Option<usize> {
        match self {
            Self::UnsupportedShape { index, .. } => Some(*index),
            _ => None,
        }
    }
}

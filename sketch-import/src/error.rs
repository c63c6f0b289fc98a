//! Types d'erreurs de l'import

use thiserror::Error;

use crate::geometry::ConversionError;

/// Erreurs pouvant survenir pendant un import
///
/// Les erreurs locales à une feature sont collectées par le pipeline;
/// les erreurs fatales (`is_fatal`) interrompent le run immédiatement.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Géométrie non convertible
    #[error("Geometry conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// Entité référencée introuvable (classe de sketch)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Attribut obligatoire absent
    #[error("Missing required property: {0}")]
    MissingField(String),

    /// Attribut présent mais inutilisable
    #[error("Invalid property {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// Échec de la fonction de mapping
    #[error("Mapping failed: {0:#}")]
    Mapping(anyhow::Error),

    /// Géométrie refusée pour la classe cible
    #[error("Geometry {geometry_type} rejected for sketch class {class_id}: {reason}")]
    Incompatible {
        geometry_type: String,
        class_id: String,
        reason: String,
    },

    /// Échec du stockage
    #[error("Store error: {0:#}")]
    Store(anyhow::Error),

    /// Échec de la source de features
    #[error("Source error: {0}")]
    Source(#[from] shpfeed::ShpError),

    /// Échec de l'interaction utilisateur
    #[error("Prompt failed: {0:#}")]
    Prompt(anyhow::Error),
}

impl ImportError {
    /// Crée une erreur d'entité introuvable
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Crée une erreur d'attribut invalide
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur doit interrompre le run sans attendre la fin de la lecture
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::Store(_) | Self::Prompt(_) => true,
            Self::Source(e) => !e.is_recoverable(),
            _ => false,
        }
    }
}

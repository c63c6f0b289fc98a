//! Fonctions de mapping appliquées à chaque feature avant construction
//!
//! Un mapper reçoit la géométrie source et les attributs bruts; il retourne
//! les attributs transformés, ou `None` pour rejeter la feature.

use anyhow::Result;
use async_trait::async_trait;
use geojson::Geometry;

use crate::model::Properties;

/// Transformation (ou rejet) des attributs d'une feature
#[async_trait]
pub trait FeatureMapper: Send + Sync {
    async fn map(&self, geometry: &Geometry, properties: Properties) -> Result<Option<Properties>>;
}

/// Transmet les attributs tels quels
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMapper;

#[async_trait]
impl FeatureMapper for IdentityMapper {
    async fn map(&self, _geometry: &Geometry, properties: Properties) -> Result<Option<Properties>> {
        Ok(Some(properties))
    }
}

/// Mapper construit depuis une closure synchrone
pub struct FnMapper<F>(pub F);

#[async_trait]
impl<F> FeatureMapper for FnMapper<F>
where
    F: Fn(&Geometry, Properties) -> Result<Option<Properties>> + Send + Sync,
{
    async fn map(&self, geometry: &Geometry, properties: Properties) -> Result<Option<Properties>> {
        (self.0)(geometry, properties)
    }
}

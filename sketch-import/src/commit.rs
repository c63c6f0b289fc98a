//! Écriture des sketches acceptés
//!
//! Chaque sketch est écrit en deux temps: sa géométrie volumineuse d'abord,
//! puis le sketch qui la référence. Les écritures sont séquentielles et
//! suivent l'ordre de lecture. Il n'y a pas de rollback global: un échec
//! laisse en place les sketches déjà écrits.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::ImportError;
use crate::model::PendingRecord;
use crate::store::SketchStore;

/// Choix de l'utilisateur une fois la lecture terminée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum CommitChoice {
    /// Ne rien écrire
    Cancel,
    /// Écrire uniquement le premier sketch accepté
    Sample,
    /// Tout écrire
    All,
}

/// Sketch écrit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedSketch {
    pub sketch_id: String,
    pub geometry_id: String,
}

/// Résultat d'un commit complet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub committed: Vec<CommittedSketch>,
}

/// Échec au milieu d'un commit
#[derive(Debug, Error)]
#[error("Commit failed at record {position} ({} already committed): {source}", .committed.len())]
pub struct CommitError {
    /// Position (0-based) du sketch en échec dans la liste acceptée
    pub position: usize,
    /// Sketches écrits avant l'échec
    pub committed: Vec<CommittedSketch>,
    /// Géométrie restée sans sketch (suppression de compensation ratée)
    pub orphaned: Option<String>,
    #[source]
    pub source: ImportError,
}

/// Gestionnaire de commit
pub struct CommitManager {
    store: Arc<dyn SketchStore>,
}

impl CommitManager {
    pub fn new(store: Arc<dyn SketchStore>) -> Self {
        Self { store }
    }

    /// Écrit les sketches sélectionnés par `choice`
    pub async fn commit(
        &self,
        records: &[PendingRecord],
        choice: CommitChoice,
    ) -> Result<CommitOutcome, CommitError> {
        let selected = match choice {
            CommitChoice::Cancel => &records[..0],
            CommitChoice::Sample => &records[..records.len().min(1)],
            CommitChoice::All => records,
        };

        let total = selected.len();
        let mut outcome = CommitOutcome::default();

        for (position, record) in selected.iter().enumerate() {
            info!("Uploading sketch {}/{}", position + 1, total);

            match self.commit_one(record).await {
                Ok(sketch) => {
                    debug!(
                        sketch_id = %sketch.sketch_id,
                        geometry_id = %sketch.geometry_id,
                        "Sketch committed"
                    );
                    outcome.committed.push(sketch);
                }
                Err((source, orphaned)) => {
                    error!(
                        position = position,
                        committed = outcome.committed.len(),
                        error = %source,
                        "Commit interrupted"
                    );
                    return Err(CommitError {
                        position,
                        committed: outcome.committed,
                        orphaned,
                        source,
                    });
                }
            }
        }

        info!(committed = outcome.committed.len(), "Commit complete");
        Ok(outcome)
    }

    /// Géométrie puis sketch; en cas d'échec du sketch, la géométrie est
    /// supprimée et son id retourné si la suppression échoue aussi
    async fn commit_one(
        &self,
        record: &PendingRecord,
    ) -> Result<CommittedSketch, (ImportError, Option<String>)> {
        let blob = record
            .large_geometry()
            .map_err(|e| (ImportError::Store(e.into()), None))?;
        let geometry_id = self
            .store
            .create_large_geometry(&blob)
            .await
            .map_err(|e| (ImportError::Store(e), None))?;

        let sketch_result = match record.to_new_sketch(&geometry_id) {
            Ok(sketch) => self.store.create_sketch(&sketch).await,
            Err(e) => Err(e.into()),
        };

        match sketch_result {
            Ok(sketch_id) => Ok(CommittedSketch {
                sketch_id,
                geometry_id,
            }),
            Err(e) => {
                let orphaned = match self.store.delete_large_geometry(&geometry_id).await {
                    Ok(()) => {
                        debug!(geometry_id = %geometry_id, "Removed geometry of failed sketch");
                        None
                    }
                    Err(delete_err) => {
                        warn!(
                            geometry_id = %geometry_id,
                            error = %delete_err,
                            "Geometry left without sketch"
                        );
                        Some(geometry_id)
                    }
                };
                Err((ImportError::Store(e), orphaned))
            }
        }
    }
}

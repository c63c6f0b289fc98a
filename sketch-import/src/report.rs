//! Rapport d'un run d'import
//!
//! Collecte les compteurs, les erreurs par feature et le résultat du commit,
//! pour affichage console ou sauvegarde JSON.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::commit::{CommitChoice, CommitError, CommittedSketch};
use crate::error::ImportError;
use crate::pipeline::RunState;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Tous les sketches acceptés ont été écrits
    Committed,
    /// Seul le premier sketch a été écrit
    Sampled,
    /// Lecture complète, rien écrit à la demande de l'utilisateur
    Cancelled,
    /// Projection non confirmée, rien lu
    Declined,
    /// Erreurs de features, rien écrit
    Aborted,
    /// Commit interrompu
    Failed,
}

impl ImportStatus {
    /// Code de sortie du processus
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Aborted | Self::Failed => 1,
            _ => 0,
        }
    }
}

/// Erreur locale à une feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureFailure {
    /// Index (0-based) de la feature dans la source
    pub index: usize,
    pub message: String,
}

/// Rapport complet d'un run
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Fichier source
    pub source: String,
    /// Projection détectée
    pub projection: String,
    /// Durée du run
    pub duration_secs: f64,
    /// Statut global
    pub status: ImportStatus,
    /// Dernier état atteint
    pub state: RunState,
    /// Projection refusée par l'utilisateur
    pub declined: bool,

    // Compteurs
    pub features_read: usize,
    pub accepted: usize,
    pub rejected: usize,

    /// Erreurs par feature
    pub errors: Vec<FeatureFailure>,

    /// Choix de commit
    pub choice: Option<CommitChoice>,
    /// Sketches écrits
    pub committed: Vec<CommittedSketch>,
    /// Géométries restées sans sketch
    pub orphaned: Vec<String>,
    /// Cause de l'interruption du commit
    pub commit_error: Option<String>,
}

impl Default for ImportReport {
    fn default() -> Self {
        Self {
            source: String::new(),
            projection: String::new(),
            duration_secs: 0.0,
            status: ImportStatus::Cancelled,
            state: RunState::NotStarted,
            declined: false,
            features_read: 0,
            accepted: 0,
            rejected: 0,
            errors: Vec::new(),
            choice: None,
            committed: Vec::new(),
            orphaned: Vec::new(),
            commit_error: None,
        }
    }
}

impl ImportReport {
    /// Crée un rapport pour un fichier source
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// Enregistre l'erreur d'une feature
    pub fn record_error(&mut self, index: usize, error: &ImportError) {
        self.errors.push(FeatureFailure {
            index,
            message: error.to_string(),
        });
    }

    /// Enregistre un commit interrompu
    pub fn record_commit_failure(&mut self, error: CommitError) {
        self.commit_error = Some(error.to_string());
        self.orphaned.extend(error.orphaned);
        self.committed = error.committed;
    }

    /// Définit la durée du run
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Fixe l'état final et le statut correspondant
    pub fn finalize(&mut self, state: RunState) {
        self.state = state;
        self.status = match state {
            RunState::CommittedAll => ImportStatus::Committed,
            RunState::CommittedSample => ImportStatus::Sampled,
            RunState::Cancelled => ImportStatus::Cancelled,
            RunState::Aborted if self.declined => ImportStatus::Declined,
            RunState::Aborted => ImportStatus::Aborted,
            _ => ImportStatus::Failed,
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("IMPORT REPORT - {}", self.source);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Projection: {}", self.projection);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Features: {} read, {} accepted, {} rejected, {} errors",
            self.features_read,
            self.accepted,
            self.rejected,
            self.errors.len()
        );
        if let Some(choice) = self.choice {
            println!("Commit: {:?}, {} sketches written", choice, self.committed.len());
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                println!("  [feature {}] {}", e.index, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        if let Some(ref message) = self.commit_error {
            println!("\n--- COMMIT FAILED ---");
            println!("  {}", message);
        }

        if !self.orphaned.is_empty() {
            println!("\n--- ORPHANED GEOMETRIES ({}) ---", self.orphaned.len());
            for id in &self.orphaned {
                println!("  {}", id);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {:?}, {} accepted, {} rejected, {} errors, {} committed",
            self.source,
            self.status,
            self.accepted,
            self.rejected,
            self.errors.len(),
            self.committed.len()
        )
    }
}

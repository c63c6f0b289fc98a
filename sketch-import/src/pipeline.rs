//! Pipeline d'import: projection, lecture, classification puis commit
//!
//! Les erreurs locales à une feature sont collectées jusqu'à la fin de la
//! lecture; une seule suffit pour que rien ne soit écrit. Les features
//! rejetées par le mapping ne sont que comptées.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use shpfeed::{Feature, FeatureSource};
use tracing::{debug, error, info, warn};

use crate::builder::{GeometryRule, RecordBuilder};
use crate::cache::ReferenceCache;
use crate::commit::{CommitChoice, CommitManager};
use crate::error::ImportError;
use crate::geometry::GeometryConverter;
use crate::mapping::FeatureMapper;
use crate::model::PendingRecord;
use crate::projection::check_projection;
use crate::prompt::Prompter;
use crate::report::ImportReport;
use crate::store::SketchStore;

/// États d'un run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    ValidatingProjection,
    Reading,
    ErrorsFound,
    AwaitingCommitChoice,
    Aborted,
    Cancelled,
    CommittedSample,
    CommittedAll,
    CommitFailed,
}

impl RunState {
    /// Passe à l'état suivant
    fn advance(&mut self, next: RunState) {
        info!(from = ?*self, to = ?next, "Run state");
        *self = next;
    }

    /// Vrai si plus aucune transition n'est possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Aborted
                | Self::Cancelled
                | Self::CommittedSample
                | Self::CommittedAll
                | Self::CommitFailed
        )
    }
}

/// Issue du traitement d'une feature
enum Outcome {
    Accepted(PendingRecord),
    Rejected,
}

/// Pipeline d'import
pub struct ImportPipeline {
    cache: Arc<ReferenceCache>,
    converter: GeometryConverter,
    builder: RecordBuilder,
    committer: CommitManager,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn SketchStore>) -> Self {
        let cache = Arc::new(ReferenceCache::new(Arc::clone(&store)));
        Self {
            builder: RecordBuilder::new(Arc::clone(&cache)),
            converter: GeometryConverter::new(),
            committer: CommitManager::new(store),
            cache,
        }
    }

    /// Remplace le convertisseur (backend de reprojection)
    pub fn with_converter(mut self, converter: GeometryConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Contrôle de compatibilité géométrie/classe
    pub fn with_geometry_rule(mut self, rule: impl GeometryRule + 'static) -> Self {
        self.builder = self.builder.with_rule(rule);
        self
    }

    /// Valeur de `static_geometry` des sketches créés
    pub fn with_static_geometry(mut self, static_geometry: bool) -> Self {
        self.builder = self.builder.with_static_geometry(static_geometry);
        self
    }

    /// Cache des références du run courant
    pub fn cache(&self) -> &Arc<ReferenceCache> {
        &self.cache
    }

    /// Exécute un run complet
    ///
    /// Les erreurs fatales (classe introuvable, stockage, source illisible,
    /// prompt) sont propagées immédiatement. Tous les autres cas aboutissent
    /// à un rapport, dont le statut indique l'issue du run.
    pub async fn run(
        &self,
        path: &Path,
        source: &mut dyn FeatureSource,
        project_id: &str,
        user_id: &str,
        mapper: &dyn FeatureMapper,
        prompter: &dyn Prompter,
    ) -> Result<ImportReport, ImportError> {
        let start = Instant::now();
        let mut state = RunState::NotStarted;
        let mut report = ImportReport::new(&path.display().to_string());

        self.cache.reset().await;

        state.advance(RunState::ValidatingProjection);
        let projection = check_projection(path);
        report.projection = projection.to_string();
        if !projection.is_verified() {
            let proceed = prompter
                .confirm_projection(&projection)
                .await
                .map_err(ImportError::Prompt)?;
            if !proceed {
                warn!(projection = %projection, "Import declined");
                state.advance(RunState::Aborted);
                report.declined = true;
                return Ok(finish(report, state, start));
            }
        }

        state.advance(RunState::Reading);
        let mut accepted = Vec::new();

        loop {
            let feature = match source.next_feature().await {
                Ok(Some(feature)) => feature,
                Ok(None) => break,
                Err(e) => {
                    let index = e.feature_index();
                    let err = ImportError::from(e);
                    if err.is_fatal() {
                        error!(error = %err, "Source failed");
                        state.advance(RunState::Aborted);
                        return Err(err);
                    }
                    let index = index.unwrap_or(report.features_read);
                    report.features_read += 1;
                    report.record_error(index, &err);
                    continue;
                }
            };

            report.features_read += 1;
            let index = feature.index;
            debug!("Processing feature {}", index);

            match self.process(feature, project_id, user_id, mapper).await {
                Ok(Outcome::Accepted(record)) => {
                    report.accepted += 1;
                    accepted.push(record);
                }
                Ok(Outcome::Rejected) => {
                    debug!(index = index, "Feature rejected by mapping");
                    report.rejected += 1;
                }
                Err(err) if err.is_fatal() => {
                    error!(index = index, error = %err, "Import stopped");
                    state.advance(RunState::Aborted);
                    return Err(err);
                }
                Err(err) => {
                    warn!(index = index, error = %err, "Feature failed");
                    report.record_error(index, &err);
                }
            }
        }

        info!(
            read = report.features_read,
            accepted = report.accepted,
            rejected = report.rejected,
            errors = report.errors.len(),
            "Reading complete"
        );

        if !report.errors.is_empty() {
            state.advance(RunState::ErrorsFound);
            for failure in &report.errors {
                error!(index = failure.index, "{}", failure.message);
            }
            state.advance(RunState::Aborted);
            return Ok(finish(report, state, start));
        }

        state.advance(RunState::AwaitingCommitChoice);
        let choice = if accepted.is_empty() {
            info!("Nothing to commit");
            CommitChoice::Cancel
        } else {
            prompter
                .choose_commit(accepted.len())
                .await
                .map_err(ImportError::Prompt)?
        };
        report.choice = Some(choice);

        if choice == CommitChoice::Cancel {
            state.advance(RunState::Cancelled);
            return Ok(finish(report, state, start));
        }

        match self.committer.commit(&accepted, choice).await {
            Ok(outcome) => {
                report.committed = outcome.committed;
                state.advance(match choice {
                    CommitChoice::Sample => RunState::CommittedSample,
                    _ => RunState::CommittedAll,
                });
            }
            Err(err) => {
                report.record_commit_failure(err);
                state.advance(RunState::CommitFailed);
            }
        }

        Ok(finish(report, state, start))
    }

    /// Mapping, conversion puis construction d'une feature
    async fn process(
        &self,
        feature: Feature,
        project_id: &str,
        user_id: &str,
        mapper: &dyn FeatureMapper,
    ) -> Result<Outcome, ImportError> {
        let Feature {
            geometry,
            properties,
            ..
        } = feature;

        let Some(properties) = mapper
            .map(&geometry, properties)
            .await
            .map_err(ImportError::Mapping)?
        else {
            return Ok(Outcome::Rejected);
        };

        let envelope = self.converter.convert(&geometry, &properties)?;
        let record = self
            .builder
            .build(envelope, &geometry, properties, project_id, user_id)
            .await?;
        Ok(Outcome::Accepted(record))
    }
}

fn finish(mut report: ImportReport, state: RunState, start: Instant) -> ImportReport {
    report.set_duration(start.elapsed());
    report.finalize(state);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FnMapper, IdentityMapper};
    use crate::projection::ProjectionStatus;
    use crate::prompt::FixedPrompter;
    use crate::report::ImportStatus;
    use crate::store::MemoryStore;
    use anyhow::Result;
    use geojson::Geometry;
    use serde_json::{json, Value};
    use shpfeed::{MemorySource, Properties};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WGS84: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    /// Compte les appels au prompter
    struct CountingPrompter {
        inner: FixedPrompter,
        projection_calls: AtomicUsize,
        commit_calls: AtomicUsize,
    }

    impl CountingPrompter {
        fn new(accept_projection: bool, choice: CommitChoice) -> Self {
            Self {
                inner: FixedPrompter::new(accept_projection, choice),
                projection_calls: AtomicUsize::new(0),
                commit_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Prompter for CountingPrompter {
        async fn confirm_projection(&self, status: &ProjectionStatus) -> Result<bool> {
            self.projection_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.confirm_projection(status).await
        }

        async fn choose_commit(&self, accepted: usize) -> Result<CommitChoice> {
            self.commit_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.choose_commit(accepted).await
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        shp: std::path::PathBuf,
        store: Arc<MemoryStore>,
        pipeline: ImportPipeline,
    }

    fn fixture(with_prj: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let shp = dir.path().join("zones.shp");
        if with_prj {
            std::fs::write(dir.path().join("zones.prj"), WGS84).unwrap();
        }
        let store = Arc::new(MemoryStore::new());
        store.add_class("c1", "Zones").unwrap();
        store.add_attribute("attr-area", "c1", "AREA").unwrap();
        let pipeline = ImportPipeline::new(store.clone());
        Fixture {
            _dir: dir,
            shp,
            store,
            pipeline,
        }
    }

    fn point(x: f64, y: f64) -> Geometry {
        Geometry::new(geojson::Value::Point(vec![x, y]))
    }

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn source(count: usize) -> MemorySource {
        MemorySource::new(
            (0..count)
                .map(|i| {
                    (
                        point(i as f64, 10.0),
                        props(json!({"SKETCH_CLASS_ID": "c1", "NAME": format!("f{}", i), "AREA": i})),
                    )
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_mapping_error_blocks_commit() {
        let f = fixture(true);
        let mut source = MemorySource::new(vec![
            (point(1.0, 1.0), props(json!({"SKETCH_CLASS_ID": "c1", "KEY": "A"}))),
            (point(2.0, 2.0), props(json!({"SKETCH_CLASS_ID": "c1", "KEY": "B"}))),
        ]);
        let mapper = FnMapper(|_: &Geometry, props: Properties| -> Result<Option<Properties>> {
            if props.get("KEY") == Some(&json!("B")) {
                anyhow::bail!("cannot map B");
            }
            Ok(Some(props))
        });
        let prompter = CountingPrompter::new(true, CommitChoice::All);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &mapper, &prompter)
            .await
            .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 1);
        assert!(report.errors[0].message.contains("cannot map B"));
        assert_eq!(report.accepted, 1);
        assert_eq!(report.state, RunState::Aborted);
        assert_eq!(report.status, ImportStatus::Aborted);
        assert_eq!(prompter.commit_calls.load(Ordering::SeqCst), 0);
        assert!(report.committed.is_empty());
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_declined_projection_reads_nothing() {
        let f = fixture(false);
        let mut source = source(3);
        let prompter = CountingPrompter::new(false, CommitChoice::All);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap();

        assert_eq!(prompter.projection_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.reads(), 0);
        assert_eq!(report.status, ImportStatus::Declined);
        assert_eq!(report.projection, "no .prj file");
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_verified_projection_is_not_prompted() {
        let f = fixture(true);
        let mut source = source(2);
        let prompter = CountingPrompter::new(false, CommitChoice::All);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap();

        assert_eq!(prompter.projection_calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.status, ImportStatus::Committed);
        assert_eq!(report.state, RunState::CommittedAll);
        assert_eq!(report.committed.len(), 2);
        assert_eq!(f.store.sketches().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_features_are_counted() {
        let f = fixture(true);
        let mut source = source(4);
        let mapper = FnMapper(|_: &Geometry, props: Properties| -> Result<Option<Properties>> {
            let keep = props.get("AREA").and_then(Value::as_u64).is_some_and(|a| a % 2 == 0);
            Ok(keep.then_some(props))
        });
        let prompter = CountingPrompter::new(true, CommitChoice::All);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &mapper, &prompter)
            .await
            .unwrap();

        assert_eq!(report.features_read, 4);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected, 2);
        assert!(report.errors.is_empty());
        let names: Vec<_> = f
            .store
            .sketches()
            .into_iter()
            .map(|(_, s)| s.name.unwrap())
            .collect();
        assert_eq!(names, ["f0", "f2"]);
    }

    #[tokio::test]
    async fn test_commit_sample() {
        let f = fixture(true);
        let mut source = source(3);
        let prompter = CountingPrompter::new(true, CommitChoice::Sample);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::CommittedSample);
        assert_eq!(report.status, ImportStatus::Sampled);
        assert_eq!(report.committed.len(), 1);
        assert_eq!(f.store.sketches()[0].1.name.as_deref(), Some("f0"));
    }

    #[tokio::test]
    async fn test_commit_cancel() {
        let f = fixture(true);
        let mut source = source(3);
        let prompter = CountingPrompter::new(true, CommitChoice::Cancel);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Cancelled);
        assert_eq!(report.accepted, 3);
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_class_is_fatal() {
        let f = fixture(true);
        let mut source = MemorySource::new(vec![
            (point(0.0, 0.0), props(json!({"SKETCH_CLASS_ID": "nope"}))),
            (point(1.0, 1.0), props(json!({"SKETCH_CLASS_ID": "c1"}))),
        ]);
        let prompter = CountingPrompter::new(true, CommitChoice::All);

        let err = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::NotFound { .. }));
        assert_eq!(source.reads(), 1);
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_conversion_and_shape_errors_are_collected() {
        let f = fixture(true);
        let mut source = MemorySource::new(vec![(
            point(0.0, 120.0),
            props(json!({"SKETCH_CLASS_ID": "c1"})),
        )]);
        source.push_error(shpfeed::ShpError::unsupported_shape(1, "Multipatch"));
        source.push(point(1.0, 1.0), props(json!({"SKETCH_CLASS_ID": "c1"})));
        let prompter = CountingPrompter::new(true, CommitChoice::All);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap();

        let indexes: Vec<_> = report.errors.iter().map(|e| e.index).collect();
        assert_eq!(indexes, [0, 1]);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.features_read, 3);
        assert_eq!(report.status, ImportStatus::Aborted);
    }

    #[tokio::test]
    async fn test_reader_stopped_aborts_before_commit() {
        let f = fixture(true);
        let mut source = MemorySource::new(vec![(
            point(1.0, 1.0),
            props(json!({"SKETCH_CLASS_ID": "c1"})),
        )]);
        source.push_error(shpfeed::ShpError::ReaderStopped("task panicked".into()));
        source.push(point(2.0, 2.0), props(json!({"SKETCH_CLASS_ID": "c1"})));
        let prompter = CountingPrompter::new(true, CommitChoice::All);

        let err = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, ImportError::Source(shpfeed::ShpError::ReaderStopped(_))));
        assert_eq!(prompter.commit_calls.load(Ordering::SeqCst), 0);
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_skips_commit_prompt() {
        let f = fixture(true);
        let mut source = MemorySource::new(Vec::new());
        let prompter = CountingPrompter::new(true, CommitChoice::All);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap();

        assert_eq!(prompter.commit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.state, RunState::Cancelled);
    }

    #[tokio::test]
    async fn test_failed_commit_is_reported() {
        let f = fixture(true);
        let mut source = source(2);
        f.store.fail_sketch_writes(true).unwrap();
        let prompter = CountingPrompter::new(true, CommitChoice::All);

        let report = f
            .pipeline
            .run(&f.shp, &mut source, "p1", "u1", &IdentityMapper, &prompter)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::CommitFailed);
        assert_eq!(report.status, ImportStatus::Failed);
        assert!(report.commit_error.is_some());
        assert!(report.orphaned.is_empty());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Aborted.is_terminal());
        assert!(RunState::CommittedAll.is_terminal());
        assert!(!RunState::Reading.is_terminal());
        assert!(!RunState::AwaitingCommitChoice.is_terminal());
    }
}

//! Sources de features
//!
//! Une source est une séquence finie, paresseuse et non redémarrable:
//! chaque appel à `next_feature` avance d'une feature.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use geojson::Geometry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ShpError;
use crate::types::{Feature, Properties};
use crate::value::record_to_properties;

/// Taille du canal entre la tâche de lecture et le consommateur
const CHANNEL_CAPACITY: usize = 64;

type Item = Result<Feature, ShpError>;
type Starter = Box<dyn FnOnce(mpsc::Sender<Item>) + Send + 'static>;

/// Séquence paresseuse de features
#[async_trait]
pub trait FeatureSource: Send {
    /// Lit la feature suivante, `None` quand la source est épuisée
    async fn next_feature(&mut self) -> Result<Option<Feature>, ShpError>;
}

/// Source lisant un shapefile (.shp + .dbf)
///
/// La lecture (bloquante) tourne dans une tâche `spawn_blocking` démarrée au
/// premier appel à `next_feature`, et alimente un canal borné. Un arrêt
/// anormal de cette tâche remonte en `ShpError::ReaderStopped`.
pub struct ShapefileSource {
    path: PathBuf,
    starter: Option<Starter>,
    rx: Option<mpsc::Receiver<Item>>,
    reader: Option<JoinHandle<()>>,
}

impl ShapefileSource {
    /// Ouvre le shapefile. Aucune feature n'est lue à ce stade.
    pub fn open(path: &Path) -> Result<Self, ShpError> {
        let mut reader = shapefile::Reader::from_path(path)?;
        info!(path = %path.display(), "Opened shapefile");

        let starter: Starter = Box::new(move |tx: mpsc::Sender<Item>| {
            for (index, entry) in reader.iter_shapes_and_records().enumerate() {
                let item = match entry {
                    Ok((shape, record)) => shape_to_geometry(index, shape)
                        .map(|geometry| Feature::new(index, geometry, record_to_properties(record))),
                    Err(e) => Err(ShpError::from(e)),
                };
                let fatal = matches!(&item, Err(e) if !e.is_recoverable());
                if tx.blocking_send(item).is_err() || fatal {
                    // Consommateur parti ou fichier illisible: on s'arrête
                    break;
                }
            }
        });

        Ok(Self::with_starter(path, starter))
    }

    fn with_starter(path: &Path, starter: Starter) -> Self {
        Self {
            path: path.to_path_buf(),
            starter: Some(starter),
            rx: None,
            reader: None,
        }
    }

    /// Chemin du .shp
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FeatureSource for ShapefileSource {
    async fn next_feature(&mut self) -> Result<Option<Feature>, ShpError> {
        if let Some(start) = self.starter.take() {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            self.reader = Some(tokio::task::spawn_blocking(move || start(tx)));
            self.rx = Some(rx);
            debug!(path = %self.path.display(), "Started shapefile reader task");
        }

        let Some(rx) = self.rx.as_mut() else {
            return Ok(None);
        };

        match rx.recv().await {
            Some(item) => item.map(Some),
            None => {
                self.rx = None;
                // Canal fermé: fin de fichier ou tâche de lecture tombée
                match self.reader.take() {
                    Some(handle) => match handle.await {
                        Ok(()) => Ok(None),
                        Err(e) => {
                            warn!(path = %self.path.display(), error = %e, "Shapefile reader task failed");
                            Err(ShpError::ReaderStopped(e.to_string()))
                        }
                    },
                    None => Ok(None),
                }
            }
        }
    }
}

/// Convertit une forme shapefile en géométrie GeoJSON
fn shape_to_geometry(index: usize, shape: shapefile::Shape) -> Result<Geometry, ShpError> {
    let geometry = geo::Geometry::<f64>::try_from(shape)
        .map_err(|reason| ShpError::unsupported_shape(index, reason.to_string()))?;
    Ok(Geometry::new(geojson::Value::from(&geometry)))
}

/// Source en mémoire (tests, imports programmatiques)
#[derive(Debug, Default)]
pub struct MemorySource {
    items: VecDeque<Item>,
    next_index: usize,
    reads: usize,
}

impl MemorySource {
    /// Crée une source depuis des paires (géométrie, attributs)
    pub fn new(features: Vec<(Geometry, Properties)>) -> Self {
        let mut source = Self::default();
        for (geometry, properties) in features {
            source.push(geometry, properties);
        }
        source
    }

    /// Ajoute une feature en fin de séquence
    pub fn push(&mut self, geometry: Geometry, properties: Properties) {
        let index = self.next_index;
        self.next_index += 1;
        self.items
            .push_back(Ok(Feature::new(index, geometry, properties)));
    }

    /// Ajoute une erreur de lecture en fin de séquence
    pub fn push_error(&mut self, error: ShpError) {
        self.next_index += 1;
        self.items.push_back(Err(error));
    }

    /// Nombre d'appels à `next_feature` effectués
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl FeatureSource for MemorySource {
    async fn next_feature(&mut self) -> Result<Option<Feature>, ShpError> {
        self.reads += 1;
        self.items.pop_front().transpose()
    }
}

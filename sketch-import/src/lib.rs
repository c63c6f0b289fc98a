//! # sketch-import
//!
//! Import de features shapefile (EPSG:4326) sous forme de sketches, avec
//! géométries converties en Esri JSON (EPSG:3857).
//!
//! ## Features
//!
//! - Vérification de la projection (`.prj`) avant lecture
//! - Conversion GeoJSON → enveloppe Esri JSON reprojetée en Web Mercator
//! - Résolution et création des dossiers, mapping des attributs par classe
//! - Commit en deux temps (géométrie puis sketch) après confirmation
//! - Stockage PostgreSQL avec pool de connexions, ou en mémoire
//!
//! ## Usage CLI
//!
//! ```bash
//! sketch-import --path ./zones.shp --user <user-id> --project <project-id>
//! sketch-import --path ./zones.shp --user <u> --project <p> --mapping mapping.json --commit all
//! ```

pub mod builder;
pub mod cache;
pub mod commit;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod projection;
pub mod prompt;
pub mod report;
pub mod reproject;
pub mod store;

pub use builder::{AcceptAnyGeometry, GeometryRule, RecordBuilder};
pub use cache::ReferenceCache;
pub use commit::{CommitChoice, CommitManager, CommitOutcome};
pub use config::MappingConfig;
pub use error::ImportError;
pub use geometry::{ConversionError, EsriEnvelope, GeometryConverter};
pub use mapping::{FeatureMapper, FnMapper, IdentityMapper};
pub use pipeline::{ImportPipeline, RunState};
pub use projection::{check_projection, ProjectionStatus};
pub use prompt::{FixedPrompter, Prompter, TerminalPrompter};
pub use report::{ImportReport, ImportStatus};
pub use store::pool::{create_pool, DatabaseConfig};
pub use store::{MemoryStore, PgStore, SketchStore};

//! Arguments et implémentation de la commande d'import

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use sketch_import::commit::CommitChoice;
use sketch_import::mapping::{FeatureMapper, IdentityMapper};
use sketch_import::prompt::{FixedPrompter, Prompter, TerminalPrompter};
use sketch_import::reproject::{SmartReprojector, SOURCE_EPSG, TARGET_EPSG};
use sketch_import::store::pool::{create_pool, test_connection, DatabaseConfig};
use sketch_import::{GeometryConverter, ImportPipeline, ImportStatus, MappingConfig, PgStore};
use shpfeed::ShapefileSource;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the shapefile (.shp)
    #[arg(short, long)]
    pub path: PathBuf,

    /// Id of the user creating the sketches
    #[arg(long, env = "SKETCH_USER_ID")]
    pub user: String,

    /// Id of the project receiving the sketches
    #[arg(long, env = "SKETCH_PROJECT_ID")]
    pub project: String,

    /// JSON mapping file (default: properties are used as-is)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,

    /// Target PostgreSQL schema
    #[arg(long, default_value = "sketches")]
    pub schema: String,

    /// Save the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Commit choice, skips the interactive prompts
    #[arg(long, value_enum)]
    pub commit: Option<CommitChoice>,

    /// Accept a projection other than EPSG:4326 (with --commit)
    #[arg(long, requires = "commit")]
    pub yes: bool,

    /// Create sketches with editable geometries
    #[arg(long)]
    pub editable_geometry: bool,

    /// PostgreSQL connection URL (défaut : env DATABASE_URL)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / sketches)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub db_user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

/// Exécute un import complet et retourne son statut
pub async fn cmd_import(args: ImportArgs) -> Result<ImportStatus> {
    info!(
        path = %args.path.display(),
        project = %args.project,
        user = %args.user,
        schema = %args.schema,
        "Starting import"
    );

    let mapper: Box<dyn FeatureMapper> = match &args.mapping {
        Some(path) => {
            let config = MappingConfig::load(path)?;
            info!(mapping = %path.display(), fields = config.fields.len(), "Mapping loaded");
            Box::new(config)
        }
        None => Box::new(IdentityMapper),
    };

    let prompter: Box<dyn Prompter> = match args.commit {
        Some(choice) => Box::new(FixedPrompter::new(args.yes, choice)),
        None => Box::new(TerminalPrompter::stdio()),
    };

    let reprojector = SmartReprojector::new(SOURCE_EPSG, TARGET_EPSG)?;
    info!(reprojector = reprojector.description(), "Reprojection EPSG:{} → EPSG:{}", SOURCE_EPSG, TARGET_EPSG);

    // Connecter à PostgreSQL
    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, &args);
    println!("Database: {} (SSL: {:?})", db_config.display_target(), db_config.ssl_mode);

    let pool = create_pool(&db_config).await?;
    let version = test_connection(&pool).await?;
    println!("Connected to PostgreSQL {}", version);

    let store = Arc::new(PgStore::new(pool, &args.schema));
    store.ensure_schema().await?;

    let mut source = ShapefileSource::open(&args.path)
        .with_context(|| format!("Failed to open shapefile: {}", args.path.display()))?;

    let pipeline = ImportPipeline::new(store)
        .with_converter(GeometryConverter::with_reprojector(reprojector))
        .with_static_geometry(!args.editable_geometry);

    let report = pipeline
        .run(
            &args.path,
            &mut source,
            &args.project,
            &args.user,
            mapper.as_ref(),
            prompter.as_ref(),
        )
        .await?;

    report.display();
    if let Some(path) = &args.report {
        report.save_to_file(path)?;
        info!(path = %path.display(), "Report saved");
    }
    info!("{}", report.summary());

    Ok(report.status)
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: &ImportArgs) {
    if let Some(url) = &args.database_url {
        config.url = Some(url.clone());
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(database) = &args.database {
        config.dbname = database.clone();
    }
    if let Some(user) = &args.db_user {
        config.user = user.clone();
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = &args.ssl {
        if let Ok(mode) = ssl.parse() {
            config.ssl_mode = mode;
        }
    }
}

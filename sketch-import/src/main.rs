//! Point d'entrée CLI pour sketch-import

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::ImportArgs;

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Importer les features d'un shapefile sous forme de sketches
#[derive(Parser)]
#[command(name = "sketch-import")]
#[command(author, version)]
#[command(about = "Importer un shapefile (EPSG:4326) comme sketches Esri JSON (EPSG:3857)")]
#[command(long_about = "Lit un shapefile, vérifie sa projection, convertit chaque feature en sketch puis écrit les sketches acceptés après confirmation.\n\nUne seule erreur de feature suffit pour qu'aucun sketch ne soit écrit.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    import: ImportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    info!(path = %cli.import.path.display(), "Import shapefile");
    let status = cli::cmd_import(cli.import).await?;

    let code = status.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

mod config;
mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facelib_core::builder::{parse_embedding, scan_directory};
use facelib_core::{identify, save_csv, IdentityLibrary, LibrarySource, DEFAULT_THRESHOLD};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "facelib", about = "Face identity library and matching CLI")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "facelib.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the configured library and print its summary
    Info,
    /// Identify a comma-separated query embedding
    Match {
        #[arg(allow_hyphen_values = true)]
        vector: String,
        /// Override the configured threshold
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Compare two comma-separated embeddings
    Compare {
        #[arg(allow_hyphen_values = true)]
        a: String,
        #[arg(allow_hyphen_values = true)]
        b: String,
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
    },
    /// Write the configured library out as CSV
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List identity images under a directory and check that they decode
    Scan { dir: PathBuf },
    /// Answer queries from stdin, reloading the library when its source changes
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => {
            let config = Config::load(&cli.config)?;
            match config.library.build(None) {
                Ok((library, report)) => {
                    println!("{report}");
                    for skip in &report.skipped {
                        println!("  skipped {}: {}", skip.location, skip.reason);
                    }
                    print!("{}", library.summary(config.threshold));
                }
                Err(e) => {
                    println!("{}: {e}", config.library);
                    print!("{}", IdentityLibrary::new().summary(config.threshold));
                }
            }
        }
        Commands::Match { vector, threshold } => {
            let config = Config::load(&cli.config)?;
            let threshold = threshold.unwrap_or(config.threshold);
            let query = parse_embedding(&vector).context("parsing query embedding")?;
            let library = load_library(&config.library);
            let result = identify(&query, &library, threshold)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Compare { a, b, threshold } => {
            let a = parse_embedding(&a).context("parsing first embedding")?;
            let b = parse_embedding(&b).context("parsing second embedding")?;
            let distance = a.distance(&b)?;
            let similarity = a.similarity(&b)?;
            println!("distance:   {distance}");
            println!("similarity: {similarity}");
            if distance <= threshold {
                println!("same identity (distance <= {threshold})");
            } else {
                println!("different identities (distance > {threshold})");
            }
        }
        Commands::Export { output } => {
            let config = Config::load(&cli.config)?;
            let (library, report) = config
                .library
                .build(None)
                .with_context(|| format!("building library from {}", config.library))?;
            save_csv(&library, &output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{report}");
            println!("wrote {} entries to {}", library.len(), output.display());
        }
        Commands::Scan { dir } => scan(&dir)?,
        Commands::Serve => {
            let config = Config::load(&cli.config)?;
            serve::run(config).await?;
        }
    }

    Ok(())
}

/// Build `source`, continuing with an empty library if it cannot be built.
fn load_library(source: &LibrarySource) -> IdentityLibrary {
    match source.build(None) {
        Ok((library, _report)) => library,
        Err(e) => {
            tracing::warn!(
                source = %source,
                error = %e,
                "library build failed, continuing with an empty library"
            );
            IdentityLibrary::new()
        }
    }
}

fn scan(dir: &Path) -> Result<()> {
    let identities = scan_directory(dir).with_context(|| format!("scanning {}", dir.display()))?;
    if identities.is_empty() {
        println!("No identity directories under {}", dir.display());
        return Ok(());
    }

    for identity in &identities {
        println!("{} ({} images)", identity.name, identity.images.len());
        for path in &identity.images {
            let status = match image::open(path) {
                Ok(img) => format!("ok {}x{}", img.width(), img.height()),
                Err(e) => format!("undecodable: {e}"),
            };
            let file = path.file_name().map(|f| f.to_string_lossy()).unwrap_or_default();
            println!("  {file}: {status}");
        }
    }
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{Embedding, EmbeddingStore, FaceEngine, FaceService, SinkDispatcher};
use rollcall_onnx::OnnxEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

mod chroma;
mod config;
mod db;

use chroma::ChromaSink;
use config::Config;
use db::{FaceDb, StoredFace};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face enrollment and identification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the face in a photo under an identity
    Enroll {
        /// Identity key (e.g. student or staff ID)
        #[arg(long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
        id: String,
        /// Display name stored alongside the embedding
        #[arg(short, long)]
        name: String,
        /// Photo containing one clearly visible face
        image: PathBuf,
    },
    /// Find the enrolled identity closest to the face in a photo
    Identify {
        image: PathBuf,
    },
    /// Print or save the raw embedding of a photo
    Embed {
        image: PathBuf,
        /// Write little-endian f32 bytes to this file instead of printing JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List enrolled faces
    List,
    /// Remove every enrollment of an identity
    Remove {
        id: String,
    },
    /// Show configuration and model status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Enroll { id, name, image } => enroll(&config, id, name, image).await,
        Commands::Identify { image } => identify(&config, image).await,
        Commands::Embed { image, out } => embed(&config, image, out).await,
        Commands::List => list(&config),
        Commands::Remove { id } => remove(&config, &id).await,
        Commands::Status => status(&config),
    }
}

fn open_db(config: &Config) -> Result<FaceDb> {
    FaceDb::open(&config.db_path).with_context(|| format!("opening {}", config.db_path.display()))
}

fn load_engine(config: &Config) -> Result<OnnxEngine> {
    OnnxEngine::load(&config.model_paths(), config.intra_threads)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))
}

fn read_image(path: &Path) -> Result<image::RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("decoding {}", path.display()))?
        .to_rgb8())
}

/// The optional vector-database sink. Building it does no I/O.
fn chroma_sink(config: &Config) -> Option<Arc<ChromaSink>> {
    let url = config.chroma_url.as_deref()?;
    let timeout = Duration::from_millis(config.sink_grace_ms);
    match ChromaSink::new(url, &config.chroma_collection, timeout) {
        Ok(sink) => Some(Arc::new(sink)),
        Err(err) => {
            tracing::warn!(url, error = %err, "vector sink disabled");
            None
        }
    }
}

/// Persist a new enrollment locally, then publish it to the gallery and the sink.
///
/// The sink only sees records that made it into the database.
fn commit_enrollment<E: FaceEngine>(
    service: &FaceService<E>,
    db: &FaceDb,
    identity: &str,
    name: &str,
    embedding: &Embedding,
) -> Result<(StoredFace, Option<JoinHandle<()>>)> {
    let stored = db.insert(identity, name, embedding)?;
    service.add_embedding(embedding, identity)?;
    let delivery = service.store_in_sink(identity, embedding, name);
    Ok((stored, delivery))
}

async fn enroll(config: &Config, id: String, name: String, image: PathBuf) -> Result<()> {
    let db = open_db(config)?;
    let store = Arc::new(db.load_store()?);
    let mut service = FaceService::new(load_engine(config)?, store);
    if let Some(sink) = chroma_sink(config) {
        service = service.with_sink(SinkDispatcher::on_current_runtime(sink)?);
    }
    let service = Arc::new(service);

    let img = read_image(&image)?;
    let worker = Arc::clone(&service);
    let embedding =
        tokio::task::spawn_blocking(move || worker.pipeline().try_generate_embedding(&img))
            .await
            .context("pipeline worker panicked")??;

    let Some(embedding) = embedding else {
        anyhow::bail!("no face detected in {}", image.display());
    };

    let (stored, delivery) = commit_enrollment(&service, &db, &id, &name, &embedding)?;
    println!("Enrolled {} ({}) as record {}", name, id, stored.id);

    if let Some(delivery) = delivery {
        let grace = Duration::from_millis(config.sink_grace_ms);
        if tokio::time::timeout(grace, delivery).await.is_err() {
            tracing::debug!(?grace, "sink delivery still pending at exit");
        }
    }
    Ok(())
}

async fn identify(config: &Config, image: PathBuf) -> Result<()> {
    let db = open_db(config)?;
    let faces = db.load_all()?;
    let store = Arc::new(db.load_store()?);
    let service = Arc::new(FaceService::new(load_engine(config)?, store));

    let img = read_image(&image)?;
    let worker = Arc::clone(&service);
    let result = tokio::task::spawn_blocking(move || worker.identify(&img))
        .await
        .context("pipeline worker panicked")??;

    let output = match result {
        None => serde_json::json!({ "face_found": false, "matched": false }),
        Some(m) => {
            let matched = m.accepted(config.similarity_threshold);
            let identity = (!m.is_no_match()).then_some(m.label.as_str());
            let name = identity
                .and_then(|id| faces.iter().find(|f| f.identity == id))
                .map(|f| f.name.as_str());
            serde_json::json!({
                "face_found": true,
                "matched": matched,
                "identity": identity,
                "name": name,
                "score": m.score,
                "threshold": config.similarity_threshold,
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn embed(config: &Config, image: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let store = Arc::new(EmbeddingStore::new());
    let service = Arc::new(FaceService::new(load_engine(config)?, store));
    let bytes = std::fs::read(&image).with_context(|| format!("reading {}", image.display()))?;

    let worker = Arc::clone(&service);
    let embedding =
        tokio::task::spawn_blocking(move || worker.generate_embedding_from_bytes(&bytes))
            .await
            .context("pipeline worker panicked")??;

    if embedding.is_zero() {
        tracing::warn!(image = %image.display(), "no face found; embedding is the zero vector");
    }

    match out {
        Some(path) => {
            std::fs::write(&path, embedding.to_le_bytes())
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}-dimension embedding to {}", embedding.len(), path.display());
        }
        None => {
            let output = serde_json::json!({
                "face_found": !embedding.is_zero(),
                "dimension": embedding.len(),
                "values": embedding.as_slice(),
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let faces = open_db(config)?.load_all()?;
    if faces.is_empty() {
        println!("No faces enrolled");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&faces)?);
    Ok(())
}

async fn remove(config: &Config, id: &str) -> Result<()> {
    let removed = open_db(config)?.delete_identity(id)?;
    if removed == 0 {
        anyhow::bail!("no enrollments for {id}");
    }
    println!("Removed {removed} enrollment(s) for {id}");

    if let Some(sink) = chroma_sink(config) {
        if let Err(err) = sink.remove_identity(id).await {
            tracing::warn!(identity = id, error = %err, "vector sink cleanup failed");
        }
    }
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let paths = config.model_paths();
    let enrolled = if config.db_path.exists() {
        Some(open_db(config)?.load_all()?.len())
    } else {
        None
    };

    let output = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "models": {
            "detector": { "path": paths.detector, "present": paths.detector.exists() },
            "landmarks": { "path": paths.landmarks, "present": paths.landmarks.exists() },
            "embedder": { "path": paths.embedder, "present": paths.embedder.exists() },
        },
        "db_path": config.db_path,
        "enrolled": enrolled,
        "similarity_threshold": config.similarity_threshold,
        "sink": config.chroma_url.as_ref().map(|url| serde_json::json!({
            "url": url,
            "collection": config.chroma_collection,
        })),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use photospace_faces::db;
use photospace_faces::pipeline::{cluster, extract, indexer, landmarks};
use photospace_faces::recognition::rekognition::RekognitionClient;
use photospace_faces::recognition::Recognition;
use photospace_faces::utils::config::Config;
use photospace_faces::utils::logging;
use tracing::info;

fn usage() -> ! {
    eprintln!("usage: photospace-faces <index|cluster|clean>");
    eprintln!("  index    detect and index faces for every photo in the catalog");
    eprintln!("  cluster  group indexed faces into person identities");
    eprintln!("  clean    drop the face collection and truncate all tables");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();

    let db_dir = cfg.data.join("db");
    std::fs::create_dir_all(&db_dir)?;
    let db_path = db_dir.join("photospace.db");
    // Apply schema up front so all later connections are plain opens.
    db::open_or_create(&db_path)?;

    let cmd = std::env::args().nth(1).unwrap_or_default();
    match cmd.as_str() {
        "index" => run_index(&cfg, &db_path).await,
        "cluster" => run_cluster(&cfg, &db_path).await,
        "clean" => run_clean(&cfg, &db_path).await,
        _ => usage(),
    }
}

async fn run_index(cfg: &Config, db_path: &PathBuf) -> anyhow::Result<()> {
    let recognition =
        RekognitionClient::new(&cfg.aws_region, &cfg.collection_id, cfg.min_confidence).await;

    let models_dir = cfg.data.join("models");
    let mut detector = landmarks::LandmarkDetector::new(models_dir, cfg.detect_confidence);
    detector.initialize().await?;

    let extractor = extract::FaceExtractor::new(
        recognition,
        Arc::new(parking_lot::Mutex::new(detector)),
        extract::HttpFetcher::new()?,
        db_path.clone(),
        cfg.clone(),
    );
    indexer::run(cfg, db_path, &extractor).await?;
    info!("Run 'photospace-faces cluster' to group faces by identity.");
    Ok(())
}

async fn run_cluster(cfg: &Config, db_path: &PathBuf) -> anyhow::Result<()> {
    let recognition =
        RekognitionClient::new(&cfg.aws_region, &cfg.collection_id, cfg.min_confidence).await;
    cluster::run(cfg, db_path, &recognition).await?;
    Ok(())
}

async fn run_clean(cfg: &Config, db_path: &PathBuf) -> anyhow::Result<()> {
    let recognition =
        RekognitionClient::new(&cfg.aws_region, &cfg.collection_id, cfg.min_confidence).await;
    info!("Deleting face collection...");
    recognition.delete_collection().await?;

    info!("Truncating all tables...");
    let dbp = db_path.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut conn = db::open_or_create(&dbp)?;
        db::writer::truncate_all(&mut conn)
    })
    .await??;
    info!("All tables and the face collection cleaned.");
    Ok(())
}

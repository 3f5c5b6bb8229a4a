use anyhow::Result;
use futures_util::future::join_all;
use std::path::Path;
use tracing::{error, info};

use crate::db;
use crate::pipeline::extract::{FaceExtractor, PhotoFetcher};
use crate::pipeline::landmarks::LandmarkSource;
use crate::recognition::Recognition;
use crate::utils::config::Config;

/// Walk the whole catalog in name order and extract faces photo by photo.
///
/// Photos are processed in fixed-size concurrent batches; the batch boundary
/// is a sync point, which bounds in-flight external calls without a worker
/// pool. A per-photo failure is logged and never stops the run.
///
/// Returns the total number of face rows in the store afterwards.
pub async fn run<R, L, F>(
    config: &Config,
    db_path: &Path,
    extractor: &FaceExtractor<R, L, F>,
) -> Result<i64>
where
    R: Recognition,
    L: LandmarkSource + Send + 'static,
    F: PhotoFetcher,
{
    // Setup failures are fatal: indexing into a missing collection would
    // silently corrupt the derived clustering.
    extractor.recognition().ensure_collection().await?;

    let photos = {
        let dbp = db_path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Vec<(String, String)>> {
            let conn = db::open_or_create(&dbp)?;
            db::query::list_photos_by_name(&conn)
        })
        .await??
    };
    if photos.is_empty() {
        anyhow::bail!("No photos in catalog. Run the populate step first.");
    }

    let total = photos.len();
    let width = config.concurrency.max(1);
    info!("Processing {} photos (concurrency={})...", total, width);

    for (batch_idx, batch) in photos.chunks(width).enumerate() {
        let futures = batch.iter().enumerate().map(|(j, (name, url))| async move {
            let idx = batch_idx * width + j + 1;
            info!("[{}/{}] {}", idx, total, name);
            if let Err(e) = extractor.process_photo(name, url).await {
                error!("Error processing {}: {:#}", name, e);
            }
        });
        join_all(futures).await;
        info!("batch done ({}/{})", (batch_idx * width + batch.len()).min(total), total);
    }

    let total_faces = {
        let dbp = db_path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<i64> {
            let conn = db::open_or_create(&dbp)?;
            db::query::count_faces(&conn)
        })
        .await??
    };
    info!("Done. {} faces indexed.", total_faces);
    Ok(total_faces)
}

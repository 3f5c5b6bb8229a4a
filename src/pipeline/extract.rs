use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::db;
use crate::models::photo::Point;
use crate::pipeline::landmarks::{LandmarkFace, LandmarkSource};
use crate::recognition::{DetectedFace, Recognition};
use crate::utils::config::Config;
use crate::utils::geometry::iou;
use crate::utils::media;

/// Seam over the image store so tests can serve bytes without a network.
#[allow(async_fn_in_trait)]
pub trait PhotoFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl PhotoFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let res = self.client.get(url).send().await.context(format!("Failed to fetch {}", url))?;
        if !res.status().is_success() {
            anyhow::bail!("Failed to fetch {}: HTTP {}", url, res.status());
        }
        Ok(res.bytes().await?.to_vec())
    }
}

/// For each recognition detection, the landmark face with the best IoU wins;
/// below the threshold the detection keeps an empty landmark list, rendered
/// downstream as a dots fallback instead of a mesh. Greedy and independent
/// per detection, so two detections may claim the same landmark face.
pub fn match_landmarks(
    detections: &[DetectedFace],
    landmark_faces: &[LandmarkFace],
    iou_threshold: f64,
) -> Vec<Vec<Point>> {
    detections
        .iter()
        .map(|det| {
            let mut best_iou = 0.0;
            let mut best: Option<&LandmarkFace> = None;
            for lf in landmark_faces {
                let score = iou(&det.bbox, &lf.bbox);
                if score > best_iou {
                    best_iou = score;
                    best = Some(lf);
                }
            }
            match best {
                Some(lf) if best_iou >= iou_threshold => lf.landmarks.clone(),
                _ => Vec::new(),
            }
        })
        .collect()
}

/// Per-photo extraction: fetch, index with the recognition service, detect
/// landmarks locally, correlate the two by IoU, persist one face row per
/// detection. Safe to re-run; an already-indexed photo is a no-op.
pub struct FaceExtractor<R, L, F> {
    recognition: R,
    landmarks: Arc<Mutex<L>>,
    fetcher: F,
    db_path: PathBuf,
    config: Config,
}

impl<R, L, F> FaceExtractor<R, L, F>
where
    R: Recognition,
    L: LandmarkSource + Send + 'static,
    F: PhotoFetcher,
{
    pub fn new(
        recognition: R,
        landmarks: Arc<Mutex<L>>,
        fetcher: F,
        db_path: PathBuf,
        config: Config,
    ) -> Self {
        Self { recognition, landmarks, fetcher, db_path, config }
    }

    pub fn recognition(&self) -> &R {
        &self.recognition
    }

    /// Returns the number of face rows written (0 when skipped or faceless).
    pub async fn process_photo(&self, photo_name: &str, photo_url: &str) -> Result<usize> {
        // Idempotency gate: must run before any external call.
        let already = {
            let dbp = self.db_path.clone();
            let name = photo_name.to_string();
            tokio::task::spawn_blocking(move || -> Result<bool> {
                let conn = db::open_or_create(&dbp)?;
                db::query::photo_has_faces(&conn, &name)
            })
            .await??
        };
        if already {
            info!("Skipping {} (already processed)", photo_name);
            return Ok(0);
        }

        // Fetch bytes, falling back to a resized variant above the service cap.
        let mut image_bytes = self.fetcher.fetch(photo_url).await?;
        if image_bytes.len() > self.config.max_image_bytes {
            info!(
                "{}: image {:.1}MB over cap, refetching resized",
                photo_name,
                image_bytes.len() as f64 / 1e6
            );
            let resized = media::resized_url(photo_url, self.config.resize_max_dim);
            image_bytes = self.fetcher.fetch(&resized).await?;
        }

        let img = image::load_from_memory(&image_bytes)
            .context(format!("Failed to decode image for {}", photo_name))?;
        let (img_w, img_h) = (img.width(), img.height());

        let detections = match self
            .recognition
            .index_faces(&image_bytes, photo_name)
            .await
        {
            Ok(d) => d,
            Err(e) => {
                error!("{}: recognition error: {}", photo_name, e);
                return Ok(0);
            }
        };
        if detections.is_empty() {
            info!("{}: no faces (recognition)", photo_name);
            return Ok(0);
        }

        let landmark_faces = {
            let detector = self.landmarks.clone();
            tokio::task::spawn_blocking(move || detector.lock().detect(&img)).await??
        };

        let meshes = match_landmarks(&detections, &landmark_faces, self.config.iou_threshold);
        let matched = meshes.iter().filter(|m| !m.is_empty()).count();

        // Thumbnails crop the original URL, not the resized variant.
        let rows: Vec<db::writer::NewFace> = detections
            .iter()
            .zip(meshes)
            .map(|(det, mesh)| db::writer::NewFace {
                external_face_id: Some(det.external_id.clone()),
                landmarks: mesh,
                bbox: det.bbox,
                thumbnail: Some(media::face_thumbnail_url(
                    photo_url,
                    &det.bbox,
                    img_w,
                    img_h,
                    self.config.thumb_size,
                )),
            })
            .collect();

        // The whole face set commits in one transaction; see insert_faces.
        let written = {
            let dbp = self.db_path.clone();
            let name = photo_name.to_string();
            tokio::task::spawn_blocking(move || -> Result<usize> {
                let mut conn = db::open_or_create(&dbp)?;
                db::writer::insert_faces(&mut conn, &name, &rows)
            })
            .await??
        };

        info!("{}: {} face(s) indexed, {} mesh-matched", photo_name, written, matched);
        Ok(written)
    }
}

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use image::DynamicImage;
use rusqlite::Connection;
use tempfile::TempDir;

use photospace_faces::db;
use photospace_faces::models::photo::Point;
use photospace_faces::pipeline::extract::PhotoFetcher;
use photospace_faces::pipeline::landmarks::{LandmarkFace, LandmarkSource};
use photospace_faces::recognition::{DetectedFace, FaceMatch, Recognition, RecognitionError};
use photospace_faces::utils::config::Config;
use photospace_faces::utils::geometry::BoundingBox;

/// Create a temporary SQLite database for testing
pub fn setup_test_db() -> (TempDir, PathBuf, Connection) {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("photospace.db");
    let conn = db::open_or_create(&db_path).unwrap();
    (tmp, db_path, conn)
}

/// Config with the design-constant defaults, independent of the environment
pub fn test_config() -> Config {
    Config {
        data: PathBuf::from("/tmp"),
        collection_id: "test-faces".to_string(),
        aws_region: "us-east-1".to_string(),
        min_confidence: 90.0,
        match_threshold: 80.0,
        max_matches: 100,
        iou_threshold: 0.3,
        detect_confidence: 0.5,
        concurrency: 3,
        max_image_bytes: 5 * 1024 * 1024,
        resize_max_dim: 2048,
        thumb_size: 80,
    }
}

/// Encode a small solid-color PNG in memory
pub fn test_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgb8(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

pub fn seed_face(conn: &Connection, photo_name: &str, external_id: Option<&str>) -> i64 {
    let bbox = BoundingBox::new(0.1, 0.1, 0.2, 0.2);
    db::writer::insert_face(conn, photo_name, external_id, &[], &bbox, None).unwrap()
}

/// Scripted recognition service. Searches return the configured matches
/// filtered by threshold, the way the real service applies it server-side.
#[derive(Default)]
pub struct MockRecognition {
    pub detections: HashMap<String, Vec<DetectedFace>>,
    pub matches: HashMap<String, Vec<(String, f32)>>,
    pub failing_searches: HashSet<String>,
    pub collection_missing: bool,
    pub index_calls: AtomicUsize,
    pub search_log: Mutex<Vec<String>>,
}

impl Recognition for MockRecognition {
    async fn ensure_collection(&self) -> Result<(), RecognitionError> {
        Ok(())
    }

    async fn index_faces(
        &self,
        _image_bytes: &[u8],
        external_image_id: &str,
    ) -> Result<Vec<DetectedFace>, RecognitionError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.get(external_image_id).cloned().unwrap_or_default())
    }

    async fn search_faces(
        &self,
        external_face_id: &str,
        threshold: f32,
        max_results: i32,
    ) -> Result<Vec<FaceMatch>, RecognitionError> {
        self.search_log.lock().unwrap().push(external_face_id.to_string());
        if self.collection_missing {
            return Err(RecognitionError::CollectionMissing("test-faces".to_string()));
        }
        if self.failing_searches.contains(external_face_id) {
            return Err(RecognitionError::Transient(anyhow::anyhow!("throttled")));
        }
        let mut out: Vec<FaceMatch> = self
            .matches
            .get(external_face_id)
            .map(|ms| {
                ms.iter()
                    .filter(|(_, sim)| *sim >= threshold)
                    .map(|(id, sim)| FaceMatch { external_id: id.clone(), similarity: *sim })
                    .collect()
            })
            .unwrap_or_default();
        out.truncate(max_results as usize);
        Ok(out)
    }

    async fn delete_collection(&self) -> Result<(), RecognitionError> {
        Ok(())
    }
}

/// Scripted landmark detector returning the same faces for every image
pub struct MockLandmarks {
    pub faces: Vec<LandmarkFace>,
}

impl LandmarkSource for MockLandmarks {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<LandmarkFace>> {
        Ok(self.faces.clone())
    }
}

/// In-memory image store keyed by URL
#[derive(Default)]
pub struct MockFetcher {
    pub responses: HashMap<String, Vec<u8>>,
    pub fetch_log: Mutex<Vec<String>>,
}

impl PhotoFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_log.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no fixture for {}", url))
    }
}

pub fn mesh_face(x: f64, y: f64, w: f64, h: f64, points: usize) -> LandmarkFace {
    LandmarkFace {
        bbox: BoundingBox::new(x, y, w, h),
        landmarks: (0..points)
            .map(|i| Point { x: i as f64 * 0.001, y: i as f64 * 0.001 })
            .collect(),
    }
}

pub fn detection(external_id: &str, x: f64, y: f64, w: f64, h: f64) -> DetectedFace {
    DetectedFace {
        external_id: external_id.to_string(),
        bbox: BoundingBox::new(x, y, w, h),
        confidence: 99.0,
    }
}

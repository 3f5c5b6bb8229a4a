use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub data: PathBuf,
    pub collection_id: String,
    pub aws_region: String,
    pub min_confidence: f32,
    pub match_threshold: f32,
    pub max_matches: i32,
    pub iou_threshold: f64,
    pub detect_confidence: f32,
    pub concurrency: usize,
    pub max_image_bytes: usize,
    pub resize_max_dim: u32,
    pub thumb_size: u32,
}

impl Config {
    pub fn from_env() -> Self {
        let data = env::var("PHOTOSPACE_DATA").unwrap_or_else(|_| "/photospace-data".to_string());
        let collection_id = env::var("PHOTOSPACE_COLLECTION_ID")
            .unwrap_or_else(|_| "photo-space-faces".to_string());
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let min_confidence = env::var("PHOTOSPACE_MIN_CONFIDENCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(90.0);
        let match_threshold = env::var("PHOTOSPACE_MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(80.0);
        let max_matches = env::var("PHOTOSPACE_MAX_MATCHES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let iou_threshold = env::var("PHOTOSPACE_IOU_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.3);
        let detect_confidence = env::var("PHOTOSPACE_DETECT_CONFIDENCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.5);
        let concurrency = env::var("PHOTOSPACE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let max_image_bytes = env::var("PHOTOSPACE_MAX_IMAGE_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5 * 1024 * 1024);
        let resize_max_dim = env::var("PHOTOSPACE_RESIZE_MAX_DIM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2048);
        let thumb_size = env::var("PHOTOSPACE_THUMB_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(80);
        Self {
            data: PathBuf::from(data),
            collection_id,
            aws_region,
            min_confidence,
            match_threshold,
            max_matches,
            iou_threshold,
            detect_confidence,
            concurrency,
            max_image_bytes,
            resize_max_dim,
            thumb_size,
        }
    }
}

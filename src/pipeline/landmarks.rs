use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::photo::Point;
use crate::utils::geometry::BoundingBox;

const DETECT_MODEL_URL_HF: &str = "https://huggingface.co/ykk648/face_lib/resolve/main/face_detect/scrfd_onnx/scrfd_500m_bnkps.onnx";
const DETECT_MODEL_URL_GH: &str = "https://github.com/deepinsight/insightface/releases/download/v0.7/scrfd_500m_bnkps.onnx";
const MESH_MODEL_URL: &str = "https://huggingface.co/ykk648/face_lib/resolve/main/face_landmark/mediapipe_onnx/face_mesh.onnx";

const DETECT_INPUT: u32 = 640;
const MESH_INPUT: u32 = 192;
/// Point count of the dense mesh output (x, y, z triples).
pub const MESH_POINTS: usize = 468;

/// One face from the local detector: a normalized box plus its dense mesh.
/// Coordinates are normalized to [0,1] the moment they leave the model, so
/// everything downstream works in one space.
#[derive(Debug, Clone)]
pub struct LandmarkFace {
    pub bbox: BoundingBox,
    pub landmarks: Vec<Point>,
}

/// Seam over the local landmark detector so tests can script detections
/// without loading models.
pub trait LandmarkSource {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<LandmarkFace>>;
}

/// Local in-process model pair: a face detector and a dense-mesh landmark
/// head. Loading is a one-time startup cost shared across the whole run.
pub struct LandmarkDetector {
    pub models_dir: PathBuf,
    detect_confidence: f32,
    detect_session: Option<Mutex<Session>>,
    mesh_session: Option<Mutex<Session>>,
}

impl LandmarkDetector {
    pub fn new(models_dir: PathBuf, detect_confidence: f32) -> Self {
        Self {
            models_dir,
            detect_confidence,
            detect_session: None,
            mesh_session: None,
        }
    }

    pub fn loaded(&self) -> bool {
        self.detect_session.is_some() && self.mesh_session.is_some()
    }

    pub async fn initialize(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.models_dir).context("Failed to create models directory")?;

        let auto_dl = std::env::var("PHOTOSPACE_MODEL_AUTO_DOWNLOAD")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "FALSE"))
            .unwrap_or(true);
        if auto_dl {
            self.download_models().await?;
        } else {
            info!("Model auto-download disabled by user.");
        }

        self.load_models()?;
        Ok(())
    }

    async fn download_models(&self) -> Result<()> {
        let detect_path = self.models_dir.join("scrfd_500m_bnkps.onnx");
        let mesh_path = self.models_dir.join("face_mesh.onnx");
        let client = reqwest::Client::new();

        if !detect_path.exists() {
            info!("Downloading face detection model...");
            if let Err(e) = download_file(&client, DETECT_MODEL_URL_HF, &detect_path).await {
                warn!("Failed to download from Hugging Face: {}. Trying GitHub...", e);
                download_file(&client, DETECT_MODEL_URL_GH, &detect_path).await?;
            }
        }

        if !mesh_path.exists() {
            info!("Downloading face mesh model...");
            download_file(&client, MESH_MODEL_URL, &mesh_path).await?;
        }

        Ok(())
    }

    fn load_models(&mut self) -> Result<()> {
        let detect_path = self.models_dir.join("scrfd_500m_bnkps.onnx");
        let mesh_path = self.models_dir.join("face_mesh.onnx");

        if !detect_path.exists() || !mesh_path.exists() {
            anyhow::bail!(
                "Landmark models missing; expected detector at {:?} and mesh at {:?}",
                detect_path,
                mesh_path
            );
        }

        let detect = Session::builder()?
            .commit_from_file(&detect_path)
            .context("Failed to create detector session")?;
        let mesh = Session::builder()?
            .commit_from_file(&mesh_path)
            .context("Failed to create mesh session")?;

        self.detect_session = Some(Mutex::new(detect));
        self.mesh_session = Some(Mutex::new(mesh));
        info!("Landmark models loaded: detector={:?} mesh={:?}", detect_path, mesh_path);
        Ok(())
    }

    /// Letterbox to the detector input square (NCHW, BGR, [-1, 1]) and return
    /// the scale needed to map outputs back to source pixels.
    fn preprocess_detect(&self, image: &DynamicImage) -> (Vec<f32>, f32) {
        let side = DETECT_INPUT;
        let (ow, oh) = (image.width() as f32, image.height() as f32);
        let scale = side as f32 / ow.max(oh);
        let nw = (ow * scale) as u32;
        let nh = (oh * scale) as u32;
        let resized = image.resize_exact(nw, nh, image::imageops::FilterType::Triangle);
        let mut padded = DynamicImage::new_rgb8(side, side);
        image::imageops::overlay(&mut padded, &resized, 0, 0);
        let rgb = padded.to_rgb8();
        let mut data = Vec::with_capacity(3 * (side * side) as usize);
        for c in 0..3 {
            for y in 0..side {
                for x in 0..side {
                    let p = rgb.get_pixel(x, y);
                    // The detector expects BGR channel order.
                    let v = match c {
                        0 => p[2],
                        1 => p[1],
                        _ => p[0],
                    } as f32;
                    data.push((v - 127.5) / 128.0);
                }
            }
        }
        (data, scale)
    }

    fn detect_boxes(&self, image: &DynamicImage) -> Result<Vec<RawBox>> {
        let mut session = self
            .detect_session
            .as_ref()
            .context("Detection model not loaded")?
            .lock();
        let (data, scale) = self.preprocess_detect(image);
        let img_w = image.width() as f32;
        let img_h = image.height() as f32;

        let input_name = session.inputs[0].name.clone();
        let shape = vec![1i64, 3, DETECT_INPUT as i64, DETECT_INPUT as i64];
        let input = Value::from_array((shape, data))
            .context("Failed to create detector input tensor")?;
        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("Detector inference failed")?;

        let threshold = self.detect_confidence;
        let mut raw: Vec<RawBox> = Vec::new();

        // One score/bbox head per stride; the grid side is input/stride.
        for stride in [8usize, 16, 32] {
            let (Some(sv), Some(bv)) = (
                outputs.get(&format!("score_{}", stride)),
                outputs.get(&format!("bbox_{}", stride)),
            ) else {
                continue;
            };
            let (Ok((_, scores)), Ok((_, boxes))) =
                (sv.try_extract_tensor::<f32>(), bv.try_extract_tensor::<f32>())
            else {
                continue;
            };

            let side = DETECT_INPUT as usize / stride;
            let grid_points = side * side;
            if scores.is_empty() || scores.len() % grid_points != 0 {
                warn!("Detector stride {}: unexpected score count {}", stride, scores.len());
                continue;
            }
            let anchors = scores.len() / grid_points;

            for i in 0..grid_points {
                let cy = (i / side * stride) as f32;
                let cx = (i % side * stride) as f32;
                for a in 0..anchors {
                    let idx = i * anchors + a;
                    let conf = scores[idx];
                    if conf < threshold {
                        continue;
                    }
                    let b = idx * 4;
                    if b + 3 >= boxes.len() {
                        continue;
                    }
                    // Offsets are distances from the anchor center, in strides.
                    let x1 = ((cx - boxes[b] * stride as f32) / scale).clamp(0.0, img_w);
                    let y1 = ((cy - boxes[b + 1] * stride as f32) / scale).clamp(0.0, img_h);
                    let x2 = ((cx + boxes[b + 2] * stride as f32) / scale).clamp(0.0, img_w);
                    let y2 = ((cy + boxes[b + 3] * stride as f32) / scale).clamp(0.0, img_h);
                    if x2 <= x1 || y2 <= y1 || (x2 - x1) < 8.0 || (y2 - y1) < 8.0 {
                        continue;
                    }
                    raw.push(RawBox { x1, y1, x2, y2, confidence: conf });
                }
            }
        }

        let keep = nms(&raw, 0.4);
        Ok(keep.into_iter().map(|i| raw[i].clone()).collect())
    }

    /// Run the mesh head on a padded face crop and map its points back to
    /// normalized full-image coordinates.
    fn mesh_for_box(&self, image: &DynamicImage, face: &RawBox) -> Result<Vec<Point>> {
        let mut session = self
            .mesh_session
            .as_ref()
            .context("Mesh model not loaded")?
            .lock();

        let img_w = image.width() as f32;
        let img_h = image.height() as f32;
        let margin = 0.25;
        let bw = face.x2 - face.x1;
        let bh = face.y2 - face.y1;
        let cx1 = (face.x1 - bw * margin).max(0.0);
        let cy1 = (face.y1 - bh * margin).max(0.0);
        let cx2 = (face.x2 + bw * margin).min(img_w);
        let cy2 = (face.y2 + bh * margin).min(img_h);
        let crop_w = cx2 - cx1;
        let crop_h = cy2 - cy1;

        let crop = image.crop_imm(cx1 as u32, cy1 as u32, crop_w as u32, crop_h as u32);
        let resized =
            crop.resize_exact(MESH_INPUT, MESH_INPUT, image::imageops::FilterType::Triangle);
        let rgb = resized.to_rgb8();
        let mut data = Vec::with_capacity(3 * (MESH_INPUT * MESH_INPUT) as usize);
        for c in 0..3 {
            for y in 0..MESH_INPUT {
                for x in 0..MESH_INPUT {
                    data.push(rgb.get_pixel(x, y)[c as usize] as f32 / 255.0);
                }
            }
        }

        let input_name = session.inputs[0].name.clone();
        let input = Value::from_array((vec![1i64, 3, MESH_INPUT as i64, MESH_INPUT as i64], data))
            .context("Failed to create mesh input tensor")?;
        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("Mesh inference failed")?;

        let key = outputs
            .keys()
            .next()
            .context("Mesh model produced no outputs")?
            .to_string();
        let (_, coords) = outputs
            .get(&key)
            .context("Mesh output missing")?
            .try_extract_tensor::<f32>()
            .context("Failed to extract mesh tensor")?;
        if coords.len() < MESH_POINTS * 3 {
            anyhow::bail!("Mesh output too short: {} values", coords.len());
        }

        // Coordinates are (x, y, z) in mesh-input pixels of the crop.
        let mut points = Vec::with_capacity(MESH_POINTS);
        for i in 0..MESH_POINTS {
            let mx = coords[i * 3] / MESH_INPUT as f32;
            let my = coords[i * 3 + 1] / MESH_INPUT as f32;
            points.push(Point {
                x: ((cx1 + mx * crop_w) / img_w) as f64,
                y: ((cy1 + my * crop_h) / img_h) as f64,
            });
        }
        Ok(points)
    }
}

impl LandmarkSource for LandmarkDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<LandmarkFace>> {
        let boxes = self.detect_boxes(image)?;
        let img_w = image.width() as f64;
        let img_h = image.height() as f64;

        let mut faces = Vec::with_capacity(boxes.len());
        for b in boxes {
            let landmarks = match self.mesh_for_box(image, &b) {
                Ok(points) => points,
                Err(e) => {
                    warn!("Mesh inference failed for a face box: {}", e);
                    Vec::new()
                }
            };
            faces.push(LandmarkFace {
                bbox: BoundingBox::from_pixels(
                    b.x1 as f64,
                    b.y1 as f64,
                    (b.x2 - b.x1) as f64,
                    (b.y2 - b.y1) as f64,
                    img_w,
                    img_h,
                ),
                landmarks,
            });
        }
        Ok(faces)
    }
}

#[derive(Debug, Clone)]
struct RawBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

fn nms(boxes: &[RawBox], iou_threshold: f32) -> Vec<usize> {
    if boxes.is_empty() {
        return vec![];
    }
    let mut indices: Vec<usize> = (0..boxes.len()).collect();
    indices.sort_by(|&a, &b| {
        boxes[b]
            .confidence
            .partial_cmp(&boxes[a].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for i in 0..indices.len() {
        let ia = indices[i];
        if suppressed[ia] {
            continue;
        }
        keep.push(ia);
        for &ib in indices.iter().skip(i + 1) {
            if !suppressed[ib] && box_iou(&boxes[ia], &boxes[ib]) > iou_threshold {
                suppressed[ib] = true;
            }
        }
    }
    keep
}

fn box_iou(a: &RawBox, b: &RawBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);
    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }
    let inter = (x2 - x1) * (y2 - y1);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

async fn download_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .context(format!("Failed to download model from {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to download model: HTTP {}", response.status());
    }
    let bytes = response.bytes().await.context("Failed to read response body")?;
    if bytes.len() < 1024 {
        anyhow::bail!(
            "Downloaded file is suspiciously small ({} bytes), may be corrupted",
            bytes.len()
        );
    }
    std::fs::write(path, &bytes).context(format!("Failed to write file: {:?}", path))?;
    info!("Downloaded model to {:?} ({} bytes)", path, bytes.len());
    Ok(())
}

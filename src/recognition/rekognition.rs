use anyhow::anyhow;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{Attribute, Image, QualityFilter};
use aws_sdk_rekognition::Client;
use tracing::info;

use super::{DetectedFace, FaceMatch, Recognition, RecognitionError};
use crate::utils::geometry::BoundingBox;

/// AWS Rekognition-backed implementation of the recognition seam.
/// Credentials come from the default provider chain (env vars, profile).
pub struct RekognitionClient {
    client: Client,
    collection_id: String,
    min_confidence: f32,
}

impl RekognitionClient {
    pub async fn new(region: &str, collection_id: &str, min_confidence: f32) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: Client::new(&config),
            collection_id: collection_id.to_string(),
            min_confidence,
        }
    }
}

impl Recognition for RekognitionClient {
    async fn ensure_collection(&self) -> Result<(), RecognitionError> {
        match self
            .client
            .describe_collection()
            .collection_id(&self.collection_id)
            .send()
            .await
        {
            Ok(_) => {
                info!("Rekognition collection \"{}\" exists.", self.collection_id);
                Ok(())
            }
            Err(e) => {
                let svc = e.into_service_error();
                if svc.is_resource_not_found_exception() {
                    self.client
                        .create_collection()
                        .collection_id(&self.collection_id)
                        .send()
                        .await
                        .map_err(|e| RecognitionError::Transient(anyhow!(e.into_service_error())))?;
                    info!("Created Rekognition collection \"{}\".", self.collection_id);
                    Ok(())
                } else {
                    Err(RecognitionError::Transient(anyhow!(svc)))
                }
            }
        }
    }

    async fn index_faces(
        &self,
        image_bytes: &[u8],
        external_image_id: &str,
    ) -> Result<Vec<DetectedFace>, RecognitionError> {
        let image = Image::builder().bytes(Blob::new(image_bytes.to_vec())).build();
        let resp = self
            .client
            .index_faces()
            .collection_id(&self.collection_id)
            .image(image)
            .external_image_id(external_image_id)
            .detection_attributes(Attribute::Default)
            .quality_filter(QualityFilter::Auto)
            .send()
            .await
            .map_err(|e| RecognitionError::Transient(anyhow!(e.into_service_error())))?;

        let mut out = Vec::new();
        for record in resp.face_records() {
            let Some(face) = record.face() else { continue };
            let Some(face_id) = face.face_id() else { continue };
            let Some(bb) = face.bounding_box() else { continue };
            let confidence = face.confidence().unwrap_or(0.0);
            if confidence < self.min_confidence {
                continue;
            }
            let w = bb.width().unwrap_or(0.0) as f64;
            let h = bb.height().unwrap_or(0.0) as f64;
            // Degenerate boxes would poison the IoU math downstream.
            if w <= 0.0 || h <= 0.0 {
                continue;
            }
            out.push(DetectedFace {
                external_id: face_id.to_string(),
                bbox: BoundingBox::new(
                    bb.left().unwrap_or(0.0) as f64,
                    bb.top().unwrap_or(0.0) as f64,
                    w,
                    h,
                ),
                confidence,
            });
        }
        Ok(out)
    }

    async fn search_faces(
        &self,
        external_face_id: &str,
        threshold: f32,
        max_results: i32,
    ) -> Result<Vec<FaceMatch>, RecognitionError> {
        let resp = self
            .client
            .search_faces()
            .collection_id(&self.collection_id)
            .face_id(external_face_id)
            .face_match_threshold(threshold)
            .max_faces(max_results)
            .send()
            .await
            .map_err(|e| {
                let svc = e.into_service_error();
                if svc.is_resource_not_found_exception() {
                    RecognitionError::CollectionMissing(self.collection_id.clone())
                } else {
                    RecognitionError::Transient(anyhow!(svc))
                }
            })?;

        let mut out = Vec::new();
        for m in resp.face_matches() {
            let Some(face) = m.face() else { continue };
            let Some(face_id) = face.face_id() else { continue };
            out.push(FaceMatch {
                external_id: face_id.to_string(),
                similarity: m.similarity().unwrap_or(0.0),
            });
        }
        Ok(out)
    }

    async fn delete_collection(&self) -> Result<(), RecognitionError> {
        match self
            .client
            .delete_collection()
            .collection_id(&self.collection_id)
            .send()
            .await
        {
            Ok(_) => {
                info!("Collection \"{}\": deleted", self.collection_id);
                Ok(())
            }
            Err(e) => {
                let svc = e.into_service_error();
                if svc.is_resource_not_found_exception() {
                    info!("Collection \"{}\": not found (already clean)", self.collection_id);
                    Ok(())
                } else {
                    Err(RecognitionError::Transient(anyhow!(svc)))
                }
            }
        }
    }
}

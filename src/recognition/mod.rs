pub mod rekognition;

use crate::utils::geometry::BoundingBox;

/// One face found by the recognition service when indexing a photo. The
/// external id is the service-issued key later used for similarity search.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub external_id: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// A similarity-search hit against the collection.
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub external_id: String,
    pub similarity: f32,
}

/// Failure taxonomy for recognition calls. Transient errors are logged at
/// the call site and degrade to an empty result; a missing collection means
/// setup never ran and aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("face collection \"{0}\" does not exist")]
    CollectionMissing(String),
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}

/// Seam over the external face-recognition service. Kept small so the
/// production client can be swapped for a scripted one in tests.
#[allow(async_fn_in_trait)]
pub trait Recognition {
    /// Create the face collection if it does not exist yet.
    async fn ensure_collection(&self) -> Result<(), RecognitionError>;

    /// Index every face in the image into the collection. Detections below
    /// the confidence threshold or with a zero-area box are dropped.
    async fn index_faces(
        &self,
        image_bytes: &[u8],
        external_image_id: &str,
    ) -> Result<Vec<DetectedFace>, RecognitionError>;

    /// Other collection members whose similarity to this face exceeds
    /// `threshold`, capped at `max_results`.
    async fn search_faces(
        &self,
        external_face_id: &str,
        threshold: f32,
        max_results: i32,
    ) -> Result<Vec<FaceMatch>, RecognitionError>;

    /// Drop the collection, tolerating it already being gone.
    async fn delete_collection(&self) -> Result<(), RecognitionError>;
}

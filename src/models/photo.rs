use serde::{Deserialize, Serialize};

use crate::utils::geometry::BoundingBox;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Photo {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub thumb_url: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub created_at: i64,
}

/// A single normalized landmark point of the face mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Face {
    pub id: i64,
    pub photo_name: String,
    pub person_id: Option<i64>,
    pub external_face_id: Option<String>,
    pub landmarks: Vec<Point>,
    pub bbox: BoundingBox,
    pub thumbnail: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Person {
    pub id: i64,
    pub name: Option<String>,
    pub face_count: i64,
    pub created_at: i64,
}

/// Face row joined with its person's name, as served to the gallery.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FaceView {
    pub id: i64,
    pub photo_name: String,
    pub person_id: Option<i64>,
    pub person_name: Option<String>,
    pub landmarks: Vec<Point>,
    pub bbox: BoundingBox,
}

/// Person plus one member face used as its visual representative.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PersonView {
    pub id: i64,
    pub name: Option<String>,
    pub face_count: i64,
    pub representative_photo: Option<String>,
    pub representative_thumbnail: Option<String>,
}

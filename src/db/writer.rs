use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};

use crate::models::photo::Point;
use crate::utils::geometry::BoundingBox;

/// Ingestion helper for the photo catalog. The indexing pipeline itself
/// treats photos as read-only; this exists for the populate step and tests.
pub fn insert_photo(
    conn: &Connection,
    name: &str,
    url: &str,
    thumb_url: Option<&str>,
    width: Option<i64>,
    height: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO photos (name, url, thumb_url, width, height, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(name) DO NOTHING",
        params![name, url, thumb_url, width, height, Utc::now().timestamp()],
    )?;
    let id = conn.query_row("SELECT id FROM photos WHERE name = ?", params![name], |r| r.get(0))?;
    Ok(id)
}

pub fn insert_face(
    conn: &Connection,
    photo_name: &str,
    external_face_id: Option<&str>,
    landmarks: &[Point],
    bbox: &BoundingBox,
    thumbnail: Option<&str>,
) -> Result<i64> {
    let landmarks_json = serde_json::to_string(landmarks)?;
    conn.execute(
        "INSERT INTO faces (photo_name, external_face_id, landmarks, box_x, box_y, box_w, box_h, thumbnail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            photo_name,
            external_face_id,
            landmarks_json,
            bbox.x,
            bbox.y,
            bbox.w,
            bbox.h,
            thumbnail,
            Utc::now().timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// One face row waiting to be written for a photo.
#[derive(Debug, Clone)]
pub struct NewFace {
    pub external_face_id: Option<String>,
    pub landmarks: Vec<Point>,
    pub bbox: BoundingBox,
    pub thumbnail: Option<String>,
}

/// Write a photo's whole face set in one transaction. All-or-nothing: a
/// partial set would satisfy the extractor's idempotency probe on re-run and
/// leave the missing detections unrecoverable.
pub fn insert_faces(conn: &mut Connection, photo_name: &str, faces: &[NewFace]) -> Result<usize> {
    // Take the write lock at BEGIN so contention resolves via the busy
    // handler instead of failing mid-set.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for f in faces {
        insert_face(
            &tx,
            photo_name,
            f.external_face_id.as_deref(),
            &f.landmarks,
            &f.bbox,
            f.thumbnail.as_deref(),
        )?;
    }
    tx.commit()?;
    Ok(faces.len())
}

/// Replace the derived person state wholesale: clear all assignments, delete
/// every person, then create one person per cluster and point its member
/// faces at it. Runs in a single transaction so readers never observe the
/// intermediate empty-person window.
///
/// Returns (persons_created, faces_assigned).
pub fn replace_person_clusters(
    conn: &mut Connection,
    clusters: &[Vec<i64>],
) -> Result<(usize, usize)> {
    let tx = conn.transaction()?;

    // Assignments must go before the persons they reference.
    tx.execute("UPDATE faces SET person_id = NULL", [])?;
    tx.execute("DELETE FROM persons", [])?;

    let mut persons_created = 0usize;
    let mut faces_assigned = 0usize;
    for cluster in clusters {
        if cluster.is_empty() {
            continue;
        }
        tx.execute(
            "INSERT INTO persons (face_count, created_at) VALUES (?1, ?2)",
            params![cluster.len() as i64, Utc::now().timestamp()],
        )?;
        let person_id = tx.last_insert_rowid();
        persons_created += 1;

        for face_id in cluster {
            let n = tx.execute(
                "UPDATE faces SET person_id = ?1 WHERE id = ?2",
                params![person_id, face_id],
            )?;
            faces_assigned += n;
        }
    }

    tx.commit()?;
    Ok((persons_created, faces_assigned))
}

/// Maintenance reset used by the `clean` subcommand: drops all derived and
/// indexed rows, including the photo catalog.
pub fn truncate_all(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("UPDATE faces SET person_id = NULL", [])?;
    tx.execute("DELETE FROM faces", [])?;
    tx.execute("DELETE FROM persons", [])?;
    tx.execute("DELETE FROM photos", [])?;
    tx.commit()?;
    Ok(())
}

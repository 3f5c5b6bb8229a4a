use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::photo::{Face, FaceView, Person, PersonView, Point};
use crate::utils::geometry::BoundingBox;

/// (face id, external face id) pairs in clustering load order.
pub type ClusterableFace = (i64, String);

fn parse_landmarks(json: &str) -> Vec<Point> {
    serde_json::from_str(json).unwrap_or_default()
}

fn row_to_face(row: &Row<'_>) -> rusqlite::Result<Face> {
    let landmarks_json: String = row.get("landmarks")?;
    Ok(Face {
        id: row.get("id")?,
        photo_name: row.get("photo_name")?,
        person_id: row.get("person_id")?,
        external_face_id: row.get("external_face_id")?,
        landmarks: parse_landmarks(&landmarks_json),
        bbox: BoundingBox::new(
            row.get("box_x")?,
            row.get("box_y")?,
            row.get("box_w")?,
            row.get("box_h")?,
        ),
        thumbnail: row.get("thumbnail")?,
        created_at: row.get("created_at")?,
    })
}

pub fn count_photos(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM photos", [], |r| r.get(0))?;
    Ok(n)
}

pub fn count_faces(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM faces", [], |r| r.get(0))?;
    Ok(n)
}

/// All photos in name order, as (name, url). The indexer processes them in
/// this order so batch boundaries are stable across runs.
pub fn list_photos_by_name(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT name, url FROM photos ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Idempotency probe for the extractor: any face row for this photo means it
/// was already processed and must be skipped before any external call.
pub fn photo_has_faces(conn: &Connection, photo_name: &str) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT id FROM faces WHERE photo_name = ? LIMIT 1",
            params![photo_name],
            |r| r.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

/// Faces eligible for clustering: non-null external id, oldest first with
/// insertion order as the tie-break. Load order decides which face ends up
/// as a cluster root but never the partition itself.
pub fn clusterable_faces(conn: &Connection) -> Result<Vec<ClusterableFace>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_face_id FROM faces
         WHERE external_face_id IS NOT NULL
         ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn faces_for_photo_full(conn: &Connection, photo_name: &str) -> Result<Vec<Face>> {
    let mut stmt = conn.prepare("SELECT * FROM faces WHERE photo_name = ? ORDER BY id ASC")?;
    let rows = stmt.query_map(params![photo_name], row_to_face)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Faces-by-photo projection served to the gallery overlay.
pub fn faces_for_photo(conn: &Connection, photo_name: &str) -> Result<Vec<FaceView>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.photo_name, f.person_id, p.name AS person_name,
                f.landmarks, f.box_x, f.box_y, f.box_w, f.box_h
         FROM faces f LEFT JOIN persons p ON f.person_id = p.id
         WHERE f.photo_name = ? ORDER BY f.id ASC",
    )?;
    let rows = stmt.query_map(params![photo_name], |row| {
        let landmarks_json: String = row.get("landmarks")?;
        Ok(FaceView {
            id: row.get("id")?,
            photo_name: row.get("photo_name")?,
            person_id: row.get("person_id")?,
            person_name: row.get("person_name")?,
            landmarks: parse_landmarks(&landmarks_json),
            bbox: BoundingBox::new(
                row.get("box_x")?,
                row.get("box_y")?,
                row.get("box_w")?,
                row.get("box_h")?,
            ),
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn list_persons(conn: &Connection) -> Result<Vec<Person>> {
    let mut stmt =
        conn.prepare("SELECT id, name, face_count, created_at FROM persons ORDER BY face_count DESC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Person {
            id: row.get(0)?,
            name: row.get(1)?,
            face_count: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Persons ordered by cluster size, each with one member face for display.
pub fn persons_with_representative_face(conn: &Connection) -> Result<Vec<PersonView>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.face_count, f.photo_name, f.thumbnail
         FROM persons p
         LEFT JOIN faces f ON f.id = (
             SELECT id FROM faces WHERE person_id = p.id ORDER BY id ASC LIMIT 1
         )
         ORDER BY p.face_count DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PersonView {
            id: row.get(0)?,
            name: row.get(1)?,
            face_count: row.get(2)?,
            representative_photo: row.get(3)?,
            representative_thumbnail: row.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

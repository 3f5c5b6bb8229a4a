mod common;

use common::{seed_face, setup_test_db};
use photospace_faces::db::{query, writer};
use photospace_faces::models::photo::Point;
use photospace_faces::utils::geometry::BoundingBox;

#[test]
fn test_insert_photo_is_idempotent_by_name() {
    let (_tmp, _path, conn) = setup_test_db();

    let a = writer::insert_photo(
        &conn,
        "img_001.jpg",
        "https://cdn/img_001.jpg",
        None,
        Some(1000),
        Some(800),
    )
    .unwrap();
    let b = writer::insert_photo(&conn, "img_001.jpg", "https://cdn/other.jpg", None, None, None)
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(query::count_photos(&conn).unwrap(), 1);
}

#[test]
fn test_list_photos_ordered_by_name() {
    let (_tmp, _path, conn) = setup_test_db();

    writer::insert_photo(&conn, "img_b.jpg", "https://cdn/b.jpg", None, None, None).unwrap();
    writer::insert_photo(&conn, "img_a.jpg", "https://cdn/a.jpg", None, None, None).unwrap();
    writer::insert_photo(&conn, "img_c.jpg", "https://cdn/c.jpg", None, None, None).unwrap();

    let photos = query::list_photos_by_name(&conn).unwrap();
    let names: Vec<&str> = photos.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["img_a.jpg", "img_b.jpg", "img_c.jpg"]);
}

#[test]
fn test_insert_face_roundtrip() {
    let (_tmp, _path, conn) = setup_test_db();

    let bbox = BoundingBox::new(0.1, 0.2, 0.3, 0.4);
    let landmarks = vec![Point { x: 0.5, y: 0.6 }, Point { x: 0.7, y: 0.8 }];
    let id = writer::insert_face(
        &conn,
        "img_001.jpg",
        Some("aws-f1"),
        &landmarks,
        &bbox,
        Some("https://cdn/thumb.webp"),
    )
    .unwrap();
    assert!(id > 0);

    let faces = query::faces_for_photo_full(&conn, "img_001.jpg").unwrap();
    assert_eq!(faces.len(), 1);
    assert_eq!(faces[0].external_face_id.as_deref(), Some("aws-f1"));
    assert_eq!(faces[0].landmarks, landmarks);
    assert_eq!(faces[0].bbox, bbox);
    assert_eq!(faces[0].thumbnail.as_deref(), Some("https://cdn/thumb.webp"));
    assert_eq!(faces[0].person_id, None);
}

#[test]
fn test_photo_has_faces_gate() {
    let (_tmp, _path, conn) = setup_test_db();

    assert!(!query::photo_has_faces(&conn, "img_001.jpg").unwrap());
    seed_face(&conn, "img_001.jpg", Some("f1"));
    assert!(query::photo_has_faces(&conn, "img_001.jpg").unwrap());
    assert!(!query::photo_has_faces(&conn, "img_002.jpg").unwrap());
}

#[test]
fn test_clusterable_faces_excludes_missing_external_id() {
    let (_tmp, _path, conn) = setup_test_db();

    let a = seed_face(&conn, "p1", Some("f1"));
    seed_face(&conn, "p1", None);
    let c = seed_face(&conn, "p2", Some("f2"));

    let rows = query::clusterable_faces(&conn).unwrap();
    assert_eq!(rows.len(), 2);
    // Same created_at second; insertion order is the tie-break.
    assert_eq!(rows[0], (a, "f1".to_string()));
    assert_eq!(rows[1], (c, "f2".to_string()));
}

#[test]
fn test_connections_configure_a_busy_handler() {
    let (_tmp, _path, conn) = setup_test_db();

    let timeout_ms: i64 = conn.query_row("PRAGMA busy_timeout", [], |r| r.get(0)).unwrap();
    assert!(timeout_ms >= 5000, "busy_timeout is {} ms", timeout_ms);
}

#[test]
fn test_insert_faces_writes_whole_set() {
    let (_tmp, _path, mut conn) = setup_test_db();

    let bbox = BoundingBox::new(0.1, 0.1, 0.2, 0.2);
    let faces: Vec<writer::NewFace> = (0..3)
        .map(|i| writer::NewFace {
            external_face_id: Some(format!("f{}", i)),
            landmarks: vec![Point { x: 0.5, y: 0.5 }],
            bbox,
            thumbnail: None,
        })
        .collect();

    let written = writer::insert_faces(&mut conn, "img_001.jpg", &faces).unwrap();
    assert_eq!(written, 3);

    let rows = query::faces_for_photo_full(&conn, "img_001.jpg").unwrap();
    assert_eq!(rows.len(), 3);
    let ids: Vec<_> = rows.iter().filter_map(|f| f.external_face_id.as_deref()).collect();
    assert_eq!(ids, vec!["f0", "f1", "f2"]);
}

#[test]
fn test_overlapping_writers_on_separate_connections_both_commit() {
    let (_tmp, path, conn) = setup_test_db();

    // Two connections racing face-set writes, as concurrent batch photos do.
    let handles: Vec<_> = (0..2)
        .map(|w| {
            let db_path = path.clone();
            std::thread::spawn(move || -> anyhow::Result<()> {
                let mut conn = photospace_faces::db::open_or_create(&db_path)?;
                let bbox = BoundingBox::new(0.1, 0.1, 0.2, 0.2);
                for i in 0..25 {
                    let faces = vec![writer::NewFace {
                        external_face_id: Some(format!("w{}-f{}", w, i)),
                        landmarks: vec![],
                        bbox,
                        thumbnail: None,
                    }];
                    writer::insert_faces(&mut conn, &format!("photo-{}-{}", w, i), &faces)?;
                }
                Ok(())
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    assert_eq!(query::count_faces(&conn).unwrap(), 50);
}

#[test]
fn test_replace_person_clusters_assigns_members() {
    let (_tmp, _path, mut conn) = setup_test_db();

    let f1 = seed_face(&conn, "p1", Some("a"));
    let f2 = seed_face(&conn, "p1", Some("b"));
    let f3 = seed_face(&conn, "p2", Some("c"));

    let (persons, assigned) =
        writer::replace_person_clusters(&mut conn, &[vec![f1, f2], vec![f3]]).unwrap();
    assert_eq!(persons, 2);
    assert_eq!(assigned, 3);

    let listed = query::list_persons(&conn).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].face_count, 2);
    assert_eq!(listed[1].face_count, 1);

    let faces = query::faces_for_photo_full(&conn, "p1").unwrap();
    assert_eq!(faces[0].person_id, faces[1].person_id);
    assert!(faces[0].person_id.is_some());
}

#[test]
fn test_replace_person_clusters_is_total_replacement() {
    let (_tmp, _path, mut conn) = setup_test_db();

    let f1 = seed_face(&conn, "p1", Some("a"));
    let f2 = seed_face(&conn, "p1", Some("b"));

    writer::replace_person_clusters(&mut conn, &[vec![f1], vec![f2]]).unwrap();
    assert_eq!(query::list_persons(&conn).unwrap().len(), 2);

    // Re-clustering with one merged component must leave exactly one person.
    writer::replace_person_clusters(&mut conn, &[vec![f1, f2]]).unwrap();
    let persons = query::list_persons(&conn).unwrap();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].face_count, 2);
}

#[test]
fn test_faces_for_photo_projection_joins_person_name() {
    let (_tmp, _path, mut conn) = setup_test_db();

    let f1 = seed_face(&conn, "p1", Some("a"));
    writer::replace_person_clusters(&mut conn, &[vec![f1]]).unwrap();
    conn.execute("UPDATE persons SET name = 'Ada'", []).unwrap();

    let views = query::faces_for_photo(&conn, "p1").unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].person_name.as_deref(), Some("Ada"));
}

#[test]
fn test_persons_with_representative_face() {
    let (_tmp, _path, mut conn) = setup_test_db();

    let bbox = BoundingBox::new(0.1, 0.1, 0.2, 0.2);
    let f1 = writer::insert_face(&conn, "p1", Some("a"), &[], &bbox, Some("https://cdn/t1.webp"))
        .unwrap();
    let f2 = seed_face(&conn, "p2", Some("b"));
    writer::replace_person_clusters(&mut conn, &[vec![f1, f2]]).unwrap();

    let views = query::persons_with_representative_face(&conn).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].face_count, 2);
    assert_eq!(views[0].representative_photo.as_deref(), Some("p1"));
    assert_eq!(views[0].representative_thumbnail.as_deref(), Some("https://cdn/t1.webp"));
}

#[test]
fn test_truncate_all_clears_everything() {
    let (_tmp, _path, mut conn) = setup_test_db();

    writer::insert_photo(&conn, "p1", "https://cdn/p1.jpg", None, None, None).unwrap();
    let f1 = seed_face(&conn, "p1", Some("a"));
    writer::replace_person_clusters(&mut conn, &[vec![f1]]).unwrap();

    writer::truncate_all(&mut conn).unwrap();
    assert_eq!(query::count_photos(&conn).unwrap(), 0);
    assert_eq!(query::count_faces(&conn).unwrap(), 0);
    assert!(query::list_persons(&conn).unwrap().is_empty());
}

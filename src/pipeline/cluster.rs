use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info};

use crate::db;
use crate::recognition::{Recognition, RecognitionError};
use crate::utils::config::Config;

/// Disjoint-set over dense indices, array-backed for cheap path compression.
/// Faces get their dense index at load time; a side table maps external ids
/// back to indices.
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Second pass: point everything on the path at the root.
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Group every element by its set root.
    pub fn components(&mut self) -> HashMap<usize, Vec<usize>> {
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for x in 0..self.parent.len() {
            let root = self.find(x);
            groups.entry(root).or_default().push(x);
        }
        groups
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterSummary {
    pub persons_created: usize,
    pub faces_assigned: usize,
    pub singletons: usize,
}

/// Group all indexed faces into person identities.
///
/// Every face with an external id seeds a singleton set; one similarity
/// search per face adds edges (the edge set is the union of both directions'
/// results), and connected components become persons. The previous person
/// state is disposable and replaced wholesale.
pub async fn run<R: Recognition>(
    config: &Config,
    db_path: &Path,
    recognition: &R,
) -> Result<ClusterSummary> {
    info!("Loading faces from database...");
    let rows = {
        let dbp = db_path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Vec<(i64, String)>> {
            let conn = db::open_or_create(&dbp)?;
            db::query::clusterable_faces(&conn)
        })
        .await??
    };
    if rows.is_empty() {
        anyhow::bail!("No faces in database. Run the indexer first.");
    }
    info!("Loaded {} faces.", rows.len());

    let external_to_idx: HashMap<&str, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, (_, ext))| (ext.as_str(), i))
        .collect();

    let mut uf = UnionFind::new(rows.len());

    info!("Searching for matches (threshold={})...", config.match_threshold);
    for (i, (_, external_id)) in rows.iter().enumerate() {
        match recognition
            .search_faces(external_id, config.match_threshold, config.max_matches)
            .await
        {
            Ok(matches) => {
                for m in matches {
                    if let Some(&j) = external_to_idx.get(m.external_id.as_str()) {
                        uf.union(i, j);
                    }
                }
            }
            // A missing collection is a setup error; clustering against it
            // would only ever produce singletons.
            Err(e @ RecognitionError::CollectionMissing(_)) => return Err(e.into()),
            Err(e) => error!("Error searching face {}: {}", external_id, e),
        }
        if (i + 1) % 20 == 0 {
            info!("Searched {}/{}...", i + 1, rows.len());
        }
    }

    let clusters: Vec<Vec<i64>> = uf
        .components()
        .into_values()
        .map(|members| members.into_iter().map(|i| rows[i].0).collect())
        .collect();
    info!("Found {} clusters.", clusters.len());

    info!("Replacing person assignments...");
    let (persons_created, faces_assigned) = {
        let dbp = db_path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(usize, usize)> {
            let mut conn = db::open_or_create(&dbp)?;
            db::writer::replace_person_clusters(&mut conn, &clusters)
        })
        .await??
    };

    let persons = {
        let dbp = db_path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Vec<crate::models::photo::Person>> {
            let conn = db::open_or_create(&dbp)?;
            db::query::list_persons(&conn)
        })
        .await??
    };
    let singletons = persons.iter().filter(|p| p.face_count == 1).count();

    info!("Total persons: {}", persons.len());
    for p in &persons {
        info!("  {}: {} faces", p.name.as_deref().unwrap_or("(unnamed)"), p.face_count);
    }
    if singletons > 0 {
        info!(
            "Note: {} person(s) with only 1 face, may be unique or false detections",
            singletons
        );
    }
    info!("Done. Re-run clustering anytime to regroup.");

    Ok(ClusterSummary {
        persons_created,
        faces_assigned,
        singletons,
    })
}

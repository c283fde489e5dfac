//! Average-linkage agglomerative clustering on cosine distance.
//!
//! Shared by consolidation (one pass over a time window) and the hierarchy
//! builder (one pass per level).

use crate::embedding::{cosine_similarity, l2_normalize};

/// Cluster `vectors`, merging the closest pair until the closest remaining pair
/// is at or beyond `threshold` (cosine distance, `1 - cos`).
///
/// Returns every cluster, singletons included, as ascending member indices,
/// ordered by their smallest member.
pub fn agglomerative(vectors: &[Vec<f32>], threshold: f64) -> Vec<Vec<usize>> {
    let n = vectors.len();
    if n == 0 {
        return Vec::new();
    }

    let mut dist = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = 1.0 - cosine_similarity(&vectors[i], &vectors[j]) as f64;
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut clusters: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if clusters[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if clusters[j].is_none() {
                    continue;
                }
                if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                    best = Some((i, j, dist[i][j]));
                }
            }
        }

        let Some((i, j, d)) = best else { break };
        if d >= threshold {
            break;
        }

        let Some(absorbed) = clusters[j].take() else { break };
        let size_i = clusters[i].as_ref().map_or(0, |c| c.len()) as f64;
        let size_j = absorbed.len() as f64;

        // Lance-Williams update for average linkage
        for k in 0..n {
            if k == i || k == j || clusters[k].is_none() {
                continue;
            }
            let merged = (size_i * dist[k][i] + size_j * dist[k][j]) / (size_i + size_j);
            dist[k][i] = merged;
            dist[i][k] = merged;
        }
        if let Some(c) = clusters[i].as_mut() {
            c.extend(absorbed);
        }
    }

    let mut out: Vec<Vec<usize>> = clusters
        .into_iter()
        .flatten()
        .map(|mut c| {
            c.sort_unstable();
            c
        })
        .collect();
    out.sort_by_key(|c| c[0]);
    out
}

/// Unit-length mean of `vectors`.
pub fn centroid(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; first.len()];
    for v in vectors {
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
    }
    l2_normalize(&sum)
}

//! Reciprocal rank fusion of the lexical and kNN hit lists.

use std::collections::HashMap;

use serde_json::Value;

/// Dampening constant: a hit at zero-based index `i` contributes
/// `1 / (K + i + 1)` to its document's fused score.
const RRF_K: f64 = 60.0;

/// Fuse two ranked hit lists into one, deduplicated by backend `_id`
/// and ordered by fused score descending.
///
/// When a document appears in both lists the hit object from
/// `lexical` is kept (its metadata is generally richer). Ties are
/// broken by first appearance in `lexical`.
pub fn reciprocal_rank_fusion(lexical: Vec<Value>, semantic: Vec<Value>) -> Vec<Value> {
    struct Fused {
        hit: Value,
        score: f64,
    }

    let mut entries: Vec<Fused> = Vec::with_capacity(lexical.len() + semantic.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for list in [lexical, semantic] {
        for (rank, hit) in list.into_iter().enumerate() {
            let contribution = 1.0 / (RRF_K + rank as f64 + 1.0);
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            match positions.get(&id) {
                Some(&index) => entries[index].score += contribution,
                None => {
                    positions.insert(id, entries.len());
                    entries.push(Fused {
                        hit,
                        score: contribution,
                    });
                }
            }
        }
    }

    // stable sort keeps insertion order (lexical first) on equal scores
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    entries.into_iter().map(|entry| entry.hit).collect()
}

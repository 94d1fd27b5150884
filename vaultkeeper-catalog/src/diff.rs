//! Compare two catalog snapshots (§4.1 "DiffCatalogs"), used by the
//! orchestrator to report what a task actually changed.

use std::collections::HashSet;

use vaultkeeper_core::Game;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub media_added: usize,
    pub media_removed: usize,
    pub total_games: usize,
    pub total_media: usize,
}

/// Diff `baseline` against `candidate`, matching entries by `path`.
pub fn diff_catalogs(baseline: &[Game], candidate: &[Game]) -> CatalogDiff {
    let baseline_paths: HashSet<&str> = baseline.iter().map(|g| g.path.as_str()).collect();
    let candidate_paths: HashSet<&str> = candidate.iter().map(|g| g.path.as_str()).collect();

    let added = candidate_paths
        .difference(&baseline_paths)
        .map(|s| s.to_string())
        .collect();
    let removed = baseline_paths
        .difference(&candidate_paths)
        .map(|s| s.to_string())
        .collect();

    let mut media_added = 0;
    let mut media_removed = 0;
    for candidate_game in candidate {
        let Some(baseline_game) = baseline.iter().find(|g| g.path == candidate_game.path) else {
            media_added += candidate_game.media.len();
            continue;
        };
        for field in candidate_game.media.keys() {
            if !baseline_game.media.contains_key(field) {
                media_added += 1;
            }
        }
        for field in baseline_game.media.keys() {
            if !candidate_game.media.contains_key(field) {
                media_removed += 1;
            }
        }
    }
    for removed_path in &removed {
        if let Some(g) = baseline.iter().find(|g| &g.path == removed_path) {
            media_removed += g.media.len();
        }
    }

    CatalogDiff {
        added,
        removed,
        media_added,
        media_removed,
        total_games: candidate.len(),
        total_media: candidate.iter().map(|g| g.media.len()).sum(),
    }
}

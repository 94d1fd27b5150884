//! The five-step matching algorithm (§4.3).

use vaultkeeper_corpus::PlatformView;

use crate::index::{MatchKind, UnifiedIndex};
use crate::lcs::lcs_ratio;
use crate::normalize::normalized_variants;

const EARLY_EXIT_SCORE: f64 = 0.9;
const PUBLISHER_EXACT_BONUS: f64 = 0.15;
const PUBLISHER_SUBSTRING_BONUS: f64 = 0.08;
const DEVELOPER_EXACT_BONUS: f64 = 0.12;
const DEVELOPER_SUBSTRING_BONUS: f64 = 0.06;
const TOP_CANDIDATES_FOR_REVIEW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    LaunchboxId,
    Main,
    Alternate,
}

/// What's known about the game being matched, gathered from its
/// existing catalog entry.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery<'a> {
    pub name: &'a str,
    pub existing_id: Option<&'a str>,
    pub known_publisher: Option<&'a str>,
    pub known_developer: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub database_id: String,
    pub score: f64,
    pub source: MatchSource,
    /// The corpus-cased name to promote into the catalog, with the
    /// original catalog name's region suffix reattached if the corpus
    /// name dropped it (§4.3 "Edge cases"). `None` only when the corpus
    /// entry itself has no name to offer.
    pub display_name_override: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub database_id: String,
    pub name: String,
    pub score: f64,
}

/// `None` result means `no-match` (§4.3 "Output"). The candidate list is
/// populated only for fuzzy (non-exact) attempts and is capped at
/// `TOP_CANDIDATES_FOR_REVIEW` entries, for partial-match review
/// (§4.3 step 5, §4.7 "Partial-match review").
pub fn match_game(query: &MatchQuery, view: &PlatformView) -> (Option<MatchOutcome>, Vec<Candidate>) {
    if query.name.trim().is_empty() {
        return (None, Vec::new());
    }

    if let Some(id) = query.existing_id
        && let Some(entry) = view.entry_by_id.get(id)
    {
        return (
            Some(MatchOutcome {
                database_id: id.to_string(),
                score: 1.0,
                source: MatchSource::LaunchboxId,
                display_name_override: Some(vaultkeeper_core::promote_name(query.name, &entry.name)),
            }),
            Vec::new(),
        );
    }

    let index = UnifiedIndex::build(view);
    let (with_suffix, without_suffix) = normalized_variants(query.name);

    for key in [&with_suffix, &without_suffix] {
        if let Some(hit) = index.lookup_exact(key) {
            let source = match hit.kind {
                MatchKind::Main => MatchSource::Main,
                MatchKind::Alternate => MatchSource::Alternate,
            };
            return (
                Some(MatchOutcome {
                    database_id: hit.database_id.clone(),
                    score: 1.0,
                    source,
                    display_name_override: hit
                        .display_name
                        .as_ref()
                        .map(|name| vaultkeeper_core::promote_name(query.name, name)),
                }),
                Vec::new(),
            );
        }
    }

    fuzzy_fallback(query, &with_suffix, &without_suffix, &index)
}

fn fuzzy_fallback(
    query: &MatchQuery,
    with_suffix: &str,
    without_suffix: &str,
    index: &UnifiedIndex,
) -> (Option<MatchOutcome>, Vec<Candidate>) {
    let mut scored: Vec<(Candidate, MatchSource, Option<String>)> = Vec::new();

    // Iterate in a stable order (by database ID) rather than the
    // index's hash-map order, so which candidate trips the early exit —
    // and therefore the final ranking — doesn't vary run to run (§4.3
    // "Determinism").
    let mut ordered: Vec<_> = index.all_names().collect();
    ordered.sort_by(|a, b| a.1.database_id.cmp(&b.1.database_id));

    for (normalized_name, candidate) in ordered {
        let base = lcs_ratio(with_suffix, normalized_name).max(lcs_ratio(without_suffix, normalized_name));
        let entry = index.view().entry_by_id.get(&candidate.database_id);
        let bonus = entry.map(|e| bonus_for(query, e)).unwrap_or(0.0);
        let score = (base + bonus).min(1.0);

        let source = match candidate.kind {
            MatchKind::Main => MatchSource::Main,
            MatchKind::Alternate => MatchSource::Alternate,
        };
        let display_name = match candidate.kind {
            MatchKind::Alternate => candidate.display_name.clone(),
            MatchKind::Main => None,
        };
        let name = entry.map(|e| e.name.clone()).unwrap_or_default();

        scored.push((
            Candidate {
                database_id: candidate.database_id.clone(),
                name,
                score,
            },
            source,
            display_name,
        ));

        if score >= EARLY_EXIT_SCORE {
            break;
        }
    }

    scored.sort_by(|a, b| {
        b.0.score
            .partial_cmp(&a.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.database_id.cmp(&b.0.database_id))
    });
    scored.truncate(TOP_CANDIDATES_FOR_REVIEW);

    let candidates: Vec<Candidate> = scored.iter().map(|(c, _, _)| c.clone()).collect();

    let best = scored.first();
    let outcome = best
        .filter(|(c, _, _)| c.score >= 1.0)
        .map(|(c, source, display_name)| MatchOutcome {
            database_id: c.database_id.clone(),
            score: c.score,
            source: *source,
            display_name_override: display_name
                .as_ref()
                .map(|name| vaultkeeper_core::promote_name(query.name, name)),
        });

    (outcome, candidates)
}

fn bonus_for(query: &MatchQuery, entry: &vaultkeeper_corpus::CorpusEntry) -> f64 {
    let mut bonus = 0.0;
    if let Some(known) = query.known_publisher
        && let Some(corpus_publisher) = entry.attr("Publisher")
    {
        if eq_ignore_case(known, corpus_publisher) {
            bonus += PUBLISHER_EXACT_BONUS;
        } else if contains_ignore_case(corpus_publisher, known) {
            bonus += PUBLISHER_SUBSTRING_BONUS;
        }
    }
    if let Some(known) = query.known_developer
        && let Some(corpus_developer) = entry.attr("Developer")
    {
        if eq_ignore_case(known, corpus_developer) {
            bonus += DEVELOPER_EXACT_BONUS;
        } else if contains_ignore_case(corpus_developer, known) {
            bonus += DEVELOPER_SUBSTRING_BONUS;
        }
    }
    bonus
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use vaultkeeper_corpus::CorpusEntry;

    fn view_with(entries: Vec<(&str, &str)>) -> PlatformView {
        let mut entry_by_id = HashMap::new();
        for (id, name) in entries {
            entry_by_id.insert(
                id.to_string(),
                CorpusEntry {
                    id: id.to_string(),
                    name: name.to_string(),
                    platform: "NES".to_string(),
                    attributes: BTreeMap::new(),
                },
            );
        }
        PlatformView {
            entry_by_id,
            alternate_names_by_id: HashMap::new(),
            images_by_id: HashMap::new(),
        }
    }

    #[test]
    fn authoritative_id_shortcut_wins() {
        let view = view_with(vec![("1", "Super Mario Bros.")]);
        let query = MatchQuery {
            name: "Completely Different Name",
            existing_id: Some("1"),
            ..Default::default()
        };
        let (outcome, candidates) = match_game(&query, &view);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.database_id, "1");
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.source, MatchSource::LaunchboxId);
        assert!(candidates.is_empty());
    }

    #[test]
    fn authoritative_id_shortcut_promotes_corpus_name() {
        let view = view_with(vec![("42", "Foo")]);
        let query = MatchQuery {
            name: "Wrong",
            existing_id: Some("42"),
            ..Default::default()
        };
        let (outcome, _) = match_game(&query, &view);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.display_name_override.as_deref(), Some("Foo"));
    }

    #[test]
    fn alternate_name_match_preserves_region_suffix() {
        let mut view = view_with(vec![("1", "Bar")]);
        view.alternate_names_by_id.insert("1".to_string(), vec!["Baz".to_string()]);
        let query = MatchQuery {
            name: "Baz (USA)",
            ..Default::default()
        };
        let (outcome, _) = match_game(&query, &view);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.source, MatchSource::Alternate);
        assert_eq!(outcome.display_name_override.as_deref(), Some("Baz (USA)"));
    }

    #[test]
    fn exact_normalized_match() {
        let view = view_with(vec![("1", "Super Mario Bros.")]);
        let query = MatchQuery {
            name: "super mario bros",
            ..Default::default()
        };
        let (outcome, _) = match_game(&query, &view);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.database_id, "1");
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.source, MatchSource::Main);
    }

    #[test]
    fn empty_name_is_no_match() {
        let view = view_with(vec![("1", "Super Mario Bros.")]);
        let query = MatchQuery { name: "", ..Default::default() };
        let (outcome, candidates) = match_game(&query, &view);
        assert!(outcome.is_none());
        assert!(candidates.is_empty());
    }

    #[test]
    fn fuzzy_candidates_are_ranked_and_capped() {
        let view = view_with(vec![
            ("1", "Super Mario Bros."),
            ("2", "Super Mario Bros. 2"),
            ("3", "Totally Unrelated Game"),
        ]);
        let query = MatchQuery {
            name: "Super Mario Brox",
            ..Default::default()
        };
        let (outcome, candidates) = match_game(&query, &view);
        assert!(outcome.is_none() || outcome.unwrap().score < 1.0);
        assert!(candidates.len() <= 20);
        assert!(candidates[0].score >= candidates.last().unwrap().score);
    }

    #[test]
    fn determinism_across_runs() {
        let view = view_with(vec![("1", "Sonic"), ("2", "Sonic 2")]);
        let query = MatchQuery { name: "Sonc", ..Default::default() };
        let (first, _) = match_game(&query, &view);
        let (second, _) = match_game(&query, &view);
        assert_eq!(first.map(|o| o.database_id), second.map(|o| o.database_id));
    }
}

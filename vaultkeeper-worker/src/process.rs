//! The per-game scraping loop (§4.7 "Loop"), factored out from the
//! process/IPC plumbing so it can be exercised directly in tests. Runs
//! entirely synchronously: corpus and catalog I/O are blocking calls, and
//! the worker process is single-threaded by design (§5 "Top-level model"
//! — "the Scraping Worker's per-game loop (sequential within the worker
//! process)").

use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;
use vaultkeeper_core::{Game, TextField};
use vaultkeeper_match::{match_game, Candidate, MatchOutcome, MatchQuery, MatchSource};

use crate::error::WorkerError;
use crate::ipc::{CandidateDto, ResultQueueMessage, WorkerSubmission};

#[derive(Debug, Clone)]
pub struct FinalOutcome {
    pub success: bool,
    pub stats: BTreeMap<String, i64>,
    pub matched_paths: Vec<String>,
}

const PARTIAL_CANDIDATES_SHOWN: usize = 5;

/// Run one submission to completion or cancellation. `emit` receives one
/// `Progress` per game plus any `PartialMatchRequest`s; `is_cancelled` is
/// polled before every game (§5 "Cancellation" observer #2).
pub fn run_submission<F, C>(
    task_id: Uuid,
    submission: &WorkerSubmission,
    mut emit: F,
    mut is_cancelled: C,
) -> Result<FinalOutcome, WorkerError>
where
    F: FnMut(ResultQueueMessage),
    C: FnMut() -> bool,
{
    let view = vaultkeeper_corpus::build_platform_view_from_file(&submission.corpus_path, &submission.platform)?;
    let mut games = vaultkeeper_catalog::parse_catalog(&submission.catalog_path)?;

    let selected: Option<HashSet<&str>> = submission
        .selected_paths
        .as_ref()
        .map(|paths| paths.iter().map(String::as_str).collect());
    let in_scope = |game: &Game| selected.as_ref().is_none_or(|sel| sel.contains(game.path.as_str()));

    let total = games.iter().filter(|g| in_scope(g)).count() as u64;
    let mut step = 0u64;
    let mut stats: BTreeMap<String, i64> = BTreeMap::new();
    let mut matched_paths = Vec::new();
    let mut stopped = false;

    for game in games.iter_mut() {
        if !in_scope(game) {
            continue;
        }
        if is_cancelled() {
            stopped = true;
            break;
        }
        step += 1;

        let query = MatchQuery {
            name: &game.name,
            existing_id: game.launchboxid.as_deref(),
            known_publisher: game.publisher.as_deref(),
            known_developer: game.developer.as_deref(),
        };
        let (outcome, candidates) = match_game(&query, &view);

        let mut delta = BTreeMap::new();
        let message = match outcome {
            Some(hit) if hit.score >= 1.0 => {
                apply_match(
                    game,
                    &hit,
                    &view,
                    submission.overwrite_text_fields,
                    submission.selected_fields.as_deref(),
                );
                matched_paths.push(game.path.clone());
                bump(&mut delta, "matched");
                format!("matched \"{}\"", game.name)
            }
            Some(hit) => {
                if submission.partial_match_review {
                    emit(ResultQueueMessage::PartialMatchRequest {
                        task_id,
                        game_path: game.path.clone(),
                        candidates: candidates_to_dto(&candidates),
                    });
                }
                bump(&mut delta, "no_match");
                format!("no confident match for \"{}\" (best {:.2})", game.name, hit.score)
            }
            None => {
                bump(&mut delta, "no_match");
                format!("no match for \"{}\"", game.name)
            }
        };

        for (key, value) in &delta {
            *stats.entry(key.clone()).or_insert(0) += value;
        }

        emit(ResultQueueMessage::Progress {
            task_id,
            message,
            progress_percentage: percentage(step, total),
            current_step: Some(step),
            total_steps: Some(total),
            stats_delta: delta,
        });
    }

    if stopped {
        emit(ResultQueueMessage::Progress {
            task_id,
            message: "stopped by user".to_string(),
            progress_percentage: None,
            current_step: Some(step),
            total_steps: Some(total),
            stats_delta: BTreeMap::new(),
        });
    }

    vaultkeeper_catalog::write_catalog(&submission.catalog_path, &games)?;

    Ok(FinalOutcome {
        success: !stopped,
        stats,
        matched_paths,
    })
}

/// Writes a match's corpus fields into `game`, gated by `overwrite_text_fields`
/// (fill-if-empty vs. unconditional overwrite, §9(iii)) and `selected_fields`
/// (`None` means every `TextField` is in scope).
fn apply_match(
    game: &mut Game,
    hit: &MatchOutcome,
    view: &vaultkeeper_corpus::PlatformView,
    overwrite_text_fields: bool,
    selected_fields: Option<&[TextField]>,
) {
    let in_scope = |field: TextField| selected_fields.is_none_or(|fields| fields.contains(&field));

    game.launchboxid = Some(hit.database_id.clone());
    if in_scope(TextField::Name)
        && let Some(name) = &hit.display_name_override
    {
        update_text(&mut game.name, name, overwrite_text_fields);
    }

    let Some(entry) = view.entry_by_id.get(&hit.database_id) else { return };
    if in_scope(TextField::Description) {
        update_field(&mut game.desc, entry.attr("Overview"), overwrite_text_fields);
    }
    if in_scope(TextField::Genre) {
        update_field(&mut game.genre, entry.attr("Genre"), overwrite_text_fields);
    }
    if in_scope(TextField::Developer) {
        update_field(&mut game.developer, entry.attr("Developer"), overwrite_text_fields);
    }
    if in_scope(TextField::Publisher) {
        update_field(&mut game.publisher, entry.attr("Publisher"), overwrite_text_fields);
    }
    if in_scope(TextField::Players) {
        update_field(&mut game.players, entry.attr("MaxPlayers"), overwrite_text_fields);
    }
    if in_scope(TextField::Rating) {
        update_field(&mut game.rating, entry.attr("CommunityRating"), overwrite_text_fields);
    }
}

fn update_field(field: &mut Option<String>, value: Option<&str>, overwrite: bool) {
    let Some(v) = value else { return };
    if v.is_empty() {
        return;
    }
    if overwrite || field.is_none() {
        *field = Some(v.to_string());
    }
}

fn update_text(field: &mut String, value: &str, overwrite: bool) {
    if value.is_empty() {
        return;
    }
    if overwrite || field.is_empty() {
        *field = value.to_string();
    }
}

/// Applies one partial-match candidate the user picked out of band
/// (§4.7 "Partial-match review") directly to the catalog, reusing
/// `apply_match`'s field semantics. Returns `false` without touching the
/// catalog if either the game or the corpus entry can't be found.
pub fn apply_candidate(
    corpus_path: &std::path::Path,
    catalog_path: &std::path::Path,
    platform: &str,
    game_path: &str,
    database_id: &str,
    overwrite_text_fields: bool,
    selected_fields: Option<&[TextField]>,
) -> Result<bool, WorkerError> {
    let view = vaultkeeper_corpus::build_platform_view_from_file(corpus_path, platform)?;
    let Some(entry) = view.entry_by_id.get(database_id) else {
        return Ok(false);
    };
    let mut games = vaultkeeper_catalog::parse_catalog(catalog_path)?;
    let Some(game) = games.iter_mut().find(|g| g.path == game_path) else {
        return Ok(false);
    };

    let outcome = MatchOutcome {
        database_id: database_id.to_string(),
        score: 1.0,
        source: MatchSource::Main,
        display_name_override: Some(vaultkeeper_core::promote_name(&game.name, &entry.name)),
    };
    apply_match(game, &outcome, &view, overwrite_text_fields, selected_fields);
    vaultkeeper_catalog::write_catalog(catalog_path, &games)?;
    Ok(true)
}

fn percentage(step: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    Some(((step * 100 / total).min(100)) as u8)
}

fn bump(stats: &mut BTreeMap<String, i64>, key: &str) {
    *stats.entry(key.to_string()).or_insert(0) += 1;
}

fn candidates_to_dto(candidates: &[Candidate]) -> Vec<CandidateDto> {
    candidates
        .iter()
        .take(PARTIAL_CANDIDATES_SHOWN)
        .map(|c| CandidateDto {
            database_id: c.database_id.clone(),
            name: c.name.clone(),
            score: c.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_corpus(path: &std::path::Path) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(
            f,
            r#"<?xml version="1.0"?>
<LaunchBox>
  <Game>
    <DatabaseID>100</DatabaseID>
    <Name>Super Example</Name>
    <Platform>snes</Platform>
    <Genre>Platformer</Genre>
  </Game>
</LaunchBox>"#
        )
        .unwrap();
    }

    fn write_catalog(path: &std::path::Path) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(
            f,
            r#"<?xml version="1.0"?>
<gameList>
  <game>
    <path>./Super Example.zip</path>
    <name>Super Example</name>
  </game>
</gameList>"#
        )
        .unwrap();
    }

    #[test]
    fn matches_and_fills_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.xml");
        let catalog_path = dir.path().join("gamelist.xml");
        write_corpus(&corpus_path);
        write_catalog(&catalog_path);

        let submission = WorkerSubmission {
            task_id: Uuid::new_v4(),
            corpus_path,
            platform: "snes".to_string(),
            catalog_path: catalog_path.clone(),
            selected_paths: None,
            partial_match_review: false,
            region_priority: vec![],
            overwrite_text_fields: false,
            selected_fields: None,
        };

        let mut progress = Vec::new();
        let outcome = run_submission(submission.task_id, &submission, |m| progress.push(m), || false).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.matched_paths, vec!["./Super Example.zip".to_string()]);
        assert_eq!(outcome.stats.get("matched"), Some(&1));

        let games = vaultkeeper_catalog::parse_catalog(&catalog_path).unwrap();
        assert_eq!(games[0].launchboxid.as_deref(), Some("100"));
        assert_eq!(games[0].genre.as_deref(), Some("Platformer"));
    }

    #[test]
    fn cancellation_stops_before_next_game_and_writes_partial_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.xml");
        let catalog_path = dir.path().join("gamelist.xml");
        write_corpus(&corpus_path);
        write_catalog(&catalog_path);

        let submission = WorkerSubmission {
            task_id: Uuid::new_v4(),
            corpus_path,
            platform: "snes".to_string(),
            catalog_path: catalog_path.clone(),
            selected_paths: None,
            partial_match_review: false,
            region_priority: vec![],
            overwrite_text_fields: false,
            selected_fields: None,
        };

        let outcome = run_submission(submission.task_id, &submission, |_| {}, || true).unwrap();
        assert!(!outcome.success);
        assert!(outcome.matched_paths.is_empty());
        assert!(catalog_path.exists());
    }

    fn write_corpus_with_developer(path: &std::path::Path) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(
            f,
            r#"<?xml version="1.0"?>
<LaunchBox>
  <Game>
    <DatabaseID>100</DatabaseID>
    <Name>Super Example</Name>
    <Platform>snes</Platform>
    <Genre>Platformer</Genre>
    <Developer>Acme</Developer>
  </Game>
</LaunchBox>"#
        )
        .unwrap();
    }

    #[test]
    fn selected_fields_restricts_which_columns_change() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.xml");
        let catalog_path = dir.path().join("gamelist.xml");
        write_corpus_with_developer(&corpus_path);
        write_catalog(&catalog_path);

        let submission = WorkerSubmission {
            task_id: Uuid::new_v4(),
            corpus_path,
            platform: "snes".to_string(),
            catalog_path: catalog_path.clone(),
            selected_paths: None,
            partial_match_review: false,
            region_priority: vec![],
            overwrite_text_fields: false,
            selected_fields: Some(vec![TextField::Name, TextField::Developer]),
        };

        run_submission(submission.task_id, &submission, |_| {}, || false).unwrap();

        let games = vaultkeeper_catalog::parse_catalog(&catalog_path).unwrap();
        assert_eq!(games[0].developer.as_deref(), Some("Acme"));
        assert_eq!(games[0].genre, None);
    }

    #[test]
    fn overwrite_text_fields_replaces_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.xml");
        let catalog_path = dir.path().join("gamelist.xml");
        write_corpus_with_developer(&corpus_path);
        let mut f = std::fs::File::create(&catalog_path).unwrap();
        writeln!(
            f,
            r#"<?xml version="1.0"?>
<gameList>
  <game>
    <path>./Super Example.zip</path>
    <name>Super Example</name>
    <genre>Old Genre</genre>
  </game>
</gameList>"#
        )
        .unwrap();
        drop(f);

        let submission = WorkerSubmission {
            task_id: Uuid::new_v4(),
            corpus_path,
            platform: "snes".to_string(),
            catalog_path: catalog_path.clone(),
            selected_paths: None,
            partial_match_review: false,
            region_priority: vec![],
            overwrite_text_fields: true,
            selected_fields: None,
        };

        run_submission(submission.task_id, &submission, |_| {}, || false).unwrap();

        let games = vaultkeeper_catalog::parse_catalog(&catalog_path).unwrap();
        assert_eq!(games[0].genre.as_deref(), Some("Platformer"));
    }

    #[test]
    fn apply_candidate_updates_catalog_out_of_band() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.xml");
        let catalog_path = dir.path().join("gamelist.xml");
        write_corpus(&corpus_path);
        let mut f = std::fs::File::create(&catalog_path).unwrap();
        writeln!(
            f,
            r#"<?xml version="1.0"?>
<gameList>
  <game>
    <path>./mystery.zip</path>
    <name>Mystery Rom</name>
  </game>
</gameList>"#
        )
        .unwrap();
        drop(f);

        // overwrite_text_fields=true: the user explicitly picked this candidate, so
        // the existing (wrong) name gets replaced, not just filled in when empty.
        let applied = apply_candidate(&corpus_path, &catalog_path, "snes", "./mystery.zip", "100", true, None).unwrap();
        assert!(applied);

        let games = vaultkeeper_catalog::parse_catalog(&catalog_path).unwrap();
        assert_eq!(games[0].name, "Super Example");
        assert_eq!(games[0].launchboxid.as_deref(), Some("100"));
        assert_eq!(games[0].genre.as_deref(), Some("Platformer"));
    }

    #[test]
    fn apply_candidate_missing_game_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.xml");
        let catalog_path = dir.path().join("gamelist.xml");
        write_corpus(&corpus_path);
        write_catalog(&catalog_path);

        let applied = apply_candidate(&corpus_path, &catalog_path, "snes", "./nope.zip", "100", false, None).unwrap();
        assert!(!applied);
    }
}

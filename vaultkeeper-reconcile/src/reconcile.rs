//! Walk each media category directory and reconcile catalog fields
//! against what's actually on disk (§4.5).

use std::collections::HashMap;
use std::path::Path;

use vaultkeeper_catalog::write_catalog;
use vaultkeeper_core::Game;

use crate::error::ReconcileError;
use crate::mapping::MediaCategory;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub updated_games: usize,
    pub removed_media: usize,
}

/// Reconcile `games` in place against `rom_tree_root`'s media
/// directories, then rewrite the catalog at `catalog_path` — always,
/// even when nothing changed, so ordering/formatting stays canonical
/// (§4.5 "Idempotence").
pub fn reconcile_system(
    rom_tree_root: &Path,
    catalog_path: &Path,
    categories: &[MediaCategory],
    mut games: Vec<Game>,
) -> Result<ReconcileStats, ReconcileError> {
    let mut stats = ReconcileStats::default();

    for category in categories {
        let dir = rom_tree_root.join(&category.directory_name);
        let files_by_stem = list_files_by_stem(&dir, &category.allowed_extensions)?;

        for game in &mut games {
            let Some(stem) = game.rom_stem() else { continue };
            match files_by_stem.get(stem) {
                Some(file_name) => {
                    let relative = format!("./media/{}/{}", category.directory_name, file_name);
                    if game.media_field(category.field) != Some(relative.as_str()) {
                        game.set_media_field(category.field, relative);
                        stats.updated_games += 1;
                    }
                }
                None => {
                    if game.media_field(category.field).is_some() {
                        game.clear_media_field(category.field);
                        stats.removed_media += 1;
                    }
                }
            }
        }
    }

    write_catalog(catalog_path, &games)?;
    Ok(stats)
}

fn list_files_by_stem(dir: &Path, allowed_extensions: &[String]) -> Result<HashMap<String, String>, ReconcileError> {
    let mut by_stem = HashMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(by_stem),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        if !allowed_extensions.is_empty() && !allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        by_stem.insert(stem.to_string(), file_name.to_string());
    }
    Ok(by_stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkeeper_core::MediaField;

    fn category() -> MediaCategory {
        MediaCategory {
            directory_name: "boxart".to_string(),
            field: MediaField::Boxart,
            allowed_extensions: vec!["png".to_string()],
        }
    }

    #[test]
    fn sets_field_when_matching_file_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("boxart")).unwrap();
        std::fs::write(dir.path().join("boxart/Foo.png"), b"data").unwrap();

        let catalog_path = dir.path().join("gamelist.xml");
        let games = vec![Game::with_defaults(1, "./Foo.zip")];
        let stats = reconcile_system(dir.path(), &catalog_path, &[category()], games).unwrap();

        assert_eq!(stats.updated_games, 1);
        let written = vaultkeeper_catalog::parse_catalog(&catalog_path).unwrap();
        assert_eq!(written[0].media_field(MediaField::Boxart), Some("./media/boxart/Foo.png"));
    }

    #[test]
    fn clears_field_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("gamelist.xml");
        let mut game = Game::with_defaults(1, "./Foo.zip");
        game.set_media_field(MediaField::Boxart, "./media/boxart/Foo.png");

        let stats = reconcile_system(dir.path(), &catalog_path, &[category()], vec![game]).unwrap();
        assert_eq!(stats.removed_media, 1);
        let written = vaultkeeper_catalog::parse_catalog(&catalog_path).unwrap();
        assert_eq!(written[0].media_field(MediaField::Boxart), None);
    }

    #[test]
    fn repeated_runs_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("boxart")).unwrap();
        std::fs::write(dir.path().join("boxart/Foo.png"), b"data").unwrap();
        let catalog_path = dir.path().join("gamelist.xml");

        let games = vec![Game::with_defaults(1, "./Foo.zip")];
        reconcile_system(dir.path(), &catalog_path, &[category()], games).unwrap();

        let reloaded = vaultkeeper_catalog::parse_catalog(&catalog_path).unwrap();
        let stats = reconcile_system(dir.path(), &catalog_path, &[category()], reloaded).unwrap();
        assert_eq!(stats.updated_games, 0);
        assert_eq!(stats.removed_media, 0);
    }
}

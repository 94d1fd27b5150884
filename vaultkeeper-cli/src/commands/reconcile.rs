//! `vaultkeeper reconcile` and `vaultkeeper diff`: the two commands that
//! only touch the Catalog Store, with no Task involved.

use std::path::Path;

use vaultkeeper_catalog::{diff_catalogs, parse_catalog};
use vaultkeeper_core::VaultConfig;
use vaultkeeper_reconcile::{categories_from_config, reconcile_system};

use crate::error::CliError;

pub(crate) async fn run_reconcile(config: &VaultConfig, system: String) -> Result<(), CliError> {
    let catalog_path = config.gamelist_path(&system);
    let games = parse_catalog(&catalog_path)?;
    let categories = categories_from_config(&config.media_mappings, &config.media_extensions);
    let rom_tree = config.rom_tree_system_dir(&system);

    let stats = reconcile_system(&rom_tree, &catalog_path, &categories, games)?;
    log::info!(
        "reconciled {system}: {} game(s) updated, {} media reference(s) removed",
        stats.updated_games,
        stats.removed_media,
    );
    Ok(())
}

pub(crate) async fn run_diff(before: &Path, after: &Path) -> Result<(), CliError> {
    let baseline = parse_catalog(before)?;
    let candidate = parse_catalog(after)?;
    let diff = diff_catalogs(&baseline, &candidate);

    println!("added:         {}", diff.added.len());
    println!("removed:       {}", diff.removed.len());
    println!("media added:   {}", diff.media_added);
    println!("media removed: {}", diff.media_removed);
    println!("total games:   {}", diff.total_games);
    println!("total media:   {}", diff.total_media);
    for path in &diff.added {
        println!("  + {path}");
    }
    for path in &diff.removed {
        println!("  - {path}");
    }
    Ok(())
}

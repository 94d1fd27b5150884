use vaultkeeper_catalog::{diff_catalogs, parse_catalog, write_catalog};
use vaultkeeper_core::{Game, MediaField};

#[test]
fn round_trips_a_full_catalog_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gamelist.xml");

    let mut mario = Game::with_defaults(1, "./Super Mario Bros. (USA).zip");
    mario.name = "Super Mario Bros.".to_string();
    mario.genre = Some("Platformer".to_string());
    mario.set_media_field(MediaField::Boxart, "./media/boxart/mario.png");

    let zelda = Game::with_defaults(2, "./Zelda (Europe).zip");

    write_catalog(&path, &[mario.clone(), zelda.clone()]).unwrap();
    let parsed = parse_catalog(&path).unwrap();

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].genre.as_deref(), Some("Platformer"));
    assert_eq!(parsed[0].media_field(MediaField::Boxart), Some("./media/boxart/mario.png"));
}

#[test]
fn diff_reports_zero_changes_for_identical_snapshots() {
    let game = Game::with_defaults(1, "./Foo.zip");
    let diff = diff_catalogs(&[game.clone()], &[game]);
    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
    assert_eq!(diff.media_added, 0);
    assert_eq!(diff.media_removed, 0);
}

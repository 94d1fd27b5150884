use std::collections::HashMap;

use vaultkeeper_core::{Game, MediaField};
use vaultkeeper_corpus::ImageDescriptor;
use vaultkeeper_download::{region_priority_for_game, select_best_media};

#[test]
fn end_to_end_region_selection_for_a_catalog_game() {
    let game = Game::with_defaults(1, "./Chrono Trigger (USA).sfc");
    let priority = region_priority_for_game(&game, &["Japan".to_string(), "Europe".to_string()]);
    assert_eq!(priority[0], "USA");

    let images = vec![
        ImageDescriptor { image_type: "box-2D".to_string(), file_name: "jp.png".to_string(), region: Some("Japan".to_string()) },
        ImageDescriptor { image_type: "box-2D".to_string(), file_name: "us.png".to_string(), region: Some("USA".to_string()) },
    ];
    let mut mappings = HashMap::new();
    mappings.insert("box-2D".to_string(), "boxart".to_string());

    let selected = select_best_media(&images, &mappings, &priority);
    assert_eq!(selected[&MediaField::Boxart].file_name, "us.png");
}

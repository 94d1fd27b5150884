//! Media selection by image-type mapping and region priority (§4.4
//! "Region selection"), adapted from ScreenScraper's per-region media
//! picker to the corpus's `ImageDescriptor` shape.

use std::collections::HashMap;

use vaultkeeper_corpus::ImageDescriptor;
use vaultkeeper_core::{Game, MediaField};

/// Per game, a region priority list: the catalog filename's own region
/// token (if any) promoted to first, then the configured default order.
pub fn region_priority_for_game(game: &Game, default_priority: &[String]) -> Vec<String> {
    let mut priority = Vec::with_capacity(default_priority.len() + 1);
    if let Some(token) = game.region_token() {
        priority.push(token);
    }
    for region in default_priority {
        if !priority.iter().any(|r| r.eq_ignore_ascii_case(region)) {
            priority.push(region.clone());
        }
    }
    priority
}

/// Pick the single best image per mapped catalog field: the
/// highest-priority-region image among those whose provider `image_type`
/// maps to that field (§4.4 "always downloads one file per catalog field
/// per game, the top-priority available").
pub fn select_best_media<'a>(
    images: &'a [ImageDescriptor],
    image_type_mappings: &HashMap<String, String>,
    region_priority: &[String],
) -> HashMap<MediaField, &'a ImageDescriptor> {
    let mut by_field: HashMap<MediaField, Vec<&ImageDescriptor>> = HashMap::new();
    for image in images {
        let Some(field_name) = image_type_mappings.get(&image.image_type) else {
            continue;
        };
        let Some(field) = MediaField::from_tag(field_name) else {
            continue;
        };
        by_field.entry(field).or_default().push(image);
    }

    let mut selected = HashMap::with_capacity(by_field.len());
    for (field, candidates) in by_field {
        if let Some(best) = pick_by_region(&candidates, region_priority) {
            selected.insert(field, best);
        }
    }
    selected
}

fn pick_by_region<'a>(candidates: &[&'a ImageDescriptor], region_priority: &[String]) -> Option<&'a ImageDescriptor> {
    for region in region_priority {
        if let Some(found) = candidates
            .iter()
            .find(|c| c.region.as_deref().is_some_and(|r| r.eq_ignore_ascii_case(region)))
        {
            return Some(*found);
        }
    }
    // No region in the candidate matched the priority list — fall back
    // to the first available image for this field rather than skipping it.
    candidates.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(image_type: &str, region: Option<&str>) -> ImageDescriptor {
        ImageDescriptor {
            image_type: image_type.to_string(),
            file_name: format!("{image_type}.png"),
            region: region.map(str::to_string),
        }
    }

    #[test]
    fn game_filename_region_is_promoted_to_first() {
        let game = Game::with_defaults(1, "./Foo (Europe).zip");
        let priority = region_priority_for_game(&game, &["USA".to_string(), "Japan".to_string()]);
        assert_eq!(priority, vec!["Europe", "USA", "Japan"]);
    }

    #[test]
    fn selects_highest_priority_region_per_field() {
        let images = vec![image("box-2D", Some("Japan")), image("box-2D", Some("USA"))];
        let mut mappings = HashMap::new();
        mappings.insert("box-2D".to_string(), "boxart".to_string());

        let selected = select_best_media(&images, &mappings, &["USA".to_string(), "Japan".to_string()]);
        assert_eq!(selected[&MediaField::Boxart].region.as_deref(), Some("USA"));
    }

    #[test]
    fn falls_back_to_first_image_when_no_region_matches() {
        let images = vec![image("box-2D", Some("Germany"))];
        let mut mappings = HashMap::new();
        mappings.insert("box-2D".to_string(), "boxart".to_string());

        let selected = select_best_media(&images, &mappings, &["USA".to_string()]);
        assert!(selected.contains_key(&MediaField::Boxart));
    }
}

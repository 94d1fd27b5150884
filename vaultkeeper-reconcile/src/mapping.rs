//! The `(media-category -> catalog-field, extensions-allowed)` table
//! driving reconciliation (§4.5, §6 "Media mapping config"), the same
//! category/extension shape a provider's media-subdir table uses.

use std::collections::BTreeMap;

use vaultkeeper_core::MediaField;

#[derive(Debug, Clone)]
pub struct MediaCategory {
    pub directory_name: String,
    pub field: MediaField,
    pub allowed_extensions: Vec<String>,
}

/// Build the category table from config's `media_mappings` /
/// `media_extensions` maps, skipping any category whose field tag isn't
/// recognized.
pub fn categories_from_config(
    media_mappings: &BTreeMap<String, String>,
    media_extensions: &BTreeMap<String, Vec<String>>,
) -> Vec<MediaCategory> {
    media_mappings
        .iter()
        .filter_map(|(directory_name, field_tag)| {
            let field = MediaField::from_tag(field_tag)?;
            let allowed_extensions = media_extensions.get(directory_name).cloned().unwrap_or_default();
            Some(MediaCategory {
                directory_name: directory_name.clone(),
                field,
                allowed_extensions,
            })
        })
        .collect()
}

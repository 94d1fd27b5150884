//! The unified per-platform index built once over a `PlatformView`
//! (§4.3 step 3, design note §9 "flat pool indexed by integer handle").
//! Entries live in the platform view's own pool; this index stores only
//! handles (here, `DatabaseID` strings, since `PlatformView` already
//! keys its pool that way) in the name multimap, mirroring
//! `retro-junk-dat`'s hash-keyed indices over a flat game `Vec`.

use std::collections::HashMap;

use vaultkeeper_corpus::PlatformView;

use crate::normalize::normalize_game_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Main,
    Alternate,
}

/// A name-index entry: which corpus ID it resolves to, whether it came
/// from the main name or an alternate, and (for alternates) the
/// original-cased text for display.
#[derive(Debug, Clone)]
pub struct IndexedName {
    pub database_id: String,
    pub kind: MatchKind,
    pub display_name: Option<String>,
}

/// `normalized-name -> [(kind, entry)]`, built once per platform view.
pub struct UnifiedIndex<'v> {
    view: &'v PlatformView,
    by_normalized_name: HashMap<String, Vec<IndexedName>>,
}

impl<'v> UnifiedIndex<'v> {
    pub fn build(view: &'v PlatformView) -> Self {
        let mut by_normalized_name: HashMap<String, Vec<IndexedName>> = HashMap::new();

        for (id, entry) in &view.entry_by_id {
            let key = normalize_game_name(&entry.name);
            by_normalized_name.entry(key).or_default().push(IndexedName {
                database_id: id.clone(),
                kind: MatchKind::Main,
                display_name: None,
            });
        }
        for (id, names) in &view.alternate_names_by_id {
            for alt in names {
                let key = normalize_game_name(alt);
                by_normalized_name.entry(key).or_default().push(IndexedName {
                    database_id: id.clone(),
                    kind: MatchKind::Alternate,
                    display_name: Some(alt.clone()),
                });
            }
        }

        Self { view, by_normalized_name }
    }

    pub fn view(&self) -> &PlatformView {
        self.view
    }

    /// Exact lookup on a normalized key. Ties prefer `Main` over
    /// `Alternate` (§4.3 step 3).
    pub fn lookup_exact(&self, normalized: &str) -> Option<&IndexedName> {
        let candidates = self.by_normalized_name.get(normalized)?;
        candidates
            .iter()
            .find(|c| c.kind == MatchKind::Main)
            .or_else(|| candidates.first())
    }

    /// `(normalized_name, entry)` pairs, for the fuzzy fallback's linear
    /// scan against every candidate's normalized name.
    pub fn all_names(&self) -> impl Iterator<Item = (&str, &IndexedName)> {
        self.by_normalized_name
            .iter()
            .flat_map(|(key, names)| names.iter().map(move |n| (key.as_str(), n)))
    }
}

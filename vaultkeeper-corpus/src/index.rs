//! The corpus cache: a flat, handle-indexed pool of entries plus
//! secondary indices by `DatabaseID` and by platform (§4.2). The shape
//! mirrors a hash-keyed lookup index over a flat backing `Vec`, same as
//! a SHA1/MD5-keyed hash index over a flat game pool, adapted here to
//! string IDs and a platform dimension instead of content hashes.

use std::collections::HashMap;
use std::path::Path;

use crate::entry::{CorpusEntry, ImageDescriptor};
use crate::error::CorpusError;
use crate::xml::{parse_corpus_bytes, parse_corpus_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusState {
    Empty,
    Loading,
    Loaded,
}

/// The process-wide, read-only-after-load corpus cache.
pub struct CorpusCache {
    entries: Vec<CorpusEntry>,
    by_id: HashMap<String, usize>,
    by_platform: HashMap<String, Vec<usize>>,
    images_by_id: HashMap<String, Vec<ImageDescriptor>>,
    alt_names_by_id: HashMap<String, Vec<String>>,
    state: CorpusState,
}

impl Default for CorpusCache {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_id: HashMap::new(),
            by_platform: HashMap::new(),
            images_by_id: HashMap::new(),
            alt_names_by_id: HashMap::new(),
            state: CorpusState::Empty,
        }
    }
}

impl CorpusCache {
    /// Load the global corpus XML from `path`. If the file is missing,
    /// the cache is left `Empty` rather than returning an error — all
    /// matches against an empty cache become `no-match` (§4.2 "Failures").
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let mut cache = Self {
            state: CorpusState::Loading,
            ..Self::default()
        };
        match parse_corpus_file(path) {
            Ok(parsed) => cache.populate(parsed.entries, parsed.images_by_id, parsed.alt_names_by_id),
            Err(CorpusError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("corpus file not found at {}; cache is empty", path.display());
                cache.state = CorpusState::Empty;
            }
            Err(e) => return Err(e),
        }
        Ok(cache)
    }

    fn populate(
        &mut self,
        entries: Vec<CorpusEntry>,
        images_by_id: HashMap<String, Vec<ImageDescriptor>>,
        alt_names_by_id: HashMap<String, Vec<String>>,
    ) {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_platform: HashMap<String, Vec<usize>> = HashMap::new();
        for (handle, entry) in entries.iter().enumerate() {
            by_id.entry(entry.id.clone()).or_insert(handle);
            by_platform.entry(entry.platform.clone()).or_default().push(handle);
        }
        self.entries = entries;
        self.by_id = by_id;
        self.by_platform = by_platform;
        self.images_by_id = images_by_id;
        self.alt_names_by_id = alt_names_by_id;
        self.state = CorpusState::Loaded;
    }

    /// Clear and repopulate from `path` (§4.2 "Reload").
    pub fn reload(&mut self, path: &Path) -> Result<(), CorpusError> {
        self.state = CorpusState::Loading;
        let reloaded = Self::load(path)?;
        *self = reloaded;
        Ok(())
    }

    pub fn state(&self) -> CorpusState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, CorpusState::Empty) || self.entries.is_empty()
    }

    pub fn entry(&self, id: &str) -> Option<&CorpusEntry> {
        self.by_id.get(id).map(|&h| &self.entries[h])
    }

    pub fn images(&self, id: &str) -> &[ImageDescriptor] {
        self.images_by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn alternate_names(&self, id: &str) -> &[String] {
        self.alt_names_by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self.by_platform.keys().cloned().collect();
        platforms.sort();
        platforms
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The per-platform subset used by the Match Engine (§4.2
    /// "BuildPlatformView"). Worker processes that parse the corpus file
    /// directly build the same structure via `build_platform_view_from_file`.
    pub fn build_platform_view(&self, platform: &str) -> PlatformView {
        let handles = self.by_platform.get(platform).cloned().unwrap_or_default();
        let mut entry_by_id = HashMap::with_capacity(handles.len());
        let mut alternate_names_by_id = HashMap::new();
        let mut images_by_id = HashMap::new();
        for handle in handles {
            let entry = &self.entries[handle];
            if let Some(names) = self.alt_names_by_id.get(&entry.id) {
                alternate_names_by_id.insert(entry.id.clone(), names.clone());
            }
            if let Some(images) = self.images_by_id.get(&entry.id) {
                images_by_id.insert(entry.id.clone(), images.clone());
            }
            entry_by_id.insert(entry.id.clone(), entry.clone());
        }
        PlatformView {
            entry_by_id,
            alternate_names_by_id,
            images_by_id,
        }
    }
}

/// A self-contained, per-platform filtered view (§4.2). Holds owned
/// copies of its entries so a worker process with no shared memory with
/// the parent can parse the corpus file directly into one.
#[derive(Debug, Clone, Default)]
pub struct PlatformView {
    pub entry_by_id: HashMap<String, CorpusEntry>,
    pub alternate_names_by_id: HashMap<String, Vec<String>>,
    pub images_by_id: HashMap<String, Vec<ImageDescriptor>>,
}

impl PlatformView {
    pub fn is_empty(&self) -> bool {
        self.entry_by_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entry_by_id.len()
    }
}

/// Parse the corpus file directly into a platform view without building
/// the full process-wide cache (§4.2 "Worker processes that do not hold
/// the global cache parse the corpus file directly into the platform view").
pub fn build_platform_view_from_file(path: &Path, platform: &str) -> Result<PlatformView, CorpusError> {
    let parsed = parse_corpus_file(path)?;
    Ok(filter_parsed_to_platform(parsed, platform))
}

pub fn build_platform_view_from_bytes(bytes: &[u8], platform: &str) -> Result<PlatformView, CorpusError> {
    let parsed = parse_corpus_bytes(bytes)?;
    Ok(filter_parsed_to_platform(parsed, platform))
}

fn filter_parsed_to_platform(parsed: crate::xml::ParsedCorpus, platform: &str) -> PlatformView {
    let mut entry_by_id = HashMap::new();
    let mut alternate_names_by_id = HashMap::new();
    let mut images_by_id = HashMap::new();
    for entry in parsed.entries.into_iter().filter(|e| e.platform == platform) {
        if let Some(names) = parsed.alt_names_by_id.get(&entry.id) {
            alternate_names_by_id.insert(entry.id.clone(), names.clone());
        }
        if let Some(images) = parsed.images_by_id.get(&entry.id) {
            images_by_id.insert(entry.id.clone(), images.clone());
        }
        entry_by_id.insert(entry.id.clone(), entry);
    }
    PlatformView {
        entry_by_id,
        alternate_names_by_id,
        images_by_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sample(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("corpus.xml");
        std::fs::write(
            &path,
            r#"<GameDatabase>
  <Game><DatabaseID>1</DatabaseID><Name>Mario</Name><Platform>NES</Platform></Game>
  <Game><DatabaseID>2</DatabaseID><Name>Sonic</Name><Platform>Genesis</Platform></Game>
  <GameAlternateName><DatabaseID>1</DatabaseID><AlternateName>Super Mario Bros</AlternateName></GameAlternateName>
</GameDatabase>"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn loads_and_indexes_by_platform() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());
        let cache = CorpusCache::load(&path).unwrap();
        assert_eq!(cache.entry_count(), 2);
        assert_eq!(cache.platforms(), vec!["Genesis".to_string(), "NES".to_string()]);
    }

    #[test]
    fn missing_file_yields_empty_cache() {
        let cache = CorpusCache::load(Path::new("/nonexistent/corpus.xml")).unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.state(), CorpusState::Empty);
    }

    #[test]
    fn platform_view_filters_to_one_platform() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());
        let cache = CorpusCache::load(&path).unwrap();
        let view = cache.build_platform_view("NES");
        assert_eq!(view.len(), 1);
        assert!(view.entry_by_id.contains_key("1"));
        assert_eq!(view.alternate_names_by_id["1"], vec!["Super Mario Bros".to_string()]);
    }

    #[test]
    fn standalone_view_from_file_matches_cache_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());
        let view = build_platform_view_from_file(&path, "Genesis").unwrap();
        assert_eq!(view.len(), 1);
        assert!(view.entry_by_id.contains_key("2"));
    }
}

//! The catalog entry type shared by every component that reads or writes
//! a system's gamelist.

use serde::{Deserialize, Serialize};

/// The closed set of media-reference fields a catalog entry may carry.
///
/// Order here is the canonical serialization order used by
/// `vaultkeeper-catalog` when writing a `<game>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MediaField {
    Image,
    Video,
    Marquee,
    Wheel,
    Boxart,
    Thumbnail,
    Screenshot,
    Cartridge,
    Fanart,
    Titleshot,
    Manual,
    Boxback,
    Extra1,
}

impl MediaField {
    /// All media fields, in canonical order.
    pub const ALL: [MediaField; 13] = [
        MediaField::Image,
        MediaField::Video,
        MediaField::Marquee,
        MediaField::Wheel,
        MediaField::Boxart,
        MediaField::Thumbnail,
        MediaField::Screenshot,
        MediaField::Cartridge,
        MediaField::Fanart,
        MediaField::Titleshot,
        MediaField::Manual,
        MediaField::Boxback,
        MediaField::Extra1,
    ];

    /// The XML tag name this field serializes to.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Marquee => "marquee",
            Self::Wheel => "wheel",
            Self::Boxart => "boxart",
            Self::Thumbnail => "thumbnail",
            Self::Screenshot => "screenshot",
            Self::Cartridge => "cartridge",
            Self::Fanart => "fanart",
            Self::Titleshot => "titleshot",
            Self::Manual => "manual",
            Self::Boxback => "boxback",
            Self::Extra1 => "extra1",
        }
    }

    /// Parse a field back from its XML tag name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "image" => Self::Image,
            "video" => Self::Video,
            "marquee" => Self::Marquee,
            "wheel" => Self::Wheel,
            "boxart" => Self::Boxart,
            "thumbnail" => Self::Thumbnail,
            "screenshot" => Self::Screenshot,
            "cartridge" => Self::Cartridge,
            "fanart" => Self::Fanart,
            "titleshot" => Self::Titleshot,
            "manual" => Self::Manual,
            "boxback" => Self::Boxback,
            "extra1" => Self::Extra1,
            _ => return None,
        })
    }
}

impl std::fmt::Display for MediaField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// The closed set of text fields a scrape is allowed to write (§4.7,
/// `selected_fields`). Unlike [`MediaField`] these back plain `Option<String>`
/// columns on [`Game`] rather than media references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextField {
    Name,
    Description,
    Genre,
    Developer,
    Publisher,
    Players,
    Rating,
}

impl TextField {
    pub const ALL: [TextField; 7] = [
        TextField::Name,
        TextField::Description,
        TextField::Genre,
        TextField::Developer,
        TextField::Publisher,
        TextField::Players,
        TextField::Rating,
    ];

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Description => "Description",
            Self::Genre => "Genre",
            Self::Developer => "Developer",
            Self::Publisher => "Publisher",
            Self::Players => "Players",
            Self::Rating => "Rating",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Some(match s {
            "Name" | "name" => Self::Name,
            "Description" | "Desc" | "description" | "desc" => Self::Description,
            "Genre" | "genre" => Self::Genre,
            "Developer" | "developer" => Self::Developer,
            "Publisher" | "publisher" => Self::Publisher,
            "Players" | "players" => Self::Players,
            "Rating" | "rating" => Self::Rating,
            _ => return None,
        })
    }
}

impl std::fmt::Display for TextField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

impl std::str::FromStr for TextField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unrecognized field {s:?}"))
    }
}

/// A single catalog entry (`<game>` element) for one system.
///
/// `path` is the primary key within a catalog (relative to the system's
/// ROM directory, e.g. `./Foo (USA).zip`). All text is stored canonical
/// unescaped Unicode; XML escaping is applied only at serialization time
/// (see `vaultkeeper-catalog::xml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub desc: Option<String>,
    pub genre: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub rating: Option<String>,
    pub players: Option<String>,

    pub media: std::collections::BTreeMap<MediaField, String>,

    pub launchboxid: Option<String>,
    pub igdbid: Option<String>,
    pub steamid: Option<String>,
}

impl Game {
    /// A freshly-parsed entry with only `id` and `path` known; the rest of
    /// the fields take `ParseCatalog`'s documented defaults.
    pub fn with_defaults(id: i64, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            name: "Unknown Game".to_string(),
            ..Default::default()
        }
    }

    pub fn media_field(&self, field: MediaField) -> Option<&str> {
        self.media.get(&field).map(String::as_str)
    }

    pub fn set_media_field(&mut self, field: MediaField, value: impl Into<String>) {
        self.media.insert(field, value.into());
    }

    pub fn clear_media_field(&mut self, field: MediaField) {
        self.media.remove(&field);
    }

    /// The filename component of `path`, without its extension — used as
    /// the stem media files on disk are matched against.
    pub fn rom_stem(&self) -> Option<&str> {
        let filename = self.path.rsplit('/').next().unwrap_or(&self.path);
        filename.rsplit_once('.').map(|(stem, _)| stem).or(Some(filename))
    }

    /// Extract a parenthesized region token from the file name, e.g.
    /// `"Foo (USA).zip"` -> `Some("USA")`. Returns the first parenthetical
    /// group that isn't obviously a disc/revision/language tag.
    pub fn region_token(&self) -> Option<String> {
        let filename = self.path.rsplit('/').next().unwrap_or(&self.path);
        region_token_in(filename)
    }
}

/// The parenthetical-scanning half of [`Game::region_token`], usable on
/// any string (e.g. a corpus or catalog `name`, not just a ROM path) —
/// the Match Engine reuses this to preserve a catalog name's region
/// suffix when promoting an alternate or canonical corpus name (§4.3
/// "Edge cases").
pub fn region_token_in(s: &str) -> Option<String> {
    let mut depth = 0u32;
    let mut start = None;
    for (i, c) in s.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    start = Some(i + 1);
                }
                depth += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0
                    && let Some(st) = start
                {
                    let token = &s[st..i];
                    if is_plausible_region(token) {
                        return Some(token.to_string());
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }
    None
}

/// Reattach a parenthetical region suffix from `original` onto
/// `candidate` when promoting a corpus name into a catalog `name` field,
/// unless `candidate` already carries its own suffix (§4.3 "Edge cases":
/// "When promoting an alternate to `name`, parenthetical suffixes from
/// the catalog name are preserved").
pub fn promote_name(original: &str, candidate: &str) -> String {
    if region_token_in(candidate).is_some() {
        return candidate.to_string();
    }
    match region_token_in(original) {
        Some(suffix) => format!("{candidate} ({suffix})"),
        None => candidate.to_string(),
    }
}

fn is_plausible_region(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let lower = token.to_ascii_lowercase();
    !lower.starts_with("rev")
        && !lower.starts_with("disc")
        && !lower.starts_with("v1")
        && !lower.starts_with("v2")
        && !lower.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_stem_strips_extension() {
        let g = Game::with_defaults(1, "./Foo (USA).zip");
        assert_eq!(g.rom_stem(), Some("Foo (USA)"));
    }

    #[test]
    fn region_token_finds_first_plausible_region() {
        let g = Game::with_defaults(1, "./Foo (Rev A) (USA).zip");
        assert_eq!(g.region_token(), Some("USA".to_string()));
    }

    #[test]
    fn region_token_none_when_absent() {
        let g = Game::with_defaults(1, "./Foo.zip");
        assert_eq!(g.region_token(), None);
    }

    #[test]
    fn media_field_tag_round_trip() {
        for field in MediaField::ALL {
            assert_eq!(MediaField::from_tag(field.as_tag()), Some(field));
        }
    }

    #[test]
    fn text_field_label_round_trip() {
        for field in TextField::ALL {
            assert_eq!(TextField::from_label(field.as_label()), Some(field));
        }
    }

    #[test]
    fn promote_name_reattaches_region_suffix() {
        assert_eq!(promote_name("Baz (USA)", "Bar"), "Bar (USA)");
    }

    #[test]
    fn promote_name_leaves_unsuffixed_original_alone() {
        assert_eq!(promote_name("Wrong", "Foo"), "Foo");
    }

    #[test]
    fn promote_name_does_not_double_suffix() {
        assert_eq!(promote_name("Baz (USA)", "Bar (Europe)"), "Bar (Europe)");
    }
}

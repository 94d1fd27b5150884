//! Read and write a system's `gamelist.xml` (§4.1 "ParseCatalog" /
//! "WriteCatalog").
//!
//! Parsing is tolerant: unknown elements are skipped, a missing `id` is
//! assigned in document order, a missing `name` falls back to
//! `Game::with_defaults`'s default, and entries whose text content was
//! escaped more than once (`&amp;amp;` for a literal `&`) are unescaped
//! to a fixed point before being stored. Writing always dedups by path,
//! backs up whatever was there before, and renames a temp file into
//! place so a reader never observes a half-written catalog.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use quick_xml::events::{BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use vaultkeeper_core::{Game, MediaField};

use crate::error::CatalogError;

/// Parse a `gamelist.xml` document into its entries.
pub fn parse_catalog(path: &Path) -> Result<Vec<Game>, CatalogError> {
    let contents = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CatalogError::NotFound(path.display().to_string())
        } else {
            CatalogError::Io(e)
        }
    })?;
    parse_catalog_bytes(&contents)
}

/// Parse catalog XML already read into memory (used by the worker, which
/// receives catalog bytes over its IPC channel rather than a path).
pub fn parse_catalog_bytes(bytes: &[u8]) -> Result<Vec<Game>, CatalogError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    parse_games(&mut reader)
}

fn parse_games<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<Game>, CatalogError> {
    let mut buf = Vec::new();
    let mut games = Vec::new();
    let mut next_id = 1i64;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(tag) if tag.name().as_ref() == b"game" => {
                let game = parse_game(reader, &mut next_id)?;
                games.push(game);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(games)
}

fn parse_game<R: BufRead>(reader: &mut Reader<R>, next_id: &mut i64) -> Result<Game, CatalogError> {
    let mut buf = Vec::new();
    let mut id: Option<i64> = None;
    let mut path: Option<String> = None;
    let mut name: Option<String> = None;
    let mut desc = None;
    let mut genre = None;
    let mut developer = None;
    let mut publisher = None;
    let mut rating = None;
    let mut players = None;
    let mut launchboxid = None;
    let mut igdbid = None;
    let mut steamid = None;
    let mut media = BTreeMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(tag) => {
                let tag_name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                let text = read_text(reader, tag.name().as_ref())?;
                assign_field(
                    &tag_name, text, &mut id, &mut path, &mut name, &mut desc, &mut genre,
                    &mut developer, &mut publisher, &mut rating, &mut players, &mut launchboxid,
                    &mut igdbid, &mut steamid, &mut media,
                );
            }
            Event::End(tag) if tag.name().as_ref() == b"game" => break,
            Event::Eof => return Err(CatalogError::malformed("unexpected end of document inside <game>")),
            _ => {}
        }
        buf.clear();
    }

    let id = id.unwrap_or_else(|| {
        let assigned = *next_id;
        assigned
    });
    if id >= *next_id {
        *next_id = id + 1;
    }
    let path = path.unwrap_or_else(|| {
        log::warn!("catalog entry with id {id} has no <path>; assigning placeholder");
        format!("__missing_path_{id}__")
    });

    let mut game = Game::with_defaults(id, path);
    if let Some(name) = name {
        game.name = unescape_fixed_point(&name);
    }
    game.desc = desc.map(|s| unescape_fixed_point(&s));
    game.genre = genre.map(|s| unescape_fixed_point(&s));
    game.developer = developer.map(|s| unescape_fixed_point(&s));
    game.publisher = publisher.map(|s| unescape_fixed_point(&s));
    game.rating = rating;
    game.players = players;
    game.launchboxid = launchboxid;
    game.igdbid = igdbid;
    game.steamid = steamid;
    game.media = media;
    Ok(game)
}

#[allow(clippy::too_many_arguments)]
fn assign_field(
    tag: &str,
    text: String,
    id: &mut Option<i64>,
    path: &mut Option<String>,
    name: &mut Option<String>,
    desc: &mut Option<String>,
    genre: &mut Option<String>,
    developer: &mut Option<String>,
    publisher: &mut Option<String>,
    rating: &mut Option<String>,
    players: &mut Option<String>,
    launchboxid: &mut Option<String>,
    igdbid: &mut Option<String>,
    steamid: &mut Option<String>,
    media: &mut BTreeMap<MediaField, String>,
) {
    match tag {
        "id" => *id = text.trim().parse().ok(),
        "path" => *path = Some(unescape_fixed_point(&text)),
        "name" => *name = Some(text),
        "desc" => *desc = Some(text),
        "genre" => *genre = Some(text),
        "developer" => *developer = Some(text),
        "publisher" => *publisher = Some(text),
        "rating" => *rating = Some(text),
        "players" => *players = Some(text),
        "launchboxid" => *launchboxid = Some(text),
        "igdbid" => *igdbid = Some(text),
        "steamid" => *steamid = Some(text),
        other => {
            if let Some(field) = MediaField::from_tag(other) {
                if !text.is_empty() {
                    media.insert(field, unescape_fixed_point(&text));
                }
            }
            // unknown elements are ignored, matching a tolerant reader
        }
    }
}

fn read_text<R: BufRead>(reader: &mut Reader<R>, end_tag: &[u8]) -> Result<String, CatalogError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(t) => text.push_str(&String::from_utf8_lossy(&t.into_inner())),
            Event::End(tag) if tag.name().as_ref() == end_tag => break,
            Event::Eof => return Err(CatalogError::malformed("unexpected end of document")),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Repeatedly unescape `&amp;`-style entities until a fixed point, so
/// text that was accidentally double-escaped upstream (seen from some
/// providers) renders correctly.
fn unescape_fixed_point(s: &str) -> String {
    let mut current = s.to_string();
    for _ in 0..4 {
        let unescaped = quick_xml::escape::unescape(&current)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| current.clone());
        if unescaped == current {
            break;
        }
        current = unescaped;
    }
    current
}

/// Write a catalog to `path`, backing up any prior file and writing
/// atomically (temp file + rename). Entries are deduplicated by `path`
/// (first occurrence wins); pathless placeholder entries are deduped by
/// lowercased name instead.
pub fn write_catalog(path: &Path, games: &[Game]) -> Result<(), CatalogError> {
    if path.exists() {
        backup_existing(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let deduped = dedup_by_path(games);
    let xml = render_catalog(&deduped)?;

    let tmp = path.with_extension("xml.tmp");
    std::fs::write(&tmp, xml.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn dedup_by_path(games: &[Game]) -> Vec<&Game> {
    let mut seen_paths = std::collections::HashSet::new();
    let mut seen_names = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(games.len());
    for game in games {
        if game.path.starts_with("__missing_path_") {
            let key = game.name.to_ascii_lowercase();
            if seen_names.insert(key) {
                out.push(game);
            }
            continue;
        }
        if seen_paths.insert(game.path.clone()) {
            out.push(game);
        }
    }
    out
}

fn render_catalog(games: &[&Game]) -> Result<String, CatalogError> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);
        writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let gamelist_start = quick_xml::events::BytesStart::new("gameList");
        writer.write_event(Event::Start(gamelist_start.clone()))?;
        for game in games {
            write_game(&mut writer, game)?;
        }
        writer.write_event(Event::End(gamelist_start.to_end()))?;
    }
    buf.push(b'\n');
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_game<W: std::io::Write>(writer: &mut Writer<W>, game: &Game) -> Result<(), CatalogError> {
    let start = quick_xml::events::BytesStart::new("game");
    writer.write_event(Event::Start(start.clone()))?;

    write_tag(writer, "id", &game.id.to_string())?;
    write_tag(writer, "path", &game.path)?;
    write_tag(writer, "name", &game.name)?;
    write_opt_tag(writer, "desc", game.desc.as_deref())?;
    write_opt_tag(writer, "genre", game.genre.as_deref())?;
    write_opt_tag(writer, "developer", game.developer.as_deref())?;
    write_opt_tag(writer, "publisher", game.publisher.as_deref())?;
    write_opt_tag(writer, "rating", game.rating.as_deref())?;
    write_opt_tag(writer, "players", game.players.as_deref())?;
    write_opt_tag(writer, "launchboxid", game.launchboxid.as_deref())?;
    write_opt_tag(writer, "igdbid", game.igdbid.as_deref())?;
    write_opt_tag(writer, "steamid", game.steamid.as_deref())?;

    for field in MediaField::ALL {
        if let Some(value) = game.media_field(field)
            && !value.is_empty()
        {
            write_tag(writer, field.as_tag(), value)?;
        }
    }

    writer.write_event(Event::End(start.to_end()))?;
    Ok(())
}

fn write_tag<W: std::io::Write>(writer: &mut Writer<W>, tag: &str, value: &str) -> Result<(), CatalogError> {
    let start = quick_xml::events::BytesStart::new(tag);
    writer.write_event(Event::Start(start.clone()))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(start.to_end()))?;
    Ok(())
}

fn write_opt_tag<W: std::io::Write>(writer: &mut Writer<W>, tag: &str, value: Option<&str>) -> Result<(), CatalogError> {
    match value {
        Some(v) if !v.is_empty() => write_tag(writer, tag, v),
        _ => Ok(()),
    }
}

fn backup_existing(path: &Path) -> Result<(), CatalogError> {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let backup_path = path.with_extension(format!("xml.backup.{ts}"));
    std::fs::copy(path, backup_path)?;
    Ok(())
}

/// Copy a system's catalog into its ROM tree location (§4.1 "CopyCatalogToRomTree"),
/// backing up any file already there. Idempotent: copying the same
/// catalog twice leaves the destination unchanged beyond the backup.
pub fn copy_catalog_to_rom_tree(
    source: &Path,
    config: &vaultkeeper_core::VaultConfig,
    system: &str,
) -> Result<(), CatalogError> {
    let dest = config.rom_tree_system_dir(system).join("gamelist.xml");
    if dest.exists() {
        backup_existing(&dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, &dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_xml() -> &'static str {
        r#"<?xml version="1.0"?>
<gameList>
  <game>
    <path>./Foo (USA).zip</path>
    <name>Foo</name>
    <desc>A game &amp;amp; friends</desc>
    <image>./media/images/Foo.png</image>
  </game>
  <game>
    <path>./Bar.zip</path>
    <name>Bar</name>
  </game>
  <unknownthing>ignored</unknownthing>
</gameList>
"#
    }

    #[test]
    fn parses_games_and_media() {
        let games = parse_catalog_bytes(sample_xml().as_bytes()).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].name, "Foo");
        assert_eq!(games[0].media_field(MediaField::Image), Some("./media/images/Foo.png"));
        assert_eq!(games[1].name, "Bar");
    }

    #[test]
    fn repairs_double_escaped_entities() {
        let games = parse_catalog_bytes(sample_xml().as_bytes()).unwrap();
        assert_eq!(games[0].desc.as_deref(), Some("A game & friends"));
    }

    #[test]
    fn missing_id_assigned_in_document_order() {
        let games = parse_catalog_bytes(sample_xml().as_bytes()).unwrap();
        assert_eq!(games[0].id, 1);
        assert_eq!(games[1].id, 2);
    }

    #[test]
    fn write_then_parse_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gamelist.xml");
        let mut g = Game::with_defaults(1, "./Foo.zip");
        g.name = "Foo & Friends".to_string();
        g.set_media_field(MediaField::Boxart, "./media/boxart/Foo.png");
        write_catalog(&path, &[g.clone()]).unwrap();

        let parsed = parse_catalog(&path).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Foo & Friends");
        assert_eq!(parsed[0].media_field(MediaField::Boxart), Some("./media/boxart/Foo.png"));
    }

    #[test]
    fn write_dedups_by_path_keeping_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gamelist.xml");
        let mut first = Game::with_defaults(1, "./Foo.zip");
        first.name = "First".to_string();
        let mut dupe = Game::with_defaults(2, "./Foo.zip");
        dupe.name = "Second".to_string();
        write_catalog(&path, &[first, dupe]).unwrap();

        let parsed = parse_catalog(&path).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "First");
    }

    #[test]
    fn write_backs_up_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gamelist.xml");
        std::fs::write(&path, sample_xml()).unwrap();
        write_catalog(&path, &[Game::with_defaults(1, "./New.zip")]).unwrap();

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("backup"))
            .collect();
        assert_eq!(backups.len(), 1);
    }
}

//! Parse the corpus XML: UTF-8, three element kinds keyed by a
//! `<DatabaseID>` child — `<Game>`, `<GameImage>`, `<GameAlternateName>`.
//! Unknown children of any element are ignored (§6 "Corpus file format").

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::entry::{CorpusEntry, ImageDescriptor};
use crate::error::CorpusError;

pub struct ParsedCorpus {
    pub entries: Vec<CorpusEntry>,
    pub images_by_id: HashMap<String, Vec<ImageDescriptor>>,
    pub alt_names_by_id: HashMap<String, Vec<String>>,
}

pub fn parse_corpus_file(path: &std::path::Path) -> Result<ParsedCorpus, CorpusError> {
    let file = std::fs::File::open(path)?;
    parse_corpus(std::io::BufReader::new(file))
}

pub fn parse_corpus_bytes(bytes: &[u8]) -> Result<ParsedCorpus, CorpusError> {
    parse_corpus(bytes)
}

fn parse_corpus<R: BufRead>(reader: R) -> Result<ParsedCorpus, CorpusError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut images_by_id: HashMap<String, Vec<ImageDescriptor>> = HashMap::new();
    let mut alt_names_by_id: HashMap<String, Vec<String>> = HashMap::new();

    let mut buf = Vec::new();
    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => {
                let name = tag.name().as_ref().to_vec();
                match name.as_slice() {
                    b"Game" => {
                        if let Some(entry) = parse_game(&mut xml)? {
                            entries.push(entry);
                        }
                    }
                    b"GameImage" => {
                        if let Some((id, image)) = parse_game_image(&mut xml)? {
                            images_by_id.entry(id).or_default().push(image);
                        }
                    }
                    b"GameAlternateName" => {
                        if let Some((id, name)) = parse_alternate_name(&mut xml)? {
                            alt_names_by_id.entry(id).or_default().push(name);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("aborting corpus parse on malformed XML, keeping partial load: {e}");
                break;
            }
        }
        buf.clear();
    }

    Ok(ParsedCorpus {
        entries,
        images_by_id,
        alt_names_by_id,
    })
}

fn parse_game<R: BufRead>(xml: &mut Reader<R>) -> Result<Option<CorpusEntry>, CorpusError> {
    let mut fields = read_fields(xml, b"Game")?;
    let Some(id) = fields.remove("DatabaseID") else {
        return Ok(None);
    };
    let name = fields.remove("Name").unwrap_or_default();
    let platform = fields.remove("Platform").unwrap_or_default();
    Ok(Some(CorpusEntry {
        id,
        name,
        platform,
        attributes: fields.into_iter().collect(),
    }))
}

fn parse_game_image<R: BufRead>(
    xml: &mut Reader<R>,
) -> Result<Option<(String, ImageDescriptor)>, CorpusError> {
    let mut fields = read_fields(xml, b"GameImage")?;
    let Some(id) = fields.remove("DatabaseID") else {
        return Ok(None);
    };
    let image_type = fields.remove("Type").unwrap_or_default();
    let file_name = fields.remove("FileName").unwrap_or_default();
    let region = fields.remove("Region");
    Ok(Some((
        id,
        ImageDescriptor {
            image_type,
            file_name,
            region,
        },
    )))
}

fn parse_alternate_name<R: BufRead>(
    xml: &mut Reader<R>,
) -> Result<Option<(String, String)>, CorpusError> {
    let mut fields = read_fields(xml, b"GameAlternateName")?;
    let Some(id) = fields.remove("DatabaseID") else {
        return Ok(None);
    };
    let alt = fields.remove("AlternateName").unwrap_or_default();
    Ok(Some((id, alt)))
}

/// Read every direct child element's text content into a `tag -> text`
/// map, up to the matching close tag of `end_tag`.
fn read_fields<R: BufRead>(
    xml: &mut Reader<R>,
    end_tag: &[u8],
) -> Result<HashMap<String, String>, CorpusError> {
    let mut fields = HashMap::new();
    let mut buf = Vec::new();
    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(tag) => {
                let tag_name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                let text = read_text(xml, tag.name().as_ref())?;
                if !text.is_empty() {
                    fields.insert(tag_name, text);
                }
            }
            Event::End(tag) if tag.name().as_ref() == end_tag => break,
            Event::Eof => return Err(CorpusError::Malformed("unexpected end of document inside corpus entry".into())),
            _ => {}
        }
        buf.clear();
    }
    Ok(fields)
}

fn read_text<R: BufRead>(xml: &mut Reader<R>, end_tag: &[u8]) -> Result<String, CorpusError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::End(tag) if tag.name().as_ref() == end_tag => break,
            Event::Eof => return Err(CorpusError::Malformed("unexpected end of document inside corpus field".into())),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"<?xml version="1.0"?>
<GameDatabase>
  <Game>
    <DatabaseID>42</DatabaseID>
    <Name>Super Mario Bros.</Name>
    <Platform>Nintendo Entertainment System</Platform>
    <Developer>Nintendo</Developer>
    <Publisher>Nintendo</Publisher>
  </Game>
  <GameImage>
    <DatabaseID>42</DatabaseID>
    <Type>Box - Front</Type>
    <FileName>42-1.jpg</FileName>
    <Region>USA</Region>
  </GameImage>
  <GameAlternateName>
    <DatabaseID>42</DatabaseID>
    <AlternateName>Super Mario Bros</AlternateName>
  </GameAlternateName>
</GameDatabase>
"#
    }

    #[test]
    fn parses_games_images_and_alternate_names() {
        let parsed = parse_corpus_bytes(sample().as_bytes()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].name, "Super Mario Bros.");
        assert_eq!(parsed.entries[0].attr("Developer"), Some("Nintendo"));
        assert_eq!(parsed.images_by_id["42"].len(), 1);
        assert_eq!(parsed.alt_names_by_id["42"], vec!["Super Mario Bros".to_string()]);
    }

    #[test]
    fn entries_without_database_id_are_skipped() {
        let xml = r#"<GameDatabase><Game><Name>No ID</Name></Game></GameDatabase>"#;
        let parsed = parse_corpus_bytes(xml.as_bytes()).unwrap();
        assert!(parsed.entries.is_empty());
    }
}

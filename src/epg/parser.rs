//! XMLTV parser
//! Streaming quick-xml reader producing a `Listing` in document order.
//! Supports both plain XML and gzip-compressed (.xml.gz) documents.

use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

use super::time::parse_time;
use crate::error::{EpgError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A channel as listed by the guide. The id doubles as display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
}

/// Stable identity of a displayed programme: channel plus parsed start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgrammeKey {
    pub channel: String,
    pub start: NaiveDateTime,
}

/// A single TV programme
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Programme {
    /// Channel id this programme claims to belong to (may not match any channel)
    pub channel: String,
    pub start: Option<NaiveDateTime>,
    pub stop: Option<NaiveDateTime>,
    pub title: String,
    /// Year or date of production
    pub date: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Actor names in document order; `None` when there is no `credits` element
    pub actors: Option<Vec<String>>,
}

impl Programme {
    /// Key for detail lookup, if the start time is usable
    pub fn key(&self) -> Option<ProgrammeKey> {
        self.start.map(|start| ProgrammeKey {
            channel: self.channel.clone(),
            start,
        })
    }

    /// Multi-line text shown in the details pane
    pub fn details(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Channel: {}", self.channel);
        let _ = writeln!(out, "Title: {}", self.title);
        let _ = writeln!(out, "Year: {}", self.date.as_deref().unwrap_or_default());
        let _ = writeln!(out, "Category: {}", self.category.as_deref().unwrap_or_default());
        out.push('\n');
        let _ = writeln!(out, "{}", self.description.as_deref().unwrap_or_default());
        out.push('\n');

        if let Some(actors) = &self.actors {
            out.push_str("Cast:\n");
            for actor in actors {
                let _ = writeln!(out, "- {}", actor);
            }
        }
        out
    }
}

/// Everything loaded from one XMLTV document
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub channels: Vec<Channel>,
    pub programmes: Vec<Programme>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn programme_count(&self) -> usize {
        self.programmes.len()
    }

    /// Find a programme by key. If a malformed guide repeats a start time on
    /// one channel, the first occurrence wins.
    pub fn programme(&self, key: &ProgrammeKey) -> Option<&Programme> {
        self.programmes
            .iter()
            .find(|p| p.channel == key.channel && p.start == Some(key.start))
    }
}

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    Programme,
    Title,
    Date,
    Category,
    Desc,
    Credits,
    Actor,
}

impl ParserState {
    fn collects_text(self) -> bool {
        matches!(
            self,
            ParserState::Title
                | ParserState::Date
                | ParserState::Category
                | ParserState::Desc
                | ParserState::Actor
        )
    }
}

/// XMLTV parser
pub struct EpgParser;

impl EpgParser {
    /// Parse an in-memory XMLTV string
    pub fn parse(xml: &str) -> Result<Listing> {
        Self::parse_reader(xml.as_bytes())
    }

    /// Parse raw document bytes, decompressing gzip when the magic number is present
    pub fn parse_bytes(bytes: &[u8]) -> Result<Listing> {
        if bytes.starts_with(&GZIP_MAGIC) {
            debug!("gzip-compressed listing, {} bytes", bytes.len());
            let decoder = std::io::BufReader::new(GzDecoder::new(bytes));
            Self::parse_reader(decoder)
        } else {
            Self::parse_reader(bytes)
        }
    }

    /// Parse a document from disk - auto-detects gzip compression
    pub fn parse_file(path: &Path) -> Result<Listing> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::with_capacity(64 * 1024, file);

        if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
            let decoder = std::io::BufReader::with_capacity(64 * 1024, GzDecoder::new(reader));
            Self::parse_reader(decoder)
        } else {
            Self::parse_reader(reader)
        }
    }

    /// Parse from a reader. Any XML error aborts the parse; no partial listing is returned.
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<Listing> {
        let mut xml_reader = Reader::from_reader(reader);
        // Entities arrive as separate events, so trimming happens on the joined text
        xml_reader.config_mut().trim_text(false);

        let mut listing = Listing::new();
        let mut seen_channels: HashSet<String> = HashSet::new();
        let mut buf = Vec::with_capacity(8192);

        let mut state = ParserState::Root;
        let mut current: Option<Programme> = None;
        let mut text_buf = String::new();
        let mut depth: usize = 0;
        let mut saw_root = false;

        loop {
            let position = xml_reader.buffer_position() as u64;
            let event = xml_reader
                .read_event_into(&mut buf)
                .map_err(|e| EpgError::Xml {
                    position,
                    message: e.to_string(),
                })?;

            match event {
                Event::Start(ref e) => {
                    depth += 1;
                    saw_root = true;

                    match (e.name().as_ref(), state) {
                        (b"channel", ParserState::Root) => {
                            push_channel(&mut listing, &mut seen_channels, e);
                            state = ParserState::Channel;
                        }
                        (b"programme", ParserState::Root) => {
                            current = Some(programme_from_attributes(e));
                            state = ParserState::Programme;
                        }
                        (b"title", ParserState::Programme) => {
                            state = ParserState::Title;
                            text_buf.clear();
                        }
                        (b"date", ParserState::Programme) => {
                            state = ParserState::Date;
                            text_buf.clear();
                        }
                        (b"category", ParserState::Programme) => {
                            state = ParserState::Category;
                            text_buf.clear();
                        }
                        (b"desc", ParserState::Programme) => {
                            state = ParserState::Desc;
                            text_buf.clear();
                        }
                        (b"credits", ParserState::Programme) => {
                            if let Some(ref mut prog) = current {
                                prog.actors.get_or_insert_with(Vec::new);
                            }
                            state = ParserState::Credits;
                        }
                        (b"actor", ParserState::Credits) => {
                            state = ParserState::Actor;
                            text_buf.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(ref e) => {
                    saw_root = true;

                    match (e.name().as_ref(), state) {
                        (b"channel", ParserState::Root) => {
                            push_channel(&mut listing, &mut seen_channels, e);
                        }
                        (b"programme", ParserState::Root) => {
                            listing.programmes.push(programme_from_attributes(e));
                        }
                        (b"credits", ParserState::Programme) => {
                            if let Some(ref mut prog) = current {
                                prog.actors.get_or_insert_with(Vec::new);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(ref e) => {
                    if state.collects_text() {
                        let raw = String::from_utf8_lossy(e.as_ref());
                        text_buf.push_str(&decode_xml_entities(&raw));
                    }
                }
                Event::CData(ref e) => {
                    if state.collects_text() {
                        text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Event::GeneralRef(ref e) => {
                    if state.collects_text() {
                        match e.resolve_char_ref() {
                            Ok(Some(ch)) => text_buf.push(ch),
                            _ => {
                                let name = String::from_utf8_lossy(e.as_ref());
                                text_buf.push_str(&decode_xml_entities(&format!("&{};", name)));
                            }
                        }
                    }
                }
                Event::End(ref e) => {
                    depth = depth.saturating_sub(1);

                    match (e.name().as_ref(), state) {
                        (b"channel", ParserState::Channel) => {
                            state = ParserState::Root;
                        }
                        (b"programme", ParserState::Programme) => {
                            if let Some(programme) = current.take() {
                                listing.programmes.push(programme);
                            }
                            state = ParserState::Root;
                        }
                        (b"title", ParserState::Title) => {
                            if let Some(ref mut prog) = current {
                                // Localized duplicates follow the first title
                                if prog.title.is_empty() {
                                    prog.title = text_buf.trim().to_string();
                                }
                            }
                            state = ParserState::Programme;
                        }
                        (b"date", ParserState::Date) => {
                            if let Some(ref mut prog) = current {
                                if prog.date.is_none() {
                                    prog.date = non_empty(&text_buf);
                                }
                            }
                            state = ParserState::Programme;
                        }
                        (b"category", ParserState::Category) => {
                            if let Some(ref mut prog) = current {
                                if prog.category.is_none() {
                                    prog.category = non_empty(&text_buf);
                                }
                            }
                            state = ParserState::Programme;
                        }
                        (b"desc", ParserState::Desc) => {
                            if let Some(ref mut prog) = current {
                                if prog.description.is_none() {
                                    prog.description = non_empty(&text_buf);
                                }
                            }
                            state = ParserState::Programme;
                        }
                        (b"credits", ParserState::Credits) => {
                            state = ParserState::Programme;
                        }
                        (b"actor", ParserState::Actor) => {
                            if let Some(ref mut prog) = current {
                                if let Some(actor) = non_empty(&text_buf) {
                                    prog.actors.get_or_insert_with(Vec::new).push(actor);
                                }
                            }
                            state = ParserState::Credits;
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(EpgError::Xml {
                position: xml_reader.buffer_position() as u64,
                message: "no root element found".to_string(),
            });
        }
        if depth != 0 {
            return Err(EpgError::Xml {
                position: xml_reader.buffer_position() as u64,
                message: format!("document ended with {} unclosed element(s)", depth),
            });
        }

        debug!(
            "parsed {} channels, {} programmes",
            listing.channel_count(),
            listing.programme_count()
        );
        Ok(listing)
    }
}

fn push_channel(listing: &mut Listing, seen: &mut HashSet<String>, e: &BytesStart) {
    let id = get_attribute(e, b"id").unwrap_or_default();
    if !id.is_empty() && seen.insert(id.clone()) {
        listing.channels.push(Channel { id });
    }
}

fn programme_from_attributes(e: &BytesStart) -> Programme {
    let start = get_attribute(e, b"start").unwrap_or_default();
    let stop = get_attribute(e, b"stop").unwrap_or_default();

    Programme {
        channel: get_attribute(e, b"channel").unwrap_or_default(),
        start: parse_time(&start),
        stop: parse_time(&stop),
        ..Programme::default()
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Get attribute value from XML element
fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8_lossy(attr.value.as_ref());
            return Some(decode_xml_entities(&raw));
        }
    }
    None
}

/// Decode named and numeric XML entities in a single pass.
/// Unknown or malformed entities are kept verbatim.
fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                result.push('&');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;

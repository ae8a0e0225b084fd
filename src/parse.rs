//! Parsers for the upstream formats: the ranked browse page, the collection
//! XML API and the collection CSV export.
//!
//! Every parser hands back plain identifiers; nothing downstream has to care
//! which upstream shape an id came from.

use crate::GameRef;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::fmt;

// Ranked page
static ANCHOR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<a\s([^>]*)>(.*?)</a>").unwrap());
static HREF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|\s)href\s*=\s*["']([^"']*)["']"#).unwrap());
static CLASS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|\s)class\s*=\s*["']([^"']*)["']"#).unwrap());
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

// Collection XML
static ERRORS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<errors\b[^>]*>(.*?)</errors>").unwrap());
static ERROR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<error\b[^>]*>(.*?)</error>").unwrap());
static MESSAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<message\b[^>]*>(.*?)</message>").unwrap());
static ITEMS_OPEN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<items\b").unwrap());
static ITEM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item\b([^>]*?)(?:/>|>(.*?)</item>)").unwrap());
static OBJECTID_ATTR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|\s)objectid\s*=\s*["']([^"']*)["']"#).unwrap());
static OBJECTID_CHILD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<objectid\b[^>]*>(.*?)</objectid>").unwrap());
static ID_ATTR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|\s)id\s*=\s*["']([^"']*)["']"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    EmptyDocument,
    NotXml,
    Csv(String),
    MissingColumn(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyDocument => write!(f, "Response body is empty"),
            ParseError::NotXml => write!(f, "Response body is not an XML document"),
            ParseError::Csv(msg) => write!(f, "Invalid CSV: {}", msg),
            ParseError::MissingColumn(column) => {
                write!(f, "CSV header has no '{}' column", column)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<csv::Error> for ParseError {
    fn from(e: csv::Error) -> Self {
        ParseError::Csv(e.to_string())
    }
}

/// What a collection XML response turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionDocument {
    /// Owned ids, deduplicated in first-seen order (possibly empty).
    Items(Vec<String>),
    /// No `<items>` root: the collection is empty or not visible.
    NoItemsRoot,
    /// Upstream accepted the request and is still building the export.
    Queued(String),
    /// Upstream reported an error message.
    ApiError(String),
}

// Named entities seen in ranked titles: markup, typographic punctuation and
// Latin-1 letters.
const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'), ("lt", '<'), ("gt", '>'), ("quot", '"'), ("apos", '\''),
    ("nbsp", '\u{a0}'), ("ndash", '\u{2013}'), ("mdash", '\u{2014}'),
    ("lsquo", '\u{2018}'), ("rsquo", '\u{2019}'), ("sbquo", '\u{201a}'),
    ("ldquo", '\u{201c}'), ("rdquo", '\u{201d}'), ("bdquo", '\u{201e}'),
    ("hellip", '\u{2026}'), ("bull", '\u{2022}'), ("middot", '\u{b7}'),
    ("laquo", '\u{ab}'), ("raquo", '\u{bb}'), ("trade", '\u{2122}'),
    ("reg", '\u{ae}'), ("copy", '\u{a9}'), ("deg", '\u{b0}'), ("times", '\u{d7}'),
    ("frac12", '\u{bd}'), ("iexcl", '\u{a1}'), ("iquest", '\u{bf}'),
    ("Agrave", 'À'), ("Aacute", 'Á'), ("Acirc", 'Â'), ("Atilde", 'Ã'), ("Auml", 'Ä'),
    ("Aring", 'Å'), ("AElig", 'Æ'), ("Ccedil", 'Ç'), ("Egrave", 'È'), ("Eacute", 'É'),
    ("Ecirc", 'Ê'), ("Euml", 'Ë'), ("Igrave", 'Ì'), ("Iacute", 'Í'), ("Icirc", 'Î'),
    ("Iuml", 'Ï'), ("Ntilde", 'Ñ'), ("Ograve", 'Ò'), ("Oacute", 'Ó'), ("Ocirc", 'Ô'),
    ("Otilde", 'Õ'), ("Ouml", 'Ö'), ("Oslash", 'Ø'), ("Ugrave", 'Ù'), ("Uacute", 'Ú'),
    ("Ucirc", 'Û'), ("Uuml", 'Ü'), ("Yacute", 'Ý'), ("szlig", 'ß'),
    ("agrave", 'à'), ("aacute", 'á'), ("acirc", 'â'), ("atilde", 'ã'), ("auml", 'ä'),
    ("aring", 'å'), ("aelig", 'æ'), ("ccedil", 'ç'), ("egrave", 'è'), ("eacute", 'é'),
    ("ecirc", 'ê'), ("euml", 'ë'), ("igrave", 'ì'), ("iacute", 'í'), ("icirc", 'î'),
    ("iuml", 'ï'), ("ntilde", 'ñ'), ("ograve", 'ò'), ("oacute", 'ó'), ("ocirc", 'ô'),
    ("otilde", 'õ'), ("ouml", 'ö'), ("oslash", 'ø'), ("ugrave", 'ù'), ("uacute", 'ú'),
    ("ucirc", 'û'), ("uuml", 'ü'), ("yacute", 'ý'), ("yuml", 'ÿ'),
];

/// Decode numeric entities and the named entities in `NAMED_ENTITIES`.
///
/// Numeric references decode in full. Named ones outside the table (the
/// rarer HTML5 names) are left as written.
pub fn decode_entities(text: &str) -> String {
    ENTITY_REGEX
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if entity.starts_with("#x") || entity.starts_with("#X") {
                u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
            } else if let Some(decimal) = entity.strip_prefix('#') {
                decimal.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                NAMED_ENTITIES
                    .iter()
                    .find(|(name, _)| *name == entity)
                    .map(|(_, c)| *c)
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Extract the id from a `/boardgame/<id>/<slug>` link.
fn boardgame_id(href: &str) -> Option<&str> {
    let mut parts = href.split('/').filter(|p| !p.is_empty());
    match (parts.next(), parts.next()) {
        (Some("boardgame"), Some(id)) => Some(id),
        _ => None,
    }
}

/// Scrape up to `limit` ranked games from the browse page.
///
/// Only `primary` anchors linking to `/boardgame/<id>/...` count. The first
/// anchor for an id supplies its name; later repeats are ignored.
pub fn parse_top100_html(html: &str, limit: usize) -> Vec<GameRef> {
    let mut games: Vec<GameRef> = Vec::new();
    let mut seen = HashSet::new();

    for anchor in ANCHOR_REGEX.captures_iter(html) {
        if games.len() >= limit {
            break;
        }
        let attrs = &anchor[1];
        let is_primary = CLASS_REGEX
            .captures(attrs)
            .map(|c| c[1].split_whitespace().any(|class| class == "primary"))
            .unwrap_or(false);
        if !is_primary {
            continue;
        }
        let Some(href) = HREF_REGEX.captures(attrs).map(|c| c[1].to_string()) else {
            continue;
        };
        let Some(id) = boardgame_id(&href) else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }
        let name = decode_entities(TAG_REGEX.replace_all(&anchor[2], "").trim());
        games.push(GameRef {
            id: id.to_string(),
            name,
        });
    }

    if games.is_empty() {
        warn!("No ranked games found on the browse page");
    }
    games
}

/// Id of one `<item>`: the `objectid` attribute, an `<objectid>` child, or the `id` attribute.
fn item_id(attrs: &str, body: &str) -> Option<String> {
    OBJECTID_ATTR_REGEX
        .captures(attrs)
        .or_else(|| OBJECTID_CHILD_REGEX.captures(body))
        .or_else(|| ID_ATTR_REGEX.captures(attrs))
        .map(|c| c[1].trim().to_string())
        .filter(|id| !id.is_empty())
}

fn inner_text(fragment: &str) -> String {
    decode_entities(TAG_REGEX.replace_all(fragment, " ").trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify a collection XML response body.
pub fn parse_collection_xml(xml: &str) -> Result<CollectionDocument, ParseError> {
    let trimmed = xml.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyDocument);
    }
    if !trimmed.starts_with('<') {
        return Err(ParseError::NotXml);
    }

    if let Some(errors) = ERRORS_REGEX.captures(trimmed) {
        let block = &errors[1];
        let message = MESSAGE_REGEX
            .captures(block)
            .or_else(|| ERROR_REGEX.captures(block))
            .map(|c| inner_text(&c[1]))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Unknown BGG API error".to_string());
        return Ok(CollectionDocument::ApiError(message));
    }

    let Some(items_start) = ITEMS_OPEN_REGEX.find(trimmed) else {
        if let Some(message) = MESSAGE_REGEX.captures(trimmed) {
            return Ok(CollectionDocument::Queued(inner_text(&message[1])));
        }
        return Ok(CollectionDocument::NoItemsRoot);
    };

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for item in ITEM_REGEX.captures_iter(&trimmed[items_start.start()..]) {
        let attrs = item.get(1).map_or("", |m| m.as_str());
        let body = item.get(2).map_or("", |m| m.as_str());
        match item_id(attrs, body) {
            Some(id) => {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
            None => debug!("Skipping collection item without an id"),
        }
    }
    Ok(CollectionDocument::Items(ids))
}

/// Read owned ids from a collection CSV export.
///
/// The header must name an `objectid` column. When an `own` column exists,
/// only rows with `own == 1` are kept.
pub fn parse_collection_csv(content: &str) -> Result<Vec<String>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let id_column = position("objectid").ok_or(ParseError::MissingColumn("objectid"))?;
    let own_column = position("own");

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if let Some(own) = own_column {
            if record.get(own) != Some("1") {
                continue;
            }
        }
        match record.get(id_column).filter(|id| !id.is_empty()) {
            Some(id) => {
                if seen.insert(id.to_string()) {
                    ids.push(id.to_string());
                }
            }
            None => debug!("Row {} has no objectid, skipping", line + 2),
        }
    }
    Ok(ids)
}

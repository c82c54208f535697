use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use thiserror::Error;

/// One catalog entry, parsed out of a single RDF unit.
///
/// Records are ephemeral: the ingestion pipeline creates one per unit,
/// hands it to the eligibility filter, and drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    pub id: u32,
    /// Empty when the catalog omits a title.
    pub title: String,
    /// Empty when the catalog omits an author.
    pub author: String,
    /// All declared language codes, lowercased. Eligibility is the
    /// filter's call, not the parser's.
    pub languages: Vec<String>,
    /// First four-digit year in the record's issued date, if any.
    pub year: Option<i32>,
    pub rights_hint: RightsHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightsHint {
    ExplicitPublicDomain,
    ExplicitRestricted,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{cause}")]
pub struct ParseFailure {
    /// Catalog id, when the unit filename or record revealed one.
    pub unit: Option<u32>,
    pub cause: ParseFailureCause,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailureCause {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("record carries no catalog id")]
    MissingId,
    #[error("unreadable unit: {0}")]
    Unreadable(String),
}

/// Element whose text content is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Title,
    AgentName,
    LanguageValue,
    Issued,
    Rights,
}

/// Parse one raw metadata unit (one RDF/XML blob describing exactly one
/// catalog item) into a [`BookRecord`].
///
/// Elements are matched by local name; the feed's namespace prefixes are
/// stable but carry no information the local names don't. Missing title,
/// author, or date fall back to the documented empty/absent values.
/// Malformed XML, or a record with no usable id anywhere (neither the
/// `ebook` attribute nor `unit_id_hint`), fail the unit.
///
/// The function reads only its arguments, which is what makes fanning it
/// out across workers safe.
pub fn parse_unit(unit_id_hint: Option<u32>, xml: &str) -> Result<BookRecord, ParseFailure> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut id: Option<u32> = None;
    let mut title: Option<String> = None;
    let mut author: Option<String> = None;
    let mut languages: Vec<String> = Vec::new();
    let mut issued: Option<String> = None;
    let mut rights_text: Option<String> = None;

    let mut in_language_block = false;
    let mut capture: Option<(Capture, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let local = start.local_name();
                match local.as_ref() {
                    b"ebook" => {
                        if id.is_none() {
                            id = ebook_id_from_attributes(&start);
                        }
                    }
                    b"title" if title.is_none() => {
                        capture = Some((Capture::Title, String::new()));
                    }
                    b"name" if author.is_none() => {
                        capture = Some((Capture::AgentName, String::new()));
                    }
                    b"language" => in_language_block = true,
                    b"value" if in_language_block => {
                        capture = Some((Capture::LanguageValue, String::new()));
                    }
                    b"issued" if issued.is_none() => {
                        capture = Some((Capture::Issued, String::new()));
                    }
                    b"rights" if rights_text.is_none() => {
                        capture = Some((Capture::Rights, String::new()));
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(text)) => {
                if let Some((_, buf)) = capture.as_mut() {
                    let chunk = text.unescape().map_err(|err| ParseFailure {
                        unit: id.or(unit_id_hint),
                        cause: ParseFailureCause::Malformed(err.to_string()),
                    })?;
                    buf.push_str(&chunk);
                }
            }
            Ok(Event::End(end)) => {
                let local = end.local_name();
                if local.as_ref() == b"language" {
                    in_language_block = false;
                }
                if let Some((kind, buf)) = capture.take() {
                    if !matches_capture_end(kind, local.as_ref()) {
                        // Nested markup inside a captured element; keep
                        // collecting text until the real closing tag.
                        capture = Some((kind, buf));
                        continue;
                    }
                    let text = buf.trim().to_owned();
                    match kind {
                        Capture::Title => title = Some(text),
                        Capture::AgentName => author = Some(text),
                        Capture::LanguageValue => {
                            if !text.is_empty() {
                                languages.push(text.to_ascii_lowercase());
                            }
                        }
                        Capture::Issued => issued = Some(text),
                        Capture::Rights => rights_text = Some(text),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ParseFailure {
                    unit: id.or(unit_id_hint),
                    cause: ParseFailureCause::Malformed(err.to_string()),
                });
            }
        }
    }

    let Some(id) = id.or(unit_id_hint) else {
        return Err(ParseFailure {
            unit: None,
            cause: ParseFailureCause::MissingId,
        });
    };

    languages.sort();
    languages.dedup();

    Ok(BookRecord {
        id,
        title: title.unwrap_or_default(),
        author: author.unwrap_or_default(),
        languages,
        year: issued.as_deref().and_then(first_four_digit_year),
        rights_hint: rights_hint_from_text(rights_text.as_deref()),
    })
}

fn matches_capture_end(kind: Capture, local: &[u8]) -> bool {
    match kind {
        Capture::Title => local == b"title",
        Capture::AgentName => local == b"name",
        Capture::LanguageValue => local == b"value",
        Capture::Issued => local == b"issued",
        Capture::Rights => local == b"rights",
    }
}

fn ebook_id_from_attributes(start: &quick_xml::events::BytesStart<'_>) -> Option<u32> {
    for attr in start.attributes().with_checks(false).flatten() {
        if attr.key.local_name().as_ref() != b"about" {
            continue;
        }
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        // The ebook node is `rdf:about="ebooks/<id>"`.
        let digits = value.rsplit('/').next().unwrap_or(&value);
        if let Ok(id) = digits.parse::<u32>() {
            return Some(id);
        }
    }
    None
}

/// First run of exactly four ASCII digits, e.g. `"1993-10-01"` -> 1993.
fn first_four_digit_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if !bytes[idx].is_ascii_digit() {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx - start == 4 {
            return text[start..idx].parse().ok();
        }
    }
    None
}

fn rights_hint_from_text(rights: Option<&str>) -> RightsHint {
    let Some(rights) = rights else {
        return RightsHint::Unknown;
    };
    let lowered = rights.to_ascii_lowercase();
    if lowered.contains("public domain") {
        RightsHint::ExplicitPublicDomain
    } else if lowered.contains("copyright") {
        RightsHint::ExplicitRestricted
    } else {
        RightsHint::Unknown
    }
}

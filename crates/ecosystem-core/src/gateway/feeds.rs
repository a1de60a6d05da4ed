use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use reqwest::Client;

use super::{FeedEntry, FeedReader};
use crate::EcosystemError;

/// Fetches RSS and Atom feeds over HTTP.
#[derive(Clone)]
pub struct HttpFeedReader {
    client: Client,
}

impl HttpFeedReader {
    pub fn new(timeout: Duration) -> Result<Self, EcosystemError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("research-ecosystem/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| EcosystemError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedReader for HttpFeedReader {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("feed request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("feed {url} returned an error status"))?
            .text()
            .await
            .with_context(|| format!("failed to read feed body from {url}"))?;

        parse_feed(&body)
    }
}

/// Layout of the document, fixed by its root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Rss,
    Atom,
}

impl Format {
    fn from_root(name: &[u8]) -> Option<Self> {
        match name {
            b"rss" | b"RDF" => Some(Self::Rss),
            b"feed" => Some(Self::Atom),
            _ => None,
        }
    }

    fn entry_tag(self) -> &'static [u8] {
        match self {
            Self::Rss => b"item",
            Self::Atom => b"entry",
        }
    }

    /// Only unprefixed children count; `media:title`, `dc:date` and friends
    /// are extensions and never override the core fields.
    fn field(self, name: &[u8]) -> Option<Field> {
        match (self, name) {
            (_, b"title") => Some(Field::Title),
            (Self::Rss, b"description") | (Self::Atom, b"summary") => Some(Field::Summary),
            (Self::Rss, b"link") => Some(Field::Link),
            (Self::Rss, b"pubDate") | (Self::Atom, b"published") => Some(Field::Published),
            (Self::Atom, b"updated") => Some(Field::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Summary,
    Link,
    Published,
    Updated,
}

#[derive(Debug, Default)]
struct PartialEntry {
    title: String,
    summary: String,
    link: String,
    published: String,
    updated: String,
    /// Atom `(rel, href)` pairs.
    links: Vec<(Option<String>, String)>,
}

impl PartialEntry {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Link => &mut self.link,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        };
        target.push_str(text);
    }

    /// The `alternate` Atom link, else the first one.
    fn primary_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|(rel, _)| rel.as_deref().is_none_or(|rel| rel == "alternate"))
            .or_else(|| self.links.first())
            .map(|(_, href)| href.as_str())
    }

    fn finish(self) -> FeedEntry {
        let link = match self.link.trim() {
            "" => self.primary_link().unwrap_or_default().to_string(),
            link => link.to_string(),
        };
        let published = match self.published.trim() {
            "" => self.updated.trim(),
            published => published,
        };
        FeedEntry {
            title: self.title.trim().to_string(),
            summary: self.summary.trim().to_string(),
            link,
            published: published.to_string(),
        }
    }
}

/// Streaming state for one document. Depths count open elements, the root
/// being depth 1.
#[derive(Debug, Default)]
struct FeedParser {
    format: Option<Format>,
    depth: usize,
    entry: Option<(usize, PartialEntry)>,
    field: Option<(usize, Field)>,
    entries: Vec<FeedEntry>,
}

impl FeedParser {
    fn open(&mut self, element: &BytesStart<'_>, empty: bool) -> Result<()> {
        let depth = self.depth + 1;
        if !empty {
            self.depth = depth;
        }

        let name = element.name();
        let Some(format) = self.format else {
            let format = Format::from_root(name.local_name().as_ref()).ok_or_else(|| {
                anyhow!(
                    "document is neither RSS nor Atom (root element <{}>)",
                    String::from_utf8_lossy(name.as_ref())
                )
            })?;
            self.format = Some(format);
            return Ok(());
        };

        if name.prefix().is_some() {
            return Ok(());
        }
        let local = name.local_name();
        let local = local.as_ref();

        if self.entry.is_none() {
            if !empty && local == format.entry_tag() {
                self.entry = Some((depth, PartialEntry::default()));
            }
            return Ok(());
        }

        if let Some((entry_depth, partial)) = &mut self.entry {
            if depth != *entry_depth + 1 {
                return Ok(());
            }
            if format == Format::Atom && local == b"link" {
                partial.links.push(atom_link(element)?);
            } else if !empty {
                self.field = format.field(local).map(|field| (depth, field));
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.field.is_some_and(|(depth, _)| depth == self.depth) {
            self.field = None;
        }
        if self
            .entry
            .as_ref()
            .is_some_and(|(depth, _)| *depth == self.depth)
        {
            if let Some((_, partial)) = self.entry.take() {
                self.entries.push(partial.finish());
            }
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn text(&mut self, text: &str) {
        if let (Some((depth, field)), Some((_, partial))) = (self.field, &mut self.entry) {
            if depth == self.depth {
                partial.push(field, text);
            }
        }
    }

    fn finish(self) -> Result<Vec<FeedEntry>> {
        if self.format.is_none() {
            bail!("feed document is empty");
        }
        Ok(self.entries)
    }
}

fn atom_link(element: &BytesStart<'_>) -> Result<(Option<String>, String)> {
    let mut rel = None;
    let mut href = String::new();
    for attribute in element.attributes() {
        let attribute = attribute.context("malformed link attribute")?;
        match attribute.key.as_ref() {
            b"href" => href = attribute.unescape_value()?.into_owned(),
            b"rel" => rel = Some(attribute.unescape_value()?.into_owned()),
            _ => {}
        }
    }
    Ok((rel, href))
}

fn resolve_reference(reference: &BytesRef<'_>) -> Result<String> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = reference.decode()?;
    Ok(match resolve_predefined_entity(&name) {
        Some(value) => value.to_string(),
        None => format!("&{name};"),
    })
}

/// Parses RSS 2.0 (or RDF) and Atom documents. Any other root element is an
/// error so callers can tell a broken feed from an empty one.
pub(crate) fn parse_feed(body: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(body);
    let mut parser = FeedParser::default();

    loop {
        match reader.read_event().context("malformed feed document")? {
            Event::Start(element) => parser.open(&element, false)?,
            Event::Empty(element) => parser.open(&element, true)?,
            Event::End(_) => parser.close(),
            Event::Text(text) => parser.text(&text.xml_content()?),
            Event::CData(data) => parser.text(&data.decode()?),
            Event::GeneralRef(reference) => parser.text(&resolve_reference(&reference)?),
            Event::Eof => break,
            _ => {}
        }
    }

    parser.finish()
}

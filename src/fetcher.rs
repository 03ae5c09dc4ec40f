//! Feed fetching: one HTTP GET per feed, parsed into a [`RawFeedDocument`].
//!
//! The network half ([`HttpFetcher`]) and the parsing half ([`parse_document`])
//! are separate so documents can be parsed without any I/O. The scheduler
//! depends only on the [`FeedFetcher`] trait.
//!
//! Only the RSS 2.0 fields the pipeline stores are read:
//!
//! ```text
//! <rss>
//!   <channel>
//!     <title/> <description/>
//!     <item> <title/> <link/> <description/> <pubDate/> </item>
//!     ...
//!   </channel>
//! </rss>
//! ```
//!
//! Everything else in the document is ignored.

use crate::error::FetchError;
use crate::models::{RawFeedDocument, RawItem};
use crate::shutdown::Shutdown;
use crate::utils::truncate_for_log;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// Sent with every request.
pub const USER_AGENT: &str = "radgregator";

/// Something that can turn a feed URL into a parsed document.
pub trait FeedFetcher {
    /// Fetch and parse the feed at `url`.
    ///
    /// Must return [`FetchError::Cancelled`] promptly once `shutdown` fires.
    async fn fetch(&self, url: &str, shutdown: &Shutdown) -> Result<RawFeedDocument, FetchError>;
}

/// [`FeedFetcher`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client. `timeout` is the only request deadline; `None` keeps
    /// the transport default.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {status}")));
        }

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Downloaded feed body");
        Ok(body.to_vec())
    }
}

impl FeedFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, shutdown: &Shutdown) -> Result<RawFeedDocument, FetchError> {
        let parsed = validate_url(url)?;

        let body = tokio::select! {
            biased;
            _ = shutdown.requested() => return Err(FetchError::Cancelled),
            body = self.download(parsed) => body?,
        };

        let document = parse_document(&body)?;
        info!(
            channel = %document.title,
            items = document.items.len(),
            "Fetched feed"
        );
        Ok(document)
    }
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: &str| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if url.trim().is_empty() {
        return Err(invalid("empty URL"));
    }
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(parsed)
}

/// Which text field of the channel or of an item is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

#[derive(Debug)]
struct Capture {
    in_item: bool,
    field: Field,
    /// Length of the element path while inside the captured element.
    depth: usize,
    text: String,
}

/// Walks reader events and keeps only the fields the pipeline stores.
///
/// Markup nested inside a captured field contributes its text. When a field
/// appears more than once in the same item, the last occurrence wins.
#[derive(Debug, Default)]
struct ChannelWalker {
    path: Vec<String>,
    seen_channel: bool,
    document: RawFeedDocument,
    item: Option<RawItem>,
    capture: Option<Capture>,
}

impl ChannelWalker {
    fn open(&mut self, name: String) {
        let depth = self.path.len();
        if self.capture.is_none() {
            let in_channel = depth >= 2 && self.path[1] == "channel";
            match depth {
                1 if name == "channel" => self.seen_channel = true,
                2 if in_channel && name == "item" => self.item = Some(RawItem::default()),
                2 if in_channel => self.start_capture(false, &name, depth + 1),
                3 if self.item.is_some() => self.start_capture(true, &name, depth + 1),
                _ => {}
            }
        }
        self.path.push(name);
    }

    fn start_capture(&mut self, in_item: bool, name: &str, depth: usize) {
        let field = match (in_item, name) {
            (_, "title") => Field::Title,
            (_, "description") => Field::Description,
            (true, "link") => Field::Link,
            (true, "pubDate") => Field::PubDate,
            _ => return,
        };
        self.capture = Some(Capture {
            in_item,
            field,
            depth,
            text: String::new(),
        });
    }

    fn close(&mut self) {
        let depth = self.path.len();
        let Some(name) = self.path.pop() else {
            return;
        };

        if self.capture.as_ref().is_some_and(|c| c.depth == depth) {
            if let Some(capture) = self.capture.take() {
                self.store(capture);
            }
        } else if depth == 3 && name == "item" {
            if let Some(item) = self.item.take() {
                self.document.items.push(item);
            }
        }
    }

    fn store(&mut self, capture: Capture) {
        let text = capture.text;
        if !capture.in_item {
            match capture.field {
                Field::Title => self.document.title = text,
                Field::Description => self.document.description = text,
                Field::Link | Field::PubDate => {}
            }
            return;
        }

        if let Some(item) = self.item.as_mut() {
            match capture.field {
                Field::Title => item.title = text,
                Field::Link => item.link = text,
                Field::Description => item.description = text,
                Field::PubDate => item.pub_date = text,
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.text.push_str(text);
        }
    }

    fn push_reference(&mut self, name: &str) {
        match resolve_xml_reference(name) {
            Some(resolved) => self.push_text(&resolved),
            // Not an XML entity; the normalizer decodes HTML ones.
            None => self.push_text(&format!("&{name};")),
        }
    }

    fn finish(self) -> Result<RawFeedDocument, FetchError> {
        if let Some(open) = self.path.last() {
            return Err(FetchError::MalformedDocument(format!(
                "document ended inside <{open}>"
            )));
        }
        if !self.seen_channel {
            return Err(FetchError::MalformedDocument(
                "missing <channel> element".to_string(),
            ));
        }
        Ok(self.document)
    }
}

/// Resolve a character reference (`#233`, `#xE9`) or one of the five
/// predefined XML entities.
fn resolve_xml_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Parse an RSS 2.0 body. XML escapes are resolved here; HTML entities are
/// left for the normalizer.
///
/// Only XML that is not well-formed, or a document without a `<channel>`,
/// is rejected. Oddities inside single items are tolerated.
pub fn parse_document(body: &[u8]) -> Result<RawFeedDocument, FetchError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| FetchError::MalformedDocument(format!("body is not UTF-8: {e}")))?;

    walk_channel(text).inspect_err(|e| {
        debug!(error = %e, preview = %truncate_for_log(text, 200), "Unparseable feed body");
    })
}

fn walk_channel(text: &str) -> Result<RawFeedDocument, FetchError> {
    let mut reader = Reader::from_str(text);
    let mut walker = ChannelWalker::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => walker.open(element_name(&e)),
            Event::Empty(e) => {
                walker.open(element_name(&e));
                walker.close();
            }
            Event::End(_) => walker.close(),
            Event::Text(e) => walker.push_text(&String::from_utf8_lossy(&e)),
            Event::CData(e) => walker.push_text(&String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => walker.push_reference(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }

    walker.finish()
}

//! Streaming sitemap XML parsing
//!
//! Handles both `<urlset>` documents and `<sitemapindex>` documents with a
//! single event loop. Tag names are matched case-insensitively and without
//! namespace prefixes; attributes, `<lastmod>`, `<priority>` and the rest
//! are ignored. Parse errors are recoverable: the parser returns whatever
//! it collected before the error.

use quick_xml::events::Event;
use quick_xml::Reader;

/// URLs collected from one sitemap document
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SitemapRefs {
    /// Page URLs from `<url><loc>` entries
    pub pages: Vec<String>,

    /// Sub-sitemap URLs from `<sitemap><loc>` entries
    pub sitemaps: Vec<String>,
}

impl SitemapRefs {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.sitemaps.is_empty()
    }
}

/// Parses sitemap XML into page and sub-sitemap URLs
pub fn parse(xml: &str) -> SitemapRefs {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut refs = SitemapRefs::default();

    let mut in_url = false;
    let mut in_sitemap = false;
    let mut in_loc = false;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => match local_name(element.name().as_ref()).as_str() {
                "url" => in_url = true,
                "sitemap" => in_sitemap = true,
                "loc" => {
                    in_loc = true;
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(content)) => {
                if in_loc {
                    if let Ok(unescaped) = content.unescape() {
                        text.push_str(&unescaped);
                    }
                }
            }
            Ok(Event::CData(content)) => {
                if in_loc {
                    text.push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
            }
            Ok(Event::End(element)) => match local_name(element.name().as_ref()).as_str() {
                "url" => in_url = false,
                "sitemap" => in_sitemap = false,
                "loc" => {
                    in_loc = false;
                    let loc = text.trim().to_string();
                    if !loc.is_empty() {
                        if in_url {
                            refs.pages.push(loc);
                        } else if in_sitemap {
                            refs.sitemaps.push(loc);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            // Recoverable: keep whatever was collected before the error
            Err(_) => break,
            Ok(_) => {}
        }
        buf.clear();
    }

    refs
}

/// Lowercases a tag name and strips any namespace prefix
fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw).to_ascii_lowercase();
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name,
    }
}

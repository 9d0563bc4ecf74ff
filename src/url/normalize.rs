use crate::UrlError;
use url::form_urlencoded;
use url::Url;

/// URL canonicalization policy, captured from the first seed URL
///
/// The policy decides URL identity for the whole crawl: whether plain-http
/// references are upgraded to https, which port is injected into portless
/// references, and whether query parameters are sorted.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    /// Scheme of the seed URL ("http" or "https")
    pub scheme: String,

    /// Upgrade http:// references to https:// (set when the seed was https)
    pub upgrade_to_https: bool,

    /// Explicit non-default port of the seed, injected into portless references
    pub preferred_port: Option<u16>,

    /// Sort query parameters alphabetically (off under preserve-query-order)
    pub sort_query: bool,
}

impl UrlPolicy {
    /// Derives the canonicalization policy from a seed URL
    ///
    /// # Arguments
    ///
    /// * `seed` - The first seed URL supplied by the user
    /// * `preserve_query_order` - Disables alphabetical query sorting
    ///
    /// # Returns
    ///
    /// * `Ok(UrlPolicy)` - Policy capturing the seed's scheme and port
    /// * `Err(UrlError)` - The seed is unparseable, non-http(s), or hostless
    pub fn from_seed(seed: &str, preserve_query_order: bool) -> Result<Self, UrlError> {
        let url = Url::parse(seed).map_err(|e| UrlError::Parse(e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }

        if url.host_str().is_none() {
            return Err(UrlError::MissingHost);
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            upgrade_to_https: url.scheme() == "https",
            preferred_port: url.port(),
            sort_query: !preserve_query_order,
        })
    }

    /// Parses a reference, promoting protocol-relative input to the seed scheme
    ///
    /// Returns `None` for unparseable input and for any scheme other than
    /// http or https. The returned URL is the pre-normalization form used to
    /// capture fallback eligibility.
    pub fn parse_promoted(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();

        let promoted;
        let input = if raw.starts_with("//") {
            promoted = format!("{}:{}", self.scheme, raw);
            &promoted
        } else {
            raw
        };

        let url = Url::parse(input).ok()?;
        match url.scheme() {
            "http" | "https" => Some(url),
            _ => None,
        }
    }

    /// Normalizes a URL to its canonical string form
    ///
    /// # Normalization Steps
    ///
    /// 1. Promote protocol-relative input to the seed scheme and parse;
    ///    reject unparseable or non-http(s) input
    /// 2. Upgrade http to https when the seed was https
    /// 3. Inject the seed's port when the URL carries no explicit port and
    ///    the seed had a non-default one
    /// 4. Sort query parameters alphabetically (unless preserved)
    /// 5. Trim trailing slashes from the path, keeping a bare `/`
    /// 6. Remove the fragment
    ///
    /// Ports equal to the scheme default are left as the parser produced
    /// them. The transformation is idempotent.
    ///
    /// # Arguments
    ///
    /// * `raw` - The URL string to normalize
    ///
    /// # Returns
    ///
    /// * `Some(String)` - The canonical form
    /// * `None` - The input does not normalize to a crawlable URL
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let mut url = self.parse_promoted(raw)?;

        if self.upgrade_to_https && url.scheme() == "http" {
            url.set_scheme("https").ok()?;
        }

        if url.port().is_none() {
            if let Some(port) = self.preferred_port {
                url.set_port(Some(port)).ok()?;
            }
        }

        if self.sort_query && url.query().is_some() {
            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            pairs.sort();

            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&pairs)
                .finish();
            url.set_query(if query.is_empty() { None } else { Some(&query) });
        }

        let path = url.path();
        if path != "/" && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/').to_string();
            url.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
        }

        url.set_fragment(None);

        Some(url.into())
    }
}

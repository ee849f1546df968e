//! Access to the current location (URL) the client was opened with.
//!
//! Parameters are looked up in the query string first and then in a query
//! embedded in the fragment, e.g. `https://app.example/#/transactions?network=mainnet`.

use std::sync::RwLock;
use url::Url;

/// Source of the current URL
pub trait UrlSource: Send + Sync {
    /// Current URL, if any
    fn current(&self) -> Option<Url>;
}

/// Look up a parameter in the query string, then in the fragment query.
///
/// An empty value counts as absent, so `?network=#/?network=mainnet` yields
/// the fragment value.
pub fn url_param(url: &Url, name: &str) -> Option<String> {
    let from_query = url
        .query_pairs()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned());

    from_query.or_else(|| {
        let fragment = url.fragment()?;
        let (_, query) = fragment.split_once('?')?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

/// Location fixed at construction, replaceable to simulate navigation
#[derive(Debug, Default)]
pub struct StaticLocation {
    url: RwLock<Option<Url>>,
}

impl StaticLocation {
    /// No current URL
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start at `url`
    pub fn new(url: Url) -> Self {
        Self {
            url: RwLock::new(Some(url)),
        }
    }

    /// Parse `url` and start there
    pub fn parse(url: &str) -> crate::Result<Self> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Replace the current URL
    pub fn navigate(&self, url: Option<Url>) {
        match self.url.write() {
            Ok(mut current) => *current = url,
            Err(poisoned) => *poisoned.into_inner() = url,
        }
    }
}

impl UrlSource for StaticLocation {
    fn current(&self) -> Option<Url> {
        match self.url.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

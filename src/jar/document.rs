//! Host adapter over a shared `reqwest` cookie jar.
//!
//! A [`DocumentCookieJar`] plays the role of `document.cookie` for one URL:
//! reads return the `Cookie` header the jar would send to that URL, writes
//! are applied as `Set-Cookie` values received from it. Several adapters can
//! share one [`Jar`] (and the HTTP client using it), giving the same ambient,
//! unsynchronized view a browser page has.

use std::fmt;
use std::sync::Arc;

use reqwest::cookie::{CookieStore as _, Jar};
use tracing::trace;
use url::Url;

use super::CookieJar;

/// Errors binding a jar to a document URL.
#[derive(Debug, thiserror::Error)]
pub enum DocumentUrlError {
    /// The URL does not parse.
    #[error("invalid document URL '{url}': {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The URL has no host to scope cookies to.
    #[error("document URL '{0}' has no host")]
    MissingHost(String),
}

/// Cookie jar view for the document at one URL.
#[derive(Clone)]
pub struct DocumentCookieJar {
    jar: Arc<Jar>,
    url: Url,
}

impl DocumentCookieJar {
    /// Binds a fresh, empty jar to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentUrlError`] if `url` does not parse or has no host.
    pub fn new(url: &str) -> Result<Self, DocumentUrlError> {
        Self::with_jar(Arc::new(Jar::default()), url)
    }

    /// Binds an existing shared jar to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentUrlError`] if `url` does not parse or has no host.
    pub fn with_jar(jar: Arc<Jar>, url: &str) -> Result<Self, DocumentUrlError> {
        let parsed = Url::parse(url).map_err(|source| DocumentUrlError::Parse {
            url: url.to_string(),
            source,
        })?;
        if parsed.host_str().is_none() {
            return Err(DocumentUrlError::MissingHost(url.to_string()));
        }
        Ok(Self { jar, url: parsed })
    }

    /// The document URL cookies are read for and written from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The shared jar, e.g. for `reqwest::ClientBuilder::cookie_provider`.
    pub fn shared_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }
}

impl fmt::Debug for DocumentCookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCookieJar")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl CookieJar for DocumentCookieJar {
    fn read(&self) -> String {
        self.jar
            .cookies(&self.url)
            .and_then(|header| header.to_str().ok().map(str::to_string))
            .unwrap_or_default()
    }

    fn write(&mut self, assignment: &str) {
        trace!(url = %self.url, "applying cookie assignment to shared jar");
        self.jar.add_cookie_str(assignment, &self.url);
    }
}

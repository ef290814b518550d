//! In-memory cookie jar that applies host cookie rules.
//!
//! [`MemoryCookieJar`] behaves like a browser's `document.cookie` for a single
//! document: assignments are parsed, checked against the document's host and
//! security context, and merged by `(name, domain, path)`. Reads return the
//! live cookies visible to the document.
//!
//! The cookie list can be saved to and loaded from a JSON file, which is how
//! the CLI keeps a jar between invocations.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cookie::Cookie;
use tracing::{debug, instrument, warn};
use url::Url;

use super::CookieJar;
use super::document::DocumentUrlError;
use crate::store::SameSite;

// 9999-12-31T23:59:59Z
const MAX_EXPIRY_SECS: u64 = 253_402_300_799;

/// Errors saving or loading a jar file.
#[derive(Debug, thiserror::Error)]
pub enum JarFileError {
    /// Filesystem I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Which optional cookie features the emulated host supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPolicy {
    /// Accept cookies carrying `SameSite=None` at all.
    pub accept_same_site_none: bool,
    /// Reject `SameSite=None` cookies that are not also `secure`.
    pub same_site_none_requires_secure: bool,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            accept_same_site_none: true,
            same_site_none_requires_secure: true,
        }
    }
}

/// A cookie held by [`MemoryCookieJar`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredCookie {
    pub name: String,
    /// Host of the document that set the cookie.
    pub host: String,
    /// Raw value as assigned (still percent-encoded when written by the store).
    pub value: String,
    /// Domain attribute without leading dot; `None` for host-only cookies.
    pub domain: Option<String>,
    pub path: String,
    /// Absolute expiry; `None` for session cookies.
    pub expires: Option<SystemTime>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl StoredCookie {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    fn same_scope(&self, other: &Self) -> bool {
        self.name == other.name
            && self.domain == other.domain
            && self.path == other.path
            && (self.domain.is_some() || self.host == other.host)
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct JarSnapshot {
    cookies: Vec<StoredCookie>,
}

/// Why the host refused an assignment.
#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("malformed assignment: {0}")]
    Malformed(#[from] cookie::ParseError),
    #[error("domain '{domain}' does not match host '{host}'")]
    DomainMismatch { domain: String, host: String },
    #[error("secure cookie set from an insecure context")]
    InsecureContext,
    #[error("SameSite=None is not supported by this host")]
    SameSiteNoneUnsupported,
    #[error("SameSite=None requires the secure attribute")]
    SameSiteNoneWithoutSecure,
}

/// Cookie jar for one document, held in memory.
#[derive(Debug, Clone)]
pub struct MemoryCookieJar {
    host: String,
    document_path: String,
    secure_context: bool,
    policy: HostPolicy,
    cookies: Vec<StoredCookie>,
}

impl MemoryCookieJar {
    /// Creates an empty jar for a document on `host` at path `/`, served over
    /// an insecure scheme.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            document_path: "/".to_string(),
            secure_context: false,
            policy: HostPolicy::default(),
            cookies: Vec::new(),
        }
    }

    /// Creates an empty jar for the document at `url`.
    ///
    /// `https` URLs are treated as secure contexts.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentUrlError`] if `url` does not parse or has no host.
    pub fn for_url(url: &str) -> Result<Self, DocumentUrlError> {
        let parsed = Url::parse(url).map_err(|source| DocumentUrlError::Parse {
            url: url.to_string(),
            source,
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DocumentUrlError::MissingHost(url.to_string()))?;

        Ok(Self::new(host)
            .with_document_path(parsed.path())
            .with_secure_context(parsed.scheme() == "https"))
    }

    #[must_use]
    pub fn with_document_path(mut self, path: impl Into<String>) -> Self {
        self.document_path = path.into();
        self
    }

    #[must_use]
    pub fn with_secure_context(mut self, secure: bool) -> Self {
        self.secure_context = secure;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: HostPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Host of the document this jar serves.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// All stored cookies, including ones not visible to the document.
    pub fn entries(&self) -> &[StoredCookie] {
        &self.cookies
    }

    /// Finds the cookie stored under exactly this scope.
    ///
    /// `domain` is compared without its leading dot; `None` selects the
    /// host-only cookie.
    pub fn entry(&self, name: &str, domain: Option<&str>, path: &str) -> Option<&StoredCookie> {
        let domain = domain.map(normalize_domain);
        self.cookies.iter().find(|cookie| {
            cookie.name == name
                && cookie.domain == domain
                && cookie.path == path
                && (domain.is_some() || cookie.host == self.host)
        })
    }

    /// Replaces the stored cookies with the ones saved at `path`.
    ///
    /// A missing file leaves the jar empty. Cookies that expired since they
    /// were saved are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`JarFileError`] if the file cannot be read or parsed.
    #[instrument(level = "debug", skip(self, path), fields(path = %path.display()))]
    pub fn load(&mut self, path: &Path) -> Result<(), JarFileError> {
        if !path.exists() {
            debug!("no jar file; starting empty");
            self.cookies.clear();
            return Ok(());
        }

        let raw = fs::read_to_string(path)?;
        let snapshot: JarSnapshot = serde_json::from_str(&raw)?;
        let now = SystemTime::now();
        self.cookies = snapshot
            .cookies
            .into_iter()
            .filter(|cookie| !cookie.is_expired(now))
            .collect();

        debug!(cookies = self.cookies.len(), "loaded jar file");
        Ok(())
    }

    /// Saves the live cookies to `path` as JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`JarFileError`] if serialization or the write fails.
    #[instrument(level = "debug", skip(self, path), fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), JarFileError> {
        let now = SystemTime::now();
        let snapshot = JarSnapshot {
            cookies: self
                .cookies
                .iter()
                .filter(|cookie| !cookie.is_expired(now))
                .cloned()
                .collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;

        debug!(cookies = snapshot.cookies.len(), "saved jar file");
        Ok(())
    }

    fn parse_assignment(&self, assignment: &str, now: SystemTime) -> Result<StoredCookie, Rejection> {
        let parsed = Cookie::parse(assignment)?;

        let domain = parsed
            .domain()
            .map(normalize_domain)
            .filter(|domain| !domain.is_empty());
        let path = parsed
            .path()
            .filter(|path| path.starts_with('/'))
            .map_or_else(|| default_path(&self.document_path), str::to_string);
        // Max-Age takes precedence over Expires.
        let expires = match parsed.max_age() {
            Some(max_age) => Some(expiry_after(now, max_age.whole_seconds())),
            None => parsed.expires_datetime().map(SystemTime::from),
        };
        let secure = parsed.secure().unwrap_or(false);
        let same_site = parsed.same_site().map(|same_site| match same_site {
            cookie::SameSite::Lax => SameSite::Lax,
            cookie::SameSite::Strict => SameSite::Strict,
            cookie::SameSite::None => SameSite::None,
        });

        if let Some(domain) = &domain
            && !domain_matches(&self.host, domain)
        {
            return Err(Rejection::DomainMismatch {
                domain: domain.clone(),
                host: self.host.clone(),
            });
        }

        if secure && !self.secure_context {
            return Err(Rejection::InsecureContext);
        }

        if same_site == Some(SameSite::None) {
            if !self.policy.accept_same_site_none {
                return Err(Rejection::SameSiteNoneUnsupported);
            }
            if self.policy.same_site_none_requires_secure && !secure {
                return Err(Rejection::SameSiteNoneWithoutSecure);
            }
        }

        Ok(StoredCookie {
            name: parsed.name().to_string(),
            host: self.host.clone(),
            value: parsed.value().to_string(),
            domain,
            path,
            expires,
            secure,
            same_site,
        })
    }

    fn is_visible(&self, cookie: &StoredCookie, now: SystemTime) -> bool {
        if cookie.is_expired(now) {
            return false;
        }
        let domain_ok = match &cookie.domain {
            Some(domain) => domain_matches(&self.host, domain),
            None => cookie.host == self.host,
        };
        domain_ok
            && path_matches(&self.document_path, &cookie.path)
            && (!cookie.secure || self.secure_context)
    }
}

impl CookieJar for MemoryCookieJar {
    fn read(&self) -> String {
        let now = SystemTime::now();
        self.cookies
            .iter()
            .filter(|cookie| self.is_visible(cookie, now))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn write(&mut self, assignment: &str) {
        let now = SystemTime::now();
        let cookie = match self.parse_assignment(assignment, now) {
            Ok(cookie) => cookie,
            Err(reason) => {
                warn!(reason = %reason, host = %self.host, "host rejected cookie assignment");
                return;
            }
        };

        self.cookies
            .retain(|existing| !existing.same_scope(&cookie) && !existing.is_expired(now));
        if cookie.is_expired(now) {
            debug!(name = %cookie.name, "expired assignment removed cookie");
            return;
        }
        self.cookies.push(cookie);
    }
}

/// Absolute expiry for a `Max-Age` of `seconds`; zero or negative means already expired.
fn expiry_after(now: SystemTime, seconds: i64) -> SystemTime {
    match u64::try_from(seconds) {
        Ok(seconds) if seconds > 0 => now
            .checked_add(Duration::from_secs(seconds))
            .unwrap_or(UNIX_EPOCH + Duration::from_secs(MAX_EXPIRY_SECS)),
        _ => UNIX_EPOCH,
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim_start_matches('.').to_ascii_lowercase()
}

/// RFC 6265 domain-match: `host` equals `domain` or is a subdomain of it.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// RFC 6265 path-match.
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path[cookie_path.len()..].starts_with('/'))
}

/// RFC 6265 default-path: the directory of the document path.
fn default_path(document_path: &str) -> String {
    if !document_path.starts_with('/') {
        return "/".to_string();
    }
    match document_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => document_path[..index].to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secure_jar() -> MemoryCookieJar {
        MemoryCookieJar::new("www.freelancer.com").with_secure_context(true)
    }

    #[test]
    fn test_write_then_read() {
        let mut jar = secure_jar();
        jar.write("a=1;path=/");
        jar.write("b=2;path=/");
        assert_eq!(jar.read(), "a=1; b=2");
    }

    #[test]
    fn test_write_same_scope_overwrites() {
        let mut jar = secure_jar();
        jar.write("a=1;path=/");
        jar.write("a=2;path=/");
        assert_eq!(jar.read(), "a=2");
        assert_eq!(jar.entries().len(), 1);
    }

    #[test]
    fn test_write_different_scope_keeps_both() {
        let mut jar = secure_jar();
        jar.write("a=1;path=/");
        jar.write("a=2;domain=freelancer.com;path=/");
        assert_eq!(jar.entries().len(), 2);
        assert_eq!(jar.read(), "a=1; a=2");
    }

    #[test]
    fn test_expired_write_deletes_matching_scope_only() {
        let mut jar = secure_jar();
        jar.write("a=1;domain=.freelancer.com;path=/");
        jar.write("a=;expires=Thu, 01 Jan 1970 00:00:00 GMT;path=/");
        assert_eq!(jar.read(), "a=1");

        jar.write("a=;expires=Thu, 01 Jan 1970 00:00:00 GMT;domain=freelancer.com;path=/");
        assert_eq!(jar.read(), "");
        assert!(jar.entries().is_empty());
    }

    #[test]
    fn test_max_age_overrides_expires() {
        let mut jar = secure_jar();
        jar.write("a=1;expires=Fri, 31 Dec 9999 23:59:59 GMT;max-age=0;path=/");
        assert_eq!(jar.read(), "");
    }

    #[test]
    fn test_far_future_expiry_is_live() {
        let mut jar = secure_jar();
        jar.write("a=1;expires=Fri, 31 Dec 9999 23:59:59 GMT;path=/");
        assert_eq!(jar.read(), "a=1");
        assert!(jar.entry("a", None, "/").unwrap().expires.is_some());
    }

    #[test]
    fn test_unparseable_expires_is_session_cookie() {
        let mut jar = secure_jar();
        jar.write("a=1;expires=whenever;path=/");
        assert_eq!(jar.read(), "a=1");
        assert_eq!(jar.entry("a", None, "/").unwrap().expires, None);
    }

    #[test]
    fn test_foreign_domain_rejected() {
        let mut jar = secure_jar();
        jar.write("a=1;domain=example.com;path=/");
        jar.write("b=1;domain=reelancer.com;path=/");
        assert!(jar.entries().is_empty());
    }

    #[test]
    fn test_parent_domain_accepted() {
        let mut jar = secure_jar();
        jar.write("a=1;domain=.freelancer.com;path=/");
        assert_eq!(jar.entry("a", Some("freelancer.com"), "/").unwrap().value, "1");
    }

    #[test]
    fn test_secure_rejected_in_insecure_context() {
        let mut jar = MemoryCookieJar::new("www.freelancer.com");
        jar.write("a=1;path=/;secure");
        assert_eq!(jar.read(), "");
    }

    #[test]
    fn test_same_site_none_requires_secure() {
        let mut jar = secure_jar();
        jar.write("a=1;path=/; SameSite=None");
        assert_eq!(jar.read(), "");
        jar.write("a=1;path=/;secure; SameSite=None");
        assert_eq!(jar.read(), "a=1");
    }

    #[test]
    fn test_same_site_none_rejected_by_policy() {
        let mut jar = secure_jar().with_policy(HostPolicy {
            accept_same_site_none: false,
            ..HostPolicy::default()
        });
        jar.write("a=1;path=/;secure; SameSite=None");
        jar.write("b=1;path=/;secure; SameSite=Lax");
        assert_eq!(jar.read(), "b=1");
    }

    #[test]
    fn test_path_scoping() {
        let mut jar = secure_jar().with_document_path("/projects/list");
        jar.write("root=1;path=/");
        jar.write("projects=1;path=/projects");
        jar.write("other=1;path=/proj");
        jar.write("defaulted=1");
        assert_eq!(jar.read(), "root=1; projects=1; defaulted=1");
        assert_eq!(jar.entry("defaulted", None, "/projects").unwrap().value, "1");
    }

    #[test]
    fn test_missing_pair_rejected() {
        let mut jar = secure_jar();
        jar.write("novalue;path=/");
        jar.write("=orphan;path=/");
        assert!(jar.entries().is_empty());
    }

    #[test]
    fn test_for_url_sets_context() {
        let jar = MemoryCookieJar::for_url("https://WWW.Freelancer.com/jobs/view").unwrap();
        assert_eq!(jar.host(), "www.freelancer.com");
        assert!(jar.secure_context);
        assert_eq!(jar.document_path, "/jobs/view");
    }

    #[test]
    fn test_for_url_rejects_invalid_urls() {
        assert!(matches!(
            MemoryCookieJar::for_url("not a url"),
            Err(DocumentUrlError::Parse { .. })
        ));
        assert!(matches!(
            MemoryCookieJar::for_url("data:text/plain,hi"),
            Err(DocumentUrlError::MissingHost(_))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("jar.json");

        let mut jar = secure_jar();
        jar.write("a=1;expires=Fri, 31 Dec 9999 23:59:59 GMT;path=/");
        jar.write("b=2;domain=freelancer.com;path=/;secure; SameSite=Lax");
        jar.save(&path).unwrap();

        let mut restored = secure_jar();
        restored.load(&path).unwrap();
        assert_eq!(restored.entries(), jar.entries());
        assert_eq!(restored.read(), "a=1; b=2");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut jar = secure_jar();
        jar.write("a=1;path=/");
        jar.load(&dir.path().join("absent.json")).unwrap();
        assert!(jar.entries().is_empty());
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jar.json");
        fs::write(&path, "not json").unwrap();
        let err = secure_jar().load(&path).unwrap_err();
        assert!(matches!(err, JarFileError::Json(_)));
    }

    #[test]
    fn test_host_only_cookie_not_visible_to_other_host() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jar.json");

        let mut jar = secure_jar();
        jar.write("hostonly=1;path=/");
        jar.write("shared=1;domain=freelancer.com;path=/");
        jar.save(&path).unwrap();

        let mut other = MemoryCookieJar::new("m.freelancer.com").with_secure_context(true);
        other.load(&path).unwrap();
        assert_eq!(other.read(), "shared=1");
        assert!(other.entry("hostonly", None, "/").is_none());
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let mut jar = secure_jar();
        jar.write("a=1; DOMAIN=.FreeLancer.com; Path=/; SECURE; samesite=none");
        let entry = jar.entry("a", Some("freelancer.com"), "/").unwrap();
        assert!(entry.secure);
        assert_eq!(entry.same_site, Some(SameSite::None));
    }

    #[test]
    fn test_relative_path_attribute_uses_default_path() {
        let mut jar = secure_jar().with_document_path("/projects/list");
        jar.write("a=1; path=projects");
        assert!(jar.entry("a", None, "/projects").is_some());
    }

    #[test]
    fn test_write_prunes_expired_entries() {
        let mut jar = secure_jar();
        jar.write("old=1;path=/");
        jar.cookies[0].expires = Some(UNIX_EPOCH + Duration::from_secs(1));

        jar.write("new=1;path=/");
        assert_eq!(jar.entries().len(), 1);
        assert_eq!(jar.entries()[0].name, "new");
    }

    #[test]
    fn test_default_path() {
        assert_eq!(default_path("/"), "/");
        assert_eq!(default_path("/index.html"), "/");
        assert_eq!(default_path("/a/b/c"), "/a/b");
        assert_eq!(default_path(""), "/");
    }

    #[test]
    fn test_domain_matches() {
        assert!(domain_matches("www.freelancer.com", "freelancer.com"));
        assert!(domain_matches("freelancer.com", "freelancer.com"));
        assert!(!domain_matches("notfreelancer.com", "freelancer.com"));
    }
}

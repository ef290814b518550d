//! Key/value cookie store over a host [`CookieJar`].
//!
//! [`CookieStore`] serializes per-write options into the jar's own assignment
//! syntax, reads values back out of the flat jar string, and derives the
//! cookie domain for a hostname.
//!
//! # Example
//!
//! ```
//! use fl_cookies::{CookieStore, Expires, MemoryCookieJar, WriteOptions};
//!
//! let mut store = CookieStore::new(MemoryCookieJar::new("www.freelancer.com"));
//! store.put("CHUCK_NORRIS", "42", &WriteOptions::new().expires(Expires::Never));
//! assert_eq!(store.get("CHUCK_NORRIS").as_deref(), Some("42"));
//! ```

mod domain;
mod mock;
mod options;

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument, trace};

use crate::jar::CookieJar;
use options::serialize_entry;

pub use domain::{DEFAULT_DOMAIN_PATTERN, DomainRule, DomainRuleError};
pub use mock::{MOCK_COOKIE_DOMAIN, MockCookieStore};
pub use options::{
    Expires, FAR_FUTURE_HTTP_DATE, ParseSameSiteError, SameSite, WriteOptions, format_http_date,
};

/// Name of the throwaway cookie used to probe `SameSite=None` support.
pub const SAME_SITE_PROBE_KEY: &str = "testsamesitenone";

// Written raw (not through `put`) so the probe itself never recurses into the
// probe. Path is pinned to `/` so the later removal targets the same scope.
const SAME_SITE_PROBE_ASSIGNMENT: &str = "testsamesitenone=1; path=/; secure; SameSite=None";

/// The cookie operations application code depends on.
///
/// Implemented by [`CookieStore`] and by the in-memory [`MockCookieStore`], so
/// call sites can be tested without a real jar.
pub trait CookieService {
    /// Returns the value stored under `key`, or `None` when absent or empty.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    fn put(&mut self, key: &str, value: &str, options: &WriteOptions);

    /// Removes `key` from the scope described by `options`.
    fn remove(&mut self, key: &str, options: &WriteOptions);

    /// Returns the cookie domain to use for `host_name`.
    fn get_domain(&self, host_name: &str) -> String;
}

/// Cookie store backed by a host jar.
///
/// Every operation is synchronous and infallible: absent values read as
/// `None`, unsupported attributes are dropped, and removals of missing keys
/// are no-ops.
#[derive(Debug)]
pub struct CookieStore<J> {
    jar: J,
    domain_rule: DomainRule,
}

impl<J: CookieJar> CookieStore<J> {
    /// Creates a store over `jar` using the default domain family rule.
    pub fn new(jar: J) -> Self {
        Self::with_domain_rule(jar, DomainRule::default())
    }

    /// Creates a store over `jar` with a custom domain derivation rule.
    pub fn with_domain_rule(jar: J, domain_rule: DomainRule) -> Self {
        Self { jar, domain_rule }
    }

    /// Returns the underlying jar.
    pub fn jar(&self) -> &J {
        &self.jar
    }

    /// Consumes the store and returns the underlying jar.
    pub fn into_jar(self) -> J {
        self.jar
    }

    /// Returns the decoded value for `key`.
    ///
    /// An empty value is indistinguishable from an absent one; both return
    /// `None`. Malformed jar content never panics, it just fails to match.
    #[instrument(level = "debug", skip(self))]
    pub fn get(&self, key: &str) -> Option<String> {
        let raw = self.jar.read();
        let tokens = parse_jar(&raw);
        let encoded = tokens.get(key)?;

        match urlencoding::decode(encoded) {
            Ok(decoded) if decoded.is_empty() => None,
            Ok(decoded) => Some(decoded.into_owned()),
            Err(error) => {
                debug!(error = %error, "cookie value is not valid UTF-8 after decoding");
                None
            }
        }
    }

    /// Writes `value` under `key` with the given options in one jar assignment.
    ///
    /// A `SameSite::None` request is only honored if the host accepts a probe
    /// cookie with that attribute; otherwise the attribute is omitted.
    #[instrument(level = "debug", skip(self, value, options))]
    pub fn put(&mut self, key: &str, value: &str, options: &WriteOptions) {
        let mut same_site = options.same_site;
        if same_site == Some(SameSite::None) && !self.same_site_none_supported() {
            debug!("host rejected SameSite=None; omitting attribute");
            same_site = None;
        }

        let assignment = serialize_entry(key, value, options, same_site, SystemTime::now());
        trace!(
            expires = options.expires.is_some(),
            domain = options.domain.as_deref(),
            path = options.path.as_deref(),
            secure = options.secure,
            same_site = same_site.map(SameSite::as_str),
            "writing cookie"
        );
        self.jar.write(&assignment);
    }

    /// Expires `key` in the scope described by `options`.
    ///
    /// `domain` and `path` must match the ones the cookie was written with,
    /// otherwise the host treats it as a different entry and leaves the
    /// original in place. Any `expires` in `options` is overridden.
    #[instrument(level = "debug", skip(self, options))]
    pub fn remove(&mut self, key: &str, options: &WriteOptions) {
        let mut options = options.clone();
        options.expires = Some(Expires::At(UNIX_EPOCH));
        self.put(key, "", &options);
    }

    /// Returns the cookie domain for `host_name`.
    ///
    /// See [`DomainRule::derive`].
    pub fn get_domain(&self, host_name: &str) -> String {
        self.domain_rule.derive(host_name)
    }

    /// Checks whether the host keeps a `SameSite=None` cookie.
    ///
    /// Some hosts reject the attribute outright, others only accept it on
    /// secure cookies. The probe cookie is always removed afterwards.
    fn same_site_none_supported(&mut self) -> bool {
        let cleanup = WriteOptions::new();
        self.remove(SAME_SITE_PROBE_KEY, &cleanup);
        self.jar.write(SAME_SITE_PROBE_ASSIGNMENT);
        let supported = self.get(SAME_SITE_PROBE_KEY).as_deref() == Some("1");
        self.remove(SAME_SITE_PROBE_KEY, &cleanup);

        debug!(supported, "probed SameSite=None support");
        supported
    }
}

impl<J: CookieJar> CookieService for CookieStore<J> {
    fn get(&self, key: &str) -> Option<String> {
        Self::get(self, key)
    }

    fn put(&mut self, key: &str, value: &str, options: &WriteOptions) {
        Self::put(self, key, value, options);
    }

    fn remove(&mut self, key: &str, options: &WriteOptions) {
        Self::remove(self, key, options);
    }

    fn get_domain(&self, host_name: &str) -> String {
        Self::get_domain(self, host_name)
    }
}

/// Splits a raw jar string into decoded names and still-encoded values.
///
/// Tokens without `=` or with an empty name are skipped. When a name appears
/// more than once, the last occurrence wins.
fn parse_jar(raw: &str) -> HashMap<String, &str> {
    let mut tokens = HashMap::new();
    for token in raw.split(';') {
        let Some((name, value)) = token.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let Ok(name) = urlencoding::decode(name) else {
            continue;
        };
        tokens.insert(name.into_owned(), value.trim());
    }
    tokens
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::jar::{HostPolicy, MemoryCookieJar};

    /// Minimal jar that appends every assignment to a log and reads a fixed string.
    #[derive(Default)]
    struct RecordingJar {
        contents: String,
        writes: Vec<String>,
    }

    impl CookieJar for RecordingJar {
        fn read(&self) -> String {
            self.contents.clone()
        }

        fn write(&mut self, assignment: &str) {
            self.writes.push(assignment.to_string());
        }
    }

    fn jar_with(contents: &str) -> RecordingJar {
        RecordingJar {
            contents: contents.to_string(),
            writes: Vec::new(),
        }
    }

    fn memory_store() -> CookieStore<MemoryCookieJar> {
        CookieStore::new(MemoryCookieJar::new("www.freelancer.com").with_secure_context(true))
    }

    #[test]
    fn test_parse_jar_handles_first_middle_last_positions() {
        let tokens = parse_jar("a=1; b=2; c=3");
        assert_eq!(tokens.get("a"), Some(&"1"));
        assert_eq!(tokens.get("b"), Some(&"2"));
        assert_eq!(tokens.get("c"), Some(&"3"));
    }

    #[test]
    fn test_parse_jar_tolerates_whitespace_and_junk() {
        let tokens = parse_jar("  a = 1 ;;novalue; =orphan;b=2");
        assert_eq!(tokens.get("a"), Some(&"1"));
        assert_eq!(tokens.get("b"), Some(&"2"));
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_parse_jar_last_duplicate_wins() {
        let tokens = parse_jar("k=first; k=second");
        assert_eq!(tokens.get("k"), Some(&"second"));
    }

    #[test]
    fn test_parse_jar_decodes_names() {
        let tokens = parse_jar("my%20key=v");
        assert_eq!(tokens.get("my key"), Some(&"v"));
    }

    #[test]
    fn test_get_decodes_value() {
        let store = CookieStore::new(jar_with("x=1; greeting=hello%21; y=2"));
        assert_eq!(store.get("greeting").as_deref(), Some("hello!"));
    }

    #[test]
    fn test_get_does_not_match_key_prefix() {
        let store = CookieStore::new(jar_with("tokenextra=1"));
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn test_get_empty_value_is_none() {
        let store = CookieStore::new(jar_with("empty=; other=x"));
        assert_eq!(store.get("empty"), None);
    }

    #[test]
    fn test_get_invalid_utf8_value_is_none() {
        let store = CookieStore::new(jar_with("bad=%FF%FE"));
        assert_eq!(store.get("bad"), None);
    }

    #[test]
    fn test_get_on_empty_jar_is_none() {
        let store = CookieStore::new(jar_with(""));
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn test_put_issues_single_write() {
        let mut store = CookieStore::new(RecordingJar::default());
        store.put("k", "v", &WriteOptions::new().secure(true));
        assert_eq!(store.jar().writes, vec!["k=v;path=/;secure".to_string()]);
    }

    #[test]
    fn test_put_lax_does_not_probe() {
        let mut store = CookieStore::new(RecordingJar::default());
        store.put("k", "v", &WriteOptions::new().same_site(SameSite::Lax));
        assert_eq!(store.jar().writes, vec!["k=v;path=/; SameSite=Lax".to_string()]);
    }

    #[test]
    fn test_remove_writes_epoch_expiry_and_keeps_scope() {
        let mut store = CookieStore::new(RecordingJar::default());
        store.remove(
            "k",
            &WriteOptions::new()
                .domain("freelancer.com")
                .path("/app")
                .expires(Expires::Never),
        );
        assert_eq!(
            store.jar().writes,
            vec!["k=;expires=Thu, 01 Jan 1970 00:00:00 GMT;domain=freelancer.com;path=/app".to_string()]
        );
    }

    #[test]
    fn test_probe_failure_omits_same_site() {
        // The recording jar never reflects writes, so the probe cannot read back.
        let mut store = CookieStore::new(RecordingJar::default());
        store.put("k", "v", &WriteOptions::new().secure(true).same_site(SameSite::None));

        let writes = &store.jar().writes;
        assert_eq!(writes.len(), 4);
        assert!(writes[0].starts_with("testsamesitenone=;expires=Thu, 01 Jan 1970"));
        assert_eq!(writes[1], SAME_SITE_PROBE_ASSIGNMENT);
        assert!(writes[2].starts_with("testsamesitenone=;expires=Thu, 01 Jan 1970"));
        assert_eq!(writes[3], "k=v;path=/;secure");
    }

    #[test]
    fn test_probe_success_keeps_same_site_and_cleans_up() {
        let mut store = memory_store();
        store.put("k", "v", &WriteOptions::new().secure(true).same_site(SameSite::None));

        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.get(SAME_SITE_PROBE_KEY), None);
        let entry = store.jar().entry("k", None, "/").unwrap();
        assert_eq!(entry.same_site, Some(SameSite::None));
    }

    #[test]
    fn test_probe_rejected_by_host_downgrades_and_cleans_up() {
        let jar = MemoryCookieJar::new("www.freelancer.com")
            .with_secure_context(true)
            .with_policy(HostPolicy {
                accept_same_site_none: false,
                ..HostPolicy::default()
            });
        let mut store = CookieStore::new(jar);
        store.put("k", "v", &WriteOptions::new().secure(true).same_site(SameSite::None));

        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.get(SAME_SITE_PROBE_KEY), None);
        let entry = store.jar().entry("k", None, "/").unwrap();
        assert_eq!(entry.same_site, None);
    }

    #[test]
    fn test_probe_clears_stale_probe_cookie() {
        let mut store = memory_store();
        store.jar.write("testsamesitenone=stale; path=/");
        store.put("k", "v", &WriteOptions::new().secure(true).same_site(SameSite::None));
        assert_eq!(store.get(SAME_SITE_PROBE_KEY), None);
    }

    #[test]
    fn test_put_and_remove_match_uri_component_encoded_key() {
        let mut store = memory_store();
        store.jar.write("it's=a!b;path=/");
        assert_eq!(store.get("it's").as_deref(), Some("a!b"));

        store.put("it's", "new", &WriteOptions::new());
        assert_eq!(store.jar().read(), "it's=new");

        store.remove("it's", &WriteOptions::new());
        assert_eq!(store.get("it's"), None);
        assert!(store.jar().entries().is_empty());
    }

    #[test]
    fn test_put_leaves_uri_component_marks_unescaped() {
        let mut store = CookieStore::new(RecordingJar::default());
        store.put("(x)", "hello!*", &WriteOptions::new());
        assert_eq!(store.jar().writes, vec!["(x)=hello!*;path=/".to_string()]);
    }

    #[test]
    fn test_get_domain_uses_rule() {
        let store = CookieStore::new(RecordingJar::default());
        assert_eq!(store.get_domain("www.freelancer.com"), ".freelancer.com");

        let custom = CookieStore::with_domain_rule(
            RecordingJar::default(),
            DomainRule::new(r"fln-dev\.net$").unwrap(),
        );
        assert_eq!(custom.get_domain("training.syd1.fln-dev.net"), ".fln-dev.net");
    }

    #[test]
    fn test_store_usable_through_trait_object() {
        fn remember(service: &mut dyn CookieService) {
            service.put("seen", "yes", &WriteOptions::new());
        }

        let mut store = memory_store();
        remember(&mut store);
        assert_eq!(CookieService::get(&store, "seen").as_deref(), Some("yes"));
    }
}

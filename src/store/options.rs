//! Per-write cookie options and their serialization into jar attributes.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::warn;

/// Expiry literal used for cookies that should never expire.
pub const FAR_FUTURE_HTTP_DATE: &str = "Fri, 31 Dec 9999 23:59:59 GMT";

/// Latest instant an HTTP-date can express (9999-12-31T23:59:59Z).
const MAX_HTTP_DATE_SECS: u64 = 253_402_300_799;

/// Bytes escaped in cookie keys and values: everything except
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, the same set `encodeURIComponent` keeps.
const URI_COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// When a cookie should expire.
///
/// Leaving [`WriteOptions::expires`] unset produces a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expires {
    /// Far-future expiry (`Fri, 31 Dec 9999 23:59:59 GMT`).
    Never,
    /// Relative to now. Emitted as an absolute `expires` date, not `max-age`,
    /// so hosts that ignore `max-age` still honor it.
    ///
    /// Zero seconds emits no attribute.
    InSeconds(i64),
    /// An absolute point in time.
    At(SystemTime),
    /// A pre-formatted date string, passed through verbatim.
    ///
    /// The caller is responsible for the format. An empty string emits no attribute.
    Literal(String),
}

impl Expires {
    /// Resolves this expiry to the date string written to the jar.
    ///
    /// Returns `None` when no `expires` attribute should be emitted.
    #[must_use]
    pub fn resolve(&self, now: SystemTime) -> Option<String> {
        match self {
            Self::Never => Some(FAR_FUTURE_HTTP_DATE.to_string()),
            Self::InSeconds(0) => None,
            Self::InSeconds(seconds) => {
                let offset = Duration::from_secs(seconds.unsigned_abs());
                let target = if *seconds > 0 {
                    now.checked_add(offset)
                } else {
                    now.checked_sub(offset)
                };
                match target {
                    Some(time) => Some(format_http_date(time)),
                    // Overflowing SystemTime in either direction lands past the
                    // representable range anyway.
                    None if *seconds > 0 => Some(FAR_FUTURE_HTTP_DATE.to_string()),
                    None => Some(format_http_date(UNIX_EPOCH)),
                }
            }
            Self::At(time) => Some(format_http_date(*time)),
            Self::Literal(literal) if literal.is_empty() => None,
            Self::Literal(literal) => Some(literal.clone()),
        }
    }
}

impl From<SystemTime> for Expires {
    fn from(time: SystemTime) -> Self {
        Self::At(time)
    }
}

/// Formats `time` as an RFC 7231 HTTP-date, clamping to the representable range.
///
/// Times before the Unix epoch become the epoch; times after year 9999 become
/// [`FAR_FUTURE_HTTP_DATE`].
#[must_use]
pub fn format_http_date(time: SystemTime) -> String {
    let Ok(since_epoch) = time.duration_since(UNIX_EPOCH) else {
        warn!("expiry before the Unix epoch; clamping to epoch");
        return httpdate::fmt_http_date(UNIX_EPOCH);
    };

    if since_epoch.as_secs() > MAX_HTTP_DATE_SECS {
        warn!(
            secs = since_epoch.as_secs(),
            "expiry beyond year 9999; clamping to far-future date"
        );
        return FAR_FUTURE_HTTP_DATE.to_string();
    }

    httpdate::fmt_http_date(time)
}

/// Cross-site sharing policy for a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SameSite {
    Lax,
    Strict,
    /// Sent on cross-site requests. Subject to a capability probe before use.
    None,
}

impl SameSite {
    /// Returns the attribute value as written to the jar.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a `SameSite` value is not `Lax`, `Strict`, or `None`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SameSite value '{0}' (expected Lax, Strict or None)")]
pub struct ParseSameSiteError(String);

impl FromStr for SameSite {
    type Err = ParseSameSiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("lax") {
            Ok(Self::Lax)
        } else if trimmed.eq_ignore_ascii_case("strict") {
            Ok(Self::Strict)
        } else if trimmed.eq_ignore_ascii_case("none") {
            Ok(Self::None)
        } else {
            Err(ParseSameSiteError(s.to_string()))
        }
    }
}

/// Options applied to a single cookie write.
///
/// Every field is optional; the default writes a session cookie scoped to the
/// current host with path `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Expiration; `None` writes a session cookie.
    pub expires: Option<Expires>,
    /// Explicit cookie domain; `None` leaves the host default (current host only).
    pub domain: Option<String>,
    /// Cookie path; `None` writes `/`.
    pub path: Option<String>,
    /// Restrict the cookie to secure transport.
    pub secure: bool,
    /// Cross-site sharing policy; `None` omits the attribute.
    pub same_site: Option<SameSite>,
}

impl WriteOptions {
    /// Creates empty options (session cookie, host default domain, path `/`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn expires(mut self, expires: impl Into<Expires>) -> Self {
        self.expires = Some(expires.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, URI_COMPONENT_ENCODE_SET).to_string()
}

/// Builds the jar assignment for one cookie.
///
/// `same_site` is passed separately from `options` because the effective value
/// may have been downgraded by the capability probe.
pub(crate) fn serialize_entry(
    key: &str,
    value: &str,
    options: &WriteOptions,
    same_site: Option<SameSite>,
    now: SystemTime,
) -> String {
    let mut cookie = format!("{}={}", encode_component(key), encode_component(value));

    if let Some(date) = options.expires.as_ref().and_then(|e| e.resolve(now)) {
        cookie.push_str(";expires=");
        cookie.push_str(&date);
    }

    if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
        cookie.push_str(";domain=");
        cookie.push_str(domain);
    }

    // Path is always emitted, unlike domain.
    let path = options.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/");
    cookie.push_str(";path=");
    cookie.push_str(path);

    if options.secure {
        cookie.push_str(";secure");
    }

    if let Some(same_site) = same_site {
        cookie.push_str("; SameSite=");
        cookie.push_str(same_site.as_str());
    }

    cookie
}

//! fl-cookies Library
//!
//! A small key/value layer over a host cookie jar. The jar is the flat,
//! `; `-joined string a browser exposes as `document.cookie`; this library adds
//! per-write options (expiry, domain, path, secure, SameSite) and derives the
//! cookie domain that shares cookies across a domain family.
//!
//! # Architecture
//!
//! - [`store`] - [`CookieStore`] and its options, domain rule and test double
//! - [`jar`] - the [`CookieJar`] capability plus host adapters:
//!   [`DocumentCookieJar`] over a shared `reqwest` jar, and the host-emulating
//!   [`MemoryCookieJar`]

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod jar;
pub mod store;

// Re-export commonly used types
pub use jar::{
    CookieJar, DocumentCookieJar, DocumentUrlError, HostPolicy, JarFileError, MemoryCookieJar,
    StoredCookie,
};
pub use store::{
    CookieService, CookieStore, DEFAULT_DOMAIN_PATTERN, DomainRule, DomainRuleError, Expires,
    FAR_FUTURE_HTTP_DATE, MOCK_COOKIE_DOMAIN, MockCookieStore, ParseSameSiteError,
    SAME_SITE_PROBE_KEY, SameSite, WriteOptions, format_http_date,
};

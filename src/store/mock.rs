//! In-memory stand-in for [`CookieStore`](super::CookieStore).

use std::collections::HashMap;

use super::{CookieService, WriteOptions};

/// Cookie domain reported by [`MockCookieStore::get_domain`].
pub const MOCK_COOKIE_DOMAIN: &str = ".freelancer.com";

/// Test double for code that depends on a [`CookieService`].
///
/// Values live in a plain map: no encoding, no expiry, no scoping. Options are
/// ignored and `get_domain` always answers [`MOCK_COOKIE_DOMAIN`].
#[derive(Debug, Clone, Default)]
pub struct MockCookieStore {
    pub cookies: HashMap<String, String>,
}

impl MockCookieStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieService for MockCookieStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cookies.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str, _options: &WriteOptions) {
        self.cookies.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str, _options: &WriteOptions) {
        self.cookies.remove(key);
    }

    fn get_domain(&self, _host_name: &str) -> String {
        MOCK_COOKIE_DOMAIN.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Expires;

    /// Example call site written against the trait.
    fn remember_login(cookies: &mut impl CookieService, host: &str, token: &str) {
        let options = WriteOptions::new()
            .domain(cookies.get_domain(host))
            .expires(Expires::Never);
        cookies.put("GETAFREE_AUTH_HASH", token, &options);
    }

    #[test]
    fn test_mock_stores_values_verbatim() {
        let mut mock = MockCookieStore::new();
        remember_login(&mut mock, "www.freelancer.com", "a;b=c");
        assert_eq!(mock.get("GETAFREE_AUTH_HASH").as_deref(), Some("a;b=c"));
    }

    #[test]
    fn test_mock_remove_deletes_key() {
        let mut mock = MockCookieStore::new();
        mock.put("k", "v", &WriteOptions::new());
        mock.remove("k", &WriteOptions::new().domain("ignored.example"));
        assert_eq!(mock.get("k"), None);
    }

    #[test]
    fn test_mock_domain_is_constant() {
        let mock = MockCookieStore::new();
        assert_eq!(mock.get_domain("training.syd1.fln-dev.net"), ".freelancer.com");
    }
}
